// ============================================================================
// predux - Context
// Registry of stores, id counters, batch depth and the transaction stack
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::constants::{CONTEXT_KEY, CONTEXT_VERSION};
use super::error::{Error, Result};
use super::types::{AnyStore, SliceId, SubState};
use crate::reactivity::scheduling::FrameScheduler;
use crate::reactivity::transaction::Snapshot;

/// A host for shared contexts: a plain std map so that independent copies
/// of this crate linked into one program can all read it.
pub type ContextHost = RefCell<HashMap<String, Rc<dyn Any>>>;

/// Entry published in a [`ContextHost`]. Only std types, so the version can
/// be read back by any copy of the crate.
type HostEntry = (u32, Rc<dyn Any>);

// =============================================================================
// CONTEXT
// =============================================================================

/// Shared state of every store, slice and transaction built from it.
///
/// A context is constructed explicitly and handed to whatever needs it.
/// Execution is single threaded, so interior mutability is enough; no
/// method here ever calls user code while a `RefCell` is borrowed.
pub struct Context {
    version: u32,

    // =========================================================================
    // IDS AND REGISTRY
    // =========================================================================
    /// Incremented for every generated guid
    guid_index: Cell<u64>,

    /// Every registered store, by guid
    stores: RefCell<HashMap<String, Weak<dyn AnyStore>>>,

    // =========================================================================
    // BATCHING
    // =========================================================================
    /// Nesting depth of open batches. Notifications are held while > 0.
    batch_depth: Cell<u32>,

    /// Stores that changed during the current batch, in first-change order
    changed_stores: RefCell<Vec<(String, Weak<dyn AnyStore>)>>,

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================
    /// Open transactions, innermost last
    transactions: RefCell<Vec<(u64, Rc<Snapshot>)>>,

    /// Serial of the most recently opened transaction
    transaction_serial: Cell<u64>,

    /// Frame queue used by stores that were not given a scheduler
    frames: Rc<FrameScheduler>,
}

impl Context {
    /// Create a fresh, unshared context.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            version: CONTEXT_VERSION,
            guid_index: Cell::new(0),
            stores: RefCell::new(HashMap::new()),
            batch_depth: Cell::new(0),
            changed_stores: RefCell::new(Vec::new()),
            transactions: RefCell::new(Vec::new()),
            transaction_serial: Cell::new(0),
            frames: Rc::new(FrameScheduler::new()),
        })
    }

    /// Join the context published in `host`, publishing a new one if there
    /// is none yet.
    ///
    /// Fails if the published context was created by an incompatible copy
    /// of this crate.
    pub fn attach(host: &ContextHost) -> Result<Rc<Self>> {
        Self::attach_as(host, CONTEXT_KEY)
    }

    /// Like [`attach`](Self::attach) with a custom host key.
    pub fn attach_as(host: &ContextHost, key: &str) -> Result<Rc<Self>> {
        let mut entries = host.borrow_mut();

        if let Some(existing) = entries.get(key) {
            let incompatible = |found| Error::IncompatibleContext {
                key: key.to_owned(),
                found,
                expected: CONTEXT_VERSION,
            };

            let Some((version, context)) = existing.downcast_ref::<HostEntry>() else {
                return Err(incompatible(0));
            };

            if *version != CONTEXT_VERSION {
                return Err(incompatible(*version));
            }

            return context
                .clone()
                .downcast::<Context>()
                .map_err(|_| incompatible(*version));
        }

        let context = Self::new();
        let entry: HostEntry = (CONTEXT_VERSION, context.clone() as Rc<dyn Any>);
        entries.insert(key.to_owned(), Rc::new(entry));

        log::debug!("published a new context under '{key}'");
        Ok(context)
    }

    /// Version of this context's layout.
    pub fn version(&self) -> u32 {
        self.version
    }

    // =========================================================================
    // IDS
    // =========================================================================

    /// Generate a guid unique within this context: `prefix.N`.
    pub fn next_guid(&self, prefix: &str) -> String {
        let index = self.guid_index.get() + 1;
        self.guid_index.set(index);
        format!("{prefix}.{index}")
    }

    // =========================================================================
    // STORE REGISTRY
    // =========================================================================

    /// Register a store under its guid.
    ///
    /// Registering the same store twice is a no-op; registering a different
    /// live store under a taken guid is an error.
    pub fn register_store(&self, store: &Rc<dyn AnyStore>) -> Result<()> {
        let guid = store.guid().to_owned();
        let mut stores = self.stores.borrow_mut();

        if let Some(prev) = stores.get(&guid).and_then(Weak::upgrade) {
            if !Rc::ptr_eq(&prev, store) {
                return Err(Error::DuplicateStore { guid });
            }
            return Ok(());
        }

        stores.insert(guid, Rc::downgrade(store));
        Ok(())
    }

    /// Look up a live store by guid.
    pub fn store(&self, guid: &str) -> Option<Rc<dyn AnyStore>> {
        self.stores.borrow().get(guid).and_then(Weak::upgrade)
    }

    /// Guids of all live stores.
    pub fn store_guids(&self) -> Vec<String> {
        let mut guids: Vec<String> = self
            .stores
            .borrow()
            .iter()
            .filter(|(_, store)| store.strong_count() > 0)
            .map(|(guid, _)| guid.clone())
            .collect();
        guids.sort_unstable();
        guids
    }

    /// Drop the registry entry of a store that is being destroyed.
    pub(crate) fn forget_store(&self, guid: &str) {
        // may run from a Drop while the registry is borrowed
        if let Ok(mut stores) = self.stores.try_borrow_mut() {
            if stores.get(guid).is_some_and(|store| store.strong_count() == 0) {
                stores.remove(guid);
            }
        }
    }

    // =========================================================================
    // BATCH BOOKKEEPING
    // =========================================================================

    /// Increment batch depth, returns new depth
    pub(crate) fn enter_batch(&self) -> u32 {
        let depth = self.batch_depth.get() + 1;
        self.batch_depth.set(depth);
        depth
    }

    /// Decrement batch depth, returns new depth, or `None` on underflow
    pub(crate) fn exit_batch(&self) -> Option<u32> {
        let depth = self.batch_depth.get().checked_sub(1)?;
        self.batch_depth.set(depth);
        Some(depth)
    }

    /// Current batch depth
    pub fn batch_depth(&self) -> u32 {
        self.batch_depth.get()
    }

    /// Check if currently in a batch
    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    /// Hold the notification of a changed store until the batch closes.
    ///
    /// Returns false, and records nothing, when no batch is open.
    pub(crate) fn defer_notification(&self, guid: &str, store: Weak<dyn AnyStore>) -> bool {
        if !self.is_batching() {
            return false;
        }

        let mut changed = self.changed_stores.borrow_mut();
        if !changed.iter().any(|(known, _)| known == guid) {
            changed.push((guid.to_owned(), store));
        }
        true
    }

    /// Take the stores whose notifications were held
    pub(crate) fn take_changed_stores(&self) -> Vec<(String, Weak<dyn AnyStore>)> {
        self.changed_stores.replace(Vec::new())
    }

    // =========================================================================
    // TRANSACTION BOOKKEEPING
    // =========================================================================

    /// Push a new snapshot frame, returns its serial
    pub(crate) fn push_transaction(&self, snapshot: Rc<Snapshot>) -> u64 {
        let serial = self.transaction_serial.get() + 1;
        self.transaction_serial.set(serial);
        self.transactions.borrow_mut().push((serial, snapshot));
        serial
    }

    /// Serial of the innermost open transaction
    pub(crate) fn top_transaction(&self) -> Option<u64> {
        self.transactions.borrow().last().map(|(serial, _)| *serial)
    }

    /// Pop the innermost transaction frame
    pub(crate) fn pop_transaction(&self) -> Option<u64> {
        self.transactions.borrow_mut().pop().map(|(serial, _)| serial)
    }

    /// Number of open transactions
    pub fn transaction_depth(&self) -> usize {
        self.transactions.borrow().len()
    }

    /// Record the pre-change sub-state of a slice in every open transaction.
    pub(crate) fn record_change(
        &self,
        store: &Weak<dyn AnyStore>,
        guid: &str,
        slice_id: &SliceId,
        previous: &SubState,
    ) {
        let frames: Vec<Rc<Snapshot>> = self
            .transactions
            .borrow()
            .iter()
            .map(|(_, snapshot)| snapshot.clone())
            .collect();

        for snapshot in frames {
            snapshot.record(store, guid, slice_id, previous);
        }
    }

    // =========================================================================
    // SCHEDULING
    // =========================================================================

    /// The frame queue shared by stores without a custom scheduler.
    pub fn frames(&self) -> &Rc<FrameScheduler> {
        &self.frames
    }

    /// Run one frame of the default frame queue, delivering every change
    /// notification scheduled so far. Returns the number of callbacks run.
    pub fn tick(&self) -> usize {
        self.frames.run_frame()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("version", &self.version)
            .field("stores", &self.store_guids())
            .field("batch_depth", &self.batch_depth.get())
            .field("transaction_depth", &self.transaction_depth())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeStore {
        guid: String,
    }

    impl AnyStore for FakeStore {
        fn guid(&self) -> &str {
            &self.guid
        }

        fn flush_notification(&self) {}

        fn restore_slice(&self, _slice_id: &SliceId, _sub_state: SubState) {}

        fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
            self
        }
    }

    fn fake(guid: &str) -> Rc<dyn AnyStore> {
        Rc::new(FakeStore {
            guid: guid.to_owned(),
        })
    }

    #[test]
    fn guids_are_sequential_per_context() {
        let ctx = Context::new();
        assert_eq!(ctx.next_guid("store"), "store.1");
        assert_eq!(ctx.next_guid("slice"), "slice.2");

        // independent contexts have independent counters
        let other = Context::new();
        assert_eq!(other.next_guid("store"), "store.1");
    }

    #[test]
    fn register_same_store_twice_is_noop() {
        let ctx = Context::new();
        let store = fake("counter");

        ctx.register_store(&store).unwrap();
        ctx.register_store(&store).unwrap();

        assert_eq!(ctx.store_guids(), vec!["counter".to_string()]);
        assert!(Rc::ptr_eq(&ctx.store("counter").unwrap(), &store));
    }

    #[test]
    fn register_different_store_under_same_guid_fails() {
        let ctx = Context::new();
        let first = fake("counter");
        let second = fake("counter");

        ctx.register_store(&first).unwrap();
        let err = ctx.register_store(&second).unwrap_err();
        assert!(matches!(err, Error::DuplicateStore { ref guid } if guid == "counter"));
    }

    #[test]
    fn dead_store_guid_can_be_reused() {
        let ctx = Context::new();
        {
            let first = fake("counter");
            ctx.register_store(&first).unwrap();
        }

        assert!(ctx.store("counter").is_none());
        assert!(ctx.store_guids().is_empty());

        let second = fake("counter");
        ctx.register_store(&second).unwrap();
        assert!(ctx.store("counter").is_some());
    }

    #[test]
    fn batch_depth() {
        let ctx = Context::new();
        assert_eq!(ctx.batch_depth(), 0);
        assert!(!ctx.is_batching());

        assert_eq!(ctx.enter_batch(), 1);
        assert_eq!(ctx.enter_batch(), 2);
        assert!(ctx.is_batching());

        assert_eq!(ctx.exit_batch(), Some(1));
        assert_eq!(ctx.exit_batch(), Some(0));
        assert!(!ctx.is_batching());

        // underflow is reported, not wrapped
        assert_eq!(ctx.exit_batch(), None);
        assert_eq!(ctx.batch_depth(), 0);
    }

    #[test]
    fn deferred_notifications_are_deduplicated() {
        let ctx = Context::new();
        let store = fake("a");

        assert!(!ctx.defer_notification("a", Rc::downgrade(&store)));

        ctx.enter_batch();
        assert!(ctx.defer_notification("a", Rc::downgrade(&store)));
        assert!(ctx.defer_notification("a", Rc::downgrade(&store)));

        let changed = ctx.take_changed_stores();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, "a");
        assert!(ctx.take_changed_stores().is_empty());
    }

    #[test]
    fn attach_shares_one_context_per_host() {
        let host = ContextHost::default();

        let a = Context::attach(&host).unwrap();
        let b = Context::attach(&host).unwrap();
        assert!(Rc::ptr_eq(&a, &b));

        // a different key is a different context
        let c = Context::attach_as(&host, "other").unwrap();
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn attach_refuses_incompatible_versions() {
        let host = ContextHost::default();
        let foreign: HostEntry = (CONTEXT_VERSION + 1, Rc::new(()) as Rc<dyn Any>);
        host.borrow_mut()
            .insert(CONTEXT_KEY.to_owned(), Rc::new(foreign));

        let err = Context::attach(&host).unwrap_err();
        assert!(matches!(
            err,
            Error::IncompatibleContext { found, expected, .. }
                if found == CONTEXT_VERSION + 1 && expected == CONTEXT_VERSION
        ));
    }

    #[test]
    fn attach_refuses_foreign_payloads() {
        let host = ContextHost::default();

        // same version, but not our context type
        let foreign: HostEntry = (CONTEXT_VERSION, Rc::new(42u8) as Rc<dyn Any>);
        host.borrow_mut()
            .insert(CONTEXT_KEY.to_owned(), Rc::new(foreign));
        assert!(Context::attach(&host).is_err());

        // not even a host entry
        host.borrow_mut()
            .insert("junk".to_owned(), Rc::new("junk") as Rc<dyn Any>);
        let err = Context::attach_as(&host, "junk").unwrap_err();
        assert!(matches!(err, Error::IncompatibleContext { found: 0, .. }));
    }
}
