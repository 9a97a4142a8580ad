// ============================================================================
// predux - Store
// Holds the state tree, routes actions to reducers and announces changes
// ============================================================================
//
// Dispatch runs in four steps:
//
//   1. Look up the reducer by action id (unknown ids are ignored)
//   2. Run it with the dispatch flag raised, so a reducer dispatching into
//      its own store fails instead of recursing
//   3. If the slice came back as a different Rc, swap in a new tree and
//      record the old sub-state in every open transaction
//   4. Announce: `dispatch_completed` always, `state_changed` only on change,
//      and only once per batch or scheduler frame
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::core::constants::STORE_GUID_PREFIX;
use crate::core::context::Context;
use crate::core::error::{Error, Result};
use crate::core::types::{ActionId, AnyStore, SliceId, StateTree, SubState};
use crate::primitives::selector::Selector;
use crate::primitives::signal::{ListenerId, Signal};
use crate::primitives::slice::{Action, ActionCreator, AnySlice, ReducerEntry, Slice};
use crate::reactivity::scheduling::{FrameHandle, Scheduler};

// =============================================================================
// OPTIONS
// =============================================================================

/// Options for creating a store.
#[derive(Clone, Default)]
pub struct StoreOptions {
    /// Fixed guid instead of a generated `store.N`.
    pub guid: Option<String>,

    /// Where change notifications are deferred to. Defaults to the
    /// context's frame queue, pumped with [`Context::tick`].
    pub scheduler: Option<Rc<dyn Scheduler>>,
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("guid", &self.guid)
            .field("scheduler", &self.scheduler.as_ref().map(|_| "custom"))
            .finish()
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Assembles a store from slices.
pub struct StoreBuilder<'a> {
    ctx: &'a Rc<Context>,
    slices: Vec<Rc<dyn AnySlice>>,
    options: StoreOptions,
}

impl StoreBuilder<'_> {
    pub fn slice<S: 'static>(mut self, slice: &Slice<S>) -> Self {
        self.slices.push(slice.as_any_slice());
        self
    }

    pub fn any_slice(mut self, slice: Rc<dyn AnySlice>) -> Self {
        self.slices.push(slice);
        self
    }

    pub fn options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the store and register it with the context.
    ///
    /// Fails when two slices share an id, when two reducers share an action
    /// id, or when another live store already uses the requested guid.
    pub fn build(self) -> Result<Store> {
        let ctx = self.ctx;
        let guid = match self.options.guid {
            Some(guid) => guid,
            None => ctx.next_guid(STORE_GUID_PREFIX),
        };

        let mut slices: HashMap<SliceId, SubState> = HashMap::new();
        let mut reducers: HashMap<ActionId, ReducerEntry> = HashMap::new();

        for slice in &self.slices {
            if slices.contains_key(slice.slice_id()) {
                return Err(Error::DuplicateSlice {
                    slice_id: slice.slice_id().to_string(),
                });
            }
            slices.insert(slice.slice_id().clone(), slice.initial_sub_state());

            for reducer in slice.reducers() {
                if reducers.contains_key(reducer.action_id()) {
                    return Err(Error::DuplicateReducer {
                        action_id: reducer.action_id().to_string(),
                    });
                }
                reducers.insert(reducer.action_id().clone(), reducer.clone());
            }
        }

        let scheduler: Rc<dyn Scheduler> = match self.options.scheduler {
            Some(scheduler) => scheduler,
            None => ctx.frames().clone(),
        };

        let inner = Rc::new_cyclic(|me| StoreInner {
            me: me.clone(),
            guid,
            ctx: ctx.clone(),
            state: RefCell::new(StateTree::from_map(slices)),
            reducers,
            dispatching: Cell::new(false),
            scheduler,
            frame: Cell::new(None),
            frame_requested: Cell::new(false),
            window: Cell::new(0),
            window_start: RefCell::new(None),
            state_changed: Signal::new(),
            dispatch_completed: Signal::new(),
        });

        let erased: Rc<dyn AnyStore> = inner.clone();
        ctx.register_store(&erased)?;

        log::debug!(
            "created store '{}' with {} slice(s) and {} reducer(s)",
            inner.guid,
            inner.state.borrow().len(),
            inner.reducers.len()
        );

        Ok(Store { inner })
    }
}

/// Build a store from type-erased slices with default options.
///
/// ```
/// use predux::{create_store, Context};
///
/// let ctx = Context::new();
/// let todos = ctx.create_slice(Vec::<String>::new()).build();
/// let filter = ctx.create_slice(String::from("all")).build();
///
/// let store = create_store(&ctx, &[todos.as_any_slice(), filter.as_any_slice()]).unwrap();
/// assert_eq!(store.get_state().len(), 2);
/// ```
pub fn create_store(ctx: &Rc<Context>, slices: &[Rc<dyn AnySlice>]) -> Result<Store> {
    slices
        .iter()
        .fold(Store::builder(ctx), |builder, slice| builder.any_slice(slice.clone()))
        .build()
}

// =============================================================================
// STORE INNER
// =============================================================================

struct StoreInner {
    me: Weak<StoreInner>,
    guid: String,
    ctx: Rc<Context>,

    /// Replaced wholesale on every change
    state: RefCell<StateTree>,
    reducers: HashMap<ActionId, ReducerEntry>,

    /// Raised while a reducer runs
    dispatching: Cell<bool>,

    // =========================================================================
    // NOTIFICATION WINDOW
    // =========================================================================
    scheduler: Rc<dyn Scheduler>,

    /// Handle of the scheduled delivery, for cancellation
    frame: Cell<Option<FrameHandle>>,

    /// A delivery was requested and has not run yet
    frame_requested: Cell<bool>,

    /// Serial of the current window; a delivery for an older one is stale
    window: Cell<u64>,

    /// The tree at the start of the current window
    window_start: RefCell<Option<StateTree>>,

    state_changed: Signal<()>,
    dispatch_completed: Signal<Action>,
}

/// Lowers the dispatch flag when the reducer returns or unwinds.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl StoreInner {
    fn erased(&self) -> Weak<dyn AnyStore> {
        self.me.clone()
    }

    fn dispatch(&self, action: Action, force_immediate: bool) -> Result<()> {
        if self.dispatching.get() {
            return Err(Error::DispatchInProgress);
        }

        let Some(reducer) = self.reducers.get(action.id()) else {
            log::trace!("store '{}' ignored unknown action '{}'", self.guid, action.id());
            return Ok(());
        };

        log::trace!("store '{}' dispatching '{}'", self.guid, reducer.display_name());

        let old_tree = self.state.borrow().clone();
        let changed = {
            let _guard = DispatchGuard::enter(&self.dispatching);

            let slice_id = reducer.slice_id();
            let previous = old_tree
                .get_raw(slice_id)
                .cloned()
                .ok_or_else(|| Error::UnknownSlice {
                    slice_id: slice_id.to_string(),
                })?;

            let next = reducer.apply(&previous, action.raw_payload())?;

            if Rc::ptr_eq(&next, &previous) {
                false
            } else {
                *self.state.borrow_mut() = old_tree.with_slice(slice_id.clone(), next);
                self.ctx
                    .record_change(&self.erased(), &self.guid, slice_id, &previous);
                true
            }
        };

        self.dispatch_completed.invoke(&action);

        if changed {
            self.state_did_change(old_tree, force_immediate);
        }

        Ok(())
    }

    /// Route a change notification: held by an open batch, delivered now
    /// when forced, or scheduled once per window.
    fn state_did_change(&self, old_tree: StateTree, force_immediate: bool) {
        if self.ctx.defer_notification(&self.guid, self.erased()) {
            return;
        }

        if force_immediate {
            self.flush_notification();
            return;
        }

        if self.frame_requested.get() {
            return;
        }

        *self.window_start.borrow_mut() = Some(old_tree);
        self.frame_requested.set(true);
        let window = self.window.get() + 1;
        self.window.set(window);

        let me = self.me.clone();
        let handle = self.scheduler.schedule(Box::new(move || {
            if let Some(store) = me.upgrade() {
                store.deliver_scheduled(window);
            }
        }));

        // an inline scheduler has already delivered
        if self.frame_requested.get() {
            self.frame.set(Some(handle));
        }
    }

    fn deliver_scheduled(&self, window: u64) {
        if !self.frame_requested.get() || self.window.get() != window {
            log::trace!("store '{}' skipped a stale delivery", self.guid);
            return;
        }

        self.frame.set(None);
        self.frame_requested.set(false);

        let start = self.window_start.borrow_mut().take();
        let current = self.state.borrow().clone();

        if start.is_some_and(|start| start.ptr_eq(&current)) {
            return;
        }

        self.state_changed.fire();
    }
}

impl AnyStore for StoreInner {
    fn guid(&self) -> &str {
        &self.guid
    }

    fn flush_notification(&self) {
        if let Some(handle) = self.frame.take() {
            self.scheduler.cancel(handle);
        }
        self.frame_requested.set(false);
        self.window_start.borrow_mut().take();

        self.state_changed.fire();
    }

    fn restore_slice(&self, slice_id: &SliceId, sub_state: SubState) {
        let old_tree = self.state.borrow().clone();
        let Some(previous) = old_tree.get_raw(slice_id).cloned() else {
            log::warn!("store '{}' cannot restore unknown slice '{slice_id}'", self.guid);
            return;
        };

        if Rc::ptr_eq(&previous, &sub_state) {
            return;
        }

        *self.state.borrow_mut() = old_tree.with_slice(slice_id.clone(), sub_state);
        self.ctx
            .record_change(&self.erased(), &self.guid, slice_id, &previous);
        self.state_did_change(old_tree, false);
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn std::any::Any> {
        self
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(handle) = self.frame.take() {
            self.scheduler.cancel(handle);
        }
        self.ctx.forget_store(&self.guid);
    }
}

// =============================================================================
// STORE
// =============================================================================

/// A container of slices. Cheap to clone; clones share the same store.
///
/// # Example
///
/// ```
/// use predux::{Context, Store};
/// use std::rc::Rc;
///
/// let ctx = Context::new();
/// let mut counter = ctx.create_slice(0i32);
/// let increment = counter.create_action(|n: &Rc<i32>, step: &i32| Rc::new(**n + step));
/// let value = counter.create_selector(|n: &i32| *n);
/// let store = Store::builder(&ctx).slice(&counter.build()).build().unwrap();
///
/// store.dispatch(increment.create(1)).unwrap();
/// store.dispatch(increment.create(1)).unwrap();
/// assert_eq!(store.select(&value), 2);
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    pub fn builder(ctx: &Rc<Context>) -> StoreBuilder<'_> {
        StoreBuilder {
            ctx,
            slices: Vec::new(),
            options: StoreOptions::default(),
        }
    }

    /// Look up a live store registered with `ctx`.
    pub fn from_context(ctx: &Context, guid: &str) -> Option<Store> {
        let inner = ctx.store(guid)?.into_any().downcast::<StoreInner>().ok()?;
        Some(Store { inner })
    }

    pub fn guid(&self) -> &str {
        &self.inner.guid
    }

    pub fn context(&self) -> &Rc<Context> {
        &self.inner.ctx
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Run the reducer of `action`. A resulting change is announced on the
    /// next scheduler frame, or when the enclosing batch closes.
    ///
    /// Actions without a reducer in this store are ignored. Dispatching from
    /// inside a reducer fails with [`Error::DispatchInProgress`].
    pub fn dispatch(&self, action: Action) -> Result<()> {
        self.inner.dispatch(action, false)
    }

    /// Like [`dispatch`](Self::dispatch), but a change is announced before
    /// this returns, replacing any delivery already scheduled. Inside a
    /// batch the notification still waits for the batch to close.
    pub fn dispatch_immediate(&self, action: Action) -> Result<()> {
        self.inner.dispatch(action, true)
    }

    /// Run `thunk` with this store and hand back its result. No reducer is
    /// involved; the thunk dispatches and selects as it needs.
    pub fn dispatch_thunk<R>(&self, thunk: impl FnOnce(&Store) -> R) -> Result<R> {
        if self.inner.dispatching.get() {
            return Err(Error::DispatchInProgress);
        }
        Ok(thunk(self))
    }

    /// Dispatch function bound to an action creator.
    pub fn bind<S, A: 'static>(&self, creator: &ActionCreator<S, A>) -> BoundAction<S, A> {
        BoundAction {
            store: self.clone(),
            creator: creator.clone(),
        }
    }

    // =========================================================================
    // STATE
    // =========================================================================

    /// The current state tree. Later dispatches never modify it.
    pub fn get_state(&self) -> StateTree {
        self.inner.state.borrow().clone()
    }

    pub fn select<R: 'static>(&self, selector: &Selector<R>) -> R {
        selector.select(&self.get_state(), &())
    }

    pub fn select_with<R: 'static, P: 'static>(&self, selector: &Selector<R, P>, props: &P) -> R {
        selector.select(&self.get_state(), props)
    }

    /// The current state of one slice, if this store holds it.
    pub fn slice_state<S: 'static>(&self, slice: &Slice<S>) -> Option<Rc<S>> {
        self.inner.state.borrow().get::<S>(slice.slice_id())
    }

    // =========================================================================
    // SIGNALS
    // =========================================================================

    /// Fired once per batch or frame in which the state changed.
    pub fn state_changed(&self) -> &Signal<()> {
        &self.inner.state_changed
    }

    /// Fired after every dispatch that reached a reducer, changed or not.
    pub fn dispatch_completed(&self) -> &Signal<Action> {
        &self.inner.dispatch_completed
    }

    /// Call `callback` once `condition` holds.
    ///
    /// Checks right away, then after every `state_changed`. Returns the
    /// listener id while waiting, so the wait can be cancelled through
    /// [`state_changed`](Self::state_changed), or `None` if the callback
    /// already ran.
    pub fn until(&self, condition: Selector<bool>, callback: impl FnOnce() + 'static) -> Option<ListenerId> {
        if self.select(&condition) {
            callback();
            return None;
        }

        let pending: RefCell<Option<Box<dyn FnOnce()>>> = RefCell::new(Some(Box::new(callback)));
        let own_id: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let me = Rc::downgrade(&self.inner);

        let id = self.inner.state_changed.subscribe({
            let own_id = own_id.clone();
            move |_| {
                let Some(inner) = me.upgrade() else {
                    return;
                };

                let state = inner.state.borrow().clone();
                if !condition.select(&state, &()) {
                    return;
                }

                if let Some(id) = own_id.get() {
                    inner.state_changed.unsubscribe(id);
                }

                let callback = pending.borrow_mut().take();
                if let Some(callback) = callback {
                    callback();
                }
            }
        });

        own_id.set(Some(id));
        Some(id)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("guid", &self.inner.guid)
            .field("state", &*self.inner.state.borrow())
            .field("reducers", &self.inner.reducers.len())
            .finish()
    }
}

// =============================================================================
// BOUND ACTION
// =============================================================================

/// An action creator bound to a store; calling it dispatches.
///
/// Holds the store strongly. Do not keep one inside a listener of the same
/// store, or neither is ever dropped.
pub struct BoundAction<S, A> {
    store: Store,
    creator: ActionCreator<S, A>,
}

impl<S, A: 'static> BoundAction<S, A> {
    pub fn dispatch(&self, args: A) -> Result<()> {
        self.store.dispatch(self.creator.create(args))
    }

    pub fn dispatch_immediate(&self, args: A) -> Result<()> {
        self.store.dispatch_immediate(self.creator.create(args))
    }

    pub fn creator(&self) -> &ActionCreator<S, A> {
        &self.creator
    }
}

impl<S, A> Clone for BoundAction<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            creator: self.creator.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
