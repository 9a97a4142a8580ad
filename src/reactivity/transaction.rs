// ============================================================================
// predux - Transactions
// Batches that can roll state back to where they started
// ============================================================================
//
// While a transaction is open, every slice that changes has its previous
// sub-state recorded, once per transaction (the first write wins). Rolling
// back writes those values back directly, without reducers.
//
// Every open transaction records every change, so rolling back an outer
// transaction also reverts what nested transactions committed.
// ============================================================================

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::core::context::Context;
use crate::core::error::{Error, Result};
use crate::core::types::{AnyStore, SliceId, SubState};

// =============================================================================
// SNAPSHOT
// =============================================================================

#[derive(Clone)]
struct SnapshotEntry {
    store: Weak<dyn AnyStore>,
    guid: String,
    slice_id: SliceId,
    state: SubState,
}

/// Pre-change sub-states captured during one transaction, in first-change
/// order.
#[derive(Default)]
pub struct Snapshot {
    entries: RefCell<Vec<SnapshotEntry>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state of a slice before its first change. Later changes
    /// to the same slice of the same store are ignored.
    pub(crate) fn record(
        &self,
        store: &Weak<dyn AnyStore>,
        guid: &str,
        slice_id: &SliceId,
        state: &SubState,
    ) {
        let mut entries = self.entries.borrow_mut();
        let known = entries
            .iter()
            .any(|entry| entry.guid == guid && entry.slice_id == *slice_id);

        if !known {
            entries.push(SnapshotEntry {
                store: store.clone(),
                guid: guid.to_owned(),
                slice_id: slice_id.clone(),
                state: state.clone(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// `(store guid, slice id)` pairs captured so far.
    pub fn touched(&self) -> Vec<(String, SliceId)> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| (entry.guid.clone(), entry.slice_id.clone()))
            .collect()
    }

    /// Write every captured sub-state back to its store inside one batch.
    fn restore(&self, ctx: &Context) {
        // restoring records into open transactions, which may include this one
        let entries = self.entries.borrow().clone();

        ctx.batch(|| {
            for entry in entries {
                if let Some(store) = entry.store.upgrade() {
                    store.restore_slice(&entry.slice_id, entry.state);
                }
            }
        });
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// Handle of an open (or ended) transaction.
pub struct Transaction {
    serial: u64,
    snapshot: Rc<Snapshot>,
    ctx: Rc<Context>,
}

impl Transaction {
    /// Position of this transaction in the context's timeline.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Number of slices this transaction would restore.
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Restore every slice touched since the transaction began.
    ///
    /// Stores are notified once each, when the surrounding batch (if any)
    /// closes.
    pub fn rollback(&self) {
        if self.snapshot.is_empty() {
            return;
        }

        log::debug!(
            "rolling back transaction #{} ({} slice(s))",
            self.serial,
            self.snapshot.len()
        );
        self.snapshot.restore(&self.ctx);
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("serial", &self.serial)
            .field("touched", &self.snapshot.touched())
            .finish()
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Decides whether the value returned by a transaction callback commits
/// or aborts the transaction.
pub trait TransactionOutcome {
    fn is_commit(&self) -> bool;
}

impl TransactionOutcome for () {
    fn is_commit(&self) -> bool {
        true
    }
}

/// `false` aborts.
impl TransactionOutcome for bool {
    fn is_commit(&self) -> bool {
        *self
    }
}

/// `None` aborts.
impl<T> TransactionOutcome for Option<T> {
    fn is_commit(&self) -> bool {
        self.is_some()
    }
}

/// `Err` aborts and is handed back to the caller after the rollback.
impl<T, E> TransactionOutcome for Result<T, E> {
    fn is_commit(&self) -> bool {
        self.is_ok()
    }
}

// =============================================================================
// CONTEXT API
// =============================================================================

impl Context {
    /// Open a transaction. Only the changes made from now on are captured.
    ///
    /// Prefer [`transaction`](Self::transaction), which also handles
    /// batching, ordering and panics.
    pub fn begin_transaction(self: &Rc<Self>) -> Transaction {
        let snapshot = Rc::new(Snapshot::new());
        let serial = self.push_transaction(snapshot.clone());

        Transaction {
            serial,
            snapshot,
            ctx: self.clone(),
        }
    }

    /// Stop capturing changes into `transaction`.
    ///
    /// Transactions end in reverse order of their beginning; ending any but
    /// the innermost one is an error and leaves the stack untouched.
    pub fn end_transaction(&self, transaction: &Transaction) -> Result<()> {
        match self.top_transaction() {
            Some(top) if top == transaction.serial => {
                self.pop_transaction();
                Ok(())
            }
            top => Err(Error::TransactionOrder {
                expected: top.unwrap_or_default(),
                actual: transaction.serial,
            }),
        }
    }

    /// Run `f` as a transaction.
    ///
    /// Notifications are batched for the duration. If `f` returns an abort
    /// outcome (`false`, `None`, `Err`) or panics, every slice it changed is
    /// restored before the batch closes, so each affected store is notified
    /// once. The outcome is returned as is; a panic resumes after the
    /// rollback.
    ///
    /// # Panics
    ///
    /// When `f` panics, the rollback and the closing batch run while the
    /// thread is unwinding, so `state_changed` listeners are invoked from a
    /// drop guard. A listener that panics at that point is a panic during
    /// unwinding and aborts the process. Listeners of stores touched by a
    /// transaction that may panic must not panic themselves.
    ///
    /// # Example
    ///
    /// ```
    /// use predux::{Context, Store};
    /// use std::rc::Rc;
    ///
    /// let ctx = Context::new();
    /// let mut counter = ctx.create_slice(0i32);
    /// let add = counter.create_action(|n: &Rc<i32>, step: &i32| Rc::new(**n + step));
    /// let value = counter.create_selector(|n: &i32| *n);
    /// let store = Store::builder(&ctx).slice(&counter.build()).build().unwrap();
    ///
    /// let result: Result<(), &str> = ctx.transaction(|| {
    ///     store.dispatch(add.create(5)).unwrap();
    ///     Err("changed my mind")
    /// });
    ///
    /// assert!(result.is_err());
    /// assert_eq!(store.select(&value), 0);
    /// ```
    pub fn transaction<O: TransactionOutcome>(self: &Rc<Self>, f: impl FnOnce() -> O) -> O {
        self.begin_batch();
        let transaction = self.begin_transaction();

        // Closes the transaction and the batch on every path, rolling back
        // first unless disarmed by a commit.
        struct TransactionGuard<'a> {
            ctx: &'a Rc<Context>,
            transaction: &'a Transaction,
            commit: bool,
        }

        impl Drop for TransactionGuard<'_> {
            fn drop(&mut self) {
                self.ctx.close_transaction(self.transaction);
                if !self.commit {
                    self.transaction.rollback();
                }
                self.ctx.end_batch();
            }
        }

        let mut guard = TransactionGuard {
            ctx: self,
            transaction: &transaction,
            commit: false,
        };

        let outcome = f();
        guard.commit = outcome.is_commit();
        drop(guard);

        outcome
    }

    /// Pop `transaction`, discarding any frames the callback left open above it.
    fn close_transaction(&self, transaction: &Transaction) {
        while let Some(top) = self.top_transaction() {
            if top < transaction.serial {
                break;
            }

            self.pop_transaction();
            if top == transaction.serial {
                return;
            }

            log::warn!(
                "transaction #{top} was left open inside transaction #{}",
                transaction.serial
            );
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
