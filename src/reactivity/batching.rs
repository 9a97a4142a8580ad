// ============================================================================
// predux - Batching
// Suspend change notifications across a sequence of dispatches
// ============================================================================

use crate::core::context::Context;

// =============================================================================
// BATCH
// =============================================================================

impl Context {
    /// Open a batch. While any batch is open, stores hold their change
    /// notifications. Returns the new depth.
    pub fn begin_batch(&self) -> u32 {
        self.enter_batch()
    }

    /// Close a batch. When the outermost batch closes, every store that
    /// changed inside it fires `state_changed` exactly once.
    ///
    /// Returns the new depth. Closing a batch that was never opened is
    /// ignored with a warning.
    pub fn end_batch(&self) -> u32 {
        let Some(depth) = self.exit_batch() else {
            log::warn!("end_batch called without a matching begin_batch");
            return 0;
        };

        if depth == 0 {
            self.flush_changed_stores();
        }

        depth
    }

    /// Run `f` inside a batch.
    ///
    /// # Example
    ///
    /// ```
    /// use predux::{Context, Store};
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    ///
    /// let ctx = Context::new();
    /// let mut counter = ctx.create_slice(0i32);
    /// let increment = counter.create_action(|n: &Rc<i32>, step: &i32| Rc::new(**n + step));
    /// let store = Store::builder(&ctx).slice(&counter.build()).build().unwrap();
    ///
    /// let notified = Rc::new(Cell::new(0));
    /// store.state_changed().subscribe({
    ///     let notified = notified.clone();
    ///     move |_| notified.set(notified.get() + 1)
    /// });
    ///
    /// ctx.batch(|| {
    ///     store.dispatch(increment.create(1)).unwrap();
    ///     store.dispatch(increment.create(2)).unwrap();
    ///     // nothing delivered yet
    ///     assert_eq!(notified.get(), 0);
    /// });
    ///
    /// // one notification for the whole batch
    /// assert_eq!(notified.get(), 1);
    /// ```
    pub fn batch<T>(&self, f: impl FnOnce() -> T) -> T {
        self.begin_batch();

        // Use a guard pattern to ensure we exit the batch even on panic
        struct BatchGuard<'a>(&'a Context);

        impl Drop for BatchGuard<'_> {
            fn drop(&mut self) {
                self.0.end_batch();
            }
        }

        let _guard = BatchGuard(self);
        f()
    }

    fn flush_changed_stores(&self) {
        let changed = self.take_changed_stores();
        if changed.is_empty() {
            return;
        }

        log::debug!("batch closed, notifying {} store(s)", changed.len());
        for (_, store) in changed {
            if let Some(store) = store.upgrade() {
                store.flush_notification();
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
