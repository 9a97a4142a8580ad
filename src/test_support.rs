// ============================================================================
// predux - Test Support
// Fixtures shared by the unit tests
// ============================================================================

use std::cell::Cell;
use std::rc::Rc;

use crate::{ActionCreator, Context, Selector, Store};

/// A store holding one `i32` counter slice starting at 0.
///
/// `increment(step)` adds `step`; a zero step keeps the state reference.
pub(crate) fn counter_store(ctx: &Rc<Context>) -> (Store, ActionCreator<i32, i32>, Selector<i32>) {
    let mut counter = ctx.create_slice(0i32);
    let increment = counter.create_named_action("increment", |n: &Rc<i32>, step: &i32| {
        if *step == 0 {
            n.clone()
        } else {
            Rc::new(**n + step)
        }
    });
    let value = counter.create_selector(|n: &i32| *n);

    let store = Store::builder(ctx)
        .slice(&counter.build())
        .build()
        .expect("counter store");

    (store, increment, value)
}

/// Counts `state_changed` notifications of `store`.
pub(crate) fn notification_counter(store: &Store) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    store.state_changed().subscribe({
        let count = count.clone();
        move |_| count.set(count.get() + 1)
    });
    count
}
