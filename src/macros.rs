// ============================================================================
// predux - Ergonomic Macros
// ============================================================================

/// Helper macro to clone variables into a move closure.
///
/// Reduces the boilerplate of cloning `Rc`s, stores and selectors before
/// moving them into a listener or reducer.
///
/// # Usage
///
/// ```rust
/// use predux::{cloned, Context, Store};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let ctx = Context::new();
/// let store = Store::builder(&ctx).slice(&ctx.create_slice(0u8).build()).build().unwrap();
/// let count = Rc::new(Cell::new(0));
///
/// store.state_changed().subscribe(cloned!(count => move |_| count.set(count.get() + 1)));
/// store.state_changed().fire();
/// assert_eq!(count.get(), 1);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Subscribe to a store's `state_changed` with automatic variable capturing.
///
/// Wraps `store.state_changed().subscribe(cloned!(... => move |_| ...))` and
/// returns the listener id.
///
/// # Usage
///
/// ```rust
/// use predux::{on_change, Context, Store};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let ctx = Context::new();
/// let mut counter = ctx.create_slice(0i32);
/// let add = counter.create_action(|n: &Rc<i32>, step: &i32| Rc::new(**n + step));
/// let store = Store::builder(&ctx).slice(&counter.build()).build().unwrap();
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// on_change!(store, seen => seen.borrow_mut().push("changed"));
///
/// store.dispatch_immediate(add.create(3)).unwrap();
/// assert_eq!(*seen.borrow(), vec!["changed"]);
/// ```
#[macro_export]
macro_rules! on_change {
    // Case 1: With captured variables
    ($store:ident, $($deps:ident),+ => $body:expr) => {
        $store
            .state_changed()
            .subscribe($crate::cloned!($($deps),+ => move |_: &()| $body))
    };
    // Case 2: Nothing captured
    ($store:ident => $body:expr) => {
        $store.state_changed().subscribe(move |_: &()| $body)
    };
}
