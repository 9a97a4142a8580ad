// ============================================================================
// predux - Signal Primitive
// Synchronous multicast notification with copy-on-write listeners
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Identifies one subscription, for [`Signal::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Rc<dyn Fn(&T)>;

// =============================================================================
// SIGNAL<T>
// =============================================================================

/// A list of listeners called synchronously, in subscription order.
///
/// Subscribing or unsubscribing while the signal is being invoked (from a
/// listener, typically) never disturbs the running invocation: it iterates a
/// snapshot of the list, and the change applies from the next invoke on.
///
/// # Example
///
/// ```
/// use predux::Signal;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let changed: Signal<i32> = Signal::new();
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let id = changed.subscribe({
///     let seen = seen.clone();
///     move |value| seen.borrow_mut().push(*value)
/// });
///
/// changed.invoke(&1);
/// changed.unsubscribe(id);
/// changed.invoke(&2);
///
/// assert_eq!(*seen.borrow(), vec![1]);
/// ```
pub struct Signal<T = ()> {
    /// Shared with every invoke in flight; mutated through `Rc::make_mut`
    listeners: RefCell<Rc<Vec<(ListenerId, Listener<T>)>>>,
    next_id: Cell<u64>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Rc::new(Vec::new())),
            next_id: Cell::new(0),
        }
    }

    /// Add a listener. The same closure may be subscribed more than once;
    /// every subscription gets its own id.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get() + 1);
        self.next_id.set(id.0);

        let mut listeners = self.listeners.borrow_mut();
        Rc::make_mut(&mut listeners).push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(index) = listeners.iter().position(|(known, _)| *known == id) else {
            return false;
        };

        Rc::make_mut(&mut listeners).remove(index);
        true
    }

    /// Call every listener with `event`.
    pub fn invoke(&self, event: &T) {
        let snapshot = self.listeners.borrow().clone();
        for (_, listener) in snapshot.iter() {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.borrow().is_empty()
    }
}

impl Signal<()> {
    /// Invoke a signal that carries no event.
    pub fn fire(&self) {
        self.invoke(&());
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
