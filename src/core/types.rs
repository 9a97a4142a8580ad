// ============================================================================
// predux - Type Definitions
// Identifiers, the aggregate state tree and type-erased store access
// ============================================================================

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Rc<str>);

        impl $name {
            pub fn new(id: impl Into<Rc<str>>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), &*self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id! {
    /// Identifies a slice, and with it one disjoint region of the state tree.
    SliceId
}

string_id! {
    /// Identifies an action creator. Every action produced by one creator
    /// carries the same id.
    ActionId
}

/// Type-erased sub-state owned by one slice.
pub type SubState = Rc<dyn Any>;

// =============================================================================
// STATE TREE
// =============================================================================

/// The aggregate state of a store: one sub-state per slice.
///
/// A tree is never mutated in place. Every change produces a new top-level
/// map that shares the `Rc` of every untouched slice, so comparing trees or
/// sub-states by pointer is enough to detect changes.
#[derive(Clone, Default)]
pub struct StateTree {
    slices: Rc<HashMap<SliceId, SubState>>,
}

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(slices: HashMap<SliceId, SubState>) -> Self {
        Self {
            slices: Rc::new(slices),
        }
    }

    /// Number of slices in the tree.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn contains(&self, slice_id: &SliceId) -> bool {
        self.slices.contains_key(slice_id)
    }

    /// Get the type-erased sub-state of a slice.
    pub fn get_raw(&self, slice_id: &SliceId) -> Option<&SubState> {
        self.slices.get(slice_id)
    }

    /// Get the sub-state of a slice, if present and of type `S`.
    pub fn get<S: 'static>(&self, slice_id: &SliceId) -> Option<Rc<S>> {
        self.slices.get(slice_id)?.clone().downcast::<S>().ok()
    }

    pub fn slice_ids(&self) -> impl Iterator<Item = &SliceId> {
        self.slices.keys()
    }

    /// True if both handles point at the very same tree.
    pub fn ptr_eq(&self, other: &StateTree) -> bool {
        Rc::ptr_eq(&self.slices, &other.slices)
    }

    /// Produce a new tree with one sub-state replaced.
    ///
    /// Only the map of pointers is copied; sub-states are shared.
    pub(crate) fn with_slice(&self, slice_id: SliceId, sub_state: SubState) -> StateTree {
        let mut slices = (*self.slices).clone();
        slices.insert(slice_id, sub_state);
        Self::from_map(slices)
    }
}

impl fmt::Debug for StateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.slices.keys().map(SliceId::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("StateTree").field("slices", &ids).finish()
    }
}

// =============================================================================
// TYPE-ERASED STORE
// =============================================================================
//
// The context needs to reach stores for two things only: flushing deferred
// notifications when a batch closes, and writing snapshot values back during
// a rollback. Neither needs the concrete store type.
// =============================================================================

/// Type-erased store interface used by [`Context`](super::context::Context).
pub trait AnyStore: Any {
    /// Globally unique guid of the store.
    fn guid(&self) -> &str;

    /// Deliver a change notification right now, cancelling any scheduled one.
    fn flush_notification(&self);

    /// Replace the sub-state of a slice without running a reducer.
    fn restore_slice(&self, slice_id: &SliceId, sub_state: SubState);

    /// Upcast to `Any` for downcasting to the concrete store.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(entries: &[(&str, SubState)]) -> StateTree {
        StateTree::from_map(
            entries
                .iter()
                .map(|(id, value)| (SliceId::from(*id), value.clone()))
                .collect(),
        )
    }

    #[test]
    fn ids_compare_by_value() {
        let a = SliceId::from("slice.1");
        let b = SliceId::new(String::from("slice.1"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "slice.1");
        assert_eq!(format!("{:?}", ActionId::from("x/1")), "ActionId(\"x/1\")");
    }

    #[test]
    fn typed_lookup() {
        let counter: SubState = Rc::new(3i32);
        let name: SubState = Rc::new(String::from("a"));
        let state = tree(&[("counter", counter), ("name", name)]);

        assert_eq!(state.get::<i32>(&"counter".into()).as_deref(), Some(&3));
        assert_eq!(state.get::<String>(&"name".into()).as_deref().map(String::as_str), Some("a"));

        // wrong type or missing slice
        assert!(state.get::<u8>(&"counter".into()).is_none());
        assert!(state.get::<i32>(&"missing".into()).is_none());
    }

    #[test]
    fn with_slice_preserves_untouched_references() {
        let a: SubState = Rc::new(1i32);
        let b: SubState = Rc::new(2i32);
        let state = tree(&[("a", a.clone()), ("b", b.clone())]);

        let next = state.with_slice("a".into(), Rc::new(10i32));

        assert!(!next.ptr_eq(&state));
        assert!(Rc::ptr_eq(next.get_raw(&"b".into()).unwrap(), &b));
        assert!(!Rc::ptr_eq(next.get_raw(&"a".into()).unwrap(), &a));

        // the old tree is untouched
        assert_eq!(state.get::<i32>(&"a".into()).as_deref(), Some(&1));
    }

    #[test]
    fn clones_share_the_tree() {
        let a: SubState = Rc::new(1i32);
        let state = tree(&[("a", a)]);
        let copy = state.clone();
        assert!(copy.ptr_eq(&state));
        assert_eq!(format!("{:?}", copy), "StateTree { slices: [\"a\"] }");
    }
}
