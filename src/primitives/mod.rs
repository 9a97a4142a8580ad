// ============================================================================
// predux - Primitives Module
// Signals, selectors, slices and the store
// ============================================================================

pub mod selector;
pub mod signal;
pub mod slice;
pub mod store;

// Re-export for convenience
pub use selector::{
    compose, compose_memo, select_props, Combiner, Composite, Identity, Selector,
    SelectorFactory, SelectorInputs, SelectorKind,
};
pub use signal::{ListenerId, Signal};
pub use slice::{Action, ActionCreator, AnySlice, ReducerEntry, Slice, SliceBuilder, SliceOptions};
pub use store::{create_store, BoundAction, Store, StoreBuilder, StoreOptions};
