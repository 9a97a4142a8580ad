// ============================================================================
// predux - A Slice-Based State Container for Rust
// ============================================================================
//
// State lives in stores built from slices. A slice owns one region of the
// state tree together with its reducers and selectors. Dispatching an action
// runs exactly one reducer; a changed tree is announced through a signal,
// coalesced per scheduler frame or per batch. Transactions are batches that
// can restore every slice they touched.
//
// Everything hangs off an explicitly constructed `Context`.
// ============================================================================

#[macro_use]
mod macros;

pub mod core;
pub mod primitives;
pub mod reactivity;

#[cfg(test)]
mod test_support;

// Re-export core items at crate root for ergonomic access
pub use core::constants;
pub use core::context::{Context, ContextHost};
pub use core::error::{BoxError, Error, Result};
pub use core::types::{ActionId, AnyStore, SliceId, StateTree, SubState};

// Re-export primitives at crate root
pub use primitives::selector::{
    compose, compose_memo, select_props, Combiner, Composite, Identity, Selector,
    SelectorFactory, SelectorInputs, SelectorKind,
};
pub use primitives::signal::{ListenerId, Signal};
pub use primitives::slice::{
    Action, ActionCreator, AnySlice, ReducerEntry, Slice, SliceBuilder, SliceOptions,
};
pub use primitives::store::{create_store, BoundAction, Store, StoreBuilder, StoreOptions};

// Re-export reactivity types
pub use reactivity::scheduling::{
    FrameCallback, FrameHandle, FrameScheduler, ImmediateScheduler, Scheduler,
};
pub use reactivity::transaction::{Snapshot, Transaction, TransactionOutcome};

// =============================================================================
// TESTS
// =============================================================================
