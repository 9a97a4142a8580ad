// ============================================================================
// predux - Core Module
// Identifiers, the state tree, errors and the shared context
// ============================================================================

pub mod constants;
pub mod context;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use context::{Context, ContextHost};
pub use error::{BoxError, Error, Result};
pub use types::{ActionId, AnyStore, SliceId, StateTree, SubState};
