// ============================================================================
// predux - Reactivity Module
// Notification scheduling, batching and transactions
// ============================================================================

pub mod batching;
pub mod scheduling;
pub mod transaction;

// Re-export scheduling types
pub use scheduling::{FrameCallback, FrameHandle, FrameScheduler, ImmediateScheduler, Scheduler};

// Re-export transaction types
pub use transaction::{Snapshot, Transaction, TransactionOutcome};
