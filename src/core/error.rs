// ============================================================================
// predux - Errors
// ============================================================================

use thiserror::Error;

/// Boxed error returned by fallible reducers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while building or driving a store.
///
/// Configuration errors (`Duplicate*`, `TransactionOrder`,
/// `IncompatibleContext`) are programmer errors and are reported as soon as
/// they are detected. Unknown actions are not errors, they are ignored.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot register multiple reducers for the action '{action_id}'")]
    DuplicateReducer { action_id: String },

    #[error("the slice '{slice_id}' was already added to this store")]
    DuplicateSlice { slice_id: String },

    #[error("a different store with the guid '{guid}' was already registered")]
    DuplicateStore { guid: String },

    #[error("cannot dispatch from a reducer")]
    DispatchInProgress,

    #[error("transaction #{actual} cannot end before transaction #{expected}")]
    TransactionOrder { expected: u64, actual: u64 },

    #[error(
        "found an existing context under '{key}', but it is of an incompatible version \
         (found {found}, expected {expected})"
    )]
    IncompatibleContext {
        key: String,
        found: u32,
        expected: u32,
    },

    #[error("the payload of action '{action_id}' does not match its reducer")]
    PayloadMismatch { action_id: String },

    #[error("the slice '{slice_id}' is not part of this store")]
    UnknownSlice { slice_id: String },

    #[error("the state of slice '{slice_id}' does not have the type its reducers expect")]
    StateMismatch { slice_id: String },

    #[error("reducer for action '{action_id}' failed: {source}")]
    Reducer {
        action_id: String,
        #[source]
        source: BoxError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = Error::DuplicateReducer {
            action_id: "counter/1".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot register multiple reducers for the action 'counter/1'"
        );

        let err = Error::TransactionOrder {
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "transaction #1 cannot end before transaction #2"
        );
    }

    #[test]
    fn reducer_error_exposes_source() {
        let err = Error::Reducer {
            action_id: "todos/3".into(),
            source: "title must not be empty".into(),
        };

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("title must not be empty"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_bounds<T: Send + Sync + 'static>() {}
        assert_bounds::<Error>();
    }
}
