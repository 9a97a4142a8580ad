// ============================================================================
// predux - Constants
// Context handshake keys and guid prefixes
// ============================================================================

// =============================================================================
// CONTEXT HANDSHAKE
// =============================================================================

/// Key under which a shared [`Context`](crate::Context) is published in a
/// context host.
pub const CONTEXT_KEY: &str = "__preduxGlobalContext";

/// Version of the context layout.
///
/// Must be incremented with every breaking change to `Context` so that two
/// copies of this crate attached to the same host refuse to share state
/// instead of silently diverging.
pub const CONTEXT_VERSION: u32 = 1;

// =============================================================================
// GUID PREFIXES
// =============================================================================

/// Prefix of dynamically generated store guids (`store.1`, `store.2`, ...)
pub const STORE_GUID_PREFIX: &str = "store";

/// Prefix of dynamically generated slice ids (`slice.1`, `slice.2`, ...)
pub const SLICE_GUID_PREFIX: &str = "slice";

/// Separator between a slice id and the per-slice action counter.
pub const ACTION_ID_SEPARATOR: char = '/';
