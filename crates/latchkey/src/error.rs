//! Unified error type for the Latchkey facade.

use latchkey_expire::ExpireError;
use latchkey_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `latchkey` facade, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LatchkeyError {
    /// A session-level error (bad config, deleted session, shut down).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An expiration registry error (zero duration).
    #[error(transparent)]
    Expire(#[from] ExpireError),

    /// Configuration text that isn't valid JSON for a
    /// [`ManagerConfig`](latchkey_session::ManagerConfig).
    #[error("malformed configuration: {0}")]
    Config(#[from] serde_json::Error),
}
