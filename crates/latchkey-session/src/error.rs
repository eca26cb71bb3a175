//! Error types for the session layer.

use crate::SessionKey;

/// Errors that can occur during session management.
///
/// None of these describe a failed login: a wrong, stale, or reused login
/// key is silently ignored so callers cannot tell the cases apart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The manager configuration was rejected at construction time.
    /// The message names the offending field.
    #[error("invalid session manager configuration: {0}")]
    InvalidConfig(String),

    /// The session behind a handle no longer exists. This happens when the
    /// deletion clock removed it while the caller still held the handle.
    #[error("session {} not found", .0.short())]
    NotFound(SessionKey),

    /// The manager's actor has shut down, so no command can be served.
    #[error("session manager is unavailable")]
    Unavailable,
}
