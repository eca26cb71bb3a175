//! Error types for the expiration registry.

/// Errors that can occur when constructing an [`Expirer`](crate::Expirer).
///
/// Touching and waiting never fail: an unknown key is simply a fresh
/// countdown, and an empty registry just pends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpireError {
    /// The registry was configured with a zero-length countdown. Every
    /// touch would fire immediately, which is never what the caller meant.
    #[error("expiration duration must be greater than zero")]
    ZeroDuration,

    /// The countdown is longer than [`MAX_DURATION`](crate::MAX_DURATION),
    /// so its deadline could not be represented.
    #[error("expiration duration of {secs}s exceeds the maximum of {max}s")]
    DurationTooLong { secs: u64, max: u64 },
}
