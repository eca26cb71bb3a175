//! Token generation hook for session keys and login keys.
//!
//! Both kinds of token are bearer credentials: whoever presents a session
//! key owns the session, and whoever presents a login key can log it in.
//! They must therefore be unpredictable, not merely unique.
//!
//! Latchkey ships [`RandomTokens`], backed by the thread-local CSPRNG from
//! `rand`. The [`TokenGenerator`] trait exists so callers can plug in their
//! own source (a hardware RNG, a different encoding) or a deterministic one
//! in tests.

use rand::Rng;

/// Produces fresh, unique, unguessable token strings.
///
/// # Trait bounds
///
/// - `Send + 'static` → the generator is moved into the manager's actor
///   task and lives as long as the manager.
///
/// Any `FnMut() -> String` closure is also a generator:
///
/// ```rust
/// use latchkey_session::TokenGenerator;
///
/// let mut n = 0u64;
/// let mut sequential = move || {
///     n += 1;
///     format!("token-{n}")
/// };
/// assert_eq!(sequential.generate(), "token-1");
/// ```
pub trait TokenGenerator: Send + 'static {
    /// Returns a new token. Called once per session key and once per
    /// issued login key.
    fn generate(&mut self) -> String;
}

impl<F> TokenGenerator for F
where
    F: FnMut() -> String + Send + 'static,
{
    fn generate(&mut self) -> String {
        self()
    }
}

/// The default generator: 128 random bits as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenGenerator for RandomTokens {
    fn generate(&mut self) -> String {
        generate_token()
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
///
/// `rand::rng()` is a cryptographically secure generator seeded from the
/// operating system, so guessing a live token is computationally
/// infeasible.
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
