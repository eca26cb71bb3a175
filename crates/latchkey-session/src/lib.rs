//! Session tracking for Latchkey.
//!
//! This crate follows a client from anonymous visitor to authenticated user
//! and back:
//!
//! 1. **Sessions**: an unguessable key names each client's session
//!    ([`SessionManager::create_session`])
//! 2. **Login keys**: a single-use token proves the client may act as a
//!    given user ([`Session::issue_login_key`], [`Session::attempt_login`])
//! 3. **Clocks**: three independent renewable timeouts log idle sessions
//!    out, expire unused login keys, and finally delete abandoned sessions
//!
//! # How it fits in the stack
//!
//! ```text
//! Your web layer (above)  ← cookies, emailed links, credential checks
//!     ↕
//! Session layer (this crate)  ← who is logged in, which key is valid
//!     ↕
//! Expire layer (below)  ← renewable per-key countdowns
//! ```
//!
//! Deciding that a user may receive a login key (checking a password,
//! sending an email) is deliberately left to the caller.

mod config;
mod error;
mod manager;
mod session;
mod token;

pub use config::{DEFAULT_DELETE_AFTER_SECS, MAX_DURATION_SECS, ManagerConfig};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{LoginEvent, Session, SessionEvent, SessionKey};
pub use token::{RandomTokens, TokenGenerator};
