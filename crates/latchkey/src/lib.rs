//! # Latchkey
//!
//! In-memory login sessions for web backends that authenticate with
//! single-use login keys ("magic links").
//!
//! A session starts anonymous. The application decides who the visitor
//! claims to be, issues a login key for that identity, and delivers it out
//! of band. Redeeming the key logs the session in. Three independent clocks
//! then log idle sessions out, expire unused keys, and delete abandoned
//! sessions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use latchkey::prelude::*;
//!
//! # async fn run() -> Result<(), LatchkeyError> {
//! let config = latchkey::config::from_json(
//!     r#"{ "logout_after_secs": 1800, "login_key_expires_after_secs": 900 }"#,
//! )?;
//! let sessions = SessionManager::new(config)?;
//!
//! let session = sessions.create_session().await?;
//! let login_key = session.issue_login_key("me@example.com").await?;
//! // ...email a link containing `login_key`, then when it's clicked:
//! session.attempt_login(&login_key).await?;
//! assert!(session.is_logged_in().await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;

pub use error::LatchkeyError;
pub use latchkey_expire as expire;
pub use latchkey_session as session;

/// Everything needed to run a session manager.
pub mod prelude {
    pub use crate::LatchkeyError;
    pub use latchkey_session::{
        LoginEvent, ManagerConfig, Session, SessionEvent, SessionKey, SessionManager,
        TokenGenerator,
    };
}
