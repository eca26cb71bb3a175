//! Manager configuration: the three clock durations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Seconds before an untouched session is deleted, when not configured.
pub const DEFAULT_DELETE_AFTER_SECS: u64 = 60 * 60 * 24 * 7;

/// Largest value any duration field accepts (one hundred years).
pub const MAX_DURATION_SECS: u64 = latchkey_expire::MAX_DURATION.as_secs();

/// Configuration for a [`SessionManager`](crate::SessionManager).
///
/// Each field drives one independent clock. The deletion clock is normally
/// much longer than the logout clock, so an idle user is logged out quickly
/// but can still log back in on the same session for days.
///
/// Durations are fixed for the manager's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Seconds of inactivity after which a logged-in session is logged out.
    pub logout_after_secs: u64,

    /// Seconds an issued login key stays usable.
    pub login_key_expires_after_secs: u64,

    /// Seconds of inactivity after which a session is removed entirely.
    ///
    /// Default: 604 800 (7 days).
    #[serde(default = "default_delete_after_secs")]
    pub delete_after_secs: u64,
}

fn default_delete_after_secs() -> u64 {
    DEFAULT_DELETE_AFTER_SECS
}

impl ManagerConfig {
    /// Creates a config with the two required durations and the default
    /// deletion window.
    pub fn new(logout_after_secs: u64, login_key_expires_after_secs: u64) -> Self {
        Self {
            logout_after_secs,
            login_key_expires_after_secs,
            delete_after_secs: DEFAULT_DELETE_AFTER_SECS,
        }
    }

    /// Overrides the deletion window.
    pub fn with_delete_after_secs(mut self, secs: u64) -> Self {
        self.delete_after_secs = secs;
        self
    }

    /// Rejects durations that would make a clock fire immediately, and
    /// durations past [`MAX_DURATION_SECS`] whose deadlines could not be
    /// represented.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SessionError> {
        let fields = [
            ("logout_after_secs", self.logout_after_secs),
            ("login_key_expires_after_secs", self.login_key_expires_after_secs),
            ("delete_after_secs", self.delete_after_secs),
        ];
        for (name, secs) in fields {
            if secs == 0 {
                return Err(SessionError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
            if secs > MAX_DURATION_SECS {
                return Err(SessionError::InvalidConfig(format!(
                    "{name} must be at most {MAX_DURATION_SECS}, got {secs}"
                )));
            }
        }

        if self.delete_after_secs < self.logout_after_secs {
            tracing::warn!(
                delete_after_secs = self.delete_after_secs,
                logout_after_secs = self.logout_after_secs,
                "sessions are deleted before they would be logged out"
            );
        }
        Ok(())
    }

    /// Logout clock duration.
    pub fn logout_after(&self) -> Duration {
        Duration::from_secs(self.logout_after_secs)
    }

    /// Login-key clock duration.
    pub fn login_key_expires_after(&self) -> Duration {
        Duration::from_secs(self.login_key_expires_after_secs)
    }

    /// Deletion clock duration.
    pub fn delete_after(&self) -> Duration {
        Duration::from_secs(self.delete_after_secs)
    }
}
