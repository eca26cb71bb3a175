//! Loading manager configuration from JSON.
//!
//! ```json
//! {
//!     "logout_after_secs": 1800,
//!     "login_key_expires_after_secs": 900,
//!     "delete_after_secs": 604800
//! }
//! ```
//!
//! `delete_after_secs` may be omitted and defaults to seven days.

use latchkey_session::ManagerConfig;

use crate::LatchkeyError;

/// Parses and validates a [`ManagerConfig`] from JSON text.
///
/// Validation runs here, not just at manager construction, so a bad
/// config file is reported when it is read.
///
/// # Errors
/// - [`LatchkeyError::Config`]: not valid JSON, or missing a required field
/// - [`LatchkeyError::Session`]: a duration is zero or past the maximum
pub fn from_json(text: &str) -> Result<ManagerConfig, LatchkeyError> {
    let config: ManagerConfig = serde_json::from_str(text)?;
    config.validate()?;
    tracing::debug!(?config, "manager configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use latchkey_session::{DEFAULT_DELETE_AFTER_SECS, SessionError};

    use super::*;

    #[test]
    fn test_from_json_full_config() {
        let config = from_json(
            r#"{ "logout_after_secs": 1800, "login_key_expires_after_secs": 900, "delete_after_secs": 3600 }"#,
        )
        .unwrap();

        assert_eq!(config.logout_after_secs, 1800);
        assert_eq!(config.login_key_expires_after_secs, 900);
        assert_eq!(config.delete_after_secs, 3600);
    }

    #[test]
    fn test_from_json_defaults_deletion() {
        let config =
            from_json(r#"{ "logout_after_secs": 5, "login_key_expires_after_secs": 10 }"#).unwrap();

        assert_eq!(config.delete_after_secs, DEFAULT_DELETE_AFTER_SECS);
    }

    #[test]
    fn test_from_json_missing_required_field() {
        let result = from_json(r#"{ "logout_after_secs": 5 }"#);

        assert!(matches!(result, Err(LatchkeyError::Config(_))));
    }

    #[test]
    fn test_from_json_zero_duration_rejected() {
        let result =
            from_json(r#"{ "logout_after_secs": 0, "login_key_expires_after_secs": 10 }"#);

        assert!(matches!(
            result,
            Err(LatchkeyError::Session(SessionError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_from_json_huge_duration_rejected() {
        let result = from_json(
            r#"{ "logout_after_secs": 5, "login_key_expires_after_secs": 10, "delete_after_secs": 18446744073709551615 }"#,
        );

        assert!(matches!(
            result,
            Err(LatchkeyError::Session(SessionError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_from_json_negative_duration_rejected() {
        let result =
            from_json(r#"{ "logout_after_secs": -5, "login_key_expires_after_secs": 10 }"#);

        assert!(matches!(result, Err(LatchkeyError::Config(_))));
    }
}
