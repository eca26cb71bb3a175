//! Session types: the handle callers hold and the state behind it.
//!
//! A "session" is the server's record of one client, typically named by a
//! cookie. It tracks:
//! - WHO the client claims to be (`user_id`, set when a login key is issued)
//! - WHETHER that claim has been proven (`logged_in`)
//! - HOW it can be proven (a single-use pending login key)
//!
//! The state itself lives inside the manager's actor. A [`Session`] is a
//! cheap handle that sends commands to that actor, the same way a caller
//! never owns the session table directly.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::SessionError;
use crate::manager::{Command, Reply};

// ---------------------------------------------------------------------------
// SessionKey
// ---------------------------------------------------------------------------

/// The unique, unguessable name of a session.
///
/// This is what goes into the client's cookie. It is a bearer credential,
/// so logs only ever show [`SessionKey::short`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub(crate) fn new(key: String) -> Self {
        Self(key)
    }

    /// The full key, e.g. for setting a cookie.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the owned string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// The first eight characters, safe to put in logs.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lets the session table be queried with a plain `&str`.
impl Borrow<str> for SessionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<SessionKey> for String {
    fn from(key: SessionKey) -> Self {
        key.0
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A change in a session's authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginEvent {
    /// A login key was redeemed.
    LoggedIn,
    /// The session left the logged-in state (explicitly, by re-issuing a
    /// login key, by inactivity, or on deletion).
    LoggedOut,
}

/// A [`LoginEvent`] re-published on the manager's global channel, with the
/// session it happened to.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    /// What happened.
    pub kind: LoginEvent,
    /// Which session it happened to.
    pub session: Session,
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// The per-session state machine, owned by the manager's actor.
///
/// ```text
///                 issue_login_key           attempt_login (match)
///   Anonymous ───────────────────→ Pending ───────────────────→ LoggedIn
///       ↑                            │  ↑                          │
///       └──(invalidate / expiry)─────┘  └────(issue_login_key)─────┘
///                                          logs out first
/// ```
///
/// Pure data with no clocks or channels, so every transition is testable
/// synchronously.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionRecord {
    user_id: Option<String>,
    pending_login_key: Option<String>,
    logged_in: bool,
}

impl SessionRecord {
    pub(crate) fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub(crate) fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub(crate) fn has_pending_login_key(&self) -> bool {
        self.pending_login_key.is_some()
    }

    /// Stores a new pending key for `user_id`, replacing any unused one.
    /// The caller is responsible for logging out first.
    pub(crate) fn issue_login_key(&mut self, user_id: String, login_key: String) {
        self.user_id = Some(user_id);
        self.pending_login_key = Some(login_key);
    }

    /// Redeems `provided` if it is the pending key. Returns `true` on a
    /// transition to logged in.
    ///
    /// An absent pending key matches nothing, not even an empty string.
    pub(crate) fn attempt_login(&mut self, provided: &str) -> bool {
        if self.pending_login_key.as_deref() != Some(provided) {
            return false;
        }
        self.pending_login_key = None;
        self.logged_in = true;
        true
    }

    pub(crate) fn invalidate_login_key(&mut self) {
        self.pending_login_key = None;
    }

    /// Returns `true` only if the session was logged in, so repeated
    /// logouts produce a single notification.
    pub(crate) fn log_out(&mut self) -> bool {
        std::mem::replace(&mut self.logged_in, false)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Handle to one managed session.
///
/// Cloning is cheap: it's a key plus two channel senders. Every operation
/// is executed by the manager's actor, one at a time, in the order the
/// actor receives them.
///
/// Operations return [`SessionError::NotFound`] once the deletion clock has
/// removed the session and [`SessionError::Unavailable`] after the manager
/// shuts down. Nothing else is an error.
#[derive(Debug, Clone)]
pub struct Session {
    key: SessionKey,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<LoginEvent>,
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Session {}

impl Session {
    pub(crate) fn new(
        key: SessionKey,
        commands: mpsc::Sender<Command>,
        events: broadcast::Sender<LoginEvent>,
    ) -> Self {
        Self {
            key,
            commands,
            events,
        }
    }

    /// The session's key.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Subscribes to this session's login/logout notifications.
    ///
    /// Only events emitted after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<LoginEvent> {
        self.events.subscribe()
    }

    /// The identity named by the most recent login key, if any.
    ///
    /// Logging out does not clear it; only a new login key replaces it.
    pub async fn user_id(&self) -> Result<Option<String>, SessionError> {
        let key = self.key.clone();
        self.call(|reply| Command::UserId { key, reply }).await
    }

    /// Issues a fresh single-use login key for `user_id` and returns it.
    ///
    /// If the session is logged in it is logged out first, so a new
    /// identity never inherits the previous one's authentication. Any
    /// earlier unused login key stops working.
    ///
    /// Delivering the key to the user (an emailed link, say) is the
    /// caller's job.
    pub async fn issue_login_key(
        &self,
        user_id: impl Into<String>,
    ) -> Result<String, SessionError> {
        let key = self.key.clone();
        let user_id = user_id.into();
        self.call(|reply| Command::IssueLoginKey {
            key,
            user_id,
            reply,
        })
        .await
    }

    /// Tries to log in with `login_key`.
    ///
    /// Returns `Ok(())` whether or not the key matched. Check
    /// [`is_logged_in`](Self::is_logged_in) or subscribe to events to learn
    /// the outcome.
    pub async fn attempt_login(&self, login_key: &str) -> Result<(), SessionError> {
        let key = self.key.clone();
        let provided = login_key.to_string();
        self.call(|reply| Command::AttemptLogin {
            key,
            provided,
            reply,
        })
        .await
    }

    /// Discards the pending login key, if any. Leaves the login state alone.
    pub async fn invalidate_login_key(&self) -> Result<(), SessionError> {
        let key = self.key.clone();
        self.call(|reply| Command::InvalidateLoginKey { key, reply })
            .await
    }

    /// Whether a login key has been redeemed since the last logout.
    pub async fn is_logged_in(&self) -> Result<bool, SessionError> {
        let key = self.key.clone();
        self.call(|reply| Command::IsLoggedIn { key, reply }).await
    }

    /// Logs the session out. A no-op if it is not logged in.
    pub async fn log_out(&self) -> Result<(), SessionError> {
        let key = self.key.clone();
        self.call(|reply| Command::LogOut { key, reply }).await
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        crate::manager::call(&self.commands, make).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued(user: &str, login_key: &str) -> SessionRecord {
        let mut record = SessionRecord::default();
        record.issue_login_key(user.into(), login_key.into());
        record
    }

    #[test]
    fn test_record_default_is_anonymous() {
        let record = SessionRecord::default();

        assert!(!record.is_logged_in());
        assert!(record.user_id().is_none());
        assert!(!record.has_pending_login_key());
    }

    #[test]
    fn test_attempt_login_matching_key_logs_in_and_consumes() {
        let mut record = issued("u", "k1");

        assert!(record.attempt_login("k1"));

        assert!(record.is_logged_in());
        assert!(!record.has_pending_login_key());
    }

    #[test]
    fn test_attempt_login_same_key_twice_second_fails() {
        let mut record = issued("u", "k1");
        assert!(record.attempt_login("k1"));

        assert!(!record.attempt_login("k1"), "login keys are single use");
    }

    #[test]
    fn test_attempt_login_wrong_key_changes_nothing() {
        let mut record = issued("u", "k1");

        assert!(!record.attempt_login("k2"));

        assert!(!record.is_logged_in());
        assert!(record.has_pending_login_key());
    }

    #[test]
    fn test_attempt_login_without_pending_key_never_matches() {
        let mut record = SessionRecord::default();

        assert!(!record.attempt_login(""));
        assert!(!record.attempt_login("anything"));
    }

    #[test]
    fn test_issue_login_key_supersedes_previous_key() {
        let mut record = issued("u", "k1");
        record.issue_login_key("u".into(), "k2".into());

        assert!(!record.attempt_login("k1"));
        assert!(record.attempt_login("k2"));
    }

    #[test]
    fn test_invalidate_login_key_keeps_login_state() {
        let mut record = issued("u", "k1");
        record.attempt_login("k1");
        record.issue_login_key("u".into(), "k2".into());
        record.invalidate_login_key();

        assert!(record.is_logged_in());
        assert!(!record.attempt_login("k2"));
    }

    #[test]
    fn test_log_out_reports_transition_once() {
        let mut record = issued("u", "k1");
        record.attempt_login("k1");

        assert!(record.log_out());
        assert!(!record.log_out(), "second logout is a no-op");
        assert!(!record.is_logged_in());
    }

    #[test]
    fn test_log_out_keeps_user_id() {
        let mut record = issued("me@example.com", "k1");
        record.attempt_login("k1");
        record.log_out();

        assert_eq!(record.user_id(), Some("me@example.com"));
    }

    #[test]
    fn test_session_key_short_is_prefix() {
        let key = SessionKey::new("0123456789abcdef0123456789abcdef".into());

        assert_eq!(key.short(), "01234567");
        assert_eq!(key.to_string(), key.as_str());
        assert_eq!(SessionKey::new("abc".into()).short(), "abc");
    }
}
