//! The session manager: owns every session and the three clocks.
//!
//! The manager is split the same way as a room: a cheap, cloneable
//! [`SessionManager`] handle and a private actor task that owns all state.
//! The actor's loop is the only place the session table and the clocks are
//! ever touched, so every create, lookup, login, logout, and expiry runs to
//! completion before the next one starts. A clock firing at the same moment
//! as a lookup on the same key cannot race: the actor sees one, then the
//! other.
//!
//! # Clocks
//!
//! Three [`Expirer`]s share the session-key namespace:
//!
//! | Action          | logout | deletion | login key |
//! |-----------------|:------:|:--------:|:---------:|
//! | create session  | touch  |          |           |
//! | issue login key | touch  | touch    | touch     |
//! | login succeeds  | touch  |          |           |
//! | lookup          | touch  | touch    |           |
//!
//! When a clock fires: logout logs the session out, deletion logs it out and
//! removes it, login key discards the pending key.

use std::collections::HashMap;
use std::fmt;

use latchkey_expire::Expirer;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, trace};

use crate::session::SessionRecord;
use crate::{
    LoginEvent, ManagerConfig, RandomTokens, Session, SessionError, SessionEvent, SessionKey,
    TokenGenerator,
};

/// Command channel size for the manager actor.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Buffered notifications per session before slow subscribers lag.
const SESSION_EVENT_CAPACITY: usize = 16;

/// Buffered notifications on the global channel before slow subscribers lag.
const GLOBAL_EVENT_CAPACITY: usize = 256;

/// Reply channel carried by every command.
pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Commands sent to the manager actor.
///
/// Each variant carries a `oneshot` reply channel; the caller sends the
/// command and waits for the answer on it.
pub(crate) enum Command {
    Create {
        reply: Reply<Session>,
    },
    Get {
        key: String,
        reply: Reply<Option<Session>>,
    },
    Len {
        reply: Reply<usize>,
    },
    UserId {
        key: SessionKey,
        reply: Reply<Option<String>>,
    },
    IssueLoginKey {
        key: SessionKey,
        user_id: String,
        reply: Reply<String>,
    },
    AttemptLogin {
        key: SessionKey,
        provided: String,
        reply: Reply<()>,
    },
    InvalidateLoginKey {
        key: SessionKey,
        reply: Reply<()>,
    },
    IsLoggedIn {
        key: SessionKey,
        reply: Reply<bool>,
    },
    LogOut {
        key: SessionKey,
        reply: Reply<()>,
    },
    Shutdown,
}

/// Sends a command built around a fresh reply channel and waits for the
/// answer. A closed channel on either leg means the actor is gone.
pub(crate) async fn call<T>(
    commands: &mpsc::Sender<Command>,
    make: impl FnOnce(Reply<T>) -> Command,
) -> Result<T, SessionError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    commands
        .send(make(reply_tx))
        .await
        .map_err(|_| SessionError::Unavailable)?;
    reply_rx.await.map_err(|_| SessionError::Unavailable)?
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Creates and looks up sessions, and re-publishes their login events.
///
/// Cheap to clone; every clone talks to the same actor.
///
/// ## Lifecycle
///
/// ```text
/// create_session() ──→ [anonymous] ──issue_login_key()──→ [pending]
///                                                            │
///                           attempt_login(key) ◄─────────────┘
///                                   │
///                                   ▼
///        logout clock / log_out() ◄─ [logged in]
///
/// deletion clock ──→ log out + remove from table (lookups return None)
/// ```
#[derive(Debug, Clone)]
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Validates `config` and spawns the manager actor with the default
    /// CSPRNG token generator.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfig`] if any duration is zero.
    pub fn new(config: ManagerConfig) -> Result<Self, SessionError> {
        Self::with_generator(config, RandomTokens)
    }

    /// Like [`new`](Self::new), with a caller-supplied token source for
    /// session keys and login keys.
    pub fn with_generator(
        config: ManagerConfig,
        generator: impl TokenGenerator,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let clock = |name: &str, secs: u64| {
            Expirer::with_secs(secs)
                .map_err(|e| SessionError::InvalidConfig(format!("{name}: {e}")))
        };
        let logout_clock = clock("logout_after_secs", config.logout_after_secs)?;
        let deletion_clock = clock("delete_after_secs", config.delete_after_secs)?;
        let login_key_clock = clock(
            "login_key_expires_after_secs",
            config.login_key_expires_after_secs,
        )?;

        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
        let (events, _) = broadcast::channel(GLOBAL_EVENT_CAPACITY);

        let actor = ManagerActor {
            sessions: HashMap::new(),
            logout_clock,
            deletion_clock,
            login_key_clock,
            tokens: Box::new(generator),
            events: events.clone(),
            handle_sender: tx.downgrade(),
            receiver: rx,
        };

        info!(
            logout_after_secs = config.logout_after_secs,
            login_key_expires_after_secs = config.login_key_expires_after_secs,
            delete_after_secs = config.delete_after_secs,
            "session manager started"
        );
        tokio::spawn(actor.run());

        Ok(Self {
            commands: tx,
            events,
        })
    }

    /// Creates a new anonymous session and starts its logout clock.
    pub async fn create_session(&self) -> Result<Session, SessionError> {
        call(&self.commands, |reply| Command::Create { reply }).await
    }

    /// Looks up a session by key.
    ///
    /// A hit counts as activity: it restarts the session's logout and
    /// deletion clocks. Unknown or deleted keys yield `Ok(None)` and touch
    /// nothing.
    pub async fn get_session(&self, key: &str) -> Result<Option<Session>, SessionError> {
        let key = key.to_string();
        call(&self.commands, |reply| Command::Get { key, reply }).await
    }

    /// Number of sessions currently in the table.
    pub async fn len(&self) -> Result<usize, SessionError> {
        call(&self.commands, |reply| Command::Len { reply }).await
    }

    /// Returns `true` if no sessions exist.
    pub async fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.len().await? == 0)
    }

    /// Subscribes to every session's login/logout notifications.
    ///
    /// Only events emitted after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stops the actor. Pending countdowns are dropped without firing and
    /// every handle starts returning [`SessionError::Unavailable`].
    ///
    /// The actor also stops on its own once every manager and session
    /// handle has been dropped.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| SessionError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Which clock fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clock {
    Logout,
    Deletion,
    LoginKey,
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logout => write!(f, "logout"),
            Self::Deletion => write!(f, "deletion"),
            Self::LoginKey => write!(f, "login-key"),
        }
    }
}

/// One turn of the actor loop.
enum Wake {
    Command(Command),
    Expired(Clock, String),
    Closed,
}

/// A live session: its state plus its local notification channel.
struct Entry {
    record: SessionRecord,
    events: broadcast::Sender<LoginEvent>,
}

/// The internal manager state. Runs inside a Tokio task.
struct ManagerActor {
    sessions: HashMap<SessionKey, Entry>,
    logout_clock: Expirer,
    deletion_clock: Expirer,
    login_key_clock: Expirer,
    tokens: Box<dyn TokenGenerator>,
    events: broadcast::Sender<SessionEvent>,
    /// Used to mint `Session` handles. Weak, so the actor doesn't keep its
    /// own command channel open.
    handle_sender: mpsc::WeakSender<Command>,
    receiver: mpsc::Receiver<Command>,
}

impl ManagerActor {
    /// Processes commands and clock expirations one at a time until
    /// shutdown or until every handle is dropped.
    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Wake::Command(cmd),
                    None => Wake::Closed,
                },
                key = self.logout_clock.next_expired() => Wake::Expired(Clock::Logout, key),
                key = self.deletion_clock.next_expired() => Wake::Expired(Clock::Deletion, key),
                key = self.login_key_clock.next_expired() => Wake::Expired(Clock::LoginKey, key),
            };

            match wake {
                Wake::Command(Command::Shutdown) | Wake::Closed => break,
                Wake::Command(cmd) => self.handle_command(cmd),
                Wake::Expired(clock, key) => self.handle_expiry(clock, &key),
            }
        }

        info!(sessions = self.sessions.len(), "session manager stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        // A dropped reply receiver just means the caller stopped waiting.
        match cmd {
            Command::Create { reply } => {
                let result = self.create().ok_or(SessionError::Unavailable);
                let _ = reply.send(result);
            }
            Command::Get { key, reply } => {
                let _ = reply.send(Ok(self.get(&key)));
            }
            Command::Len { reply } => {
                let _ = reply.send(Ok(self.sessions.len()));
            }
            Command::UserId { key, reply } => {
                let result = self
                    .entry(&key)
                    .map(|entry| entry.record.user_id().map(str::to_string));
                let _ = reply.send(result);
            }
            Command::IssueLoginKey {
                key,
                user_id,
                reply,
            } => {
                let _ = reply.send(self.issue_login_key(&key, user_id));
            }
            Command::AttemptLogin {
                key,
                provided,
                reply,
            } => {
                let _ = reply.send(self.attempt_login(&key, &provided));
            }
            Command::InvalidateLoginKey { key, reply } => {
                let result = self.entry_mut(&key).map(|entry| {
                    entry.record.invalidate_login_key();
                });
                let _ = reply.send(result);
            }
            Command::IsLoggedIn { key, reply } => {
                let result = self.entry(&key).map(|entry| entry.record.is_logged_in());
                let _ = reply.send(result);
            }
            Command::LogOut { key, reply } => {
                let result = self.entry(&key).map(|_| ());
                if result.is_ok() {
                    self.log_out(&key);
                }
                let _ = reply.send(result);
            }
            Command::Shutdown => {}
        }
    }

    fn handle_expiry(&mut self, clock: Clock, key: &str) {
        let Some((key, _)) = self.sessions.get_key_value(key) else {
            trace!(%clock, "clock fired for a session that no longer exists");
            return;
        };
        let key = key.clone();

        match clock {
            Clock::Logout => {
                if self.entry(&key).is_ok_and(|entry| entry.record.is_logged_in()) {
                    debug!(session = key.short(), "logged out after inactivity");
                    self.log_out(&key);
                }
            }
            Clock::Deletion => {
                self.log_out(&key);
                self.sessions.remove(&key);
                self.logout_clock.remove(key.as_str());
                self.login_key_clock.remove(key.as_str());
                info!(session = key.short(), "session deleted after inactivity");
            }
            Clock::LoginKey => {
                if let Ok(entry) = self.entry_mut(&key) {
                    if entry.record.has_pending_login_key() {
                        debug!(session = key.short(), "login key expired");
                    }
                    entry.record.invalidate_login_key();
                }
            }
        }
    }

    // -- Operations -------------------------------------------------------

    fn create(&mut self) -> Option<Session> {
        let key = loop {
            let candidate = self.tokens.generate();
            if !self.sessions.contains_key(candidate.as_str()) {
                break SessionKey::new(candidate);
            }
            debug!("generated session key collided with a live session, retrying");
        };

        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        self.sessions.insert(
            key.clone(),
            Entry {
                record: SessionRecord::default(),
                events,
            },
        );
        self.logout_clock.touch(key.as_str());

        info!(session = key.short(), "session created");
        self.handle(&key)
    }

    fn get(&mut self, key: &str) -> Option<Session> {
        let (key, _) = self.sessions.get_key_value(key)?;
        let key = key.clone();
        self.logout_clock.touch(key.as_str());
        self.deletion_clock.touch(key.as_str());
        trace!(session = key.short(), "session looked up");
        self.handle(&key)
    }

    fn issue_login_key(
        &mut self,
        key: &SessionKey,
        user_id: String,
    ) -> Result<String, SessionError> {
        self.entry(key)?;
        self.log_out(key);

        let login_key = self.tokens.generate();
        self.entry_mut(key)?
            .record
            .issue_login_key(user_id, login_key.clone());

        self.logout_clock.touch(key.as_str());
        self.deletion_clock.touch(key.as_str());
        self.login_key_clock.touch(key.as_str());

        debug!(session = key.short(), "login key issued");
        Ok(login_key)
    }

    fn attempt_login(&mut self, key: &SessionKey, provided: &str) -> Result<(), SessionError> {
        if !self.entry_mut(key)?.record.attempt_login(provided) {
            // Deliberately indistinguishable from success to the caller.
            trace!(session = key.short(), "login key did not match");
            return Ok(());
        }

        self.logout_clock.touch(key.as_str());
        info!(session = key.short(), "session logged in");
        self.emit(key, LoginEvent::LoggedIn);
        Ok(())
    }

    /// Logs the session out if it is logged in, notifying subscribers.
    /// Returns nothing: repeated logouts are silent no-ops.
    fn log_out(&mut self, key: &SessionKey) {
        let logged_out = self
            .sessions
            .get_mut(key)
            .is_some_and(|entry| entry.record.log_out());
        if logged_out {
            info!(session = key.short(), "session logged out");
            self.emit(key, LoginEvent::LoggedOut);
        }
    }

    // -- Helpers ----------------------------------------------------------

    fn entry(&self, key: &SessionKey) -> Result<&Entry, SessionError> {
        self.sessions
            .get(key)
            .ok_or_else(|| SessionError::NotFound(key.clone()))
    }

    fn entry_mut(&mut self, key: &SessionKey) -> Result<&mut Entry, SessionError> {
        self.sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::NotFound(key.clone()))
    }

    /// Mints a handle for a live session. `None` only if every command
    /// sender is gone, i.e. the actor is about to stop.
    fn handle(&self, key: &SessionKey) -> Option<Session> {
        let entry = self.sessions.get(key)?;
        let commands = self.handle_sender.upgrade()?;
        Some(Session::new(key.clone(), commands, entry.events.clone()))
    }

    /// Publishes `kind` to the session's own subscribers, then to the
    /// global channel with the session attached.
    fn emit(&self, key: &SessionKey, kind: LoginEvent) {
        let Some(entry) = self.sessions.get(key) else {
            return;
        };
        // `send` only fails when nobody is subscribed.
        let _ = entry.events.send(kind);
        if let Some(session) = self.handle(key) {
            let _ = self.events.send(SessionEvent { kind, session });
        }
    }
}
