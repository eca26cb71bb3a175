//! Renewable per-key expiration registry for Latchkey.
//!
//! An [`Expirer`] is a keyed countdown timer with a single fixed duration.
//! Touching a key (re)starts its countdown; a key that goes `duration`
//! without a touch is reported exactly once by [`Expirer::next_expired`]
//! and then forgotten until it is touched again.
//!
//! # Integration
//!
//! The registry has no task of its own. It is designed to sit inside an
//! actor's `tokio::select!` loop next to the actor's command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands, maybe touch */ }
//!         key = expirer.next_expired() => { /* react to the expiry */ }
//!     }
//! }
//! ```
//!
//! Because the actor owns the registry, a touch and an expiry can never
//! race: whichever the loop observes first wins, and a key touched before
//! its deadline was observed simply gets a new deadline.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

mod error;

pub use error::ExpireError;

/// Longest countdown an [`Expirer`] accepts: one hundred years.
///
/// Deadlines are `Instant::now() + duration`, and an `Instant` cannot hold
/// an arbitrary offset.
pub const MAX_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Entry bookkeeping
// ---------------------------------------------------------------------------

/// Position of a key in the deadline queue.
///
/// The sequence number breaks ties between keys touched at the same
/// instant, so equal deadlines fire in touch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    deadline: Instant,
    seq: u64,
}

// ---------------------------------------------------------------------------
// Expirer
// ---------------------------------------------------------------------------

/// A registry of renewable countdowns sharing one duration.
///
/// Independent instances never affect each other, even when they are fed
/// the same keys.
#[derive(Debug)]
pub struct Expirer {
    duration: Duration,
    /// Current slot of every live key.
    slots: HashMap<String, Slot>,
    /// Live keys ordered by deadline. Kept in sync with `slots`.
    queue: BTreeMap<Slot, String>,
    next_seq: u64,
}

impl Expirer {
    /// Create an empty registry whose countdowns last `duration`.
    ///
    /// # Errors
    /// Returns [`ExpireError::ZeroDuration`] for a zero duration and
    /// [`ExpireError::DurationTooLong`] for one above [`MAX_DURATION`].
    pub fn new(duration: Duration) -> Result<Self, ExpireError> {
        if duration.is_zero() {
            return Err(ExpireError::ZeroDuration);
        }
        if duration > MAX_DURATION || Instant::now().checked_add(duration).is_none() {
            return Err(ExpireError::DurationTooLong {
                secs: duration.as_secs(),
                max: MAX_DURATION.as_secs(),
            });
        }
        debug!(duration_ms = duration.as_millis() as u64, "expirer created");
        Ok(Self {
            duration,
            slots: HashMap::new(),
            queue: BTreeMap::new(),
            next_seq: 0,
        })
    }

    /// Create a registry from a whole number of seconds.
    pub fn with_secs(secs: u64) -> Result<Self, ExpireError> {
        Self::new(Duration::from_secs(secs))
    }

    /// Start a fresh countdown for `key`, replacing any countdown in flight.
    ///
    /// Touches never stack: only the most recent touch decides when the
    /// key expires.
    pub fn touch(&mut self, key: impl Into<String>) {
        let key = key.into();
        let Some(deadline) = Instant::now().checked_add(self.duration) else {
            // Unreachable for durations accepted by `new`.
            warn!(key = short(&key), "deadline out of range, countdown not started");
            return;
        };
        let slot = Slot {
            deadline,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        if let Some(previous) = self.slots.insert(key.clone(), slot) {
            self.queue.remove(&previous);
            trace!(key = short(&key), "countdown restarted");
        } else {
            trace!(key = short(&key), "countdown started");
        }
        self.queue.insert(slot, key);
    }

    /// Forget `key` without firing. Returns `true` if a countdown was
    /// running for it.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some(slot) => {
                self.queue.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Wait for the next key whose countdown elapses and return it.
    ///
    /// The key is forgotten before it is returned, so it fires at most once
    /// per touch. While the registry is empty this future pends forever,
    /// which lets `tokio::select!` keep servicing other branches.
    ///
    /// # Cancel safety
    ///
    /// The registry is only mutated after the deadline has been reached and
    /// nothing is awaited after that, so dropping this future at any await
    /// point leaves the registry untouched.
    pub async fn next_expired(&mut self) -> String {
        loop {
            let Some(&slot) = self.queue.keys().next() else {
                return std::future::pending::<String>().await;
            };

            time::sleep_until(slot.deadline).await;

            // `&mut self` is held across the sleep, so the earliest slot is
            // still the one we slept on.
            if let Some(key) = self.queue.remove(&slot) {
                self.slots.remove(&key);
                debug!(key = short(&key), "countdown elapsed");
                return key;
            }
        }
    }

    /// Whether a countdown is currently running for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// When `key` will expire if it is not touched again.
    pub fn deadline(&self, key: &str) -> Option<Instant> {
        self.slots.get(key).map(|slot| slot.deadline)
    }

    /// Number of running countdowns.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no countdowns are running.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The fixed countdown length of this registry.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Drop every running countdown without firing any of them.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.queue.clear();
    }
}

/// Log-safe prefix of a key. Keys are often bearer credentials.
fn short(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}
