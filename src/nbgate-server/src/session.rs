//! Session store: maps opaque session identifiers to validated tokens.
//!
//! A session is valid iff it is present in the table and `now < expires_at`.
//! Sessions are immutable after creation. Expired entries are removed lazily
//! by any lookup that observes them and by the sweep that runs on every
//! [`SessionStore::create`].

use std::collections::HashMap;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// Number of random bytes in a session identifier (256 bits).
pub const SESSION_ID_BYTES: usize = 32;

/// Default session lifetime in seconds (8 hours).
pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 8 * 60 * 60;

/// Storage for authenticated sessions.
///
/// Every method is atomic with respect to concurrent callers: a lookup that
/// observes expiry deletes the entry under the same critical section, so a
/// concurrent reader can never see a "valid" answer for a session another
/// reader has just expired.
pub trait SessionStore: Send + Sync {
    /// Create a session holding `token` and return its identifier.
    ///
    /// Also sweeps every expired entry.
    fn create(&self, token: String) -> String;

    /// Token of a valid session, deleting the entry if it has expired.
    fn token_for(&self, session_id: &str) -> Option<String>;

    /// Whether `session_id` names a valid session.
    fn is_valid(&self, session_id: &str) -> bool {
        self.token_for(session_id).is_some()
    }

    /// Token of the most recently created valid session.
    fn most_recent_valid_token(&self) -> Option<String>;

    /// Remove expired sessions, returning how many were dropped.
    fn purge_expired(&self) -> usize;

    /// Number of entries currently held, expired or not.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lifetime given to new sessions.
    fn lifetime(&self) -> Duration;
}

/// A stored session.
#[derive(Clone)]
pub struct Session {
    token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    /// Insertion order, breaks ties between sessions created at the same instant.
    seq: u64,
}

impl Session {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A session is live strictly before its expiry instant.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    next_seq: u64,
}

impl SessionTable {
    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.is_live_at(now));
        before - self.sessions.len()
    }
}

/// Process-local session store guarded by a single mutex.
pub struct InMemorySessionStore {
    table: Mutex<SessionTable>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
}

impl std::fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionStore")
            .field("sessions", &self.table.lock().sessions.len())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_LIFETIME_SECS))
    }
}

impl InMemorySessionStore {
    /// Create a store on the system clock.
    pub fn new(lifetime: Duration) -> Self {
        Self::with_clock(lifetime, Arc::new(SystemClock))
    }

    /// Create a store on an injected clock.
    pub fn with_clock(lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Mutex::new(SessionTable::default()),
            clock,
            lifetime,
        }
    }

    /// Snapshot of a session, if present and valid.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let now = self.clock.now();
        let mut table = self.table.lock();
        lookup(&mut table, session_id, now).cloned()
    }
}

/// Look up a session, deleting it if it has expired.
fn lookup<'a>(
    table: &'a mut SessionTable,
    session_id: &str,
    now: DateTime<Utc>,
) -> Option<&'a Session> {
    if session_id.is_empty() {
        return None;
    }
    let live = table.sessions.get(session_id)?.is_live_at(now);
    if !live {
        table.sessions.remove(session_id);
        debug!("Session expired and removed");
        return None;
    }
    table.sessions.get(session_id)
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, token: String) -> String {
        let session_id = generate_session_id();
        let now = self.clock.now();

        let mut table = self.table.lock();
        let seq = table.next_seq;
        table.next_seq += 1;
        table.sessions.insert(
            session_id.clone(),
            Session {
                token,
                created_at: now,
                expires_at: now
                    .checked_add_signed(self.lifetime)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
                seq,
            },
        );
        let swept = table.sweep(now);
        debug!(swept, active = table.sessions.len(), "Session created");

        session_id
    }

    fn token_for(&self, session_id: &str) -> Option<String> {
        let now = self.clock.now();
        let mut table = self.table.lock();
        lookup(&mut table, session_id, now).map(|s| s.token.clone())
    }

    fn most_recent_valid_token(&self) -> Option<String> {
        let now = self.clock.now();
        let mut table = self.table.lock();
        table.sweep(now);
        table
            .sessions
            .values()
            .filter(|s| !s.token.is_empty())
            .max_by_key(|s| (s.created_at, s.seq))
            .map(|s| s.token.clone())
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.table.lock().sweep(now)
    }

    fn len(&self) -> usize {
        self.table.lock().sessions.len()
    }

    fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

/// Generate a URL-safe session identifier from a CSPRNG.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
