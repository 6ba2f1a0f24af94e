//! Session memory - per-session turn history with a retention window

use counsel_core::{Result, SessionKey, Turn};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Retention window applied when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[async_trait::async_trait]
pub trait SessionMemory: Send + Sync {
    /// Turns recorded for `session`, oldest first. Unknown or expired sessions are empty.
    async fn load(&self, session: &SessionKey) -> Result<Vec<Turn>>;

    /// Append one turn and restart the retention window.
    async fn append(&self, session: &SessionKey, turn: Turn) -> Result<()>;
}

struct SessionEntry {
    turns: Vec<Turn>,
    expires_at: Instant,
}

pub struct InMemorySessionStore {
    sessions: DashMap<SessionKey, SessionEntry>,
    ttl: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self { Self::new(DEFAULT_TTL) }
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { sessions: DashMap::new(), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        before - self.sessions.len()
    }
}

#[async_trait::async_trait]
impl SessionMemory for InMemorySessionStore {
    async fn load(&self, session: &SessionKey) -> Result<Vec<Turn>> {
        let now = Instant::now();
        let expired = match self.sessions.get(session) {
            Some(entry) if entry.expires_at > now => {
                info!(session = %session, turns = entry.turns.len(), "Message history loaded");
                return Ok(entry.turns.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sessions.remove(session);
            debug!(session = %session, "Session memory expired");
        }
        Ok(Vec::new())
    }

    async fn append(&self, session: &SessionKey, turn: Turn) -> Result<()> {
        let now = Instant::now();
        let mut entry = self.sessions.entry(session.clone()).or_insert_with(|| SessionEntry {
            turns: Vec::new(),
            expires_at: now,
        });
        if entry.expires_at <= now {
            entry.turns.clear();
        }
        entry.turns.push(turn);
        entry.expires_at = now + self.ttl;
        info!(session = %session, turns = entry.turns.len(), "Memory updated");
        Ok(())
    }
}
