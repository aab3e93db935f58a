use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::models::conversation::ConversationMemory;

pub const DEFAULT_MAX_SESSIONS: usize = 1000;
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct SessionEntry {
    memory: ConversationMemory,
    last_used: Instant,
}

/// Conversation memory per session (trip).
///
/// A round checks its session's memory out, works on its own copy without
/// holding the lock, and stores the updated memory back once synthesis
/// succeeds. Sessions never see each other's turns.
///
/// Sessions idle for longer than `idle_ttl` are dropped, and once more than
/// `max_sessions` are held the least recently used ones go first.
#[derive(Debug)]
pub struct SessionMemoryStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    max_exchanges: usize,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl SessionMemoryStore {
    pub fn new(max_exchanges: usize) -> Self {
        Self::with_limits(max_exchanges, DEFAULT_MAX_SESSIONS, DEFAULT_IDLE_TTL)
    }

    pub fn with_limits(max_exchanges: usize, max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_exchanges,
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn checkout(&self, session_id: &str) -> ConversationMemory {
        let mut sessions = self.lock();
        match sessions.get_mut(session_id) {
            Some(entry) if entry.last_used.elapsed() <= self.idle_ttl => {
                entry.last_used = Instant::now();
                entry.memory.clone()
            }
            _ => ConversationMemory::new(self.max_exchanges),
        }
    }

    /// Store a session's memory and return the ids of sessions evicted to
    /// stay within the limits.
    pub fn store(&self, session_id: &str, memory: ConversationMemory) -> Vec<String> {
        self.store_at(session_id, memory, Instant::now())
    }

    fn store_at(&self, session_id: &str, memory: ConversationMemory, now: Instant) -> Vec<String> {
        let mut sessions = self.lock();
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                memory,
                last_used: now,
            },
        );

        let mut evicted: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_used) > self.idle_ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &evicted {
            sessions.remove(id);
        }

        while sessions.len() > self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .filter(|(id, _)| id.as_str() != session_id)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            evicted.push(oldest);
        }

        evicted
    }

    /// Returns whether the session had any memory.
    pub fn clear(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }
}
