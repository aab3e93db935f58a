use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_MAX_EXCHANGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Bounded conversation history for one session.
///
/// Holds at most `max_exchanges * 2` turns; pushing past the window drops the
/// oldest turns first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    max_exchanges: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXCHANGES)
    }
}

impl ConversationMemory {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_exchanges: max_exchanges.max(1),
        }
    }

    pub fn window_size(&self) -> usize {
        self.max_exchanges * 2
    }

    /// Record one completed round.
    pub fn record_exchange(&mut self, user_prompt: &str, reply: &str) {
        self.push(ConversationTurn::user(user_prompt));
        self.push(ConversationTurn::assistant(reply));
    }

    fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.window_size() {
            self.turns.pop_front();
        }
    }

    /// Most recent turns, oldest first, ready to be sent ahead of a new user turn.
    pub fn recent(&self) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(self.window_size());
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
