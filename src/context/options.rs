//! Budget options for context pruning

use serde::{Deserialize, Serialize};

/// Budgets and switches for one pruning call
///
/// Inconsistent values are clamped by [`normalized`](Self::normalized),
/// never rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Maximum number of messages returned
    pub max_messages: usize,

    /// Maximum total characters across returned messages
    pub max_context_chars: usize,

    /// Maximum total estimated tokens across returned messages
    pub max_context_tokens: usize,

    /// Most recent messages always kept
    pub min_recent_messages: usize,

    /// Weight recency when ranking older messages
    pub prioritize_recent: bool,

    /// Keep system messages in the candidate set
    pub include_system_messages: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_messages: 20,
            max_context_chars: 16_000,
            max_context_tokens: 4_000,
            min_recent_messages: 4,
            prioritize_recent: true,
            include_system_messages: false,
        }
    }
}

impl ContextOptions {
    /// Copy with `min_recent_messages` clamped to `max_messages`
    pub fn normalized(&self) -> Self {
        Self {
            min_recent_messages: self.min_recent_messages.min(self.max_messages),
            ..self.clone()
        }
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self
    }

    pub fn with_min_recent_messages(mut self, min: usize) -> Self {
        self.min_recent_messages = min;
        self
    }

    pub fn with_max_context_tokens(mut self, tokens: usize) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    pub fn with_max_context_chars(mut self, chars: usize) -> Self {
        self.max_context_chars = chars;
        self
    }
}
