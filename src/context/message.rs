//! Conversation message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Weight added to a message's priority
    pub fn priority_weight(&self) -> u64 {
        match self {
            Role::User => 10,
            Role::Assistant => 8,
            Role::System => 0,
        }
    }
}

/// Reference from an answer back into a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub document_id: String,
    pub chunk_id: String,
    pub page: Option<u32>,
    pub snippet: Option<String>,
}

impl Citation {
    pub fn new(document_id: impl Into<String>, chunk_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_id: chunk_id.into(),
            page: None,
            snippet: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message with a fresh id, timestamped now
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            citations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    /// Length in characters, not bytes
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// Per-message figures computed for one pruning call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Position in the full history
    pub index: usize,
    pub char_count: usize,
    pub estimated_tokens: usize,
    pub priority: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let m = Message::user("héllo");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.char_count(), 5);
        assert!(m.citations.is_empty());
        assert_ne!(Message::assistant("a").id, Message::assistant("a").id);
    }

    #[test]
    fn test_role_weights() {
        assert!(Role::User.priority_weight() > Role::Assistant.priority_weight());
        assert!(Role::Assistant.priority_weight() > Role::System.priority_weight());
    }

    #[test]
    fn test_message_serde() {
        let m = Message::assistant("See page 4.")
            .with_citations(vec![Citation::new("doc-1", "chunk-9").with_page(4)]);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));

        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
