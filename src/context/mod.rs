//! # Context Budget Management
//!
//! Chooses which conversation messages accompany the next model request so
//! a token and character budget is respected and room is left for the
//! answer. Everything here is synchronous and pure.
//!
//! ```rust
//! use docqa_core::context::{ContextBudgetManager, ContextOptions, Message};
//!
//! let manager = ContextBudgetManager::new(ContextOptions::default());
//! let history = vec![
//!     Message::user("What does section 2 cover?"),
//!     Message::assistant("Section 2 covers the refund policy."),
//! ];
//!
//! let result = manager.manage_rag_context(&history, "Refunds are issued within 30 days.");
//! assert_eq!(result.messages.len(), 2);
//! assert!(result.available_tokens_for_response >= 500);
//! ```

pub mod manager;
pub mod message;
pub mod options;
pub mod tokens;

pub use manager::{
    conversation_tokens, manage_rag_context, message_metadata, message_priority, prune,
    prune_history, ContextBudgetManager, PruneResult, HISTORY_FLOOR_PERCENT,
    MIN_RESPONSE_TOKENS, RESPONSE_RESERVE_TOKENS,
};
pub use message::{Citation, Message, MessageMetadata, Role};
pub use options::ContextOptions;
pub use tokens::{estimate_token_count, truncate_message, CHARS_PER_TOKEN, MAX_MESSAGE_CHARS};
