//! History pruning and RAG budget allocation

use crate::context::{
    message::{Message, MessageMetadata, Role},
    options::ContextOptions,
    tokens::{estimate_token_count, truncate_message, MAX_MESSAGE_CHARS},
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::debug;

/// Tokens held back for the generated answer in RAG allocation
pub const RESPONSE_RESERVE_TOKENS: usize = 1_000;

/// Floor on tokens reported as available for the answer
pub const MIN_RESPONSE_TOKENS: usize = 500;

/// Share of the total token budget always left to history, in percent
pub const HISTORY_FLOOR_PERCENT: usize = 30;

/// Messages shorter than this get a priority bonus
const SHORT_MESSAGE_CHARS: usize = 500;

/// Outcome of a pruning call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneResult {
    /// Selected messages in their original order
    pub messages: Vec<Message>,

    /// Human-readable description of what was kept
    pub summary: String,

    /// Tokens used by the selected messages plus any document block
    pub total_tokens: usize,

    /// Characters across the selected messages
    pub total_chars: usize,

    /// Candidate messages left out
    pub omitted_count: usize,

    /// Selected messages that were shortened to fit
    pub truncated_count: usize,

    /// Tokens left for the generated answer, never below [`MIN_RESPONSE_TOKENS`]
    pub available_tokens_for_response: usize,

    /// Tokens reserved for retrieved document text (zero outside RAG)
    pub document_tokens: usize,
}

impl PruneResult {
    fn empty(document_tokens: usize, total_budget: usize) -> Self {
        let mut result = Self {
            messages: Vec::new(),
            summary: String::new(),
            total_tokens: document_tokens,
            total_chars: 0,
            omitted_count: 0,
            truncated_count: 0,
            available_tokens_for_response: response_tokens(total_budget, document_tokens),
            document_tokens,
        };
        result.summary = summarize(&result);
        result
    }
}

/// Priority of the message at `index` in the full history
///
/// Recency dominates: the recency term is squared, so a newer message
/// outranks any older one once histories are more than a few turns long.
/// Role, citations, brevity and questions break the remaining ties.
pub fn message_priority(index: usize, message: &Message, options: &ContextOptions) -> u64 {
    let recency = index as u64 + 1;
    let mut priority = if options.prioritize_recent {
        recency * recency
    } else {
        0
    };

    priority += message.role.priority_weight();
    priority += 5 * message.citations.len() as u64;

    if message.char_count() < SHORT_MESSAGE_CHARS {
        priority += 2;
    }
    if message.content.trim_end().ends_with('?') {
        priority += 3;
    }

    priority
}

/// Per-message figures for every message in `messages`
pub fn message_metadata(messages: &[Message], options: &ContextOptions) -> Vec<MessageMetadata> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| MessageMetadata {
            index,
            char_count: message.char_count(),
            estimated_tokens: estimate_token_count(&message.content),
            priority: message_priority(index, message, options),
        })
        .collect()
}

/// Estimated tokens across all messages
pub fn conversation_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| estimate_token_count(&m.content))
        .sum()
}

/// Running totals while admitting messages
struct Budget {
    max_messages: usize,
    max_chars: usize,
    max_tokens: usize,
    messages: usize,
    chars: usize,
    tokens: usize,
}

impl Budget {
    fn fits(&self, chars: usize, tokens: usize) -> bool {
        self.messages < self.max_messages
            && self.chars + chars <= self.max_chars
            && self.tokens + tokens <= self.max_tokens
    }

    fn admit(&mut self, chars: usize, tokens: usize) {
        self.messages += 1;
        self.chars += chars;
        self.tokens += tokens;
    }
}

/// Select the messages to send with the next request
///
/// The last `min_recent_messages` candidates are always kept. Older
/// candidates are admitted by priority until a budget is hit; an oversized
/// message that does not fit is shortened to [`MAX_MESSAGE_CHARS`] and
/// admitted only if it then fits. The result keeps the input order.
pub fn prune(messages: &[Message], options: &ContextOptions) -> PruneResult {
    let options = options.normalized();
    select(messages, &options, 0, options.max_context_tokens)
}

/// Pruned messages only
pub fn prune_history(messages: &[Message], options: &ContextOptions) -> Vec<Message> {
    prune(messages, options).messages
}

/// Prune history alongside a block of retrieved document text
///
/// The document and a response reserve are taken out of
/// `max_context_tokens` first; history gets what is left, but never less
/// than 30% of the total.
pub fn manage_rag_context(
    messages: &[Message],
    document_text: &str,
    options: &ContextOptions,
) -> PruneResult {
    let options = options.normalized();
    let total_budget = options.max_context_tokens;
    let document_tokens = estimate_token_count(document_text);

    let reserved = document_tokens.saturating_add(RESPONSE_RESERVE_TOKENS);
    // split so an unbounded budget cannot overflow
    let history_floor = total_budget / 100 * HISTORY_FLOOR_PERCENT
        + total_budget % 100 * HISTORY_FLOOR_PERCENT / 100;
    let history_budget = total_budget.saturating_sub(reserved).max(history_floor);

    debug!(
        "RAG budget: total {}, document {}, history {}",
        total_budget, document_tokens, history_budget
    );

    let history_options = ContextOptions {
        max_context_tokens: history_budget,
        max_context_chars: options
            .max_context_chars
            .min(history_budget.saturating_mul(4)),
        ..options
    };

    select(messages, &history_options, document_tokens, total_budget)
}

fn select(
    messages: &[Message],
    options: &ContextOptions,
    document_tokens: usize,
    total_budget: usize,
) -> PruneResult {
    let candidates: Vec<(usize, &Message)> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| options.include_system_messages || m.role != Role::System)
        .collect();

    if candidates.is_empty() {
        return PruneResult::empty(document_tokens, total_budget);
    }

    let recent_count = options.min_recent_messages.min(candidates.len());
    let (older, recent) = candidates.split_at(candidates.len() - recent_count);

    let mut budget = Budget {
        max_messages: options.max_messages,
        max_chars: options.max_context_chars,
        max_tokens: options.max_context_tokens,
        messages: 0,
        chars: 0,
        tokens: 0,
    };
    let mut selected: Vec<(usize, Message)> =
        Vec::with_capacity(options.max_messages.min(candidates.len()));
    let mut truncated_count = 0;

    for (index, message) in recent {
        budget.admit(message.char_count(), estimate_token_count(&message.content));
        selected.push((*index, (*message).clone()));
    }

    let mut ranked: Vec<(u64, usize, &Message)> = older
        .iter()
        .map(|(index, message)| (message_priority(*index, message, options), *index, *message))
        .collect();
    ranked.sort_by_key(|(priority, index, _)| (Reverse(*priority), Reverse(*index)));

    for (_, index, message) in ranked {
        if budget.messages >= budget.max_messages {
            break;
        }

        let chars = message.char_count();
        let tokens = estimate_token_count(&message.content);

        if budget.fits(chars, tokens) {
            budget.admit(chars, tokens);
            selected.push((index, message.clone()));
            continue;
        }

        if chars <= MAX_MESSAGE_CHARS {
            break;
        }

        let content = truncate_message(&message.content, MAX_MESSAGE_CHARS);
        let chars = content.chars().count();
        let tokens = estimate_token_count(&content);
        if budget.fits(chars, tokens) {
            debug!("Truncated message {} from {} to {} chars", index, message.char_count(), chars);
            budget.admit(chars, tokens);
            truncated_count += 1;
            selected.push((
                index,
                Message {
                    content,
                    ..message.clone()
                },
            ));
        }
    }

    selected.sort_by_key(|(index, _)| *index);

    let total_tokens = budget.tokens + document_tokens;
    let mut result = PruneResult {
        omitted_count: candidates.len() - selected.len(),
        messages: selected.into_iter().map(|(_, m)| m).collect(),
        summary: String::new(),
        total_tokens,
        total_chars: budget.chars,
        truncated_count,
        available_tokens_for_response: response_tokens(total_budget, total_tokens),
        document_tokens,
    };
    result.summary = summarize(&result);

    debug!("{}", result.summary);
    result
}

fn response_tokens(total_budget: usize, used: usize) -> usize {
    total_budget.saturating_sub(used).max(MIN_RESPONSE_TOKENS)
}

fn summarize(result: &PruneResult) -> String {
    let kept = result.messages.len();
    let history_tokens = result.total_tokens - result.document_tokens;

    let mut summary = if result.omitted_count == 0 {
        format!(
            "Included all {} messages (~{} tokens)",
            kept, history_tokens
        )
    } else {
        format!(
            "Included {} of {} messages (~{} tokens); {} older messages omitted",
            kept,
            kept + result.omitted_count,
            history_tokens,
            result.omitted_count
        )
    };

    if result.truncated_count > 0 {
        summary.push_str(&format!(", {} truncated", result.truncated_count));
    }
    if result.document_tokens > 0 {
        summary.push_str(&format!(
            "; document context ~{} tokens, {} tokens left for the response",
            result.document_tokens, result.available_tokens_for_response
        ));
    }

    summary
}

/// Context budgeting with a fixed set of options
///
/// Stateless apart from the options; share freely across tasks.
#[derive(Debug, Clone, Default)]
pub struct ContextBudgetManager {
    options: ContextOptions,
}

impl ContextBudgetManager {
    pub fn new(options: ContextOptions) -> Self {
        Self {
            options: options.normalized(),
        }
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn prune(&self, messages: &[Message]) -> PruneResult {
        prune(messages, &self.options)
    }

    pub fn prune_history(&self, messages: &[Message]) -> Vec<Message> {
        prune_history(messages, &self.options)
    }

    pub fn manage_rag_context(&self, messages: &[Message], document_text: &str) -> PruneResult {
        manage_rag_context(messages, document_text, &self.options)
    }

    pub fn message_metadata(&self, messages: &[Message]) -> Vec<MessageMetadata> {
        message_metadata(messages, &self.options)
    }
}
