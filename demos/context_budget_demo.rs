//! Context Budget Demo Application
//!
//! Prunes a synthetic conversation under several budgets and shows how a
//! retrieved document block changes the history allowance.
//!
//! Usage:
//!   cargo run --example context_budget_demo

use docqa_core::context::{
    manage_rag_context, message_metadata, prune, Citation, ContextOptions, Message,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn conversation() -> Vec<Message> {
    let mut history = vec![Message::system("You answer questions about uploaded contracts.")];
    for turn in 0..8 {
        history.push(Message::user(format!(
            "Question {}: what does clause {} say about termination?",
            turn,
            turn + 3
        )));
        history.push(
            Message::assistant(format!(
                "Clause {} allows termination with {} days notice. {}",
                turn + 3,
                30 + turn * 15,
                "Further detail follows in the schedule. ".repeat(turn * 10)
            ))
            .with_citations(vec![Citation::new("contract-7", format!("chunk-{}", turn)).with_page(turn as u32 + 1)]),
        );
    }
    history
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("=== Context Budget Demo ===");

    let history = conversation();
    info!("History: {} messages", history.len());

    info!("\n--- Priorities ---");
    for meta in message_metadata(&history, &ContextOptions::default()) {
        info!(
            "#{:>2}: {:>5} chars, {:>4} tokens, priority {}",
            meta.index, meta.char_count, meta.estimated_tokens, meta.priority
        );
    }

    let budgets = [
        ("default", ContextOptions::default()),
        (
            "tight",
            ContextOptions::default()
                .with_max_messages(6)
                .with_max_context_tokens(600),
        ),
        (
            "tiny",
            ContextOptions::default()
                .with_min_recent_messages(2)
                .with_max_context_tokens(120),
        ),
    ];

    for (name, options) in &budgets {
        let result = prune(&history, options);
        info!("\n--- Budget: {} ---", name);
        info!("{}", result.summary);
        info!(
            "Tokens: {}, chars: {}, truncated: {}",
            result.total_tokens, result.total_chars, result.truncated_count
        );
    }

    info!("\n--- RAG allocation ---");
    let document = "Termination requires written notice delivered to the registered address. ".repeat(40);
    let result = manage_rag_context(&history, &document, &ContextOptions::default());
    info!("{}", result.summary);
    info!(
        "Document tokens: {}, response allowance: {}",
        result.document_tokens, result.available_tokens_for_response
    );

    info!("\n=== Demo Complete ===");
}
