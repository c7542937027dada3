//! Context budget scenarios and budget properties over varied histories

use docqa_core::context::{
    estimate_token_count, manage_rag_context, prune, prune_history, truncate_message, Citation,
    ContextOptions, Message, MAX_MESSAGE_CHARS, MIN_RESPONSE_TOKENS,
};
use std::collections::HashMap;

fn alternating(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("User turn {} asking about the contract?", i))
            } else {
                Message::assistant(format!("Assistant turn {} explaining clause {}.", i, i))
            }
        })
        .collect()
}

/// Deterministic mix of lengths, roles and citations
fn mixed_history(n: usize, seed: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            let len = ((i * 37 + seed * 101) % 9) * 350 + 5;
            let body = "lorem ipsum dolor sit amet. ".repeat(len / 28 + 1);
            let body: String = body.chars().take(len).collect();
            let message = if (i + seed) % 3 == 0 {
                Message::assistant(body)
            } else {
                Message::user(body)
            };
            if i % 4 == 1 {
                message.with_citations(vec![Citation::new("doc-1", format!("chunk-{}", i))])
            } else {
                message
            }
        })
        .collect()
}

fn positions(result: &[Message], history: &[Message]) -> Vec<usize> {
    let index: HashMap<_, _> = history.iter().enumerate().map(|(i, m)| (m.id, i)).collect();
    result.iter().map(|m| index[&m.id]).collect()
}

#[test]
fn test_ten_message_scenario() {
    let history = alternating(10);
    let options = ContextOptions {
        min_recent_messages: 4,
        max_messages: 6,
        ..Default::default()
    };

    let result = prune_history(&history, &options);
    assert_eq!(result.len(), 6);

    let picked = positions(&result, &history);
    assert_eq!(&picked[2..], &[6, 7, 8, 9]);
    // the two highest-priority messages among the first six are the latest two
    assert_eq!(&picked[..2], &[4, 5]);
}

#[test]
fn test_rag_scenario_keeps_response_floor() {
    let history = alternating(6);
    let document = "The agreement renews annually. ".repeat(100);
    let document: String = document.chars().take(3000).collect();

    let options = ContextOptions {
        max_context_tokens: 200,
        ..Default::default()
    };

    let result = manage_rag_context(&history, &document, &options);
    assert_eq!(result.document_tokens, 750);
    assert_eq!(result.available_tokens_for_response, MIN_RESPONSE_TOKENS);
    assert!(!result.summary.is_empty());
    assert!(result.summary.contains("tokens"));
}

#[test]
fn test_budgets_hold_across_histories() {
    let option_sets = [
        ContextOptions::default(),
        ContextOptions {
            max_messages: 5,
            min_recent_messages: 2,
            ..Default::default()
        },
        ContextOptions {
            max_context_tokens: 600,
            max_context_chars: 2_400,
            min_recent_messages: 1,
            ..Default::default()
        },
        ContextOptions {
            max_context_tokens: 1_500,
            min_recent_messages: 0,
            prioritize_recent: false,
            ..Default::default()
        },
    ];

    for seed in 0..6 {
        for n in [0, 1, 3, 8, 25] {
            let history = mixed_history(n, seed);

            for options in &option_sets {
                let result = prune(&history, options);
                let picked = positions(&result.messages, &history);

                // chronological subsequence
                assert!(picked.windows(2).all(|w| w[0] < w[1]));

                // most recent messages always present
                let min_recent = options.min_recent_messages.min(options.max_messages).min(n);
                for i in n - min_recent..n {
                    assert!(picked.contains(&i), "seed {} n {} missing {}", seed, n, i);
                }

                assert!(result.messages.len() <= options.max_messages);
                assert_eq!(result.messages.len() + result.omitted_count, n);

                // older admissions stay within budget unless the recent set alone exceeds it
                let recent_tokens: usize = history[n - min_recent..]
                    .iter()
                    .map(|m| estimate_token_count(&m.content))
                    .sum();
                let recent_chars: usize = history[n - min_recent..]
                    .iter()
                    .map(|m| m.char_count())
                    .sum();
                assert!(result.total_tokens <= options.max_context_tokens.max(recent_tokens));
                assert!(result.total_chars <= options.max_context_chars.max(recent_chars));

                let counted: usize = result
                    .messages
                    .iter()
                    .map(|m| estimate_token_count(&m.content))
                    .sum();
                assert_eq!(counted, result.total_tokens);
            }
        }
    }
}

#[test]
fn test_truncated_messages_respect_cap() {
    let mut history = vec![Message::user("x ".repeat(3_000))];
    history.extend(alternating(3));
    let options = ContextOptions {
        min_recent_messages: 3,
        max_context_chars: 4_000,
        ..Default::default()
    };

    let result = prune(&history, &options);
    assert_eq!(result.messages.len(), 4);
    assert_eq!(result.truncated_count, 1);
    assert!(result.messages[0].char_count() <= MAX_MESSAGE_CHARS);
    assert_eq!(
        result.messages[0].content,
        truncate_message(&history[0].content, MAX_MESSAGE_CHARS)
    );
}

#[test]
fn test_zero_max_messages_returns_nothing() {
    let history = alternating(5);
    let options = ContextOptions {
        max_messages: 0,
        ..Default::default()
    };

    let result = prune(&history, &options);
    assert!(result.messages.is_empty());
    assert_eq!(result.omitted_count, 5);
}

#[test]
fn test_empty_history_rag() {
    let result = manage_rag_context(&[], "", &ContextOptions::default());
    assert!(result.messages.is_empty());
    assert_eq!(result.total_tokens, 0);
    assert_eq!(result.total_chars, 0);
}
