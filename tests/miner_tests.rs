// LogIQ - Integration Tests
// Copyright (c) 2025 LogIQ Contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Integration tests for the template miner, template IDs and retry.

use logiq::template::{extract_message, extract_parameters, is_variable, mask_tokens};
use logiq::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helper Functions
// ============================================================================

fn line(service: &str, message: &str) -> String {
    format!("[2024-05-01 12:00:00] [INFO] {}: {}", service, message)
}

#[derive(Debug, PartialEq)]
enum FetchError {
    Timeout,
    BadQuery,
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

// ============================================================================
// Section 1: Message Extraction and Masking
// ============================================================================

#[test]
fn test_01_prefix_is_stripped() {
    assert_eq!(
        extract_message("[2024-05-01 12:00:00] [ERROR] db: Connection lost"),
        "db: Connection lost"
    );
}

#[test]
fn test_02_line_without_prefix_is_mined_whole() {
    assert_eq!(extract_message("plain message 12"), "plain message 12");
    assert_eq!(extract_message("[only one] segment"), "[only one] segment");

    let miner = TemplateMiner::new();
    assert_eq!(miner.parse("plain message 12").template, "plain message <*>");
}

#[test]
fn test_03_brackets_inside_message_survive() {
    assert_eq!(
        extract_message("[t] [WARN] api: Bad payload [field=name]"),
        "api: Bad payload [field=name]"
    );
}

#[test]
fn test_04_any_digit_masks_the_token() {
    assert!(is_variable("42"));
    assert!(is_variable("10.0.0.1"));
    assert!(is_variable("req-7f3a"));
    assert!(!is_variable("login"));

    let tokens = ["GET", "/users/17", "200", "OK"];
    assert_eq!(mask_tokens(&tokens), vec!["GET", WILDCARD, WILDCARD, "OK"]);
}

#[test]
fn test_05_parameters_in_positional_order() {
    let original = ["User", "42", "from", "10.0.0.1"];
    let template = ["User", WILDCARD, "from", WILDCARD];
    assert_eq!(extract_parameters(&original, &template), vec!["42", "10.0.0.1"]);

    // Compared up to the shorter sequence
    assert_eq!(extract_parameters(&original, &template[..2]), vec!["42"]);
}

// ============================================================================
// Section 2: Template Identity
// ============================================================================

#[test]
fn test_06_template_id_is_deterministic() {
    let a = TemplateId::of("auth: User <*> logged in");
    let b = TemplateId::of("auth: User <*> logged in");
    let c = TemplateId::of("auth: User <*> logged out");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_07_template_id_hex_rendering() {
    let id = TemplateId::of("cache: Evicted <*> entries");
    let hex = id.to_string();
    assert_eq!(hex.len(), TemplateId::HEX_WIDTH);
    assert!(hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    assert_eq!(hex.parse::<TemplateId>().unwrap(), id);
}

#[test]
fn test_08_template_id_rejects_bad_hex() {
    assert!(matches!(
        "abc".parse::<TemplateId>(),
        Err(LogiqError::InvalidTemplateId(_))
    ));
    assert!("zzzzzzzzzzzzzzzz".parse::<TemplateId>().is_err());
    assert!("+123456789abcdef".parse::<TemplateId>().is_err());
}

#[test]
fn test_09_template_id_matches_parse_output() {
    let miner = TemplateMiner::new();
    let parsed = miner.parse(&line("cache", "Evicted 17 entries"));
    assert_eq!(parsed.template_id, Some(TemplateId::of(&parsed.template)));
}

// ============================================================================
// Section 3: Mining
// ============================================================================

#[test]
fn test_10_numbers_collapse() {
    let miner = TemplateMiner::new();
    let a = miner.parse(&line("auth", "User 42 logged in"));
    let b = miner.parse(&line("auth", "User 9981 logged in"));

    assert_eq!(a.template, "auth: User <*> logged in");
    assert_eq!(a.template_id, b.template_id);
    assert_eq!(a.parameters, vec!["42"]);
    assert_eq!(b.parameters, vec!["9981"]);
}

#[test]
fn test_11_repeated_line_is_monotone() {
    let miner = TemplateMiner::new();
    let first = miner.parse(&line("db", "Query took 12 ms"));
    for _ in 0..20 {
        let again = miner.parse(&line("db", "Query took 12 ms"));
        assert_eq!(again.template_id, first.template_id);
    }
}

#[test]
fn test_12_blank_and_whitespace_lines() {
    let miner = TemplateMiner::new();
    for input in ["", "   ", "\t", "[t] [INFO] ", "[t] [INFO]    "] {
        let parsed = miner.parse(input);
        assert!(parsed.is_empty(), "{:?} should be blank", input);
        assert_eq!(parsed, ParsedLine::empty());
    }
    assert_eq!(miner.template_count(), 0);
}

#[test]
fn test_13_distinct_messages_get_distinct_templates() {
    let miner = TemplateMiner::new();
    let a = miner.parse(&line("api", "Request served"));
    let b = miner.parse(&line("api", "Request failed"));
    let c = miner.parse(&line("worker", "Request served"));

    assert_ne!(a.template_id, b.template_id);
    assert_ne!(a.template_id, c.template_id);
    assert_eq!(miner.template_count(), 3);
}

#[test]
fn test_14_depth_bound() {
    let miner = TemplateMiner::with_config(MinerConfig { max_depth: 3 }).unwrap();

    // Build the full path a -> b -> c, then reuse it
    for _ in 0..4 {
        miner.parse("a b c first tail");
    }
    let other = miner.parse("a b c second tail");
    assert_eq!(other.template, "a b c first tail");
    assert!(other.parameters.is_empty());
}

#[test]
fn test_15_stats_sum_per_template() {
    let miner = TemplateMiner::new();
    for i in 0..10 {
        miner.parse(&line("auth", &format!("User {} logged in", i)));
    }
    miner.parse(&line("auth", "Password reset requested"));

    let stats = miner.stats();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats["auth: User <*> logged in"], 10);
    assert_eq!(stats["auth: Password reset requested"], 1);
    assert!(miner.node_count() > 2);
}

#[test]
fn test_16_zero_depth_rejected() {
    let err = TemplateMiner::with_config(MinerConfig { max_depth: 0 }).unwrap_err();
    assert!(matches!(err, LogiqError::InvalidConfig(_)));
}

// ============================================================================
// Section 4: Concurrency
// ============================================================================

#[test]
fn test_17_parallel_services_share_templates() {
    let miner = Arc::new(TemplateMiner::new());
    let services = ["auth", "payment", "search", "checkout"];

    std::thread::scope(|scope| {
        for service in services {
            let miner = Arc::clone(&miner);
            scope.spawn(move || {
                for i in 0..500 {
                    let parsed = miner.parse(&line(service, &format!("Handled request {} in {} ms", i, i % 40)));
                    assert_eq!(
                        parsed.template,
                        format!("{}: Handled request <*> in <*> ms", service)
                    );
                }
            });
        }
        // Diagnostics while writers are running
        scope.spawn(|| {
            for _ in 0..50 {
                let _ = miner.stats();
            }
        });
    });

    let stats = miner.stats();
    assert_eq!(stats.len(), services.len());
    assert!(stats.values().all(|&count| count == 500));
}

// ============================================================================
// Section 5: Retry
// ============================================================================

#[test]
fn test_18_transient_failures_are_retried() {
    let strategy = RetryStrategy::fixed(3, Duration::from_millis(1));
    let calls = AtomicUsize::new(0);
    let result = with_retry_transient(&strategy, || {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(FetchError::Timeout)
        } else {
            Ok("rows")
        }
    });
    assert_eq!(result, Ok("rows"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_19_permanent_failure_is_not_retried() {
    let strategy = RetryStrategy::fixed(3, Duration::from_millis(1));
    let calls = AtomicUsize::new(0);
    let result: std::result::Result<(), _> = with_retry_transient(&strategy, || {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::BadQuery)
    });
    assert_eq!(result, Err(FetchError::BadQuery));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_20_retry_budget_is_bounded() {
    let strategy = RetryStrategy::fixed(2, Duration::from_millis(1));
    let calls = AtomicUsize::new(0);
    let result: std::result::Result<(), _> = with_retry_transient(&strategy, || {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Timeout)
    });
    assert_eq!(result, Err(FetchError::Timeout));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(strategy.total_budget(), Duration::from_millis(2));
}
