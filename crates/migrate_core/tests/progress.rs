use migrate_core::{ItemOutcome, ItemStatus, ProgressLedger};

const T0: &str = "2026-01-01T00:00:00Z";
const T1: &str = "2026-01-01T00:01:00Z";

fn ledger_with(items: &[(&str, &str)]) -> ProgressLedger {
    migrate_logging::initialize_for_tests();
    let mut ledger = ProgressLedger::new(T0);
    ledger.set_total(items.len());
    for (id, url) in items {
        ledger.begin(id, url, T0);
    }
    ledger
}

#[test]
fn upload_is_terminal_and_idempotent() {
    let mut ledger = ledger_with(&[("row00000-aaaa", "https://old/a")]);
    ledger.record(
        "row00000-aaaa",
        ItemOutcome::Uploaded {
            new_url: "https://new/a".to_string(),
        },
        T0,
    );
    assert!(ledger.is_done("row00000-aaaa"));

    // A later failure report must not demote an uploaded item.
    ledger.record(
        "row00000-aaaa",
        ItemOutcome::Failed {
            error: "late error".to_string(),
            permanent: false,
        },
        T1,
    );
    let (_, item) = ledger.items().next().unwrap();
    assert_eq!(item.status, ItemStatus::Uploaded);
    assert_eq!(item.new_url.as_deref(), Some("https://new/a"));
    assert_eq!(item.updated_at, T0);
}

#[test]
fn transient_failure_becomes_retryable_on_resume() {
    let mut ledger = ledger_with(&[("row00000-aaaa", "https://old/a")]);
    ledger.record(
        "row00000-aaaa",
        ItemOutcome::Failed {
            error: "timeout".to_string(),
            permanent: false,
        },
        T0,
    );
    assert!(!ledger.is_done("row00000-aaaa"));
    assert!(ledger.is_attempted("row00000-aaaa"));

    let reset = ledger.reset_retryable(T1);
    assert_eq!(reset, 1);
    assert!(!ledger.is_attempted("row00000-aaaa"));
}

#[test]
fn permanent_failure_is_never_retried() {
    let mut ledger = ledger_with(&[("row00000-aaaa", "not-a-url")]);
    ledger.record(
        "row00000-aaaa",
        ItemOutcome::Failed {
            error: "malformed url".to_string(),
            permanent: true,
        },
        T0,
    );
    assert!(ledger.is_done("row00000-aaaa"));
    assert_eq!(ledger.reset_retryable(T1), 0);
    assert!(ledger.is_done("row00000-aaaa"));

    let mappings = ledger.mappings();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].status, "failed");
    assert!(!mappings[0].error.is_empty());
}

#[test]
fn summary_counts_every_terminal_state() {
    let mut ledger = ledger_with(&[
        ("row00000-aaaa", "https://old/a"),
        ("row00001-bbbb", "https://old/b"),
        ("row00002-cccc", "https://old/c"),
        ("row00003-dddd", "https://old/d"),
    ]);
    ledger.record(
        "row00000-aaaa",
        ItemOutcome::Uploaded {
            new_url: "https://new/a".to_string(),
        },
        T0,
    );
    ledger.record(
        "row00001-bbbb",
        ItemOutcome::Failed {
            error: "boom".to_string(),
            permanent: false,
        },
        T0,
    );
    ledger.record(
        "row00002-cccc",
        ItemOutcome::Skipped {
            reason: "no image url".to_string(),
        },
        T0,
    );

    let summary = ledger.summary();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.remaining, 1);
}

#[test]
fn mappings_preserve_input_order_and_skip_pending() {
    let mut ledger = ledger_with(&[
        ("row00001-bbbb", "https://old/b"),
        ("row00000-aaaa", "https://old/a"),
        ("row00002-cccc", "https://old/c"),
    ]);
    ledger.record(
        "row00002-cccc",
        ItemOutcome::Uploaded {
            new_url: "https://new/c".to_string(),
        },
        T0,
    );
    ledger.record(
        "row00000-aaaa",
        ItemOutcome::Uploaded {
            new_url: "https://new/a".to_string(),
        },
        T0,
    );

    let mappings = ledger.mappings();
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0].old_url, "https://old/a");
    assert_eq!(mappings[1].old_url, "https://old/c");

    let successes = ledger.successful_mappings();
    assert_eq!(successes.get("https://old/a").unwrap(), "https://new/a");
}

#[test]
fn begin_does_not_clobber_existing_state() {
    let mut ledger = ledger_with(&[("row00000-aaaa", "https://old/a")]);
    ledger.record(
        "row00000-aaaa",
        ItemOutcome::Uploaded {
            new_url: "https://new/a".to_string(),
        },
        T0,
    );
    // A resume run calls begin() for every row again.
    ledger.begin("row00000-aaaa", "https://old/a", T1);
    assert!(ledger.is_done("row00000-aaaa"));
}
