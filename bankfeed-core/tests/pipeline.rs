mod common;

use bankfeed_core::{ChatError, IngestOutcome, LedgerError, MARKER};
use bankfeed_ingest::ParseError;
use chrono::NaiveDate;
use common::{FakeChannel, FakeLedger, ACCOUNT, VALID};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_valid_notification_reaches_ledger() {
    let channel = FakeChannel::new("bank-notifications");
    let id = channel.post(VALID);
    let ledger = FakeLedger::new();
    let pipeline = common::pipeline(ledger.clone());

    let outcome = pipeline.ingest(&channel.message(id)).await;

    let receipt = match outcome {
        IngestOutcome::Ingested(receipt) => receipt,
        other => panic!("expected Ingested, got {other:?}"),
    };
    assert_eq!(receipt.amount_minor, 9045);

    let saved = ledger.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].date, NaiveDate::from_ymd_opt(2024, 9, 23).unwrap());
    assert_eq!(saved[0].amount, Decimal::new(9045, 2));
    assert_eq!(saved[0].account, ACCOUNT);
    assert_eq!(saved[0].imported_payee, "TEST. Bank Pekao S.A.");
}

#[tokio::test]
async fn test_parse_error_skips_ledger() {
    let channel = FakeChannel::new("bank-notifications");
    let id = channel.post("Invalid message format");
    let ledger = FakeLedger::new();
    let pipeline = common::pipeline(ledger.clone());

    let outcome = pipeline.ingest(&channel.message(id)).await;

    assert!(matches!(outcome, IngestOutcome::Rejected(ParseError::Layout { lines: 1, .. })));
    assert!(!pipeline.ingest_ok(&channel.message(id)).await);
    assert_eq!(ledger.calls(), 0);
}

#[tokio::test]
async fn test_ledger_failure_is_contained() {
    let channel = FakeChannel::new("bank-notifications");
    let id = channel.post(VALID);
    let pipeline = common::pipeline(FakeLedger::failing());

    let outcome = pipeline.ingest(&channel.message(id)).await;

    assert!(matches!(outcome, IngestOutcome::LedgerFailed(LedgerError::Request(_))));
    assert!(!outcome.is_ingested());
}

#[tokio::test]
async fn test_pipeline_never_marks() {
    let channel = FakeChannel::new("bank-notifications");
    let id = channel.post(VALID);
    let pipeline = common::pipeline(FakeLedger::new());

    assert!(pipeline.ingest_ok(&channel.message(id)).await);
    assert!(channel.reactions_of(id).is_empty());
}

#[tokio::test]
async fn test_handler_marks_only_on_success() {
    let channel = FakeChannel::new("bank-notifications");
    let good = channel.post(VALID);
    let junk = channel.post("hello there");

    let handler = common::handler(FakeLedger::new());
    assert!(handler.handle(&channel.message(good)).await.unwrap().is_ingested());
    assert!(!handler.handle(&channel.message(junk)).await.unwrap().is_ingested());

    assert_eq!(channel.reactions_of(good).len(), 1);
    assert_eq!(channel.reactions_of(good)[0].emoji, MARKER);
    assert!(channel.reactions_of(junk).is_empty());
}

#[tokio::test]
async fn test_handler_leaves_unmarked_on_ledger_failure() {
    let channel = FakeChannel::new("bank-notifications");
    let id = channel.post(VALID);

    let handler = common::handler(FakeLedger::failing());
    let handled = handler.handle(&channel.message(id)).await.unwrap();

    assert!(!handled.is_ingested());
    assert!(channel.marked().is_empty());
}

#[tokio::test]
async fn test_marker_failure_is_returned_after_ledger_write() {
    let channel = FakeChannel::new("bank-notifications");
    let id = channel.post(VALID);
    channel.deny_reactions();

    let ledger = FakeLedger::new();
    let handler = common::handler(ledger.clone());
    let err = handler.handle(&channel.message(id)).await.unwrap_err();

    assert!(matches!(err, ChatError::Status { status: 403, .. }), "{err:?}");
    assert_eq!(ledger.calls(), 1);
    assert!(channel.marked().is_empty());
}
