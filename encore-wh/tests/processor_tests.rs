//! Webhook processor tests
//!
//! Filter, ledger and extraction wired together with a manual clock.

mod helpers;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use encore_common::time::ManualClock;
use encore_wh::models::{ChangeNotification, Operation};
use encore_wh::services::{ProcessingOutcome, SkipReason};
use encore_wh::WebhookError;
use helpers::{processor, release, track, FakeAudio, FakeCms, FakeTrack};
use std::sync::Arc;

const A: &str = "http://x/a.mp3";

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap())
}

fn pending_update(doc_id: &str, tx: &str) -> ChangeNotification {
    ChangeNotification::new(
        Operation::Update,
        tx,
        release(doc_id, vec![track("a", Some(A), None)]),
    )
}

#[tokio::test]
async fn test_update_with_pending_track_is_patched() {
    let audio = FakeAudio::new().with(A, FakeTrack::Seconds(180.0));
    let cms = FakeCms::new();
    let clock = clock();
    let processor = processor(&audio, &cms, &clock);

    let outcome = processor
        .handle(&pending_update("release-1", "tx-1"))
        .await
        .unwrap();

    match outcome {
        ProcessingOutcome::Processed { report } => {
            assert!(report.patched);
            assert_eq!(report.updated[0].seconds, 180);
        }
        other => panic!("expected Processed, got {:?}", other),
    }
    assert_eq!(cms.last_patched_tracks()[0]["derivedDuration"], 180);
}

#[tokio::test]
async fn test_redelivery_after_patch_is_filtered() {
    let audio = FakeAudio::new().with(A, FakeTrack::Seconds(180.0));
    let cms = FakeCms::new();
    let clock = clock();
    let processor = processor(&audio, &cms, &clock);

    processor
        .handle(&pending_update("release-1", "tx-1"))
        .await
        .unwrap();

    // The CMS echoes our own patch back with a new transaction
    clock.advance(ChronoDuration::seconds(5));
    let echoed = ChangeNotification::new(
        Operation::Update,
        "tx-2",
        release("release-1", vec![track("a", Some(A), Some(180))]),
    );
    let outcome = processor.handle(&echoed).await.unwrap();

    assert_eq!(
        outcome,
        ProcessingOutcome::Skipped {
            reason: SkipReason::NothingToDo
        }
    );
    assert_eq!(cms.patches().len(), 1, "no second mutation");
    assert_eq!(audio.fetch_calls(), 1);
}

#[tokio::test]
async fn test_same_transaction_is_duplicate() {
    let audio = FakeAudio::new().with(A, FakeTrack::FetchStatus(404));
    let cms = FakeCms::new();
    let clock = clock();
    let processor = processor(&audio, &cms, &clock);

    let first = processor
        .handle(&pending_update("release-1", "tx-1"))
        .await
        .unwrap();
    assert!(matches!(first, ProcessingOutcome::Processed { .. }));

    clock.advance(ChronoDuration::seconds(10));
    let second = processor
        .handle(&pending_update("release-1", "tx-1"))
        .await
        .unwrap();
    assert_eq!(second, ProcessingOutcome::Duplicate);
    assert_eq!(audio.fetch_calls(), 1);
}

#[tokio::test]
async fn test_duplicate_expires_after_thirty_seconds() {
    let audio = FakeAudio::new().with(A, FakeTrack::FetchStatus(404));
    let cms = FakeCms::new();
    let clock = clock();
    let processor = processor(&audio, &cms, &clock);

    processor
        .handle(&pending_update("release-1", "tx-1"))
        .await
        .unwrap();
    assert_eq!(processor.ledger_entries().await, 1);

    clock.advance(ChronoDuration::seconds(30));
    assert_eq!(processor.ledger_entries().await, 0);

    let again = processor
        .handle(&pending_update("release-1", "tx-1"))
        .await
        .unwrap();
    assert!(matches!(again, ProcessingOutcome::Processed { .. }));
}

#[tokio::test]
async fn test_retry_limit_per_document() {
    // Fetch keeps failing so the track stays pending on every delivery
    let audio = FakeAudio::new().with(A, FakeTrack::FetchStatus(404));
    let cms = FakeCms::new();
    let clock = clock();
    let processor = processor(&audio, &cms, &clock);

    for i in 0..3 {
        let outcome = processor
            .handle(&pending_update("release-1", &format!("tx-{}", i)))
            .await
            .unwrap();
        assert!(matches!(outcome, ProcessingOutcome::Processed { .. }));
        clock.advance(ChronoDuration::seconds(40));
    }

    let fourth = processor
        .handle(&pending_update("release-1", "tx-3"))
        .await
        .unwrap();
    assert_eq!(fourth, ProcessingOutcome::RateLimited { attempts: 3 });
    assert_eq!(audio.fetch_calls(), 3);

    // Another document is unaffected
    let other = processor
        .handle(&pending_update("release-2", "tx-9"))
        .await
        .unwrap();
    assert!(matches!(other, ProcessingOutcome::Processed { .. }));

    // Once the first attempt leaves the five-minute window one more is allowed
    clock.advance(ChronoDuration::seconds(300 - 120));
    let later = processor
        .handle(&pending_update("release-1", "tx-4"))
        .await
        .unwrap();
    assert!(matches!(later, ProcessingOutcome::Processed { .. }));
}

#[tokio::test]
async fn test_filter_rejections() {
    let audio = FakeAudio::new().with(A, FakeTrack::Seconds(1.0));
    let cms = FakeCms::new();
    let clock = clock();
    let processor = processor(&audio, &cms, &clock);

    let draft = ChangeNotification::new(
        Operation::Create,
        "tx-1",
        release("drafts.release-1", vec![track("a", Some(A), None)]),
    );
    let deleted = ChangeNotification::new(
        Operation::Delete,
        "tx-2",
        release("release-1", vec![track("a", Some(A), None)]),
    );
    let mut wrong_source_doc = release("release-2", vec![track("a", Some(A), None)]);
    wrong_source_doc.release_source = Some("distributor".to_string());
    let wrong_source = ChangeNotification::new(Operation::Update, "tx-3", wrong_source_doc);

    for (notification, reason) in [
        (draft, SkipReason::Draft),
        (deleted, SkipReason::Deleted),
        (wrong_source, SkipReason::WrongSource),
    ] {
        let outcome = processor.handle(&notification).await.unwrap();
        assert_eq!(outcome, ProcessingOutcome::Skipped { reason });
    }

    assert_eq!(processor.ledger_entries().await, 0, "skips are not recorded");
    assert_eq!(audio.fetch_calls(), 0);
}

#[tokio::test]
async fn test_create_is_processed_even_when_complete() {
    let audio = FakeAudio::new();
    let cms = FakeCms::new();
    let clock = clock();
    let processor = processor(&audio, &cms, &clock);

    let created = ChangeNotification::new(
        Operation::Create,
        "tx-1",
        release("release-1", vec![track("a", Some(A), Some(200))]),
    );
    match processor.handle(&created).await.unwrap() {
        ProcessingOutcome::Processed { report } => assert!(report.is_noop()),
        other => panic!("expected Processed, got {:?}", other),
    }
    assert!(cms.patches().is_empty());
}

#[tokio::test]
async fn test_patch_failure_surfaces_as_persistence_error() {
    let audio = FakeAudio::new().with(A, FakeTrack::Seconds(180.0));
    let cms = FakeCms::failing();
    let clock = clock();
    let processor = processor(&audio, &cms, &clock);

    let err = processor
        .handle(&pending_update("release-1", "tx-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::Persistence(_)));

    // The attempt stays recorded, so a redelivery of the same transaction is a duplicate
    cms.set_failing(false);
    let retry = processor
        .handle(&pending_update("release-1", "tx-1"))
        .await
        .unwrap();
    assert_eq!(retry, ProcessingOutcome::Duplicate);
}

#[tokio::test]
async fn test_concurrent_redeliveries_process_once() {
    let audio = FakeAudio::new().with(A, FakeTrack::Seconds(180.0));
    let cms = FakeCms::new();
    let clock = clock();
    let processor = Arc::new(processor(&audio, &cms, &clock));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let processor = processor.clone();
            tokio::spawn(async move {
                processor
                    .handle(&pending_update("release-1", "tx-1"))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut processed = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            ProcessingOutcome::Processed { .. } => processed += 1,
            ProcessingOutcome::Duplicate => duplicates += 1,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(processed, 1);
    assert_eq!(duplicates, 3);
    assert_eq!(cms.patches().len(), 1);
}
