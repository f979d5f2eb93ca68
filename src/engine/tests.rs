use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use crate::calendar::ValidationError;
use crate::config::Config;
use crate::engine::{Engine, EngineError, Period};
use crate::model::{ProposalStrategy, ReserveOutcome, ResourceId, Slot, Status};
use crate::store::Store;

fn monday_at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 2)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn engine_in(dir: &TempDir) -> Engine {
    let mut cfg = Config::default();
    cfg.data_dir = dir.path().to_path_buf();
    Engine::new(Arc::new(Store::open(cfg).unwrap()))
}

fn slot(start: NaiveDateTime, minutes: i64) -> Slot {
    Slot::new(start, start + Duration::minutes(minutes))
}

fn room(n: u8) -> ResourceId {
    format!("room{n}").parse().unwrap()
}

#[tokio::test]
async fn free_slot_commits_immediately() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    let outcome = engine
        .propose(room(1), slot(monday_at(10, 0), 60), Some("alice"), None, now)
        .await
        .unwrap();

    let reservation = match outcome {
        ReserveOutcome::Confirmed(r) => r,
        other => panic!("expected confirmation, got {other:?}"),
    };
    assert_eq!(reservation.resource, room(1));
    assert_eq!(reservation.owner.as_deref(), Some("alice"));
    assert_eq!(engine.store().snapshot().await.len(), 1);
}

#[tokio::test]
async fn conflicting_proposal_reports_without_committing() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    engine
        .propose(room(1), slot(monday_at(10, 0), 60), None, None, now)
        .await
        .unwrap();

    let outcome = engine
        .propose(room(1), slot(monday_at(10, 30), 60), None, None, now)
        .await
        .unwrap();

    match outcome {
        ReserveOutcome::Conflict { existing, alternatives } => {
            assert_eq!(existing.len(), 1);
            assert!(!alternatives.is_empty());
            assert!(alternatives.len() <= 3);
            for alt in &alternatives {
                assert_eq!(alt.resource.group, room(1).group);
                assert_eq!(alt.slot.duration_minutes(), 60);
            }
            // Another free room at the same time ranks first.
            assert_eq!(alternatives[0].strategy, ProposalStrategy::OtherResourceSameTime);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(engine.store().snapshot().await.len(), 1);
}

#[tokio::test]
async fn text_round_trip_reserves() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    let outcome = engine
        .propose_from_text("reserve room3 2025-06-03 10:07~11:01", Some("bob"), now)
        .await
        .unwrap();

    let reservation = match outcome {
        ReserveOutcome::Confirmed(r) => r,
        other => panic!("expected confirmation, got {other:?}"),
    };
    assert_eq!(reservation.resource, room(3));
    // Raw times snap to the grid before validation.
    assert_eq!(reservation.slot.start, monday_at(10, 0) + Duration::days(1));
    assert_eq!(reservation.slot.duration_minutes(), 70);
    assert_eq!(
        reservation.request_text.as_deref(),
        Some("reserve room3 2025-06-03 10:07~11:01")
    );
}

#[tokio::test]
async fn unresolvable_hint_is_unknown_resource() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    let err = engine
        .propose_from_text("reserve whiteboard 2025-06-03 10:00~11:00", None, now)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownResource(_)));

    let err = engine
        .propose_from_text("room1 10:00~11:00", None, now)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
}

#[tokio::test]
async fn committed_option_is_revalidated() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    engine
        .propose(room(1), slot(monday_at(10, 0), 60), None, None, now)
        .await
        .unwrap();
    let outcome = engine
        .propose(room(1), slot(monday_at(10, 0), 60), None, None, now)
        .await
        .unwrap();
    let alternatives = match outcome {
        ReserveOutcome::Conflict { alternatives, .. } => alternatives,
        other => panic!("expected conflict, got {other:?}"),
    };
    let first = alternatives[0];

    let committed = engine
        .commit_option(&first, Some("carol"), None, now)
        .await
        .unwrap();
    assert_eq!(committed.resource, first.resource);
    assert_eq!(committed.slot, first.slot);

    // The same option cannot be committed twice.
    let err = engine.commit_option(&first, None, None, now).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }));
}

#[tokio::test]
async fn update_moves_and_conflicts_like_a_fresh_commit() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    let first = match engine
        .propose(room(1), slot(monday_at(10, 0), 60), None, None, now)
        .await
        .unwrap()
    {
        ReserveOutcome::Confirmed(r) => r,
        other => panic!("{other:?}"),
    };
    engine
        .propose(room(2), slot(monday_at(14, 0), 60), None, None, now)
        .await
        .unwrap();

    let moved = engine
        .update_reservation(first.id, Some(room(2)), slot(monday_at(11, 0), 60), now)
        .await
        .unwrap();
    assert_eq!(moved.resource, room(2));
    assert_eq!(moved.slot.start, monday_at(11, 0));

    // Moving onto the other room2 record conflicts with alternatives.
    let err = engine
        .update_reservation(moved.id, None, slot(monday_at(14, 0), 60), now)
        .await
        .unwrap_err();
    match err {
        EngineError::Conflict { existing, alternatives } => {
            assert_eq!(existing.len(), 1);
            assert!(!alternatives.is_empty());
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_closes_the_record() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    let reservation = match engine
        .propose(room(4), slot(monday_at(10, 0), 60), None, None, now)
        .await
        .unwrap()
    {
        ReserveOutcome::Confirmed(r) => r,
        other => panic!("{other:?}"),
    };

    let closed = engine.cancel(reservation.id, monday_at(9, 0)).await.unwrap();
    assert_eq!(closed.status, Status::Closed);
    assert!(engine.store().snapshot().await.is_empty());
    assert!(matches!(
        engine.cancel(reservation.id, monday_at(9, 0)).await,
        Err(EngineError::Storage(_))
    ));
}

#[tokio::test]
async fn proposing_sweeps_expired_records_first() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    engine
        .propose(room(1), slot(monday_at(10, 0), 60), None, None, monday_at(8, 0))
        .await
        .unwrap();

    // By noon the 10:00 hold has expired and gets swept before the commit.
    let later = monday_at(12, 0);
    let outcome = engine
        .propose(
            room(1),
            slot(monday_at(14, 0), 60),
            None,
            None,
            later,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, ReserveOutcome::Confirmed(_)));
    assert_eq!(engine.store().closed_snapshot().await.len(), 1);
}

#[tokio::test]
async fn validation_errors_pass_through() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    // Saturday 2025-06-07.
    let saturday = NaiveDate::from_ymd_opt(2025, 6, 7)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let err = engine
        .propose(room(1), slot(saturday, 60), None, None, now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::WeekendOrHoliday)
    ));

    let err = engine
        .propose(room(1), slot(monday_at(7, 0), 60), None, None, now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::OutOfWindow)
    ));
}

#[tokio::test]
async fn day_schedule_tracks_the_clock() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    // Before open: the whole business day.
    let view = engine.schedule(Period::Day, monday_at(7, 0)).await.unwrap();
    assert_eq!(view.window.start, monday_at(8, 0));
    assert_eq!(view.window.end, monday_at(19, 0));
    assert_eq!(view.bookable_minutes, 11 * 60);

    // Mid-day: remainder from the 10-minute floor of now.
    let view = engine.schedule(Period::Day, monday_at(10, 17)).await.unwrap();
    assert_eq!(view.window.start, monday_at(10, 10));
    assert_eq!(view.window.end, monday_at(19, 0));

    // After close: the next business day.
    let view = engine.schedule(Period::Day, monday_at(19, 30)).await.unwrap();
    assert_eq!(view.window.start, monday_at(8, 0) + Duration::days(1));
    assert_eq!(view.window.end, monday_at(19, 0) + Duration::days(1));
}

#[tokio::test]
async fn week_schedule_reports_occupancy_and_blocked_days() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    engine
        .propose(room(1), slot(monday_at(10, 0), 120), Some("alice"), None, now)
        .await
        .unwrap();
    engine
        .propose(room(1), slot(monday_at(14, 0), 60), Some("alice"), None, now)
        .await
        .unwrap();

    let view = engine.schedule(Period::Week, monday_at(9, 0)).await.unwrap();
    // The following Saturday and Sunday fall inside the week window.
    assert_eq!(view.blocked.len(), 2);
    assert_eq!(view.rooms.len(), 10);
    assert_eq!(view.devices.len(), 20);

    // room1 carries two reservations, so it sorts last among the rooms.
    let busiest = view.rooms.last().unwrap();
    assert_eq!(busiest.resource, room(1));
    assert_eq!(busiest.reservations.len(), 2);
    assert_eq!(busiest.reserved_minutes, 180);
    assert!(busiest.occupancy_rate > 0.0);
    assert!(!busiest.occupied_now);

    let view = engine.schedule(Period::Week, monday_at(10, 30)).await.unwrap();
    let busiest = view.rooms.last().unwrap();
    assert!(busiest.occupied_now);
}

#[tokio::test]
async fn my_reservations_filters_and_sorts() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let now = monday_at(8, 0);

    engine
        .propose(room(2), slot(monday_at(14, 0), 60), Some("alice"), None, now)
        .await
        .unwrap();
    engine
        .propose(room(1), slot(monday_at(10, 0), 60), Some("alice"), None, now)
        .await
        .unwrap();
    engine
        .propose(room(3), slot(monday_at(10, 0), 60), Some("bob"), None, now)
        .await
        .unwrap();

    let mine = engine.my_reservations("alice", now).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].resource, room(1));
    assert_eq!(mine[1].resource, room(2));
    assert!(engine.my_reservations("nobody", now).await.unwrap().is_empty());
}
