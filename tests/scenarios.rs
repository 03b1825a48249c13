//! End-to-end floor scenarios through the public API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use floor_timeline::error::PersistenceError;
use floor_timeline::grid::{resolve_drag_delta, GridCell};
use floor_timeline::models::{ReservationId, MS_PER_MINUTE};
use floor_timeline::mutation::PersistenceClient;
use floor_timeline::reassign::ReassignBatch;
use floor_timeline::timeline::TurnFilter;
use floor_timeline::validation::ValidationErrorKind;
use floor_timeline::{FloorTimeline, Reservation, ReservationPatch, TimelineConfig, TimelineError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn service_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

/// Epoch ms of `hh:mm` on the service date.
fn at(hour: u32, minute: u32) -> i64 {
    service_date()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis()
}

fn booking(id: &str, table: &str, from: (u32, u32), to: (u32, u32)) -> Reservation {
    Reservation::new(id, at(from.0, from.1))
        .with_table(table)
        .with_end(at(to.0, to.1))
}

#[derive(Default)]
struct Backend {
    saves: Mutex<Vec<(String, ReservationPatch)>>,
}

#[async_trait]
impl PersistenceClient for Backend {
    async fn save(
        &self,
        id: &str,
        patch: &ReservationPatch,
    ) -> Result<Option<ReservationId>, PersistenceError> {
        self.saves.lock().push((id.to_string(), patch.clone()));
        Ok(None)
    }

    async fn delete(&self, _id: &str) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Holds each save until released, then reports the backend offline.
struct GatedBackend {
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

#[async_trait]
impl PersistenceClient for GatedBackend {
    async fn save(
        &self,
        _id: &str,
        _patch: &ReservationPatch,
    ) -> Result<Option<ReservationId>, PersistenceError> {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Err(PersistenceError::Offline)
    }

    async fn delete(&self, _id: &str) -> Result<(), PersistenceError> {
        Err(PersistenceError::Offline)
    }
}

#[test]
fn test_overlapping_bookings_conflict_and_stack() {
    init_tracing();
    let timeline = FloorTimeline::new(TimelineConfig::default());
    timeline.replace_reservations(vec![
        booking("A", "12", (18, 0), (19, 30)),
        booking("B", "12", (18, 45), (20, 0)),
    ]);

    let view = timeline.view(at(17, 0));
    let pairs = view.conflicts.for_table("12");
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].is_between("A", "B"));
    assert!(pairs[0].is_between("B", "A"));

    assert_eq!(view.stacking.lane("12", "A"), Some(0));
    assert_eq!(view.stacking.lane("12", "B"), Some(1));
    assert_eq!(view.stacking.stack_count("12"), 2);
    assert_eq!(view.rotation.rotation("12", "A"), view.rotation.rotation("12", "B"));

    let grid = timeline.config().time_grid(
        service_date(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
    );
    let placement = grid.placement(at(18, 0), at(19, 30)).unwrap();
    assert_eq!(placement.first_column, 12);
    assert_eq!(placement.span, 18);
}

#[test]
fn test_touching_bookings_are_sequential_turns() {
    init_tracing();
    let timeline = FloorTimeline::new(TimelineConfig::default());
    timeline.replace_reservations(vec![
        booking("C", "5", (17, 0), (18, 0)),
        booking("D", "5", (18, 0), (19, 0)),
    ]);

    let view = timeline.view(at(18, 30));
    assert!(view.conflicts.for_table("5").is_empty());
    assert_eq!(view.rotation.rotation("5", "C"), Some(1));
    assert_eq!(view.rotation.rotation("5", "D"), Some(2));
    assert_eq!(view.stacking.stack_count("5"), 1);

    assert!(view.rotation.is_visible("D", TurnFilter::Turn(2)));
    assert!(!view.rotation.is_visible("C", TurnFilter::Turn(2)));
    assert!(view.occupied_tables.contains("5"));
    assert_eq!(view.overdue, vec!["C".to_string()]);
}

#[tokio::test]
async fn test_shared_primary_table_rejects_batch() {
    init_tracing();
    let timeline = FloorTimeline::new(TimelineConfig::default());
    let x = booking("X", "3", (19, 0), (20, 0));
    let y = booking("Y", "7", (21, 0), (22, 0));
    timeline.replace_reservations(vec![x.clone(), y.clone()]);
    let backend = Backend::default();

    let mut batch = ReassignBatch::new();
    batch.open(&x).select(["3", "4"]).unwrap();
    batch.open(&y).select(["3"]).unwrap();

    let err = timeline
        .commit_reassignments(&mut batch, &backend)
        .await
        .unwrap_err();
    let TimelineError::Validation(validation) = err else {
        panic!("expected a validation error, got {err}");
    };
    assert_eq!(
        validation.kind,
        ValidationErrorKind::DuplicatePrimaryTable("3".into())
    );

    assert!(backend.saves.lock().is_empty());
    assert_eq!(timeline.coordinator().pending_count(), 0);
    let view = timeline.view(at(18, 0));
    assert_eq!(view.reservation("X").unwrap().tables, vec!["3".to_string()]);
    assert_eq!(view.reservation("Y").unwrap().tables, vec!["7".to_string()]);

    // Fixing the second session lets the batch through.
    batch.session_mut("Y").unwrap().select(["8"]).unwrap();
    let report = timeline
        .commit_reassignments(&mut batch, &backend)
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(backend.saves.lock().len(), 2);
    let view = timeline.view(at(18, 0));
    assert_eq!(
        view.reservation("X").unwrap().tables,
        vec!["3".to_string(), "4".to_string()]
    );
    assert_eq!(view.reservation("Y").unwrap().tables, vec!["8".to_string()]);
}

#[tokio::test]
async fn test_rejected_drag_reverts() {
    init_tracing();
    let timeline = FloorTimeline::new(TimelineConfig::default());
    let z = booking("Z", "9", (19, 0), (20, 0));
    timeline.replace_reservations(vec![z.clone()]);

    let delta = resolve_drag_delta(GridCell { row: 0 }, (81.0, 3.0), 20.0, &[40.0]);
    assert_eq!(delta.delta_columns, 4);
    assert_eq!(delta.delta_rows, 0);

    let (answer, gate) = oneshot::channel();
    let backend = GatedBackend {
        gate: Mutex::new(Some(gate)),
    };
    let moved = z.start_ms + 20 * MS_PER_MINUTE;
    let patch = ReservationPatch::new().start_ms(moved);
    let before = timeline.view(at(18, 0));

    let mut mutation = std::pin::pin!(timeline.run_mutation(&backend, "Z", &patch, &patch));
    assert!(futures::poll!(mutation.as_mut()).is_pending());
    assert_eq!(
        timeline.view(at(18, 0)).reservation("Z").unwrap().start_ms,
        moved
    );

    answer.send(()).unwrap();
    let result = mutation.await;
    assert!(matches!(
        result,
        Err(TimelineError::Persistence {
            source: PersistenceError::Offline,
            ..
        })
    ));

    let after = timeline.view(at(18, 0));
    assert_eq!(after.reservation("Z").unwrap().start_ms, z.start_ms);
    assert_eq!(before.reservation("Z"), after.reservation("Z"));
    assert_eq!(timeline.coordinator().pending_count(), 0);
}

#[tokio::test]
async fn test_partial_push_keeps_in_flight_move() {
    init_tracing();
    let timeline = FloorTimeline::new(TimelineConfig::default());
    let z = booking("Z", "9", (19, 0), (20, 0));
    timeline.replace_reservations(vec![z.clone()]);

    let (answer, gate) = oneshot::channel();
    let backend = GatedBackend {
        gate: Mutex::new(Some(gate)),
    };
    let moved = at(19, 20);
    let patch = ReservationPatch::new().start_ms(moved);

    let mut mutation = std::pin::pin!(timeline.run_mutation(&backend, "Z", &patch, &patch));
    assert!(futures::poll!(mutation.as_mut()).is_pending());

    // The feed briefly drops the booking, then sends it back unchanged.
    let report = timeline.replace_reservations(Vec::new());
    assert!(report.orphaned.is_empty());
    timeline.replace_reservations(vec![z.clone()]);
    assert_eq!(
        timeline.view(at(18, 0)).reservation("Z").unwrap().start_ms,
        moved
    );

    answer.send(()).unwrap();
    assert!(mutation.await.is_err());
    assert_eq!(
        timeline.view(at(18, 0)).reservation("Z").unwrap().start_ms,
        z.start_ms
    );
    assert_eq!(timeline.coordinator().pending_count(), 0);
}

#[tokio::test]
async fn test_confirmed_move_reconciles_once() {
    init_tracing();
    let timeline = FloorTimeline::new(TimelineConfig::default());
    let z = booking("Z", "9", (19, 0), (20, 0));
    timeline.replace_reservations(vec![z.clone()]);
    let backend = Backend::default();

    let delta = resolve_drag_delta(GridCell { row: 0 }, (80.0, 0.0), 20.0, &[40.0]);
    timeline
        .move_reservation(&backend, "Z", delta, &["9".to_string()])
        .await
        .unwrap();
    assert_eq!(
        timeline.view(at(18, 0)).reservation("Z").unwrap().start_ms,
        at(19, 20)
    );

    let echoed = booking("Z", "9", (19, 20), (20, 20));
    let first = timeline.replace_reservations(vec![echoed.clone()]);
    assert_eq!(first.confirmed, vec!["Z".to_string()]);

    let revision = timeline.coordinator().revision();
    let second = timeline.replace_reservations(vec![echoed]);
    assert!(second.is_empty());
    assert_eq!(timeline.coordinator().revision(), revision);
}

#[test]
fn test_feed_records_normalized() {
    init_tracing();
    let timeline = FloorTimeline::new(TimelineConfig::default())
        .with_course_durations(Arc::new(|course: &str| (course == "tasting").then_some(150_i64)));
    let records = floor_timeline::source::parse_snapshot(&format!(
        r#"[
            {{"id": "T", "start": {}, "table": 2, "courseName": "tasting"}},
            {{"id": "U", "startMs": {}, "tables": [2], "durationMin": -10}},
            {{"id": "V", "startMs": null, "tables": ["4"]}}
        ]"#,
        at(18, 0),
        at(21, 0)
    ))
    .unwrap();

    let report = timeline.ingest(&records);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.excluded.len(), 1);

    let view = timeline.view(at(17, 0));
    let t = view.index.intervals("2");
    assert_eq!(t.len(), 2);
    assert_eq!(t[0].end_ms, at(20, 30));
    // Non-positive durations fall back to the minimum.
    assert_eq!(t[1].end_ms, at(21, 5));
    assert!(view.conflicts.is_empty());
}
