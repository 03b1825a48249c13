//! Floor timeline facade.
//!
//! [`FloorTimeline`] owns the authoritative snapshot and the optimistic
//! [`MutationCoordinator`], and memoizes the [`DerivedGridView`] so that
//! repeated reads with unchanged inputs reuse the last derivation.
//!
//! # Example
//! ```
//! use floor_timeline::{FloorTimeline, Reservation, TimelineConfig};
//!
//! let timeline = FloorTimeline::new(TimelineConfig::default());
//! timeline.replace_reservations(vec![
//!     Reservation::new("A", 0).with_table("12").with_duration_min(90),
//!     Reservation::new("B", 45 * 60_000).with_table("12").with_duration_min(75),
//! ]);
//!
//! let view = timeline.view(0);
//! assert!(view.conflicts.is_conflicting("12", "A", "B"));
//! assert_eq!(view.stacking.stack_count("12"), 2);
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::TimelineConfig;
use crate::error::{NormalizeError, Result, TimelineError};
use crate::grid::{move_patch, resize_patch, DragDelta};
use crate::models::{
    CourseDurationResolver, DurationPolicy, Reservation, ReservationId, ReservationPatch, TableId,
};
use crate::mutation::{MutationCoordinator, PersistenceClient, ReconcileReport};
use crate::reassign::{CommitReport, ReassignBatch};
use crate::source::{normalize_snapshot, RawReservation, ReservationSource};
use crate::timeline::{compute_view, display_rotation, DerivedGridView};
use crate::validation::validate_reservations;

/// Result of ingesting one feed push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Records accepted onto the timeline.
    pub accepted: usize,
    /// Records that could not be normalized.
    pub excluded: Vec<NormalizeError>,
    /// Pending patches dropped by reconciliation.
    pub reconciled: ReconcileReport,
}

#[derive(Debug, Default)]
struct Authoritative {
    reservations: Arc<Vec<Reservation>>,
    revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ViewKey {
    snapshot: u64,
    pending: u64,
    now_ms: i64,
}

#[derive(Debug)]
struct CachedView {
    key: ViewKey,
    view: Arc<DerivedGridView>,
}

/// Authoritative reservations, pending mutations and the memoized view.
#[derive(Debug)]
pub struct FloorTimeline {
    config: TimelineConfig,
    policy: DurationPolicy,
    coordinator: MutationCoordinator,
    authoritative: RwLock<Authoritative>,
    cache: Mutex<Option<CachedView>>,
}

impl FloorTimeline {
    pub fn new(config: TimelineConfig) -> Self {
        let policy = config.duration_policy();
        Self {
            config,
            policy,
            coordinator: MutationCoordinator::new(),
            authoritative: RwLock::new(Authoritative::default()),
            cache: Mutex::new(None),
        }
    }

    /// Resolves course default durations through `resolver`.
    pub fn with_course_durations(mut self, resolver: Arc<dyn CourseDurationResolver>) -> Self {
        self.policy = self.policy.with_resolver(resolver);
        self
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn policy(&self) -> &DurationPolicy {
        &self.policy
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    /// Normalizes a feed push and installs it as the authoritative snapshot.
    pub fn ingest(&self, records: &[RawReservation]) -> IngestReport {
        let normalized = normalize_snapshot(records);
        let accepted = normalized.reservations.len();
        let reconciled = self.replace_reservations(normalized.reservations);
        IngestReport {
            accepted,
            excluded: normalized.excluded,
            reconciled,
        }
    }

    /// Installs canonical records as the authoritative snapshot and drops
    /// every pending patch they confirm.
    pub fn replace_reservations(&self, reservations: Vec<Reservation>) -> ReconcileReport {
        if let Err(errors) = validate_reservations(&reservations) {
            for err in &errors {
                tracing::warn!(kind = ?err.kind, "{}", err.message);
            }
        }

        let reservations = Arc::new(reservations);
        let revision = {
            let mut state = self.authoritative.write();
            state.reservations = Arc::clone(&reservations);
            state.revision += 1;
            state.revision
        };
        let reconciled = self.coordinator.reconcile(&reservations);

        tracing::debug!(
            revision,
            reservations = reservations.len(),
            pending = self.coordinator.pending_count(),
            "authoritative snapshot installed"
        );
        reconciled
    }

    /// Current authoritative records.
    pub fn reservations(&self) -> Arc<Vec<Reservation>> {
        Arc::clone(&self.authoritative.read().reservations)
    }

    /// Number of snapshots installed so far.
    pub fn snapshot_revision(&self) -> u64 {
        self.authoritative.read().revision
    }

    /// Authoritative record with its pending patch applied.
    pub fn effective_reservation(&self, id: &str) -> Result<Reservation> {
        let reservations = self.reservations();
        let base = reservations
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| TimelineError::ReservationNotFound(id.to_string()))?;
        Ok(match self.coordinator.pending_patch(id) {
            Some(patch) => patch.apply(base),
            None => base.clone(),
        })
    }

    /// Derived view at `now_ms`, recomputed only when an input changed.
    pub fn view(&self, now_ms: i64) -> Arc<DerivedGridView> {
        let (reservations, snapshot) = {
            let state = self.authoritative.read();
            (Arc::clone(&state.reservations), state.revision)
        };
        // Read before the overlay: a racing mutation leaves a stale key, never a stale view.
        let key = ViewKey {
            snapshot,
            pending: self.coordinator.revision(),
            now_ms,
        };

        if let Some(cached) = self.cache.lock().as_ref().filter(|c| c.key == key) {
            return Arc::clone(&cached.view);
        }

        let pending = self.coordinator.pending();
        let view = Arc::new(compute_view(&reservations, &pending, now_ms, &self.policy));
        *self.cache.lock() = Some(CachedView {
            key,
            view: Arc::clone(&view),
        });
        view
    }

    /// Turn number as shown to staff, clamped to the configured cap.
    pub fn turn_label(&self, rotation: u32) -> u32 {
        display_rotation(rotation, self.config.rotation_display_cap)
    }

    /// Applies `optimistic` immediately and persists `persist`.
    pub async fn run_mutation<P>(
        &self,
        client: &P,
        id: &str,
        persist: &ReservationPatch,
        optimistic: &ReservationPatch,
    ) -> Result<Option<ReservationId>>
    where
        P: PersistenceClient + ?Sized,
    {
        self.effective_reservation(id)?;
        self.coordinator
            .run_mutation(client, id, persist, optimistic)
            .await
    }

    /// Moves a reservation by a resolved drag delta.
    ///
    /// `row_tables` lists the table of each grid row, top to bottom.
    pub async fn move_reservation<P>(
        &self,
        client: &P,
        id: &str,
        delta: DragDelta,
        row_tables: &[TableId],
    ) -> Result<Option<ReservationId>>
    where
        P: PersistenceClient + ?Sized,
    {
        let current = self.effective_reservation(id)?;
        let patch = move_patch(&current, delta, self.config.slot_ms(), row_tables);
        if patch.is_empty() {
            return Ok(None);
        }
        self.coordinator
            .run_mutation(client, id, &patch, &patch)
            .await
    }

    /// Moves a reservation's end by `delta_columns` slots.
    pub async fn resize_reservation<P>(
        &self,
        client: &P,
        id: &str,
        delta_columns: i64,
    ) -> Result<Option<ReservationId>>
    where
        P: PersistenceClient + ?Sized,
    {
        let current = self.effective_reservation(id)?;
        let patch = resize_patch(
            &current,
            self.policy.effective_end_ms(&current),
            delta_columns,
            self.config.slot_ms(),
            self.policy.min_duration_ms(),
        );
        if patch.is_empty() {
            return Ok(None);
        }
        self.coordinator
            .run_mutation(client, id, &patch, &patch)
            .await
    }

    /// Hides a reservation immediately and deletes it in the backend.
    pub async fn delete_reservation<P>(&self, client: &P, id: &str) -> Result<()>
    where
        P: PersistenceClient + ?Sized,
    {
        self.effective_reservation(id)?;
        self.coordinator.run_delete(client, id).await
    }

    /// Validates and commits every open session of `batch`.
    pub async fn commit_reassignments<P>(
        &self,
        batch: &mut ReassignBatch,
        client: &P,
    ) -> Result<CommitReport>
    where
        P: PersistenceClient + ?Sized,
    {
        batch.commit(&self.coordinator, client).await
    }

    /// Ingests every push from `source` until its sender goes away.
    pub async fn follow<S>(&self, source: &S)
    where
        S: ReservationSource + ?Sized,
    {
        let mut rx = source.subscribe();
        loop {
            let snapshot = Arc::clone(&rx.borrow_and_update());
            let report = self.ingest(&snapshot);
            tracing::debug!(
                accepted = report.accepted,
                excluded = report.excluded.len(),
                confirmed = report.reconciled.confirmed.len(),
                "reservation feed push applied"
            );
            if rx.changed().await.is_err() {
                break;
            }
        }
        tracing::debug!("reservation feed closed");
    }
}
