//! Derived grid view pipeline.
//!
//! `compute_view(reservations, pending, now)` is the single entry point the
//! presentation layer calls on every input change. It owns no state: the
//! same inputs always produce the same view.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{
    assign_stacks, compute_rotations, conflicts_by_table, Conflicts, IntervalIndex,
    RotationIndex, StackAssignment,
};
use crate::models::{DurationPolicy, Reservation, ReservationId, TableId};
use crate::mutation::PendingPatches;

/// Everything the timeline renders, derived from authoritative records
/// overlaid with pending optimistic patches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedGridView {
    /// Authoritative records ⊕ pending patches, deletions removed.
    pub effective_reservations: Vec<Reservation>,
    pub index: IntervalIndex,
    pub conflicts: Conflicts,
    pub stacking: StackAssignment,
    pub rotation: RotationIndex,
    /// Tables holding a non-departed reservation active at `now_ms`.
    pub occupied_tables: BTreeSet<TableId>,
    /// Reservations whose effective end has passed without departure.
    pub overdue: Vec<ReservationId>,
    pub now_ms: i64,
}

/// Runs the full derivation pipeline.
pub fn compute_view(
    reservations: &[Reservation],
    pending: &PendingPatches,
    now_ms: i64,
    policy: &DurationPolicy,
) -> DerivedGridView {
    let effective_reservations = pending.overlay(reservations);
    let index = IntervalIndex::build(&effective_reservations, policy);
    let conflicts = conflicts_by_table(&index);
    let stacking = assign_stacks(&index);
    let rotation = compute_rotations(&index);

    let mut occupied_tables = BTreeSet::new();
    let mut overdue = Vec::new();
    for r in effective_reservations.iter().filter(|r| r.is_placeable()) {
        if r.status.departed {
            continue;
        }
        let end_ms = policy.effective_end_ms(r);
        if r.start_ms <= now_ms && now_ms < end_ms {
            occupied_tables.extend(r.tables.iter().cloned());
        } else if end_ms <= now_ms {
            overdue.push(r.id.clone());
        }
    }

    tracing::debug!(
        reservations = effective_reservations.len(),
        tables = index.table_count(),
        conflicts = conflicts.total(),
        max_rotation = rotation.max_rotation(),
        "grid view derived"
    );

    DerivedGridView {
        effective_reservations,
        index,
        conflicts,
        stacking,
        rotation,
        occupied_tables,
        overdue,
        now_ms,
    }
}

impl DerivedGridView {
    /// Effective record for `id`.
    pub fn reservation(&self, id: &str) -> Option<&Reservation> {
        self.effective_reservations.iter().find(|r| r.id == id)
    }

    /// Reservations that could not be placed on the grid.
    pub fn excluded(&self) -> &[ReservationId] {
        self.index.skipped()
    }
}
