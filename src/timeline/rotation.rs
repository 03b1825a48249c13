//! Turn (rotation) numbering.
//!
//! # Algorithm
//! Per table, walk intervals sorted by `(start, end)` tracking the end of
//! the current wave. A reservation starting at or after that end opens a
//! new wave; anything else joins the current wave and may extend it.
//! Overlapping reservations, directly or through a chain, therefore share
//! a turn number.
//!
//! A reservation on several tables takes the maximum turn across them, so
//! a turn filter never shows it on one table and hides it on another.
//!
//! Numbers are emitted uncapped; [`display_rotation`] applies a display cap.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::{Interval, IntervalIndex};
use crate::models::{ReservationId, TableId};

/// Turn numbers per table and per reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationIndex {
    /// Raw per-table turn numbers.
    per_table: BTreeMap<TableId, HashMap<ReservationId, u32>>,
    /// Maximum across the reservation's tables.
    per_reservation: HashMap<ReservationId, u32>,
    max_rotation: u32,
}

/// Presentation filter on turn numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnFilter {
    #[default]
    All,
    Turn(u32),
}

/// Computes turn numbers on every table of the index.
pub fn compute_rotations(index: &IntervalIndex) -> RotationIndex {
    let mut per_table = BTreeMap::new();
    let mut per_reservation: HashMap<ReservationId, u32> = HashMap::new();

    for (table, intervals) in index.iter() {
        let turns = rotate_table(intervals);
        for (id, &turn) in &turns {
            let slot = per_reservation.entry(id.clone()).or_insert(turn);
            *slot = (*slot).max(turn);
        }
        per_table.insert(table.clone(), turns);
    }

    let max_rotation = per_reservation.values().copied().max().unwrap_or(0);
    RotationIndex {
        per_table,
        per_reservation,
        max_rotation,
    }
}

fn rotate_table(intervals: &[Interval]) -> HashMap<ReservationId, u32> {
    let mut turns = HashMap::with_capacity(intervals.len());
    let mut current_rotation = 1;
    let mut current_end: Option<i64> = None;

    for iv in intervals {
        match current_end {
            None => current_end = Some(iv.end_ms),
            Some(end) if iv.start_ms >= end => {
                current_rotation += 1;
                current_end = Some(iv.end_ms);
            }
            Some(end) => current_end = Some(end.max(iv.end_ms)),
        }
        turns.insert(iv.reservation_id.clone(), current_rotation);
    }

    turns
}

impl RotationIndex {
    /// Effective turn of `id` on `table`: the maximum across all of the
    /// reservation's tables. `None` if `id` is not on `table`.
    pub fn rotation(&self, table: &str, id: &str) -> Option<u32> {
        self.per_table.get(table)?.get(id)?;
        self.per_reservation.get(id).copied()
    }

    /// Turn of `id` computed on `table` alone.
    pub fn table_rotation(&self, table: &str, id: &str) -> Option<u32> {
        self.per_table.get(table)?.get(id).copied()
    }

    /// Effective turn of a reservation.
    pub fn for_reservation(&self, id: &str) -> Option<u32> {
        self.per_reservation.get(id).copied()
    }

    /// Highest turn number on any table (0 when empty).
    pub fn max_rotation(&self) -> u32 {
        self.max_rotation
    }

    /// Reservations whose effective turn is `turn`, sorted.
    pub fn in_turn(&self, turn: u32) -> BTreeSet<&str> {
        self.per_reservation
            .iter()
            .filter(|(_, t)| **t == turn)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Whether `id` passes `filter`.
    pub fn is_visible(&self, id: &str, filter: TurnFilter) -> bool {
        match filter {
            TurnFilter::All => true,
            TurnFilter::Turn(turn) => self.for_reservation(id) == Some(turn),
        }
    }
}

/// Clamps a turn number to `cap` for display. `None` leaves it unchanged.
pub fn display_rotation(rotation: u32, cap: Option<u32>) -> u32 {
    match cap {
        Some(cap) => rotation.min(cap.max(1)),
        None => rotation,
    }
}
