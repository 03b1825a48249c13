//! Per-table interval lists.
//!
//! Every placeable reservation contributes one interval to each distinct
//! table it occupies. Lists are sorted by `(start, end, id)` and rebuilt
//! wholesale on every change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{DurationPolicy, Reservation, ReservationId, TableId};

/// A reservation's occupancy of one table: `[start_ms, end_ms)`.
///
/// Half-open: touching intervals (`a.end_ms == b.start_ms`) do not overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub reservation_id: ReservationId,
    /// Inclusive start (ms).
    pub start_ms: i64,
    /// Exclusive end (ms).
    pub end_ms: i64,
}

impl Interval {
    pub fn new(reservation_id: impl Into<ReservationId>, start_ms: i64, end_ms: i64) -> Self {
        Self {
            reservation_id: reservation_id.into(),
            start_ms,
            end_ms,
        }
    }

    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    /// Whether `time_ms` falls inside the interval.
    #[inline]
    pub fn contains(&self, time_ms: i64) -> bool {
        time_ms >= self.start_ms && time_ms < self.end_ms
    }

    /// Whether the interval intersects `[start_ms, end_ms)`.
    #[inline]
    pub fn overlaps_range(&self, start_ms: i64, end_ms: i64) -> bool {
        self.start_ms < end_ms && start_ms < self.end_ms
    }

    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.overlaps_range(other.start_ms, other.end_ms)
    }
}

/// Sorted interval lists keyed by table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalIndex {
    by_table: BTreeMap<TableId, Vec<Interval>>,
    /// Reservations left off the grid (no tables).
    skipped: Vec<ReservationId>,
}

impl IntervalIndex {
    /// Builds the index from effective reservations.
    ///
    /// Reservations without tables are recorded in [`skipped`](Self::skipped)
    /// and not indexed. A table listed twice by one reservation is indexed once.
    pub fn build(reservations: &[Reservation], policy: &DurationPolicy) -> Self {
        let mut by_table: BTreeMap<TableId, Vec<Interval>> = BTreeMap::new();
        let mut skipped = Vec::new();

        for r in reservations {
            if !r.is_placeable() {
                tracing::debug!(reservation_id = %r.id, "reservation has no table, not indexed");
                skipped.push(r.id.clone());
                continue;
            }
            let end_ms = policy.effective_end_ms(r);
            for table in r.distinct_tables() {
                by_table
                    .entry(table.to_string())
                    .or_default()
                    .push(Interval::new(r.id.clone(), r.start_ms, end_ms));
            }
        }

        for list in by_table.values_mut() {
            list.sort_by(|a, b| {
                (a.start_ms, a.end_ms, &a.reservation_id).cmp(&(
                    b.start_ms,
                    b.end_ms,
                    &b.reservation_id,
                ))
            });
        }

        Self { by_table, skipped }
    }

    /// Sorted intervals for a table (empty if unknown).
    pub fn intervals(&self, table: &str) -> &[Interval] {
        self.by_table.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All `(table, intervals)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&TableId, &[Interval])> {
        self.by_table.iter().map(|(t, list)| (t, list.as_slice()))
    }

    /// Tables with at least one interval.
    pub fn tables(&self) -> impl Iterator<Item = &TableId> {
        self.by_table.keys()
    }

    /// Intervals on `table` intersecting `[start_ms, end_ms)`.
    ///
    /// An empty or inverted range intersects nothing. `exclude_id` drops one
    /// reservation from the result, typically the one being moved.
    pub fn overlapping(
        &self,
        table: &str,
        start_ms: i64,
        end_ms: i64,
        exclude_id: Option<&str>,
    ) -> Vec<&Interval> {
        if end_ms <= start_ms {
            return Vec::new();
        }
        let list = self.intervals(table);
        // Sorted by start: nothing at or after `cut` can intersect.
        let cut = list.partition_point(|iv| iv.start_ms < end_ms);
        list[..cut]
            .iter()
            .filter(|iv| iv.end_ms > start_ms)
            .filter(|iv| Some(iv.reservation_id.as_str()) != exclude_id)
            .collect()
    }

    /// Intervals on `table` active at `time_ms`.
    pub fn active_at(&self, table: &str, time_ms: i64) -> Vec<&Interval> {
        self.overlapping(table, time_ms, time_ms.saturating_add(1), None)
    }

    /// Reservations that were not indexed.
    pub fn skipped(&self) -> &[ReservationId] {
        &self.skipped
    }

    pub fn table_count(&self) -> usize {
        self.by_table.len()
    }

    /// Total number of `(table, reservation)` entries.
    pub fn len(&self) -> usize {
        self.by_table.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_table.is_empty()
    }
}
