//! Table-sharing conflict detection.
//!
//! # Algorithm
//! Per table, sweep intervals in start order with an active set. Entries
//! ending at or before the current start are evicted; the current interval
//! then conflicts with everything still active.
//!
//! # Complexity
//! O(k²) per table in the worst case, where k is the number of bookings on
//! the table. Concurrent bookings per table are few.
//!
//! A multi-table reservation is evaluated independently on each table.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Interval, IntervalIndex};
use crate::models::{ReservationId, TableId};

/// Two reservations overlapping on one table. `a` starts no later than `b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConflictPair {
    pub a: ReservationId,
    pub b: ReservationId,
}

impl ConflictPair {
    /// Whether this pair is `{x, y}` in either order.
    pub fn is_between(&self, x: &str, y: &str) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    pub fn involves(&self, id: &str) -> bool {
        self.a == id || self.b == id
    }
}

/// Conflicts grouped by table. Tables without conflicts are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflicts {
    by_table: BTreeMap<TableId, Vec<ConflictPair>>,
}

/// Finds overlapping reservation pairs on every table.
pub fn conflicts_by_table(index: &IntervalIndex) -> Conflicts {
    let mut by_table = BTreeMap::new();
    for (table, intervals) in index.iter() {
        let pairs = sweep_table(intervals);
        if !pairs.is_empty() {
            by_table.insert(table.clone(), pairs);
        }
    }
    let conflicts = Conflicts { by_table };
    if !conflicts.is_empty() {
        tracing::debug!(
            tables = conflicts.by_table.len(),
            pairs = conflicts.total(),
            "table conflicts detected"
        );
    }
    conflicts
}

fn sweep_table(intervals: &[Interval]) -> Vec<ConflictPair> {
    let mut pairs = Vec::new();
    let mut active: Vec<&Interval> = Vec::new();

    for current in intervals {
        active.retain(|iv| iv.end_ms > current.start_ms);
        for other in &active {
            if other.reservation_id != current.reservation_id {
                pairs.push(ConflictPair {
                    a: other.reservation_id.clone(),
                    b: current.reservation_id.clone(),
                });
            }
        }
        active.push(current);
    }

    pairs
}

impl Conflicts {
    /// Conflict pairs on a table.
    pub fn for_table(&self, table: &str) -> &[ConflictPair] {
        self.by_table.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `x` and `y` overlap on `table`. Symmetric.
    pub fn is_conflicting(&self, table: &str, x: &str, y: &str) -> bool {
        self.for_table(table).iter().any(|p| p.is_between(x, y))
    }

    /// Tables on which `id` conflicts with someone.
    pub fn tables_for(&self, id: &str) -> Vec<&TableId> {
        self.by_table
            .iter()
            .filter(|(_, pairs)| pairs.iter().any(|p| p.involves(id)))
            .map(|(t, _)| t)
            .collect()
    }

    /// Every reservation involved in at least one conflict.
    pub fn conflicting_ids(&self) -> BTreeSet<&str> {
        self.by_table
            .values()
            .flatten()
            .flat_map(|p| [p.a.as_str(), p.b.as_str()])
            .collect()
    }

    /// All `(table, pairs)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (&TableId, &[ConflictPair])> {
        self.by_table.iter().map(|(t, p)| (t, p.as_slice()))
    }

    /// Total pair count across tables.
    pub fn total(&self) -> usize {
        self.by_table.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_table.is_empty()
    }
}
