//! Display lane assignment for overlapping reservations.
//!
//! # Algorithm
//! Greedy interval-graph colouring ("minimum meeting rooms"). Per table,
//! walk intervals sorted by `(start, end)`, keep an active set of
//! `(lane, end)`, evict entries with `end <= start`, and give the new
//! interval the smallest lane not in use.
//!
//! Interval graphs are perfect, so the number of lanes used equals the
//! maximum number of simultaneously active reservations.
//!
//! # Reference
//! Golumbic (2004), "Algorithmic Graph Theory and Perfect Graphs", Ch. 8

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{Interval, IntervalIndex};
use crate::models::{ReservationId, TableId};

/// Lane layout of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStack {
    /// Reservation → lane (0-based).
    pub lanes: HashMap<ReservationId, usize>,
    /// Maximum simultaneous overlap depth.
    pub depth: usize,
}

/// Lane assignments for every table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackAssignment {
    tables: BTreeMap<TableId, TableStack>,
}

/// Assigns lanes on every table of the index.
pub fn assign_stacks(index: &IntervalIndex) -> StackAssignment {
    let tables = index
        .iter()
        .map(|(table, intervals)| (table.clone(), stack_table(intervals)))
        .collect();
    StackAssignment { tables }
}

fn stack_table(intervals: &[Interval]) -> TableStack {
    let mut stack = TableStack::default();
    // (lane, end_ms)
    let mut active: Vec<(usize, i64)> = Vec::new();

    for iv in intervals {
        active.retain(|&(_, end)| end > iv.start_ms);

        let mut lane = 0;
        while active.iter().any(|&(l, _)| l == lane) {
            lane += 1;
        }

        active.push((lane, iv.end_ms));
        stack.depth = stack.depth.max(active.len());
        stack.lanes.insert(iv.reservation_id.clone(), lane);
    }

    stack
}

impl StackAssignment {
    /// Lane of `id` on `table`.
    pub fn lane(&self, table: &str, id: &str) -> Option<usize> {
        self.tables.get(table)?.lanes.get(id).copied()
    }

    /// Maximum simultaneous overlap on `table` (0 if the table is empty).
    pub fn stack_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |s| s.depth)
    }

    /// Layout of one table.
    pub fn table(&self, table: &str) -> Option<&TableStack> {
        self.tables.get(table)
    }

    /// Largest stack count across all tables.
    pub fn max_stack_count(&self) -> usize {
        self.tables.values().map(|s| s.depth).max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TableId, &TableStack)> {
        self.tables.iter()
    }
}
