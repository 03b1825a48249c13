//! Pointer drag resolution.
//!
//! The engine never sees raw pointer events. A drag is reduced to a whole
//! number of columns and rows, which are then turned into reservation
//! patches.

use serde::{Deserialize, Serialize};

use crate::models::{Reservation, ReservationPatch, TableId};

/// The grid cell a drag starts from.
///
/// Horizontal deltas are relative to the pointer, so only the row is
/// carried; it anchors the vertical hit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
}

/// Discrete result of a drag gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragDelta {
    pub delta_columns: i64,
    pub delta_rows: i64,
}

impl DragDelta {
    pub fn is_zero(&self) -> bool {
        self.delta_columns == 0 && self.delta_rows == 0
    }
}

/// Converts a pixel offset into column and row deltas.
///
/// Horizontal movement rounds to the nearest whole slot. Vertical movement
/// follows the pointer from the centre of the starting row into whichever
/// row now contains it; rows may have different heights, and the result is
/// clamped to existing rows. Non-finite or non-positive sizes yield a zero
/// delta on that axis.
pub fn resolve_drag_delta(
    start_cell: GridCell,
    pointer_delta_px: (f64, f64),
    slot_px: f64,
    row_heights: &[f64],
) -> DragDelta {
    let (dx, dy) = pointer_delta_px;

    let delta_columns = if slot_px.is_finite() && slot_px > 0.0 && dx.is_finite() {
        (dx / slot_px).round() as i64
    } else {
        0
    };

    DragDelta {
        delta_columns,
        delta_rows: resolve_row_delta(start_cell.row, dy, row_heights),
    }
}

fn resolve_row_delta(start_row: usize, dy: f64, row_heights: &[f64]) -> i64 {
    if !dy.is_finite() || start_row >= row_heights.len() {
        return 0;
    }
    if row_heights.iter().any(|h| !h.is_finite() || *h <= 0.0) {
        return 0;
    }

    let top: f64 = row_heights[..start_row].iter().sum();
    let target_y = top + row_heights[start_row] / 2.0 + dy;

    let mut edge = 0.0;
    let mut target_row = row_heights.len() - 1;
    for (row, height) in row_heights.iter().enumerate() {
        edge += height;
        if target_y < edge {
            target_row = row;
            break;
        }
    }
    target_row as i64 - start_row as i64
}

/// Patch that moves a reservation by `delta`.
///
/// The start shifts by whole slots; an explicit end shifts with it so the
/// length is preserved. A vertical move replaces the primary table with the
/// table of the target row, keeping the other tables. Returns an empty patch
/// when nothing would change.
pub fn move_patch(
    reservation: &Reservation,
    delta: DragDelta,
    slot_ms: i64,
    row_tables: &[TableId],
) -> ReservationPatch {
    let mut patch = ReservationPatch::new();

    if delta.delta_columns != 0 {
        let shift = delta.delta_columns.saturating_mul(slot_ms);
        patch = patch.start_ms(reservation.start_ms.saturating_add(shift));
        if let Some(end) = reservation.end_ms {
            patch = patch.end_ms(Some(end.saturating_add(shift)));
        }
    }

    if delta.delta_rows != 0 {
        if let Some(tables) = retarget_primary(reservation, delta.delta_rows, row_tables) {
            patch = patch.tables(tables);
        }
    }

    patch
}

fn retarget_primary(
    reservation: &Reservation,
    delta_rows: i64,
    row_tables: &[TableId],
) -> Option<Vec<TableId>> {
    let primary = reservation.primary_table()?;
    let row = row_tables.iter().position(|t| t == primary)?;
    let target = usize::try_from(row as i64 + delta_rows).ok()?;
    let target_table = row_tables.get(target)?;
    if target_table == primary {
        return None;
    }

    let mut tables = vec![target_table.clone()];
    tables.extend(
        reservation
            .tables
            .iter()
            .skip(1)
            .filter(|t| *t != target_table)
            .cloned(),
    );
    Some(tables)
}

/// Patch that moves a reservation's end by whole slots.
///
/// The new end is never earlier than `start + min_duration_ms`. The result
/// is always written as an explicit end.
pub fn resize_patch(
    reservation: &Reservation,
    effective_end_ms: i64,
    delta_columns: i64,
    slot_ms: i64,
    min_duration_ms: i64,
) -> ReservationPatch {
    let floor = reservation.start_ms.saturating_add(min_duration_ms.max(1));
    let end = effective_end_ms
        .saturating_add(delta_columns.saturating_mul(slot_ms))
        .max(floor);
    if reservation.end_ms == Some(end) {
        return ReservationPatch::new();
    }
    ReservationPatch::new().end_ms(Some(end))
}
