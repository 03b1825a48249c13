//! Time axis discretization.
//!
//! Maps epoch milliseconds onto slot columns of fixed width. Columns are
//! half-open: column `c` covers `[start + c*slot, start + (c+1)*slot)`.
//! Conversions are unclipped; negative columns and columns past the last
//! one are valid results.

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MS_PER_MINUTE;

/// Default slot width (5 minutes).
pub const DEFAULT_SLOT_MS: i64 = 5 * MS_PER_MINUTE;

/// A visible window on the time axis split into equal slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeGrid {
    /// Window start (epoch ms); left edge of column 0.
    pub window_start_ms: i64,
    /// Slot width (ms). Always positive.
    pub slot_ms: i64,
    /// Number of visible columns.
    pub columns: u32,
}

/// Clipped horizontal placement of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPlacement {
    /// First visible column.
    pub first_column: u32,
    /// Visible width in columns (≥ 1).
    pub span: u32,
    /// The interval starts before the window.
    pub clipped_start: bool,
    /// The interval ends after the window.
    pub clipped_end: bool,
}

impl TimeGrid {
    /// Creates a grid with the default 5 minute slot.
    pub fn new(window_start_ms: i64, columns: u32) -> Self {
        Self {
            window_start_ms,
            slot_ms: DEFAULT_SLOT_MS,
            columns,
        }
    }

    /// Sets the slot width. Non-positive widths fall back to the default.
    pub fn with_slot_ms(mut self, slot_ms: i64) -> Self {
        self.slot_ms = if slot_ms > 0 { slot_ms } else { DEFAULT_SLOT_MS };
        self
    }

    /// Builds a window covering opening hours on a calendar date (UTC).
    ///
    /// A closing time at or before the opening time is taken to be on the
    /// following day. The column count rounds up to cover the closing time.
    pub fn for_service(date: NaiveDate, open: NaiveTime, close: NaiveTime, slot_ms: i64) -> Self {
        let start = Utc.from_utc_datetime(&date.and_time(open));
        let mut end = Utc.from_utc_datetime(&date.and_time(close));
        if end <= start {
            end += Duration::days(1);
        }
        let grid = Self::new(start.timestamp_millis(), 0).with_slot_ms(slot_ms);
        let span_ms = end.timestamp_millis() - grid.window_start_ms;
        let columns = (span_ms + grid.slot_ms - 1) / grid.slot_ms;
        Self {
            columns: u32::try_from(columns).unwrap_or(u32::MAX),
            ..grid
        }
    }

    /// Column containing `ms`: `floor((ms - start) / slot)`.
    #[inline]
    pub fn column_for_time(&self, ms: i64) -> i64 {
        (ms - self.window_start_ms).div_euclid(self.slot_ms)
    }

    /// Left edge of column `col`.
    #[inline]
    pub fn time_for_column(&self, col: i64) -> i64 {
        self.window_start_ms + col * self.slot_ms
    }

    /// Rounds down to the nearest slot boundary.
    #[inline]
    pub fn snap(&self, ms: i64) -> i64 {
        self.time_for_column(self.column_for_time(ms))
    }

    /// Right edge of the last column.
    #[inline]
    pub fn window_end_ms(&self) -> i64 {
        self.time_for_column(i64::from(self.columns))
    }

    /// Whether `col` is a visible column.
    #[inline]
    pub fn contains_column(&self, col: i64) -> bool {
        (0..i64::from(self.columns)).contains(&col)
    }

    /// Clamps `col` into the visible range.
    pub fn clamp_column(&self, col: i64) -> u32 {
        let last = i64::from(self.columns.saturating_sub(1));
        // Bounded by `last`, which itself came from a u32.
        col.clamp(0, last) as u32
    }

    /// Visible columns covered by `[start_ms, end_ms)`.
    ///
    /// Returns `None` if the interval is empty or lies entirely outside
    /// the window.
    pub fn placement(&self, start_ms: i64, end_ms: i64) -> Option<GridPlacement> {
        if end_ms <= start_ms || self.columns == 0 {
            return None;
        }
        if end_ms <= self.window_start_ms || start_ms >= self.window_end_ms() {
            return None;
        }
        let first = self.column_for_time(start_ms);
        // Last column touched by the half-open interval.
        let last = self.column_for_time(end_ms - 1);
        let first_visible = self.clamp_column(first);
        let last_visible = self.clamp_column(last);
        Some(GridPlacement {
            first_column: first_visible,
            span: last_visible - first_visible + 1,
            clipped_start: first < 0,
            clipped_end: last >= i64::from(self.columns),
        })
    }
}
