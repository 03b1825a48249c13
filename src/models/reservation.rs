//! Reservation model.
//!
//! A reservation books one or more tables for a guest party starting at a
//! fixed instant. Its end is derived, see [`DurationPolicy`](super::DurationPolicy).
//!
//! # Time Representation
//! All times are epoch milliseconds.

use serde::{Deserialize, Serialize};

/// Opaque table key.
pub type TableId = String;

/// Opaque reservation key.
pub type ReservationId = String;

/// Service progress flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationStatus {
    pub arrived: bool,
    pub paid: bool,
    pub departed: bool,
}

/// A canonical reservation record.
///
/// `tables` order does not matter for overlap logic, but the first element
/// is the primary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation identifier.
    pub id: ReservationId,
    /// Seating time (epoch ms).
    pub start_ms: i64,
    /// Explicit end (epoch ms). Takes precedence over `duration_min`.
    pub end_ms: Option<i64>,
    /// Explicit duration (minutes).
    pub duration_min: Option<i64>,
    /// Occupied tables; first = primary.
    pub tables: Vec<TableId>,
    /// Party size.
    pub guests: u32,
    /// Course (menu) name, used for default durations.
    pub course: Option<String>,
    /// Service progress.
    pub status: ReservationStatus,
    pub created_at_ms: Option<i64>,
    pub updated_at_ms: Option<i64>,
}

impl Reservation {
    /// Creates a reservation with no tables and no explicit end.
    pub fn new(id: impl Into<ReservationId>, start_ms: i64) -> Self {
        Self {
            id: id.into(),
            start_ms,
            end_ms: None,
            duration_min: None,
            tables: Vec::new(),
            guests: 0,
            course: None,
            status: ReservationStatus::default(),
            created_at_ms: None,
            updated_at_ms: None,
        }
    }

    /// Sets an explicit end time.
    pub fn with_end(mut self, end_ms: i64) -> Self {
        self.end_ms = Some(end_ms);
        self
    }

    /// Sets an explicit duration in minutes.
    pub fn with_duration_min(mut self, minutes: i64) -> Self {
        self.duration_min = Some(minutes);
        self
    }

    /// Appends a table.
    pub fn with_table(mut self, table: impl Into<TableId>) -> Self {
        self.tables.push(table.into());
        self
    }

    /// Replaces the table list.
    pub fn with_tables<I, T>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TableId>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the party size.
    pub fn with_guests(mut self, guests: u32) -> Self {
        self.guests = guests;
        self
    }

    /// Sets the course name.
    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }

    /// Sets the service flags.
    pub fn with_status(mut self, status: ReservationStatus) -> Self {
        self.status = status;
        self
    }

    /// First listed table.
    pub fn primary_table(&self) -> Option<&str> {
        self.tables.first().map(String::as_str)
    }

    /// Whether the reservation occupies `table`.
    pub fn occupies(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// Tables with duplicates removed, first occurrence wins.
    pub fn distinct_tables(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.tables.len());
        for t in &self.tables {
            if !seen.contains(&t.as_str()) {
                seen.push(t);
            }
        }
        seen
    }

    /// Whether the reservation can be placed on the grid.
    pub fn is_placeable(&self) -> bool {
        !self.tables.is_empty()
    }
}
