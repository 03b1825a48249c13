//! Authoritative reservation feed.
//!
//! Records arrive in the booking backend's wire shape, which tolerates
//! several field spellings and numeric table keys. They are normalized once
//! here into canonical [`Reservation`]s; nothing downstream sees aliases.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::NormalizeError;
use crate::models::{Reservation, ReservationStatus, TableId};

/// A table or reservation key as sent by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawKey {
    Text(String),
    Number(f64),
}

impl RawKey {
    /// Canonical string form. Integral numbers print without a fraction.
    /// Blank keys yield `None`.
    pub fn to_key(&self) -> Option<String> {
        match self {
            Self::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Self::Number(n) if !n.is_finite() => None,
            Self::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            Self::Number(n) => Some(n.to_string()),
        }
    }
}

/// One key or a list of keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawKeys {
    One(RawKey),
    Many(Vec<RawKey>),
}

impl RawKeys {
    fn iter(&self) -> impl Iterator<Item = &RawKey> {
        match self {
            Self::One(key) => std::slice::from_ref(key).iter(),
            Self::Many(keys) => keys.iter(),
        }
    }
}

/// Reservation record in wire form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawReservation {
    pub id: Option<RawKey>,
    #[serde(alias = "start")]
    pub start_ms: Option<f64>,
    #[serde(alias = "end")]
    pub end_ms: Option<f64>,
    #[serde(alias = "duration")]
    pub duration_min: Option<f64>,
    #[serde(alias = "table")]
    pub tables: Option<RawKeys>,
    pub guests: Option<f64>,
    #[serde(alias = "courseName")]
    pub course: Option<String>,
    pub arrived: bool,
    pub paid: bool,
    pub departed: bool,
    pub created_at_ms: Option<f64>,
    pub updated_at_ms: Option<f64>,
}

/// Largest timestamp magnitude accepted from the wire, in ms (±100 million
/// days around the epoch). Keeps grid arithmetic clear of `i64` overflow.
pub const MAX_WIRE_MS: f64 = 8.64e15;

fn finite_ms(value: Option<f64>) -> Option<i64> {
    value
        .map(f64::round)
        .filter(|v| v.is_finite() && v.abs() <= MAX_WIRE_MS)
        .map(|v| v as i64)
}

impl RawReservation {
    /// Converts to the canonical record.
    ///
    /// Table keys are de-duplicated in order. Guests are clamped to `0..=u32::MAX`.
    pub fn normalize(&self) -> Result<Reservation, NormalizeError> {
        let id = self
            .id
            .as_ref()
            .and_then(RawKey::to_key)
            .ok_or(NormalizeError::MissingId)?;

        let start_ms = finite_ms(self.start_ms).ok_or_else(|| NormalizeError::InvalidStart {
            id: id.clone(),
        })?;

        let mut tables: Vec<TableId> = Vec::new();
        for key in self.tables.iter().flat_map(RawKeys::iter) {
            if let Some(key) = key.to_key() {
                if !tables.contains(&key) {
                    tables.push(key);
                }
            }
        }
        if tables.is_empty() {
            return Err(NormalizeError::NoTables { id });
        }

        let guests = self
            .guests
            .filter(|g| g.is_finite())
            .map(|g| g.round().clamp(0.0, u32::MAX as f64) as u32)
            .unwrap_or(0);
        let course = self
            .course
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(Reservation {
            id,
            start_ms,
            end_ms: finite_ms(self.end_ms),
            duration_min: finite_ms(self.duration_min),
            tables,
            guests,
            course,
            status: ReservationStatus {
                arrived: self.arrived,
                paid: self.paid,
                departed: self.departed,
            },
            created_at_ms: finite_ms(self.created_at_ms),
            updated_at_ms: finite_ms(self.updated_at_ms),
        })
    }
}

/// Canonical records plus the ones that could not be placed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSnapshot {
    pub reservations: Vec<Reservation>,
    pub excluded: Vec<NormalizeError>,
}

/// Normalizes a whole feed push.
///
/// Malformed records are excluded and logged. When an id repeats, the first
/// record wins.
pub fn normalize_snapshot(records: &[RawReservation]) -> NormalizedSnapshot {
    let mut snapshot = NormalizedSnapshot::default();
    let mut seen = HashSet::new();

    for record in records {
        match record.normalize() {
            Ok(r) => {
                if seen.insert(r.id.clone()) {
                    snapshot.reservations.push(r);
                } else {
                    tracing::warn!(reservation_id = %r.id, "duplicate reservation id in snapshot, ignored");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "reservation excluded from timeline");
                snapshot.excluded.push(err);
            }
        }
    }
    snapshot
}

/// Parses a JSON array of wire records.
pub fn parse_snapshot(json: &str) -> Result<Vec<RawReservation>, serde_json::Error> {
    serde_json::from_str(json)
}

/// One push of the authoritative feed.
pub type Snapshot = Arc<Vec<RawReservation>>;

/// Push-based authoritative reservation list for a service window.
pub trait ReservationSource: Send + Sync {
    /// Receiver that always holds the latest snapshot.
    fn subscribe(&self) -> watch::Receiver<Snapshot>;
}

impl ReservationSource for watch::Sender<Snapshot> {
    fn subscribe(&self) -> watch::Receiver<Snapshot> {
        watch::Sender::subscribe(self)
    }
}
