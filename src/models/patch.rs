//! Partial reservation overrides.
//!
//! A patch is a set of field values keyed by [`PatchField`]. Merging is
//! shallow: a later value for a field replaces the earlier one, and list
//! fields (`tables`) are replaced wholesale and compared element-wise.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Reservation, TableId};

/// Patchable reservation fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PatchField {
    StartMs,
    EndMs,
    DurationMin,
    Tables,
    Guests,
    Course,
    Arrived,
    Paid,
    Departed,
}

/// A value for one patchable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PatchValue {
    StartMs(i64),
    EndMs(Option<i64>),
    DurationMin(Option<i64>),
    Tables(Vec<TableId>),
    Guests(u32),
    Course(Option<String>),
    Arrived(bool),
    Paid(bool),
    Departed(bool),
}

impl PatchValue {
    /// The field this value targets.
    pub fn field(&self) -> PatchField {
        match self {
            Self::StartMs(_) => PatchField::StartMs,
            Self::EndMs(_) => PatchField::EndMs,
            Self::DurationMin(_) => PatchField::DurationMin,
            Self::Tables(_) => PatchField::Tables,
            Self::Guests(_) => PatchField::Guests,
            Self::Course(_) => PatchField::Course,
            Self::Arrived(_) => PatchField::Arrived,
            Self::Paid(_) => PatchField::Paid,
            Self::Departed(_) => PatchField::Departed,
        }
    }

    /// Writes this value into `r`.
    pub fn apply_to(&self, r: &mut Reservation) {
        match self {
            Self::StartMs(v) => r.start_ms = *v,
            Self::EndMs(v) => r.end_ms = *v,
            Self::DurationMin(v) => r.duration_min = *v,
            Self::Tables(v) => r.tables = v.clone(),
            Self::Guests(v) => r.guests = *v,
            Self::Course(v) => r.course = v.clone(),
            Self::Arrived(v) => r.status.arrived = *v,
            Self::Paid(v) => r.status.paid = *v,
            Self::Departed(v) => r.status.departed = *v,
        }
    }

    /// Whether `r` already holds this value.
    pub fn is_satisfied_by(&self, r: &Reservation) -> bool {
        match self {
            Self::StartMs(v) => r.start_ms == *v,
            Self::EndMs(v) => r.end_ms == *v,
            Self::DurationMin(v) => r.duration_min == *v,
            Self::Tables(v) => r.tables == *v,
            Self::Guests(v) => r.guests == *v,
            Self::Course(v) => r.course == *v,
            Self::Arrived(v) => r.status.arrived == *v,
            Self::Paid(v) => r.status.paid == *v,
            Self::Departed(v) => r.status.departed == *v,
        }
    }
}

/// A partial reservation override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPatch {
    values: BTreeMap<PatchField, PatchValue>,
}

impl ReservationPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any previous value for it.
    pub fn with(mut self, value: PatchValue) -> Self {
        self.set(value);
        self
    }

    /// Sets the start time.
    pub fn start_ms(self, start_ms: i64) -> Self {
        self.with(PatchValue::StartMs(start_ms))
    }

    /// Sets (or clears) the explicit end.
    pub fn end_ms(self, end_ms: Option<i64>) -> Self {
        self.with(PatchValue::EndMs(end_ms))
    }

    /// Sets (or clears) the explicit duration.
    pub fn duration_min(self, minutes: Option<i64>) -> Self {
        self.with(PatchValue::DurationMin(minutes))
    }

    /// Replaces the table list.
    pub fn tables<I, T>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TableId>,
    {
        self.with(PatchValue::Tables(
            tables.into_iter().map(Into::into).collect(),
        ))
    }

    /// Sets the party size.
    pub fn guests(self, guests: u32) -> Self {
        self.with(PatchValue::Guests(guests))
    }

    /// Sets the arrived flag.
    pub fn arrived(self, arrived: bool) -> Self {
        self.with(PatchValue::Arrived(arrived))
    }

    /// Sets the paid flag.
    pub fn paid(self, paid: bool) -> Self {
        self.with(PatchValue::Paid(paid))
    }

    /// Sets the departed flag.
    pub fn departed(self, departed: bool) -> Self {
        self.with(PatchValue::Departed(departed))
    }

    /// Sets a field in place. Returns `true` if the stored value changed.
    pub fn set(&mut self, value: PatchValue) -> bool {
        let field = value.field();
        if self.values.get(&field) == Some(&value) {
            return false;
        }
        self.values.insert(field, value);
        true
    }

    /// Shallow-merges `other` into `self`. Returns `true` if anything changed.
    pub fn merge(&mut self, other: &ReservationPatch) -> bool {
        let mut changed = false;
        for value in other.values.values() {
            changed |= self.set(value.clone());
        }
        changed
    }

    /// Value for a field.
    pub fn get(&self, field: PatchField) -> Option<&PatchValue> {
        self.values.get(&field)
    }

    /// Patched fields in stable order.
    pub fn fields(&self) -> impl Iterator<Item = PatchField> + '_ {
        self.values.keys().copied()
    }

    /// Patched values in stable field order.
    pub fn values(&self) -> impl Iterator<Item = &PatchValue> {
        self.values.values()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns a copy of `r` with this patch applied.
    pub fn apply(&self, r: &Reservation) -> Reservation {
        let mut out = r.clone();
        for value in self.values.values() {
            value.apply_to(&mut out);
        }
        out
    }

    /// Whether every patched field already matches `r`.
    pub fn is_satisfied_by(&self, r: &Reservation) -> bool {
        self.values.values().all(|v| v.is_satisfied_by(r))
    }
}

impl FromIterator<PatchValue> for ReservationPatch {
    fn from_iter<I: IntoIterator<Item = PatchValue>>(iter: I) -> Self {
        let mut patch = Self::new();
        for value in iter {
            patch.set(value);
        }
        patch
    }
}
