//! Input validation.
//!
//! Checks structural integrity of reservation snapshots and of batch
//! reassignment requests. Detects:
//! - Duplicate reservation IDs
//! - Reservations without tables
//! - A table listed twice by one reservation
//! - Empty table selections in a reassignment
//! - Two reassignments claiming the same primary table

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::models::{Reservation, TableId};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two reservations share the same ID.
    DuplicateReservationId,
    /// A reservation has no table.
    EmptyTables,
    /// A reservation lists the same table more than once.
    DuplicateTable,
    /// A reassignment selects no table.
    EmptySelection,
    /// More than one reassignment targets this primary table.
    DuplicatePrimaryTable(TableId),
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn empty_selection(reservation_id: &str) -> Self {
        Self::new(
            ValidationErrorKind::EmptySelection,
            format!("Reservation '{reservation_id}' has no table selected"),
        )
    }

    pub(crate) fn duplicate_primary(table: &str) -> Self {
        Self::new(
            ValidationErrorKind::DuplicatePrimaryTable(table.to_string()),
            format!("Table '{table}' is the primary table of more than one reassignment"),
        )
    }
}

/// Validates an authoritative reservation snapshot.
///
/// Checks:
/// 1. No duplicate reservation IDs
/// 2. Every reservation has at least one table
/// 3. No reservation lists a table twice
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_reservations(reservations: &[Reservation]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();

    for r in reservations {
        if !ids.insert(r.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateReservationId,
                format!("Duplicate reservation ID: {}", r.id),
            ));
        }

        if r.tables.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyTables,
                format!("Reservation '{}' has no table", r.id),
            ));
        }

        if r.distinct_tables().len() != r.tables.len() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateTable,
                format!("Reservation '{}' lists a table more than once", r.id),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a batch of table selections `(reservation_id, selected_tables)`.
///
/// Stops at the first problem: an empty selection, or a primary table
/// (first selected) claimed by more than one entry. Entries are examined
/// in order, so the reported table is the first one claimed twice.
pub fn validate_reassignments<'a, I>(selections: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = (&'a str, &'a [TableId])>,
{
    let mut claimed: HashMap<&str, &str> = HashMap::new();

    for (reservation_id, tables) in selections {
        let Some(primary) = tables.first() else {
            return Err(ValidationError::empty_selection(reservation_id));
        };
        if claimed.insert(primary.as_str(), reservation_id).is_some() {
            return Err(ValidationError::duplicate_primary(primary));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Reservation> {
        vec![
            Reservation::new("R1", 0).with_tables(["1"]),
            Reservation::new("R2", 0).with_tables(["2", "3"]),
        ]
    }

    fn tables(ids: &[&str]) -> Vec<TableId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_snapshot() {
        assert!(validate_reservations(&sample()).is_ok());
    }

    #[test]
    fn test_duplicate_reservation_id() {
        let mut reservations = sample();
        reservations.push(Reservation::new("R1", 5).with_table("9"));

        let errors = validate_reservations(&reservations).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateReservationId));
    }

    #[test]
    fn test_empty_and_duplicate_tables() {
        let reservations = vec![
            Reservation::new("R1", 0),
            Reservation::new("R2", 0).with_tables(["4", "4"]),
        ];

        let errors = validate_reservations(&reservations).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, ValidationErrorKind::EmptyTables);
        assert_eq!(errors[1].kind, ValidationErrorKind::DuplicateTable);
    }

    #[test]
    fn test_reassignments_ok() {
        let x = tables(&["3", "4"]);
        let y = tables(&["5"]);
        assert!(validate_reassignments([("X", x.as_slice()), ("Y", y.as_slice())]).is_ok());
    }

    #[test]
    fn test_reassignments_duplicate_primary() {
        let x = tables(&["3", "4"]);
        let y = tables(&["3"]);
        let err = validate_reassignments([("X", x.as_slice()), ("Y", y.as_slice())]).unwrap_err();
        assert_eq!(
            err.kind,
            ValidationErrorKind::DuplicatePrimaryTable("3".into())
        );
        assert!(err.to_string().contains("'3'"));
    }

    #[test]
    fn test_reassignments_secondary_overlap_allowed() {
        // Only primary tables must be unique.
        let x = tables(&["3", "4"]);
        let y = tables(&["4", "3"]);
        assert!(validate_reassignments([("X", x.as_slice()), ("Y", y.as_slice())]).is_ok());
    }

    #[test]
    fn test_reassignments_empty_selection() {
        let x: Vec<TableId> = Vec::new();
        let err = validate_reassignments([("X", x.as_slice())]).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::EmptySelection);
    }
}
