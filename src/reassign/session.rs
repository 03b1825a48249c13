//! Single-reservation reassignment workflow.
//!
//! # State Machine
//! ```text
//! Idle ──begin──▶ Selecting ──confirm──▶ Confirming ──apply──▶ Applied
//!                    ▲                      │
//!                    └─────────edit─────────┘
//! any non-terminal state ──cancel──▶ Cancelled
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, TimelineError};
use crate::models::{Reservation, ReservationId, TableId};
use crate::validation::ValidationError;

/// Lifecycle stage of a reassignment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Selecting,
    Confirming,
    Applied,
    Cancelled,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Confirming => "confirming",
            Self::Applied => "applied",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the session has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Applied | Self::Cancelled)
    }
}

/// An in-progress re-tabling of one reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignSession {
    base_reservation_id: ReservationId,
    original_tables: Vec<TableId>,
    /// Ordered selection; the first entry is the primary table.
    selected_tables: Vec<TableId>,
    state: SessionState,
}

impl ReassignSession {
    /// Creates an idle session for `reservation`.
    pub fn new(reservation: &Reservation) -> Self {
        Self {
            base_reservation_id: reservation.id.clone(),
            original_tables: reservation.tables.clone(),
            selected_tables: Vec::new(),
            state: SessionState::Idle,
        }
    }

    fn transition(
        &mut self,
        allowed: &[SessionState],
        action: &'static str,
        to: SessionState,
    ) -> Result<(), SessionError> {
        if !allowed.contains(&self.state) {
            return Err(SessionError {
                state: self.state.name(),
                action,
            });
        }
        self.state = to;
        Ok(())
    }

    fn require_selecting(&self, action: &'static str) -> Result<(), SessionError> {
        if self.state == SessionState::Selecting {
            Ok(())
        } else {
            Err(SessionError {
                state: self.state.name(),
                action,
            })
        }
    }

    /// Starts selecting, pre-selecting the current tables.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        self.transition(&[SessionState::Idle], "begin", SessionState::Selecting)?;
        self.selected_tables = self.original_tables.clone();
        Ok(())
    }

    /// Adds or removes a table. Returns `true` if it is now selected.
    pub fn toggle_table(&mut self, table: impl Into<TableId>) -> Result<bool, SessionError> {
        self.require_selecting("toggle a table")?;
        let table = table.into();
        if let Some(pos) = self.selected_tables.iter().position(|t| *t == table) {
            self.selected_tables.remove(pos);
            Ok(false)
        } else {
            self.selected_tables.push(table);
            Ok(true)
        }
    }

    /// Makes `table` the primary table, selecting it if needed.
    pub fn set_primary(&mut self, table: impl Into<TableId>) -> Result<(), SessionError> {
        self.require_selecting("set the primary table")?;
        let table = table.into();
        self.selected_tables.retain(|t| *t != table);
        self.selected_tables.insert(0, table);
        Ok(())
    }

    /// Replaces the whole selection.
    pub fn select<I, T>(&mut self, tables: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = T>,
        T: Into<TableId>,
    {
        self.require_selecting("select tables")?;
        self.selected_tables.clear();
        for table in tables {
            let table = table.into();
            if !self.selected_tables.contains(&table) {
                self.selected_tables.push(table);
            }
        }
        Ok(())
    }

    /// Moves to confirmation. Fails without a selection.
    pub fn confirm(&mut self) -> Result<(), TimelineError> {
        self.require_selecting("confirm")?;
        if self.selected_tables.is_empty() {
            return Err(ValidationError::empty_selection(&self.base_reservation_id).into());
        }
        self.state = SessionState::Confirming;
        Ok(())
    }

    /// Returns from confirmation to selection.
    pub fn edit(&mut self) -> Result<(), SessionError> {
        self.transition(&[SessionState::Confirming], "edit", SessionState::Selecting)
    }

    /// Abandons the session.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.transition(
            &[
                SessionState::Idle,
                SessionState::Selecting,
                SessionState::Confirming,
            ],
            "cancel",
            SessionState::Cancelled,
        )
    }

    pub(crate) fn mark_applied(&mut self) -> Result<(), SessionError> {
        self.transition(&[SessionState::Confirming], "apply", SessionState::Applied)
    }

    pub fn reservation_id(&self) -> &str {
        &self.base_reservation_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selected_tables(&self) -> &[TableId] {
        &self.selected_tables
    }

    pub fn original_tables(&self) -> &[TableId] {
        &self.original_tables
    }

    /// First selected table.
    pub fn primary_table(&self) -> Option<&str> {
        self.selected_tables.first().map(String::as_str)
    }

    /// Whether the selection differs from the original tables.
    pub fn is_changed(&self) -> bool {
        self.selected_tables != self.original_tables
    }
}
