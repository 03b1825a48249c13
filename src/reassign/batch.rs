//! Batch commit of concurrent reassignment sessions.
//!
//! All open sessions are validated together before anything is written.
//! A primary table claimed by two sessions rejects the entire batch with
//! zero mutations. Once validated, each reservation is updated through the
//! [`MutationCoordinator`] independently of the others.

use futures::future::join_all;

use super::{ReassignSession, SessionState};
use crate::error::{Result, TimelineError};
use crate::models::{Reservation, ReservationId, ReservationPatch};
use crate::mutation::{MutationCoordinator, PersistenceClient};
use crate::validation::{validate_reassignments, ValidationError};

/// Open reassignment sessions, in the order they were opened.
#[derive(Debug, Clone, Default)]
pub struct ReassignBatch {
    sessions: Vec<ReassignSession>,
}

/// Result of a committed batch.
#[derive(Debug, Default)]
pub struct CommitReport {
    /// Reservations whose new tables were persisted.
    pub applied: Vec<ReservationId>,
    /// Reservations whose save was rejected; their optimistic change was reverted.
    pub failed: Vec<(ReservationId, TimelineError)>,
    /// Final state of every committed session.
    pub sessions: Vec<ReassignSession>,
}

impl CommitReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl ReassignBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or returns the already open) session for `reservation`, in
    /// the selecting state.
    pub fn open(&mut self, reservation: &Reservation) -> &mut ReassignSession {
        let pos = match self.position(&reservation.id) {
            Some(pos) => pos,
            None => {
                let mut session = ReassignSession::new(reservation);
                // A fresh session is always idle.
                let _ = session.begin();
                self.sessions.push(session);
                self.sessions.len() - 1
            }
        };
        &mut self.sessions[pos]
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.sessions
            .iter()
            .position(|s| s.reservation_id() == id && !s.state().is_terminal())
    }

    pub fn session(&self, id: &str) -> Option<&ReassignSession> {
        self.position(id).map(|pos| &self.sessions[pos])
    }

    pub fn session_mut(&mut self, id: &str) -> Option<&mut ReassignSession> {
        self.position(id).map(move |pos| &mut self.sessions[pos])
    }

    /// Removes the open session for `id` and returns it, now cancelled.
    pub fn cancel(&mut self, id: &str) -> Option<ReassignSession> {
        let pos = self.position(id)?;
        let mut session = self.sessions.remove(pos);
        session.cancel().ok()?;
        Some(session)
    }

    /// Drops every session.
    pub fn cancel_all(&mut self) {
        self.sessions.clear();
    }

    /// Sessions that are still open.
    pub fn open_sessions(&self) -> impl Iterator<Item = &ReassignSession> {
        self.sessions.iter().filter(|s| !s.state().is_terminal())
    }

    pub fn len(&self) -> usize {
        self.open_sessions().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks every open session for empty selections and shared primary tables.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_reassignments(
            self.open_sessions()
                .filter(|s| s.state() != SessionState::Idle)
                .map(|s| (s.reservation_id(), s.selected_tables())),
        )
    }

    /// Validates, then persists every open session's table selection.
    ///
    /// On a validation error nothing is mutated and the sessions are kept
    /// for correction. Otherwise every session is cleared, and per-reservation
    /// persistence failures are listed in the report.
    pub async fn commit<P>(
        &mut self,
        coordinator: &MutationCoordinator,
        client: &P,
    ) -> Result<CommitReport>
    where
        P: PersistenceClient + ?Sized,
    {
        if let Err(err) = self.validate() {
            tracing::warn!(error = %err, sessions = self.len(), "reassignment batch rejected");
            return Err(err.into());
        }

        let mut sessions: Vec<ReassignSession> = std::mem::take(&mut self.sessions)
            .into_iter()
            .filter(|s| matches!(s.state(), SessionState::Selecting | SessionState::Confirming))
            .collect();
        for session in &mut sessions {
            if session.state() == SessionState::Selecting {
                session.confirm()?;
            }
        }

        let plans: Vec<(ReservationId, ReservationPatch)> = sessions
            .iter()
            .map(|s| {
                let patch = ReservationPatch::new().tables(s.selected_tables().iter().cloned());
                (s.reservation_id().to_string(), patch)
            })
            .collect();

        let results = join_all(
            plans
                .iter()
                .map(|(id, patch)| coordinator.run_mutation(client, id, patch, patch)),
        )
        .await;

        let mut report = CommitReport::default();
        for ((id, _), result) in plans.into_iter().zip(results) {
            match result {
                Ok(_) => report.applied.push(id),
                Err(err) => report.failed.push((id, err)),
            }
        }
        for session in &mut sessions {
            session.mark_applied()?;
        }
        report.sessions = sessions;

        tracing::info!(
            applied = report.applied.len(),
            failed = report.failed.len(),
            "reassignment batch committed"
        );
        Ok(report)
    }
}
