//! Persistence collaborator interface.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::models::{ReservationId, ReservationPatch};

/// Backend that stores reservation changes.
///
/// Calls are fire-and-forget from the engine's point of view: it never
/// retries and never cancels them. A failed call is reported as an error.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Persists `patch` for `id`. May return a backend-assigned id.
    async fn save(
        &self,
        id: &str,
        patch: &ReservationPatch,
    ) -> Result<Option<ReservationId>, PersistenceError>;

    /// Deletes the reservation.
    async fn delete(&self, id: &str) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<T> PersistenceClient for Arc<T>
where
    T: PersistenceClient + ?Sized,
{
    async fn save(
        &self,
        id: &str,
        patch: &ReservationPatch,
    ) -> Result<Option<ReservationId>, PersistenceError> {
        (**self).save(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        (**self).delete(id).await
    }
}
