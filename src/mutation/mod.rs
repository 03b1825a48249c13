//! Optimistic local mutation.
//!
//! User edits are shown immediately as pending patches, persisted through a
//! [`PersistenceClient`], reverted on rejection, and dropped once an
//! authoritative snapshot confirms them.

mod coordinator;
mod persistence;

pub use coordinator::{AppliedPatch, MutationCoordinator, PendingPatches, ReconcileReport};
pub use persistence::PersistenceClient;
