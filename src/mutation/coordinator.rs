//! Optimistic mutation bookkeeping.
//!
//! Pending patches overlay authoritative records until the backend echoes
//! the same values back. Each applied field carries the sequence number of
//! the mutation that last wrote it; reverting a failed mutation only
//! removes fields still stamped with that mutation's number, so a later
//! in-flight mutation on the same reservation is never clobbered.
//!
//! A snapshot that omits a reservation does not drop its patch while a save
//! for that id is still in flight; partial feed pushes would otherwise
//! flash the old values back until the echo arrives.
//!
//! # Locking
//! State sits behind a mutex that is only held inside synchronous methods,
//! never across an `.await`. In-flight saves for different reservations do
//! not block each other.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::PersistenceClient;
use crate::error::{Result, TimelineError};
use crate::models::{PatchField, PatchValue, Reservation, ReservationId, ReservationPatch};

/// Plain snapshot of pending optimistic state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPatches {
    pub patches: BTreeMap<ReservationId, ReservationPatch>,
    pub deleted: BTreeSet<ReservationId>,
}

impl PendingPatches {
    /// Adds (merges) a patch for `id`.
    pub fn insert(&mut self, id: impl Into<ReservationId>, patch: ReservationPatch) {
        self.patches.entry(id.into()).or_default().merge(&patch);
    }

    /// Marks `id` as deleted.
    pub fn delete(&mut self, id: impl Into<ReservationId>) {
        self.deleted.insert(id.into());
    }

    pub fn get(&self, id: &str) -> Option<&ReservationPatch> {
        self.patches.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.deleted.is_empty()
    }

    /// Authoritative records with patches applied and deletions removed.
    ///
    /// Patches for ids absent from `authoritative` are ignored.
    pub fn overlay(&self, authoritative: &[Reservation]) -> Vec<Reservation> {
        authoritative
            .iter()
            .filter(|r| !self.deleted.contains(&r.id))
            .map(|r| match self.patches.get(&r.id) {
                Some(patch) => patch.apply(r),
                None => r.clone(),
            })
            .collect()
    }
}

/// Record of one optimistic application, used to revert it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPatch {
    pub reservation_id: ReservationId,
    pub seq: u64,
    /// Fields stamped by this application.
    pub fields: Vec<PatchField>,
    /// Whether any visible value changed.
    pub changed: bool,
}

/// Outcome of reconciling against an authoritative snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Patches dropped because the snapshot already matches them.
    pub confirmed: Vec<ReservationId>,
    /// Patches dropped because the reservation is gone and no save for it
    /// is in flight.
    pub orphaned: Vec<ReservationId>,
    /// Deletions the snapshot now reflects.
    pub deleted: Vec<ReservationId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.orphaned.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone)]
struct StampedValue {
    value: PatchValue,
    seq: u64,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    patches: HashMap<ReservationId, BTreeMap<PatchField, StampedValue>>,
    deleted: HashMap<ReservationId, u64>,
    /// Number of unsettled saves per reservation.
    in_flight: HashMap<ReservationId, usize>,
    next_seq: u64,
    revision: u64,
}

impl CoordinatorState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Counts one save as in flight until dropped, including when the save
/// future is cancelled.
struct InFlight<'a> {
    coordinator: &'a MutationCoordinator,
    id: &'a str,
}

impl<'a> InFlight<'a> {
    fn enter(coordinator: &'a MutationCoordinator, id: &'a str) -> Self {
        *coordinator
            .state
            .lock()
            .in_flight
            .entry(id.to_string())
            .or_default() += 1;
        Self { coordinator, id }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.coordinator.state.lock();
        if let Some(count) = state.in_flight.get_mut(self.id) {
            *count -= 1;
            if *count == 0 {
                state.in_flight.remove(self.id);
            }
        }
    }
}

/// Applies, reverts and reconciles optimistic reservation patches.
#[derive(Debug, Default)]
pub struct MutationCoordinator {
    state: Mutex<CoordinatorState>,
}

impl MutationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow-merges `patch` into the pending overlay for `id`.
    ///
    /// Fields whose pending value is already equal are re-stamped but do
    /// not count as a change; a patch that changes nothing leaves the
    /// revision untouched.
    pub fn apply_optimistic(&self, id: &str, patch: &ReservationPatch) -> AppliedPatch {
        let mut state = self.state.lock();
        let seq = state.next_seq();
        let entry = state.patches.entry(id.to_string()).or_default();

        let mut fields = Vec::with_capacity(patch.len());
        let mut changed = false;
        for value in patch.values() {
            let field = value.field();
            let unchanged = entry.get(&field).is_some_and(|slot| slot.value == *value);
            entry.insert(
                field,
                StampedValue {
                    value: value.clone(),
                    seq,
                },
            );
            changed |= !unchanged;
            fields.push(field);
        }
        if entry.is_empty() {
            state.patches.remove(id);
        }
        if changed {
            state.revision += 1;
        }

        tracing::debug!(reservation_id = %id, seq, changed, fields = fields.len(), "optimistic patch applied");
        AppliedPatch {
            reservation_id: id.to_string(),
            seq,
            fields,
            changed,
        }
    }

    /// Removes the fields `applied` still owns. Returns `true` if anything
    /// was removed.
    pub fn revert(&self, applied: &AppliedPatch) -> bool {
        let mut state = self.state.lock();
        let Some(entry) = state.patches.get_mut(&applied.reservation_id) else {
            return false;
        };

        let mut removed = false;
        for field in &applied.fields {
            if entry.get(field).is_some_and(|slot| slot.seq == applied.seq) {
                entry.remove(field);
                removed = true;
            }
        }
        if entry.is_empty() {
            state.patches.remove(&applied.reservation_id);
        }
        if removed {
            state.revision += 1;
        }
        removed
    }

    /// Hides `id` until the snapshot drops it. Returns the tombstone stamp.
    pub fn mark_deleted(&self, id: &str) -> u64 {
        let mut state = self.state.lock();
        let seq = state.next_seq();
        if state.deleted.insert(id.to_string(), seq).is_none() {
            state.revision += 1;
        }
        seq
    }

    /// Restores `id` if the tombstone still carries `seq`.
    pub fn unmark_deleted(&self, id: &str, seq: u64) -> bool {
        let mut state = self.state.lock();
        if state.deleted.get(id) == Some(&seq) {
            state.deleted.remove(id);
            state.revision += 1;
            true
        } else {
            false
        }
    }

    /// Drops every pending patch the authoritative snapshot already satisfies.
    ///
    /// Patches for ids the snapshot omits are kept while a save for the id
    /// is in flight. Re-applying the same snapshot is a no-op.
    pub fn reconcile(&self, snapshot: &[Reservation]) -> ReconcileReport {
        let by_id: HashMap<&str, &Reservation> =
            snapshot.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut state = self.state.lock();
        let state = &mut *state;
        let mut report = ReconcileReport::default();

        let in_flight = &state.in_flight;
        state.patches.retain(|id, fields| match by_id.get(id.as_str()) {
            None if in_flight.contains_key(id) => true,
            None => {
                report.orphaned.push(id.clone());
                false
            }
            Some(r) if fields.values().all(|s| s.value.is_satisfied_by(r)) => {
                report.confirmed.push(id.clone());
                false
            }
            Some(_) => true,
        });
        state.deleted.retain(|id, _| {
            let present = by_id.contains_key(id.as_str());
            if !present {
                report.deleted.push(id.clone());
            }
            present
        });

        if !report.is_empty() {
            state.revision += 1;
            report.confirmed.sort();
            report.orphaned.sort();
            report.deleted.sort();
            tracing::debug!(
                confirmed = report.confirmed.len(),
                orphaned = report.orphaned.len(),
                deleted = report.deleted.len(),
                "pending patches reconciled"
            );
        }
        report
    }

    /// Current pending overlay as plain data.
    pub fn pending(&self) -> PendingPatches {
        let state = self.state.lock();
        PendingPatches {
            patches: state
                .patches
                .iter()
                .map(|(id, fields)| {
                    let patch: ReservationPatch =
                        fields.values().map(|s| s.value.clone()).collect();
                    (id.clone(), patch)
                })
                .collect(),
            deleted: state.deleted.keys().cloned().collect(),
        }
    }

    /// Pending patch for one reservation.
    pub fn pending_patch(&self, id: &str) -> Option<ReservationPatch> {
        let state = self.state.lock();
        let fields = state.patches.get(id)?;
        Some(fields.values().map(|s| s.value.clone()).collect())
    }

    /// Number of reservations with pending patches or deletions.
    pub fn pending_count(&self) -> usize {
        let state = self.state.lock();
        state.patches.len() + state.deleted.len()
    }

    /// Number of saves for `id` that have not settled yet.
    pub fn in_flight(&self, id: &str) -> usize {
        self.state.lock().in_flight.get(id).copied().unwrap_or(0)
    }

    /// Monotonic counter bumped on every visible change.
    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    /// Applies `optimistic` immediately, then persists `persist`.
    ///
    /// On rejection only this call's fields are reverted and the error is
    /// returned. Never retries.
    pub async fn run_mutation<P>(
        &self,
        client: &P,
        id: &str,
        persist: &ReservationPatch,
        optimistic: &ReservationPatch,
    ) -> Result<Option<ReservationId>>
    where
        P: PersistenceClient + ?Sized,
    {
        let flight = InFlight::enter(self, id);
        let applied = self.apply_optimistic(id, optimistic);
        let result = client.save(id, persist).await;
        drop(flight);
        match result {
            Ok(saved) => Ok(saved),
            Err(err) => {
                let reverted = self.revert(&applied);
                tracing::warn!(reservation_id = %id, seq = applied.seq, reverted, error = %err, "save rejected, optimistic patch reverted");
                Err(TimelineError::persistence(id, err))
            }
        }
    }

    /// Hides `id` immediately, then deletes it in the backend.
    pub async fn run_delete<P>(&self, client: &P, id: &str) -> Result<()>
    where
        P: PersistenceClient + ?Sized,
    {
        let seq = self.mark_deleted(id);
        match client.delete(id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.unmark_deleted(id, seq);
                tracing::warn!(reservation_id = %id, error = %err, "delete rejected, reservation restored");
                Err(TimelineError::persistence(id, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::models::MS_PER_MINUTE;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    type SaveReply = std::result::Result<Option<ReservationId>, PersistenceError>;

    /// Replies to each call with the next scripted response, waiting for it
    /// if it has not been sent yet. Missing scripts succeed.
    #[derive(Default)]
    struct ScriptedClient {
        saves: Mutex<VecDeque<oneshot::Receiver<SaveReply>>>,
        deletes: Mutex<VecDeque<std::result::Result<(), PersistenceError>>>,
        saved: Mutex<Vec<(String, ReservationPatch)>>,
    }

    impl ScriptedClient {
        fn replying(replies: Vec<SaveReply>) -> Self {
            let client = Self::default();
            for reply in replies {
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(reply);
                client.saves.lock().push_back(rx);
            }
            client
        }

        fn gated(&self) -> oneshot::Sender<SaveReply> {
            let (tx, rx) = oneshot::channel();
            self.saves.lock().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl PersistenceClient for ScriptedClient {
        async fn save(&self, id: &str, patch: &ReservationPatch) -> SaveReply {
            self.saved.lock().push((id.to_string(), patch.clone()));
            let next = self.saves.lock().pop_front();
            match next {
                Some(rx) => rx.await.unwrap_or(Err(PersistenceError::Offline)),
                None => Ok(None),
            }
        }

        async fn delete(&self, _id: &str) -> std::result::Result<(), PersistenceError> {
            self.deletes.lock().pop_front().unwrap_or(Ok(()))
        }
    }

    fn base() -> Reservation {
        Reservation::new("Z", 18 * 60 * MS_PER_MINUTE)
            .with_end(20 * 60 * MS_PER_MINUTE)
            .with_table("3")
    }

    #[test]
    fn test_apply_and_overlay() {
        let coord = MutationCoordinator::new();
        let applied = coord.apply_optimistic("Z", &ReservationPatch::new().guests(4));
        assert!(applied.changed);
        assert_eq!(coord.revision(), 1);

        let effective = coord.pending().overlay(&[base()]);
        assert_eq!(effective[0].guests, 4);
    }

    #[test]
    fn test_noop_apply_keeps_revision() {
        let coord = MutationCoordinator::new();
        coord.apply_optimistic("Z", &ReservationPatch::new().tables(["3", "4"]));
        let rev = coord.revision();

        let again = coord.apply_optimistic("Z", &ReservationPatch::new().tables(["3", "4"]));
        assert!(!again.changed);
        assert_eq!(coord.revision(), rev);

        let empty = coord.apply_optimistic("Y", &ReservationPatch::new());
        assert!(!empty.changed);
        assert_eq!(coord.pending_count(), 1);
    }

    #[test]
    fn test_later_values_win_and_revert_respects_stamps() {
        let coord = MutationCoordinator::new();
        let first = coord.apply_optimistic("Z", &ReservationPatch::new().start_ms(100).guests(2));
        let second = coord.apply_optimistic("Z", &ReservationPatch::new().start_ms(200));

        assert_eq!(
            coord.pending_patch("Z").unwrap().get(PatchField::StartMs),
            Some(&PatchValue::StartMs(200))
        );

        // First fails: its guests field goes, the newer start survives.
        assert!(coord.revert(&first));
        let patch = coord.pending_patch("Z").unwrap();
        assert_eq!(patch.get(PatchField::StartMs), Some(&PatchValue::StartMs(200)));
        assert!(patch.get(PatchField::Guests).is_none());

        assert!(coord.revert(&second));
        assert!(coord.pending_patch("Z").is_none());
        assert!(!coord.revert(&second));
    }

    #[test]
    fn test_equal_value_restamped_by_later_call() {
        let coord = MutationCoordinator::new();
        let first = coord.apply_optimistic("Z", &ReservationPatch::new().paid(true));
        let _second = coord.apply_optimistic("Z", &ReservationPatch::new().paid(true));

        assert!(!coord.revert(&first));
        assert!(coord.pending_patch("Z").is_some());
    }

    #[test]
    fn test_reconcile_drops_confirmed_only() {
        let coord = MutationCoordinator::new();
        coord.apply_optimistic("Z", &ReservationPatch::new().guests(4).arrived(true));

        let partial = base().with_guests(4);
        assert!(coord.reconcile(&[partial]).is_empty());
        assert!(coord.pending_patch("Z").is_some());

        let mut confirmed = base().with_guests(4);
        confirmed.status.arrived = true;
        let report = coord.reconcile(std::slice::from_ref(&confirmed));
        assert_eq!(report.confirmed, vec!["Z".to_string()]);
        assert!(coord.pending_patch("Z").is_none());

        let rev = coord.revision();
        assert!(coord.reconcile(&[confirmed]).is_empty());
        assert_eq!(coord.revision(), rev);
    }

    #[test]
    fn test_reconcile_orphans_and_deletions() {
        let coord = MutationCoordinator::new();
        coord.apply_optimistic("gone", &ReservationPatch::new().guests(1));
        coord.mark_deleted("Z");

        let report = coord.reconcile(&[base()]);
        assert_eq!(report.orphaned, vec!["gone".to_string()]);
        assert!(report.deleted.is_empty());
        assert_eq!(coord.pending().deleted.len(), 1);

        let report = coord.reconcile(&[]);
        assert_eq!(report.deleted, vec!["Z".to_string()]);
        assert!(coord.pending().is_empty());
    }

    #[tokio::test]
    async fn test_absent_id_keeps_patch_while_save_in_flight() {
        let coord = MutationCoordinator::new();
        let client = ScriptedClient::default();
        let gate = client.gated();
        let moved = base().start_ms + 20 * MS_PER_MINUTE;
        let patch = ReservationPatch::new().start_ms(moved);

        let mut save = std::pin::pin!(coord.run_mutation(&client, "Z", &patch, &patch));
        assert!(futures::poll!(save.as_mut()).is_pending());
        assert_eq!(coord.in_flight("Z"), 1);

        // An empty push arrives before the echo.
        let report = coord.reconcile(&[]);
        assert!(report.orphaned.is_empty());
        let effective = coord.pending().overlay(&[base()]);
        assert_eq!(effective[0].start_ms, moved);

        let _ = gate.send(Ok(None));
        assert!(save.await.is_ok());
        assert_eq!(coord.in_flight("Z"), 0);

        // Settled and still absent: the patch is an orphan now.
        let report = coord.reconcile(&[]);
        assert_eq!(report.orphaned, vec!["Z".to_string()]);
        assert_eq!(coord.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_save_leaves_nothing_in_flight() {
        let coord = MutationCoordinator::new();
        let client = ScriptedClient::default();
        let _gate = client.gated();
        let patch = ReservationPatch::new().guests(3);

        {
            let mut save = std::pin::pin!(coord.run_mutation(&client, "Z", &patch, &patch));
            assert!(futures::poll!(save.as_mut()).is_pending());
            assert_eq!(coord.in_flight("Z"), 1);
        }
        assert_eq!(coord.in_flight("Z"), 0);
    }

    #[tokio::test]
    async fn test_run_mutation_success_keeps_patch_until_echo() {
        let coord = MutationCoordinator::new();
        let client = ScriptedClient::replying(vec![Ok(Some("Z".into()))]);
        let patch = ReservationPatch::new().start_ms(base().start_ms + 20 * MS_PER_MINUTE);

        let saved = coord.run_mutation(&client, "Z", &patch, &patch).await.unwrap();
        assert_eq!(saved.as_deref(), Some("Z"));
        assert_eq!(coord.pending_patch("Z"), Some(patch.clone()));
        assert_eq!(client.saved.lock().len(), 1);

        let echoed = patch.apply(&base());
        coord.reconcile(&[echoed]);
        assert!(coord.pending_patch("Z").is_none());
    }

    #[tokio::test]
    async fn test_run_mutation_failure_reverts() {
        let coord = MutationCoordinator::new();
        let client = ScriptedClient::replying(vec![Err(PersistenceError::Offline)]);
        let patch = ReservationPatch::new().start_ms(base().start_ms + 20 * MS_PER_MINUTE);

        let err = coord.run_mutation(&client, "Z", &patch, &patch).await.unwrap_err();
        assert_eq!(
            err,
            TimelineError::Persistence {
                reservation_id: "Z".into(),
                source: PersistenceError::Offline
            }
        );
        let effective = coord.pending().overlay(&[base()]);
        assert_eq!(effective[0].start_ms, base().start_ms);
    }

    #[tokio::test]
    async fn test_concurrent_same_id_failure_keeps_later_value() {
        let coord = MutationCoordinator::new();
        let client = ScriptedClient::default();
        let first_gate = client.gated();
        let second_gate = client.gated();

        let p1 = ReservationPatch::new().start_ms(100).guests(5);
        let p2 = ReservationPatch::new().start_ms(200);

        let driver = async {
            tokio::task::yield_now().await;
            let _ = first_gate.send(Err(PersistenceError::rejected("conflict")));
            tokio::task::yield_now().await;
            let _ = second_gate.send(Ok(None));
        };
        let (r1, r2, ()) = tokio::join!(
            coord.run_mutation(&client, "Z", &p1, &p1),
            coord.run_mutation(&client, "Z", &p2, &p2),
            driver
        );

        assert!(r1.is_err());
        assert!(r2.is_ok());
        let patch = coord.pending_patch("Z").unwrap();
        assert_eq!(patch.get(PatchField::StartMs), Some(&PatchValue::StartMs(200)));
        assert!(patch.get(PatchField::Guests).is_none());
    }

    #[tokio::test]
    async fn test_run_delete_restores_on_failure() {
        let coord = MutationCoordinator::new();
        let client = ScriptedClient::default();
        client.deletes.lock().push_back(Err(PersistenceError::Offline));

        assert!(coord.run_delete(&client, "Z").await.is_err());
        assert_eq!(coord.pending().overlay(&[base()]).len(), 1);

        assert!(coord.run_delete(&client, "Z").await.is_ok());
        assert!(coord.pending().overlay(&[base()]).is_empty());
    }
}
