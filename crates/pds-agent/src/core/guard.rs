//! Guarded exchange persistence
//!
//! Every protocol step that changes an exchange goes through
//! [`attempt_transition`]. The record is checked before any side effect
//! runs, and persisted only after the side effect succeeds, so a rejected
//! or failed step leaves the stored record exactly as it was.
//!
//! Steps on the same exchange are serialized within one agent process: the
//! stored record is re-read under a per-exchange lock, so of two concurrent
//! attempts at the same step only the first runs its side effect.

use pds_core::{ExchangeQuery, ExchangeRecord, ExchangeRole, ExchangeState, PdsError, Protocol, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::storage::{AgentStore, ExchangeRow};

/// Lazily created async locks, one per key
///
/// Entries nobody holds or waits on are pruned on the next acquisition.
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Typed access to exchange records in the agent store
#[derive(Debug, Clone)]
pub struct ExchangeRepository {
    store: Arc<dyn AgentStore>,
    locks: Arc<KeyedLocks>,
}

impl ExchangeRepository {
    pub fn new(store: Arc<dyn AgentStore>) -> Self {
        Self {
            store,
            locks: Arc::new(KeyedLocks::default()),
        }
    }

    /// Exclusive access to one exchange until the guard is dropped
    pub async fn lock_exchange<P: Protocol>(&self, id: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(format!("{}/id/{}", P::NAME, id)).await
    }

    /// Exclusive access to the `role` side of `thread_id` until the guard is
    /// dropped
    ///
    /// Held while checking for and opening a record on a thread, so a
    /// duplicate delivery cannot open a second one.
    pub async fn lock_thread<P: Protocol>(&self, thread_id: &str, role: P::Role) -> OwnedMutexGuard<()> {
        self.locks
            .acquire(format!("{}/thread/{}/{}", P::NAME, role.as_str(), thread_id))
            .await
    }

    /// Insert or replace a record
    pub async fn save<P: Protocol>(&self, record: &ExchangeRecord<P>) -> Result<()> {
        let row = ExchangeRow::from_record(record)?;
        self.store.save_exchange(row).await?;
        debug!(
            protocol = P::NAME,
            id = %record.id,
            state = record.state.as_str(),
            "Exchange record saved"
        );
        Ok(())
    }

    /// Get a record by id
    pub async fn get<P: Protocol>(&self, id: &str) -> Result<ExchangeRecord<P>> {
        let row = self
            .store
            .get_exchange(P::NAME, id)
            .await?
            .ok_or_else(|| PdsError::not_found(format!("{} exchange {}", P::NAME, id)))?;
        Ok(row.into_record()?)
    }

    /// The record this agent holds in `role` on `thread_id`, if any
    pub async fn find_by_thread<P: Protocol>(
        &self,
        thread_id: &str,
        role: P::Role,
    ) -> Result<Option<ExchangeRecord<P>>> {
        let query = ExchangeQuery {
            thread_id: Some(thread_id.to_string()),
            role: Some(role.as_str().to_string()),
            ..Default::default()
        };
        let mut records = self.query::<P>(&query).await?;
        if records.len() > 1 {
            warn!(
                protocol = P::NAME,
                thread_id = %thread_id,
                count = records.len(),
                "Several exchanges share a thread; using the oldest"
            );
        }
        Ok(if records.is_empty() { None } else { Some(records.remove(0)) })
    }

    /// Every record matching `query`, oldest first
    pub async fn query<P: Protocol>(&self, query: &ExchangeQuery) -> Result<Vec<ExchangeRecord<P>>> {
        let rows = self.store.query_exchanges(P::NAME, query).await?;
        rows.into_iter()
            .map(|row| row.into_record().map_err(PdsError::from))
            .collect()
    }
}

/// Run one guarded protocol step
///
/// 1. `expected_state -> next` must be in the transition table.
/// 2. Under the exchange's lock, the stored version of `record` must be in
///    `expected_state` and held in `expected_role`.
/// 3. `side_effect` runs on the stored version and returns the new payload.
/// 4. State and payload are updated together and the record is saved.
///
/// Nothing is written if step 1, 2 or 3 fails.
pub async fn attempt_transition<P, F, Fut>(
    repo: &ExchangeRepository,
    record: ExchangeRecord<P>,
    expected_state: P::State,
    expected_role: P::Role,
    next: P::State,
    side_effect: F,
) -> Result<ExchangeRecord<P>>
where
    P: Protocol,
    F: FnOnce(ExchangeRecord<P>) -> Fut,
    Fut: Future<Output = Result<P::Payload>>,
{
    if !expected_state.can_transition_to(&next) {
        return Err(PdsError::InvalidTransition {
            from: expected_state.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }

    let _lock = repo.lock_exchange::<P>(&record.id).await;
    let mut record: ExchangeRecord<P> = repo.get(&record.id).await?;

    if let Err(e) = record.ensure(expected_state, expected_role) {
        warn!(protocol = P::NAME, id = %record.id, error = %e, "Exchange step rejected");
        return Err(e);
    }

    let payload = side_effect(record.clone()).await?;

    record.payload = payload;
    record.advance(next)?;
    repo.save(&record).await?;

    info!(
        protocol = P::NAME,
        id = %record.id,
        thread_id = %record.thread_id,
        state = next.as_str(),
        "Exchange advanced"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pds_core::{Dri, Initiator, Issuance, IssuancePayload, IssuanceRole, IssuanceState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn repo() -> ExchangeRepository {
        ExchangeRepository::new(Arc::new(MemoryStore::new()))
    }

    fn holder_record() -> ExchangeRecord<Issuance> {
        ExchangeRecord::new(
            "conn-1",
            "thread-1",
            Initiator::Local,
            IssuanceRole::Holder,
            IssuanceState::RequestSent,
            IssuancePayload::default(),
        )
    }

    fn with_credential(record: ExchangeRecord<Issuance>) -> IssuancePayload {
        IssuancePayload {
            credential_dri: Some(Dri::encode_str("credential")),
            ..record.payload
        }
    }

    #[tokio::test]
    async fn test_successful_step_persists() {
        let repo = repo();
        let record = holder_record();
        repo.save(&record).await.unwrap();

        let advanced = attempt_transition(
            &repo,
            record.clone(),
            IssuanceState::RequestSent,
            IssuanceRole::Holder,
            IssuanceState::Issued,
            |r| async move { Ok(with_credential(r)) },
        )
        .await
        .unwrap();

        assert_eq!(advanced.state, IssuanceState::Issued);
        let stored: ExchangeRecord<Issuance> = repo.get(&record.id).await.unwrap();
        assert_eq!(stored, advanced);
        assert!(stored.payload.credential_dri.is_some());
    }

    #[tokio::test]
    async fn test_rejected_guard_skips_side_effect() {
        let repo = repo();
        let record = holder_record();
        repo.save(&record).await.unwrap();
        let calls = AtomicUsize::new(0);

        let err = attempt_transition(
            &repo,
            record.clone(),
            IssuanceState::RequestSent,
            IssuanceRole::Issuer,
            IssuanceState::Issued,
            |r| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(r.payload) }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PdsError::InvalidRole { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(repo.get::<Issuance>(&record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_failed_side_effect_leaves_record() {
        let repo = repo();
        let record = holder_record();
        repo.save(&record).await.unwrap();

        let err = attempt_transition(
            &repo,
            record.clone(),
            IssuanceState::RequestSent,
            IssuanceRole::Holder,
            IssuanceState::Issued,
            |_| async { Err(PdsError::Collaborator("holder offline".into())) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PdsError::Collaborator(_)));
        assert_eq!(repo.get::<Issuance>(&record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_concurrent_steps_run_one_side_effect() {
        let repo = repo();
        let record = holder_record();
        repo.save(&record).await.unwrap();
        let calls = AtomicUsize::new(0);

        let step = |r: ExchangeRecord<Issuance>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::task::yield_now().await;
                Ok(with_credential(r))
            }
        };
        let (first, second) = tokio::join!(
            attempt_transition(
                &repo,
                record.clone(),
                IssuanceState::RequestSent,
                IssuanceRole::Holder,
                IssuanceState::Issued,
                step,
            ),
            attempt_transition(
                &repo,
                record.clone(),
                IssuanceState::RequestSent,
                IssuanceRole::Holder,
                IssuanceState::Issued,
                step,
            ),
        );

        assert!(first.is_ok());
        assert_eq!(
            second.unwrap_err(),
            PdsError::InvalidState {
                expected: "request_sent".into(),
                actual: "issued".into(),
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(repo.get::<Issuance>(&record.id).await.unwrap().state, IssuanceState::Issued);
    }

    #[tokio::test]
    async fn test_stale_snapshot_checked_against_store() {
        let repo = repo();
        let record = holder_record();
        repo.save(&record).await.unwrap();

        let mut issued = record.clone();
        issued.advance(IssuanceState::Issued).unwrap();
        repo.save(&issued).await.unwrap();

        let err = attempt_transition(
            &repo,
            record,
            IssuanceState::RequestSent,
            IssuanceRole::Holder,
            IssuanceState::Issued,
            |r| async move { Ok(r.payload) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PdsError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_edge_outside_table_rejected() {
        let repo = repo();
        let record = holder_record();

        let err = attempt_transition(
            &repo,
            record,
            IssuanceState::RequestSent,
            IssuanceRole::Holder,
            IssuanceState::RequestSent,
            |r| async move { Ok(r.payload) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PdsError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_find_by_thread_respects_role() {
        let repo = repo();
        let record = holder_record();
        repo.save(&record).await.unwrap();

        let found = repo
            .find_by_thread::<Issuance>("thread-1", IssuanceRole::Holder)
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(record.id));

        assert!(repo
            .find_by_thread::<Issuance>("thread-1", IssuanceRole::Issuer)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let err = repo().get::<Issuance>("nope").await.unwrap_err();
        assert!(matches!(err, PdsError::NotFound(_)));
    }
}
