use crate::domain::{Newsletter, Subscriber};
use crate::utils::error_chain_fmt;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A database failure: connection, query or transaction. Retrying is up to the caller's policy.
#[derive(thiserror::Error)]
#[error(transparent)]
pub struct PersistenceError(#[from] anyhow::Error);

impl std::fmt::Debug for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// One email, ready to be handed to the delivery worker at `scheduled_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEmailJob {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub scheduled_at: DateTime<Utc>,
}

/// The transactional reads and writes a release needs.
///
/// Everything a release touches goes through a single `Tx`: nothing becomes visible to other
/// transactions before `commit`, and `rollback` (or dropping the transaction) discards it all.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    type Tx: Send + 'static;

    async fn begin(&self) -> Result<Self::Tx, PersistenceError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), PersistenceError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), PersistenceError>;

    async fn get_newsletter(
        &self,
        tx: &mut Self::Tx,
        newsletter_id: Uuid,
    ) -> Result<Option<Newsletter>, PersistenceError>;

    /// Marks the newsletter as released at `released_at` and its release as scheduled. Returns
    /// `false` if it already was.
    async fn claim_release(
        &self,
        tx: &mut Self::Tx,
        newsletter_id: Uuid,
        released_at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Verified subscribers, oldest subscription first (ties broken by id).
    async fn list_verified_subscribers(
        &self,
        tx: &mut Self::Tx,
    ) -> Result<Vec<Subscriber>, PersistenceError>;
}

/// Accepts batches of scheduled send-email jobs inside a caller-owned transaction.
#[async_trait]
pub trait JobQueue<Tx: Send>: Send + Sync {
    async fn insert_batch(
        &self,
        tx: &mut Tx,
        jobs: Vec<ScheduledEmailJob>,
    ) -> Result<(), PersistenceError>;
}
