use crate::domain::{Newsletter, Subscriber};
use crate::release::{JobQueue, PersistenceError, ReleaseStore, ScheduledEmailJob};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub struct PgReleaseStore {
    pool: PgPool,
}

impl PgReleaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NewsletterRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    title: String,
    content: String,
    released_at: Option<DateTime<Utc>>,
    released: bool,
    associated_article_slug: String,
}

impl From<NewsletterRow> for Newsletter {
    fn from(row: NewsletterRow) -> Self {
        Newsletter {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            title: row.title,
            content: row.content,
            released_at: row.released_at,
            released: row.released,
            associated_article_slug: row.associated_article_slug,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriberRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    email: String,
    subscribed_at: DateTime<Utc>,
    referer: String,
    is_verified: bool,
}

impl From<SubscriberRow> for Subscriber {
    fn from(row: SubscriberRow) -> Self {
        Subscriber {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            email: row.email,
            subscribed_at: row.subscribed_at,
            referer: row.referer,
            is_verified: row.is_verified,
        }
    }
}

#[async_trait]
impl ReleaseStore for PgReleaseStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, PersistenceError> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to acquire a Postgres connection from the pool")?;
        Ok(tx)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), PersistenceError> {
        tx.commit()
            .await
            .context("Failed to commit SQL transaction to schedule a newsletter release")?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), PersistenceError> {
        tx.rollback()
            .await
            .context("Failed to roll back SQL transaction")?;
        Ok(())
    }

    #[tracing::instrument(name = "Get newsletter", skip(self, tx))]
    async fn get_newsletter(
        &self,
        tx: &mut Self::Tx,
        newsletter_id: Uuid,
    ) -> Result<Option<Newsletter>, PersistenceError> {
        let row = sqlx::query_as::<_, NewsletterRow>(
            r#"
            SELECT id, created_at, updated_at, title, content, released_at, released,
                   associated_article_slug
            FROM newsletters
            WHERE id = $1
            "#,
        )
        .bind(newsletter_id)
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to perform a query to retrieve a newsletter")?;

        Ok(row.map(Newsletter::from))
    }

    #[tracing::instrument(name = "Claim newsletter release", skip(self, tx))]
    async fn claim_release(
        &self,
        tx: &mut Self::Tx,
        newsletter_id: Uuid,
        released_at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let result = sqlx::query(
            r#"
            UPDATE newsletters
            SET released = true,
                released_at = $2,
                updated_at = $2,
                release_scheduled_at = now()
            WHERE id = $1 AND released = false AND release_scheduled_at IS NULL
            "#,
        )
        .bind(newsletter_id)
        .bind(released_at)
        .execute(&mut **tx)
        .await
        .context("Failed to claim the newsletter release")?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Get verified subscribers", skip(self, tx))]
    async fn list_verified_subscribers(
        &self,
        tx: &mut Self::Tx,
    ) -> Result<Vec<Subscriber>, PersistenceError> {
        let rows = sqlx::query_as::<_, SubscriberRow>(
            r#"
            SELECT id, created_at, updated_at, email, subscribed_at, referer, is_verified
            FROM subscribers
            WHERE is_verified = true
            ORDER BY subscribed_at, id
            "#,
        )
        .fetch_all(&mut **tx)
        .await
        .context("Failed to perform a query to retrieve verified subscribers")?;

        Ok(rows.into_iter().map(Subscriber::from).collect())
    }
}

/// Stores delivery jobs in `scheduled_email_jobs`; the delivery worker picks them up once
/// `scheduled_at` has passed.
pub struct PgJobQueue;

#[async_trait]
impl JobQueue<Transaction<'static, Postgres>> for PgJobQueue {
    #[tracing::instrument(name = "Enqueue newsletter emails", skip_all, fields(jobs = jobs.len()))]
    async fn insert_batch(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        jobs: Vec<ScheduledEmailJob>,
    ) -> Result<(), PersistenceError> {
        if jobs.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(jobs.len());
        let mut recipients = Vec::with_capacity(jobs.len());
        let mut senders = Vec::with_capacity(jobs.len());
        let mut subjects = Vec::with_capacity(jobs.len());
        let mut html_bodies = Vec::with_capacity(jobs.len());
        let mut text_bodies = Vec::with_capacity(jobs.len());
        let mut scheduled_ats = Vec::with_capacity(jobs.len());
        for job in jobs {
            ids.push(Uuid::new_v4());
            recipients.push(job.to);
            senders.push(job.from);
            subjects.push(job.subject);
            html_bodies.push(job.html_body);
            text_bodies.push(job.text_body);
            scheduled_ats.push(job.scheduled_at);
        }

        sqlx::query(
            r#"
            INSERT INTO scheduled_email_jobs
                (id, recipient, sender, subject, html_body, text_body, scheduled_at)
            SELECT * FROM UNNEST(
                $1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[],
                $7::timestamptz[]
            )
            "#,
        )
        .bind(ids)
        .bind(recipients)
        .bind(senders)
        .bind(subjects)
        .bind(html_bodies)
        .bind(text_bodies)
        .bind(scheduled_ats)
        .execute(&mut **tx)
        .await
        .context("Failed to enqueue newsletter delivery jobs")?;

        Ok(())
    }
}
