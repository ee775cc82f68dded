use crate::domain::NewsletterError;
use crate::emails::{EmailRenderer, NewsletterEmail, TemplateError, NEWSLETTER_TEMPLATE};
use crate::release::{JobQueue, PersistenceError, ReleaseStore, ScheduledEmailJob, SendPacing};
use crate::tokens::{NewToken, TokenIssuer, TokenScope};
use crate::utils::error_chain_fmt;
use crate::validation::ValidationErrorSet;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use secrecy::ExposeSecret;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(thiserror::Error)]
pub enum ReleaseError {
    #[error("newsletter {0} does not exist")]
    NotFound(Uuid),
    #[error("the release of newsletter {0} has already been scheduled")]
    AlreadyScheduled(Uuid),
    #[error("newsletter {0} is not ready to be released")]
    Incomplete(Uuid, #[source] ValidationErrorSet),
    #[error("the release policy is invalid: {0}")]
    InvalidPolicy(String),
    #[error("Failed to schedule the release because of a database error")]
    Persistence(#[from] PersistenceError),
    #[error("Failed to render the newsletter email")]
    Template(#[from] TemplateError),
    #[error("scheduling the release did not complete within {0:?}")]
    Timeout(std::time::Duration),
}

impl std::fmt::Debug for ReleaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// The knobs of a release: how fast emails go out, how long unsubscribe links stay valid, how long
/// the whole fan-out may take, and what the emails look like from the outside.
#[derive(Debug, Clone)]
pub struct ReleasePolicy {
    pub emails_per_day: u32,
    pub unsubscribe_token_ttl: Duration,
    pub timeout: std::time::Duration,
    pub sender: String,
    pub subject: String,
    pub base_url: String,
    pub unsubscribe_path: String,
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self {
            emails_per_day: 50,
            unsubscribe_token_ttl: Duration::days(365),
            timeout: std::time::Duration::from_secs(5 * 60),
            sender: "newsletter@localhost".to_string(),
            subject: "newsletter".to_string(),
            base_url: "http://127.0.0.1:8000".to_string(),
            unsubscribe_path: "/subscriptions/unsubscribe".to_string(),
        }
    }
}

impl ReleasePolicy {
    pub fn unsubscribe_link(&self, plaintext_token: &str, email: &str) -> String {
        format!(
            "{}{}?token={}&email={}",
            self.base_url,
            self.unsubscribe_path,
            urlencoding::encode(plaintext_token),
            urlencoding::encode(email),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub newsletter_id: Uuid,
    pub jobs_scheduled: usize,
    pub gap_minutes: u32,
    pub first_send_at: Option<DateTime<Utc>>,
    pub last_send_at: Option<DateTime<Utc>>,
}

/// Fans a newsletter release out to every verified subscriber, all-or-nothing.
///
/// A run opens one transaction and, inside it, reads the newsletter, checks it is complete enough
/// to go out, marks it released, reads the verified subscribers, issues one unsubscribe token per
/// subscriber, renders a personalised email for each and inserts the whole batch of delivery jobs. Only a run that finished every
/// step commits; any error, or running past `ReleasePolicy::timeout`, rolls everything back.
pub struct NewsletterReleaseScheduler<S: ReleaseStore> {
    store: S,
    tokens: Arc<dyn TokenIssuer<S::Tx>>,
    queue: Arc<dyn JobQueue<S::Tx>>,
    renderer: Arc<dyn EmailRenderer>,
    policy: ReleasePolicy,
    rng: Mutex<StdRng>,
}

impl<S: ReleaseStore> NewsletterReleaseScheduler<S> {
    pub fn new(
        store: S,
        tokens: Arc<dyn TokenIssuer<S::Tx>>,
        queue: Arc<dyn JobQueue<S::Tx>>,
        renderer: Arc<dyn EmailRenderer>,
        policy: ReleasePolicy,
    ) -> Self {
        Self {
            store,
            tokens,
            queue,
            renderer,
            policy,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Pins the gap generator, so runs are reproducible in tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn policy(&self) -> &ReleasePolicy {
        &self.policy
    }

    #[tracing::instrument(
        name = "Schedule newsletter release",
        skip(self),
        fields(subscriber_count = tracing::field::Empty)
    )]
    pub async fn schedule(&self, newsletter_id: Uuid) -> Result<ReleaseSummary, ReleaseError> {
        let mut tx = self.store.begin().await?;

        let outcome =
            tokio::time::timeout(self.policy.timeout, self.fan_out(&mut tx, newsletter_id)).await;

        match outcome {
            Ok(Ok(summary)) => {
                self.store.commit(tx).await?;
                tracing::info!(
                    jobs_scheduled = summary.jobs_scheduled,
                    gap_minutes = summary.gap_minutes,
                    "Newsletter release scheduled"
                );
                Ok(summary)
            }
            Ok(Err(e)) => {
                self.abort(tx).await;
                Err(e)
            }
            Err(_) => {
                self.abort(tx).await;
                Err(ReleaseError::Timeout(self.policy.timeout))
            }
        }
    }

    /// Rolls back after a failed run. A rollback error is logged, never returned.
    async fn abort(&self, tx: S::Tx) {
        if let Err(e) = self.store.rollback(tx).await {
            tracing::error!(error.cause_chain = ?e, "Failed to roll back a newsletter release");
        }
    }

    async fn fan_out(
        &self,
        tx: &mut S::Tx,
        newsletter_id: Uuid,
    ) -> Result<ReleaseSummary, ReleaseError> {
        let now = Utc::now();
        let newsletter = self
            .store
            .get_newsletter(tx, newsletter_id)
            .await?
            .ok_or(ReleaseError::NotFound(newsletter_id))?
            .release(now)
            .map_err(|e| match e {
                NewsletterError::AlreadyReleased(id) => ReleaseError::AlreadyScheduled(id),
                NewsletterError::Invalid(errors) => ReleaseError::Incomplete(newsletter_id, errors),
            })?;
        if !self.store.claim_release(tx, newsletter_id, now).await? {
            return Err(ReleaseError::AlreadyScheduled(newsletter_id));
        }
        let subscribers = self.store.list_verified_subscribers(tx).await?;
        tracing::Span::current().record("subscriber_count", subscribers.len() as u64);

        let expires_at = now
            .checked_add_signed(self.policy.unsubscribe_token_ttl)
            .ok_or_else(|| {
                ReleaseError::InvalidPolicy(format!(
                    "an unsubscribe token ttl of {:?} overflows the calendar",
                    self.policy.unsubscribe_token_ttl
                ))
            })?;
        let pacing = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            SendPacing::random(now, self.policy.emails_per_day, &mut *rng)
        };
        let paragraphs = newsletter.paragraphs();

        let mut jobs = Vec::with_capacity(subscribers.len());
        for (i, subscriber) in subscribers.iter().enumerate() {
            let token = self
                .tokens
                .issue_token(
                    tx,
                    NewToken {
                        expires_at,
                        scope: TokenScope::Unsubscribe,
                        subject_id: subscriber.id,
                    },
                )
                .await
                .map_err(|e| {
                    tracing::error!(
                        error.cause_chain = ?e,
                        subscriber_id = %subscriber.id,
                        subscribers_attempted = i + 1,
                        subscriber_count = subscribers.len(),
                        "Failed to issue an unsubscribe token"
                    );
                    e
                })?;

            let unsubscribe_link = self
                .policy
                .unsubscribe_link(token.plaintext.expose_secret(), &subscriber.email);
            let context = NewsletterEmail {
                title: &newsletter.title,
                paragraphs: &paragraphs,
                unsubscribe_link: &unsubscribe_link,
            }
            .context()?;
            let email = self.renderer.render(NEWSLETTER_TEMPLATE, &context)?;

            jobs.push(ScheduledEmailJob {
                to: subscriber.email.clone(),
                from: self.policy.sender.clone(),
                subject: self.policy.subject.clone(),
                html_body: email.html,
                text_body: email.text,
                scheduled_at: pacing.scheduled_at(i),
            });
        }

        let summary = ReleaseSummary {
            newsletter_id,
            jobs_scheduled: jobs.len(),
            gap_minutes: pacing.gap_minutes(),
            first_send_at: jobs.first().map(|j| j.scheduled_at),
            last_send_at: jobs.last().map(|j| j.scheduled_at),
        };
        self.queue.insert_batch(tx, jobs).await?;

        Ok(summary)
    }
}
