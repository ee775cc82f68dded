use crate::configuration::{CleanupSettings, Settings};
use crate::startup::get_connection_pool;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

/// Subscribers who never verified their address are forgotten once they are older than
/// `unverified_max_age_hours`.
pub fn cutoff(now: DateTime<Utc>, settings: &CleanupSettings) -> DateTime<Utc> {
    now - Duration::hours(settings.unverified_max_age_hours.max(0))
}

#[tracing::instrument(name = "Delete unverified subscribers", skip(pool), fields(deleted = tracing::field::Empty))]
pub async fn delete_unverified_subscribers(
    pool: &PgPool,
    subscribed_before: DateTime<Utc>,
) -> Result<u64, anyhow::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM subscribers
        WHERE is_verified = false AND subscribed_at < $1
        "#,
    )
    .bind(subscribed_before)
    .execute(pool)
    .await
    .context("Failed to delete unverified subscribers")?;

    let deleted = result.rows_affected();
    tracing::Span::current().record("deleted", deleted);
    Ok(deleted)
}

async fn worker_loop(pool: PgPool, settings: CleanupSettings) -> Result<(), anyhow::Error> {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(settings.interval_seconds.max(1)));
    loop {
        interval.tick().await;
        if let Err(e) = delete_unverified_subscribers(&pool, cutoff(Utc::now(), &settings)).await {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "Failed to clean up unverified subscribers"
            );
        }
    }
}

/// Runs the cleanup on a fixed interval. Only returns if the worker itself fails; a failed
/// sweep is logged and retried at the next tick.
pub async fn run_worker_until_stopped(configuration: Settings) -> Result<(), anyhow::Error> {
    let pool = get_connection_pool(&configuration.database);
    worker_loop(pool, configuration.cleanup).await
}
