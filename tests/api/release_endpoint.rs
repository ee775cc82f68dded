use crate::helpers::{
    count_rows, insert_newsletter, insert_subscriber, spawn_app, subscriber, test_newsletter,
};
use chrono::{DateTime, Duration, Utc};
use inkwell::domain::Newsletter;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

/// Three verified and two unverified subscribers, the verified ones returned.
async fn seed_audience(pool: &PgPool) -> Vec<inkwell::domain::Subscriber> {
    let start = Utc::now() - Duration::days(10);
    let mut verified = Vec::new();
    for i in 0..3 {
        let s = subscriber(&format!("reader{i}@example.com"), start + Duration::minutes(i), true);
        insert_subscriber(pool, &s).await;
        verified.push(s);
    }
    for i in 0..2 {
        let s = subscriber(&format!("pending{i}@example.com"), start, false);
        insert_subscriber(pool, &s).await;
    }
    verified
}

async fn release_state(pool: &PgPool, newsletter_id: Uuid) -> (bool, Option<DateTime<Utc>>) {
    sqlx::query_as("SELECT released, released_at FROM newsletters WHERE id = $1")
        .bind(newsletter_id)
        .fetch_one(pool)
        .await
        .expect("Failed to fetch the newsletter.")
}

#[tokio::test]
async fn releasing_a_newsletter_enqueues_one_email_per_verified_subscriber() {
    // Arrange
    let app = spawn_app().await;
    let newsletter = test_newsletter();
    insert_newsletter(&app.db_pool, &newsletter).await;
    let verified = seed_audience(&app.db_pool).await;

    // Act
    let response = app.post_release(&newsletter.id.to_string()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.expect("Failed to read the response body.");
    assert!(body.contains(r#""jobs_scheduled":3"#));

    let recipients: Vec<(String,)> =
        sqlx::query_as("SELECT recipient FROM scheduled_email_jobs ORDER BY scheduled_at")
            .fetch_all(&app.db_pool)
            .await
            .expect("Failed to fetch scheduled jobs.");
    let recipients: Vec<String> = recipients.into_iter().map(|(r,)| r).collect();
    let expected: Vec<String> = verified.iter().map(|s| s.email.clone()).collect();
    assert_eq!(recipients, expected);

    let tokens: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT subscriber_id, scope FROM subscriber_tokens")
            .fetch_all(&app.db_pool)
            .await
            .expect("Failed to fetch subscriber tokens.");
    assert_eq!(tokens.len(), 3);
    let owners: HashSet<Uuid> = tokens.iter().map(|(id, _)| *id).collect();
    let expected: HashSet<Uuid> = verified.iter().map(|s| s.id).collect();
    assert_eq!(owners, expected);
    assert!(tokens.iter().all(|(_, scope)| scope == "unsubscribe"));

    let (released, released_at) = release_state(&app.db_pool, newsletter.id).await;
    assert!(released);
    assert!(released_at.is_some());
}

#[tokio::test]
async fn releasing_the_same_newsletter_twice_returns_a_409() {
    // Arrange
    let app = spawn_app().await;
    let newsletter = test_newsletter();
    insert_newsletter(&app.db_pool, &newsletter).await;
    seed_audience(&app.db_pool).await;
    let first = app.post_release(&newsletter.id.to_string()).await;
    assert_eq!(first.status().as_u16(), 200);

    // Act
    let second = app.post_release(&newsletter.id.to_string()).await;

    // Assert
    assert_eq!(second.status().as_u16(), 409);
    assert_eq!(count_rows(&app.db_pool, "scheduled_email_jobs").await, 3);
    assert_eq!(count_rows(&app.db_pool, "subscriber_tokens").await, 3);
}

#[tokio::test]
async fn releasing_an_unknown_newsletter_returns_a_404() {
    // Arrange
    let app = spawn_app().await;
    seed_audience(&app.db_pool).await;

    // Act
    let response = app.post_release(&Uuid::new_v4().to_string()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(count_rows(&app.db_pool, "scheduled_email_jobs").await, 0);
}

#[tokio::test]
async fn an_incomplete_newsletter_is_rejected_with_a_400_and_nothing_is_written() {
    // Arrange
    let app = spawn_app().await;
    let draft = Newsletter::new("Launch", "", "").expect("Failed to build a draft newsletter.");
    insert_newsletter(&app.db_pool, &draft).await;
    seed_audience(&app.db_pool).await;

    // Act
    let response = app.post_release(&draft.id.to_string()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    let body = response.text().await.expect("Failed to read the response body.");
    assert!(body.contains("Content"));
    assert_eq!(count_rows(&app.db_pool, "scheduled_email_jobs").await, 0);
    assert_eq!(count_rows(&app.db_pool, "subscriber_tokens").await, 0);
    let (released, released_at) = release_state(&app.db_pool, draft.id).await;
    assert!(!released);
    assert!(released_at.is_none());
}

#[tokio::test]
async fn a_release_failing_midway_leaves_no_rows_behind_and_can_be_retried() {
    // Arrange
    let app = spawn_app().await;
    let newsletter = test_newsletter();
    insert_newsletter(&app.db_pool, &newsletter).await;
    seed_audience(&app.db_pool).await;
    // Tokens go in fine, the batch of jobs is rejected.
    sqlx::query("ALTER TABLE scheduled_email_jobs ADD CONSTRAINT reject_all CHECK (false)")
        .execute(&app.db_pool)
        .await
        .expect("Failed to add the constraint.");

    // Act
    let response = app.post_release(&newsletter.id.to_string()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(count_rows(&app.db_pool, "scheduled_email_jobs").await, 0);
    assert_eq!(count_rows(&app.db_pool, "subscriber_tokens").await, 0);
    let (released, _) = release_state(&app.db_pool, newsletter.id).await;
    assert!(!released);

    sqlx::query("ALTER TABLE scheduled_email_jobs DROP CONSTRAINT reject_all")
        .execute(&app.db_pool)
        .await
        .expect("Failed to drop the constraint.");
    let retry = app.post_release(&newsletter.id.to_string()).await;
    assert_eq!(retry.status().as_u16(), 200);
    assert_eq!(count_rows(&app.db_pool, "scheduled_email_jobs").await, 3);
}
