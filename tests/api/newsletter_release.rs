use crate::helpers::{
    build_scheduler, build_scheduler_with_renderer, default_scheduler, get_link, query_param,
    test_hasher, test_newsletter, FailingEmailRenderer, InMemoryJobQueue, InMemoryStore,
    InMemoryTokenIssuer,
};
use chrono::{Duration, Utc};
use claims::{assert_err, assert_none, assert_ok, assert_some};
use inkwell::domain::Newsletter;
use inkwell::release::{ReleaseError, ReleasePolicy, MAX_GAP_MINUTES, MIN_GAP_MINUTES};
use inkwell::tokens::TokenScope;
use inkwell::validation::ErrorKind;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn a_release_schedules_one_email_per_verified_subscriber() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    let verified = store.add_subscribers(3, true);
    store.add_subscribers(2, false);
    let scheduler = default_scheduler(store.clone());

    // Act
    let summary = assert_ok!(scheduler.schedule(newsletter_id).await);

    // Assert
    assert_eq!(summary.newsletter_id, newsletter_id);
    assert_eq!(summary.jobs_scheduled, 3);

    let state = store.state();
    let recipients: Vec<&str> = state.jobs.iter().map(|j| j.to.as_str()).collect();
    let expected: Vec<&str> = verified.iter().map(|s| s.email.as_str()).collect();
    assert_eq!(recipients, expected);

    let policy = ReleasePolicy::default();
    for job in &state.jobs {
        assert_eq!(job.from, policy.sender);
        assert_eq!(job.subject, policy.subject);
        assert!(job.text_body.contains("A second paragraph."));
        assert!(job.html_body.contains("<h1>Launch</h1>"));
    }

    assert_eq!(state.tokens.len(), 3);
    let hashes: HashSet<&str> = state.tokens.iter().map(|t| t.hash.as_str()).collect();
    assert_eq!(hashes.len(), 3);
    for (token, subscriber) in state.tokens.iter().zip(&verified) {
        assert_eq!(token.scope, TokenScope::Unsubscribe);
        assert_eq!(token.subscriber_id, subscriber.id);
        assert!(token.expires_at > Utc::now() + Duration::days(364));
    }
}

#[tokio::test]
async fn send_times_are_spaced_by_a_single_gap() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(10, true);
    let scheduler = default_scheduler(store.clone());

    // Act
    let summary = assert_ok!(scheduler.schedule(newsletter_id).await);

    // Assert
    assert!((MIN_GAP_MINUTES..=MAX_GAP_MINUTES).contains(&summary.gap_minutes));
    let state = store.state();
    for pair in state.jobs.windows(2) {
        let delta = pair[1].scheduled_at - pair[0].scheduled_at;
        assert_eq!(delta, Duration::minutes(summary.gap_minutes.into()));
    }
    assert_eq!(summary.first_send_at, state.jobs.first().map(|j| j.scheduled_at));
    assert_eq!(summary.last_send_at, state.jobs.last().map(|j| j.scheduled_at));
}

#[tokio::test]
async fn a_large_audience_is_spread_over_several_days() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(120, true);
    let scheduler = default_scheduler(store.clone());

    // Act
    let summary = assert_ok!(scheduler.schedule(newsletter_id).await);

    // Assert
    assert_eq!(summary.jobs_scheduled, 120);
    let state = store.state();
    let first = state.jobs[0].scheduled_at;
    let days: Vec<i64> = state
        .jobs
        .iter()
        .map(|j| (j.scheduled_at - first).num_days())
        .collect();
    assert_eq!(days.iter().filter(|d| **d == 0).count(), 50);
    assert_eq!(days.iter().filter(|d| **d == 1).count(), 50);
    assert_eq!(days.iter().filter(|d| **d == 2).count(), 20);
    assert_eq!(state.jobs[50].scheduled_at, first + Duration::days(1));
    assert_eq!(state.jobs[100].scheduled_at, first + Duration::days(2));
}

#[tokio::test]
async fn a_failing_token_issue_rolls_the_whole_release_back() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(5, true);
    let scheduler = build_scheduler(
        store.clone(),
        InMemoryTokenIssuer::failing_at(3),
        InMemoryJobQueue::default(),
        ReleasePolicy::default(),
    );

    // Act
    let outcome = scheduler.schedule(newsletter_id).await;

    // Assert
    assert!(matches!(assert_err!(outcome), ReleaseError::Persistence(_)));
    {
        let state = store.state();
        assert!(state.jobs.is_empty());
        assert!(state.tokens.is_empty());
        assert!(state.claimed.is_empty());
    }

    // The claim was rolled back too, so a later run goes through.
    let retry = default_scheduler(store.clone());
    let summary = assert_ok!(retry.schedule(newsletter_id).await);
    assert_eq!(summary.jobs_scheduled, 5);
}

#[tokio::test]
async fn releasing_an_unknown_newsletter_fails_with_not_found() {
    // Arrange
    let store = InMemoryStore::default();
    store.add_subscribers(2, true);
    let scheduler = default_scheduler(store.clone());
    let unknown = Uuid::new_v4();

    // Act
    let outcome = scheduler.schedule(unknown).await;

    // Assert
    match assert_err!(outcome) {
        ReleaseError::NotFound(id) => assert_eq!(id, unknown),
        other => panic!("expected NotFound, got {:?}", other),
    }
    assert!(store.state().jobs.is_empty());
}

#[tokio::test]
async fn a_release_can_only_be_scheduled_once() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(3, true);
    let scheduler = default_scheduler(store.clone());
    assert_ok!(scheduler.schedule(newsletter_id).await);

    // Act
    let second = scheduler.schedule(newsletter_id).await;

    // Assert
    assert!(matches!(
        assert_err!(second),
        ReleaseError::AlreadyScheduled(id) if id == newsletter_id
    ));
    let state = store.state();
    assert_eq!(state.jobs.len(), 3);
    assert_eq!(state.tokens.len(), 3);
}

#[tokio::test]
async fn a_release_that_runs_past_the_timeout_is_rolled_back() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(3, true);
    let policy = ReleasePolicy {
        timeout: std::time::Duration::from_millis(50),
        ..ReleasePolicy::default()
    };
    let scheduler = build_scheduler(
        store.clone(),
        InMemoryTokenIssuer::new(),
        InMemoryJobQueue::slow(std::time::Duration::from_secs(2)),
        policy,
    );

    // Act
    let outcome = scheduler.schedule(newsletter_id).await;

    // Assert
    assert!(matches!(assert_err!(outcome), ReleaseError::Timeout(_)));
    let state = store.state();
    assert!(state.jobs.is_empty());
    assert!(state.tokens.is_empty());
    assert!(state.claimed.is_empty());
}

#[tokio::test]
async fn a_release_without_verified_subscribers_schedules_nothing() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(2, false);
    let scheduler = default_scheduler(store.clone());

    // Act
    let summary = assert_ok!(scheduler.schedule(newsletter_id).await);

    // Assert
    assert_eq!(summary.jobs_scheduled, 0);
    assert_none!(summary.first_send_at);
    assert_none!(summary.last_send_at);
    assert!(store.state().claimed.contains(&newsletter_id));
}

#[tokio::test]
async fn the_same_seed_draws_the_same_gap() {
    let mut gaps = Vec::new();
    for _ in 0..2 {
        let store = InMemoryStore::default();
        let newsletter_id = store.add_newsletter(test_newsletter());
        store.add_subscribers(4, true);
        let scheduler = default_scheduler(store).with_seed(7);

        let summary = assert_ok!(scheduler.schedule(newsletter_id).await);
        gaps.push(summary.gap_minutes);
    }

    assert_eq!(gaps[0], gaps[1]);
}

#[tokio::test]
async fn every_email_carries_its_own_unsubscribe_link() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    let verified = store.add_subscribers(2, true);
    let scheduler = default_scheduler(store.clone());
    let hasher = test_hasher();

    // Act
    assert_ok!(scheduler.schedule(newsletter_id).await);

    // Assert
    let state = store.state();
    for ((job, token), subscriber) in state.jobs.iter().zip(&state.tokens).zip(&verified) {
        let link = get_link(&job.text_body);
        assert!(link.starts_with("http://127.0.0.1:8000/subscriptions/unsubscribe?"));
        assert!(job.html_body.contains(&link));

        let email = assert_some!(query_param(&link, "email"));
        assert_eq!(email, subscriber.email);
        let plaintext = assert_some!(query_param(&link, "token"));
        assert!(hasher.verify(&plaintext, &token.hash));
        assert_ne!(plaintext, token.hash);
    }
}

#[tokio::test]
async fn newsletter_content_is_escaped_in_the_html_body() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter = Newsletter::new("Rust & <friends>", "Hello <b>there</b>", "rust-friends")
        .expect("Failed to build a valid newsletter.");
    let newsletter_id = store.add_newsletter(newsletter);
    store.add_subscribers(1, true);
    let scheduler = default_scheduler(store.clone());

    // Act
    assert_ok!(scheduler.schedule(newsletter_id).await);

    // Assert
    let state = store.state();
    let html = &state.jobs[0].html_body;
    assert!(html.contains("Rust &amp; &lt;friends&gt;"));
    assert!(!html.contains("<b>there</b>"));
    assert!(state.jobs[0].text_body.contains("Hello <b>there</b>"));
}

#[tokio::test]
async fn a_scheduled_release_marks_the_newsletter_released() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(2, true);
    let scheduler = default_scheduler(store.clone());
    let before = Utc::now();

    // Act
    assert_ok!(scheduler.schedule(newsletter_id).await);

    // Assert
    let state = store.state();
    let newsletter = &state.newsletters[&newsletter_id];
    assert!(newsletter.released);
    let released_at = assert_some!(newsletter.released_at);
    assert!(released_at >= before && released_at <= Utc::now());
}

#[tokio::test]
async fn a_newsletter_without_content_is_not_released() {
    // Arrange
    let store = InMemoryStore::default();
    let draft = Newsletter::new("Launch", "", "").expect("Failed to build a draft newsletter.");
    let newsletter_id = store.add_newsletter(draft);
    store.add_subscribers(2, true);
    let scheduler = default_scheduler(store.clone());

    // Act
    let outcome = scheduler.schedule(newsletter_id).await;

    // Assert
    match assert_err!(outcome) {
        ReleaseError::Incomplete(id, errors) => {
            assert_eq!(id, newsletter_id);
            assert!(errors.contains("Content", ErrorKind::Required));
            assert!(errors.contains("ArticleSlug", ErrorKind::Required));
        }
        other => panic!("expected Incomplete, got {:?}", other),
    }
    let state = store.state();
    assert!(state.jobs.is_empty());
    assert!(state.tokens.is_empty());
    assert!(state.claimed.is_empty());
    let newsletter = &state.newsletters[&newsletter_id];
    assert!(!newsletter.released);
    assert_none!(newsletter.released_at);
}

#[tokio::test]
async fn an_already_released_newsletter_is_not_sent_again() {
    // Arrange
    let store = InMemoryStore::default();
    let released = test_newsletter()
        .release(Utc::now())
        .expect("Failed to release the newsletter.");
    let newsletter_id = store.add_newsletter(released);
    store.add_subscribers(2, true);
    let scheduler = default_scheduler(store.clone());

    // Act
    let outcome = scheduler.schedule(newsletter_id).await;

    // Assert
    assert!(matches!(
        assert_err!(outcome),
        ReleaseError::AlreadyScheduled(id) if id == newsletter_id
    ));
    assert!(store.state().jobs.is_empty());
}

#[tokio::test]
async fn a_failing_batch_insert_rolls_the_whole_release_back() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(4, true);
    let scheduler = build_scheduler(
        store.clone(),
        InMemoryTokenIssuer::new(),
        InMemoryJobQueue::failing(),
        ReleasePolicy::default(),
    );

    // Act
    let outcome = scheduler.schedule(newsletter_id).await;

    // Assert
    assert!(matches!(assert_err!(outcome), ReleaseError::Persistence(_)));
    let state = store.state();
    assert!(state.jobs.is_empty());
    assert!(state.tokens.is_empty());
    assert!(state.claimed.is_empty());
    assert!(!state.newsletters[&newsletter_id].released);
}

#[tokio::test]
async fn a_failing_render_rolls_the_whole_release_back() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(4, true);
    let scheduler = build_scheduler_with_renderer(
        store.clone(),
        InMemoryTokenIssuer::new(),
        InMemoryJobQueue::default(),
        Arc::new(FailingEmailRenderer),
        ReleasePolicy::default(),
    );

    // Act
    let outcome = scheduler.schedule(newsletter_id).await;

    // Assert
    match assert_err!(outcome) {
        ReleaseError::Template(e) => assert_eq!(e.template(), "newsletter"),
        other => panic!("expected Template, got {:?}", other),
    }
    let state = store.state();
    assert!(state.jobs.is_empty());
    assert!(state.tokens.is_empty());
    assert!(state.claimed.is_empty());
    assert!(!state.newsletters[&newsletter_id].released);
}

#[tokio::test]
async fn a_token_ttl_past_the_end_of_the_calendar_is_an_error() {
    // Arrange
    let store = InMemoryStore::default();
    let newsletter_id = store.add_newsletter(test_newsletter());
    store.add_subscribers(2, true);
    let policy = ReleasePolicy {
        unsubscribe_token_ttl: Duration::max_value(),
        ..ReleasePolicy::default()
    };
    let scheduler = build_scheduler(
        store.clone(),
        InMemoryTokenIssuer::new(),
        InMemoryJobQueue::default(),
        policy,
    );

    // Act
    let outcome = scheduler.schedule(newsletter_id).await;

    // Assert
    assert!(matches!(assert_err!(outcome), ReleaseError::InvalidPolicy(_)));
    let state = store.state();
    assert!(state.tokens.is_empty());
    assert!(state.claimed.is_empty());
}
