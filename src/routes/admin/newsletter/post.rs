use crate::release::{
    NewsletterReleaseScheduler, PgReleaseStore, ReleaseError, ReleaseSummary,
};
use crate::utils::error_chain_fmt;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use uuid::Uuid;

#[derive(thiserror::Error)]
#[error(transparent)]
pub struct ReleaseNewsletterError(#[from] ReleaseError);

impl std::fmt::Debug for ReleaseNewsletterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ReleaseNewsletterError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            ReleaseError::NotFound(_) => StatusCode::NOT_FOUND,
            ReleaseError::AlreadyScheduled(_) => StatusCode::CONFLICT,
            ReleaseError::Incomplete(_, _) => StatusCode::BAD_REQUEST,
            ReleaseError::InvalidPolicy(_)
            | ReleaseError::Persistence(_)
            | ReleaseError::Template(_)
            | ReleaseError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match &self.0 {
            // Field-level messages, so the dashboard can point at what is missing.
            ReleaseError::Incomplete(_, errors) => {
                HttpResponse::build(self.status_code()).json(errors.form_errors())
            }
            _ => HttpResponse::new(self.status_code()),
        }
    }
}

#[derive(serde::Serialize)]
struct ReleaseResponse {
    newsletter_id: Uuid,
    jobs_scheduled: usize,
    gap_minutes: u32,
    first_send_at: Option<String>,
    last_send_at: Option<String>,
}

impl From<ReleaseSummary> for ReleaseResponse {
    fn from(summary: ReleaseSummary) -> Self {
        Self {
            newsletter_id: summary.newsletter_id,
            jobs_scheduled: summary.jobs_scheduled,
            gap_minutes: summary.gap_minutes,
            first_send_at: summary.first_send_at.map(|t| t.to_rfc3339()),
            last_send_at: summary.last_send_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Schedules one email per verified subscriber. A release can only be scheduled once: repeated
/// calls get a `409 Conflict` and leave the queue untouched. A newsletter missing its content or
/// article slug gets a `400 Bad Request` listing the offending fields.
#[tracing::instrument(name = "Release a newsletter", skip_all, fields(newsletter_id = %*newsletter_id))]
pub async fn release_newsletter(
    newsletter_id: web::Path<Uuid>,
    scheduler: web::Data<NewsletterReleaseScheduler<PgReleaseStore>>,
) -> Result<HttpResponse, ReleaseNewsletterError> {
    let summary = scheduler.schedule(newsletter_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ReleaseResponse::from(summary)))
}
