//! Newsletter releases: fan-out of one newsletter to every verified subscriber, paced over days.
mod pacing;
mod postgres;
mod scheduler;
mod store;

pub use pacing::{SendPacing, MAX_GAP_MINUTES, MIN_GAP_MINUTES};
pub use postgres::{PgJobQueue, PgReleaseStore};
pub use scheduler::{NewsletterReleaseScheduler, ReleaseError, ReleasePolicy, ReleaseSummary};
pub use store::{JobQueue, PersistenceError, ReleaseStore, ScheduledEmailJob};
