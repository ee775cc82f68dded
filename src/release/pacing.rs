use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const MIN_GAP_MINUTES: u32 = 1;
pub const MAX_GAP_MINUTES: u32 = 4;

/// Spreads the emails of one release over time.
///
/// Emails are grouped in pages of `emails_per_day`: email `i` goes out `i / emails_per_day` days
/// after `start`, offset by `(i % emails_per_day) * gap_minutes` minutes within its day.
///
/// The gap is drawn once per release and shared by every email of that release, it is not
/// re-drawn per subscriber or per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendPacing {
    start: DateTime<Utc>,
    gap_minutes: u32,
    emails_per_day: u32,
}

impl SendPacing {
    pub fn new(start: DateTime<Utc>, gap_minutes: u32, emails_per_day: u32) -> Self {
        Self {
            start,
            gap_minutes,
            emails_per_day: emails_per_day.max(1),
        }
    }

    /// Draws the shared gap uniformly from `[MIN_GAP_MINUTES, MAX_GAP_MINUTES]`.
    pub fn random<R: Rng + ?Sized>(start: DateTime<Utc>, emails_per_day: u32, rng: &mut R) -> Self {
        let gap_minutes = rng.gen_range(MIN_GAP_MINUTES..=MAX_GAP_MINUTES);
        Self::new(start, gap_minutes, emails_per_day)
    }

    pub fn gap_minutes(&self) -> u32 {
        self.gap_minutes
    }

    pub fn day_offset(&self, index: usize) -> i64 {
        (index / self.emails_per_day as usize) as i64
    }

    pub fn position_in_day(&self, index: usize) -> i64 {
        (index % self.emails_per_day as usize) as i64
    }

    pub fn scheduled_at(&self, index: usize) -> DateTime<Utc> {
        self.start
            + Duration::days(self.day_offset(index))
            + Duration::minutes(self.position_in_day(index) * i64::from(self.gap_minutes))
    }
}
