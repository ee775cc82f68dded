use crate::validation::{self, FieldRules, FieldValue, Rule, Validatable, ValidationErrorSet};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A newsletter subscriber. Only verified subscribers (double opt-in completed) receive releases.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscriber {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub subscribed_at: DateTime<Utc>,
    pub referer: String,
    pub is_verified: bool,
}

impl Subscriber {
    pub fn new(
        email: impl Into<String>,
        referer: impl Into<String>,
        subscribed_at: DateTime<Utc>,
        is_verified: bool,
    ) -> Result<Subscriber, ValidationErrorSet> {
        let now = Utc::now();
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            email: email.into(),
            subscribed_at,
            referer: referer.into(),
            is_verified,
        };
        validation::validate(&subscriber, &subscriber_rules())?;
        Ok(subscriber)
    }

    /// Marks the double opt-in as completed.
    pub fn verify(mut self) -> Subscriber {
        self.is_verified = true;
        self.updated_at = Utc::now();
        self
    }
}

fn subscriber_rules() -> FieldRules {
    FieldRules::new()
        .field("ID", [Rule::required()])
        .field("Email", [Rule::required(), Rule::email()])
        .field("Referer", [Rule::required()])
}

impl Validatable for Subscriber {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("ID", self.id.into()),
            ("CreatedAt", self.created_at.into()),
            ("UpdatedAt", self.updated_at.into()),
            ("Email", (&self.email).into()),
            ("SubscribedAt", self.subscribed_at.into()),
            ("Referer", (&self.referer).into()),
            ("IsVerified", self.is_verified.into()),
        ]
    }
}
