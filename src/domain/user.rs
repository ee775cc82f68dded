use crate::validation::{self, FieldRules, FieldValue, Rule, Validatable, ValidationErrorSet};
use chrono::{DateTime, Utc};
use secrecy::Secret;
use uuid::Uuid;

/// The owner account of the dashboard.
///
/// The password is kept behind `Secret` so that it never ends up in a log line through `Debug`.
/// Hashing happens in the authentication layer, before persistence.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub mail: String,
    pub mail_verified_at: Option<DateTime<Utc>>,
    pub password: Secret<String>,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        mail: impl Into<String>,
        password: Secret<String>,
        confirm_password: &Secret<String>,
    ) -> Result<User, ValidationErrorSet> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: name.into(),
            mail: mail.into(),
            mail_verified_at: None,
            password,
        };
        validation::validate(&user, &user_rules(confirm_password))?;
        Ok(user)
    }

    /// Builds the updated user and validates it as a whole; `self` is left untouched on failure.
    pub fn update(
        &self,
        name: impl Into<String>,
        mail: impl Into<String>,
        mail_verified_at: Option<DateTime<Utc>>,
        password: Secret<String>,
        confirm_password: &Secret<String>,
    ) -> Result<User, ValidationErrorSet> {
        let updated = User {
            id: self.id,
            created_at: self.created_at,
            updated_at: Utc::now(),
            name: name.into(),
            mail: mail.into(),
            mail_verified_at,
            password,
        };
        validation::validate(&updated, &user_rules(confirm_password))?;
        Ok(updated)
    }
}

fn user_rules(confirm_password: &Secret<String>) -> FieldRules {
    FieldRules::new()
        .field("ID", [Rule::required()])
        .field(
            "Name",
            [Rule::required(), Rule::min_length(2), Rule::max_length(25)],
        )
        .field(
            "Password",
            [
                Rule::required(),
                Rule::min_length(6),
                Rule::matches(confirm_password),
            ],
        )
        .field("Mail", [Rule::required(), Rule::email()])
        .field("CreatedAt", [Rule::required()])
}

impl Validatable for User {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("ID", self.id.into()),
            ("CreatedAt", self.created_at.into()),
            ("UpdatedAt", self.updated_at.into()),
            ("Name", (&self.name).into()),
            ("Mail", (&self.mail).into()),
            ("MailVerifiedAt", self.mail_verified_at.into()),
            ("Password", (&self.password).into()),
        ]
    }
}
