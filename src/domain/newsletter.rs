use crate::validation::{self, FieldRules, FieldValue, Rule, Validatable, ValidationErrorSet};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(thiserror::Error, Debug)]
pub enum NewsletterError {
    #[error("newsletter {0} has already been released and can no longer be edited")]
    AlreadyReleased(Uuid),
    #[error(transparent)]
    Invalid(#[from] ValidationErrorSet),
}

/// A newsletter issue. It is drafted, edited, and finally released; once released its content
/// is frozen and the release scheduler fans it out to verified subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Newsletter {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub content: String,
    pub released_at: Option<DateTime<Utc>>,
    pub released: bool,
    pub associated_article_slug: String,
}

impl Newsletter {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        associated_article_slug: impl Into<String>,
    ) -> Result<Newsletter, ValidationErrorSet> {
        let now = Utc::now();
        let newsletter = Newsletter {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: title.into(),
            content: content.into(),
            released_at: None,
            released: false,
            associated_article_slug: associated_article_slug.into(),
        };
        validation::validate(&newsletter, &draft_rules())?;
        Ok(newsletter)
    }

    pub fn update(
        &self,
        title: impl Into<String>,
        content: impl Into<String>,
        associated_article_slug: impl Into<String>,
    ) -> Result<Newsletter, NewsletterError> {
        if self.released {
            return Err(NewsletterError::AlreadyReleased(self.id));
        }
        let updated = Newsletter {
            updated_at: Utc::now(),
            title: title.into(),
            content: content.into(),
            associated_article_slug: associated_article_slug.into(),
            ..self.clone()
        };
        validation::validate(&updated, &draft_rules())?;
        Ok(updated)
    }

    /// Checks that the issue is complete enough to be sent and marks it as released.
    pub fn release(&self, now: DateTime<Utc>) -> Result<Newsletter, NewsletterError> {
        if self.released {
            return Err(NewsletterError::AlreadyReleased(self.id));
        }
        validation::validate(self, &release_rules())?;
        Ok(Newsletter {
            released: true,
            released_at: Some(now),
            updated_at: now,
            ..self.clone()
        })
    }

    /// The content split on blank lines, with surrounding whitespace trimmed.
    pub fn paragraphs(&self) -> Vec<String> {
        self.content
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

fn draft_rules() -> FieldRules {
    FieldRules::new()
        .field("ID", [Rule::required()])
        .field(
            "Title",
            [Rule::required(), Rule::min_length(3), Rule::max_length(100)],
        )
}

fn release_rules() -> FieldRules {
    draft_rules()
        .field("Content", [Rule::required()])
        .field("ArticleSlug", [Rule::required()])
}

impl Validatable for Newsletter {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("ID", self.id.into()),
            ("CreatedAt", self.created_at.into()),
            ("UpdatedAt", self.updated_at.into()),
            ("Title", (&self.title).into()),
            ("Content", (&self.content).into()),
            ("ReleasedAt", self.released_at.into()),
            ("Released", self.released.into()),
            ("ArticleSlug", (&self.associated_article_slug).into()),
        ]
    }
}
