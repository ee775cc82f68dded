use crate::domain::Tag;
use crate::validation::{self, FieldRules, FieldValue, Rule, Validatable, ValidationErrorSet};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub header_title: String,
    pub filename: String,
    pub slug: String,
    pub excerpt: String,
    pub draft: bool,
    pub release_date: Option<DateTime<Utc>>,
    pub read_time: i32,
    pub tags: Vec<Tag>,
}

impl Article {
    /// Creates a draft article. Excerpts are sized for search result snippets.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: impl Into<String>,
        header_title: impl Into<String>,
        filename: impl Into<String>,
        slug: impl Into<String>,
        excerpt: impl Into<String>,
        read_time: i32,
        tags: Vec<Tag>,
    ) -> Result<Article, ValidationErrorSet> {
        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: title.into(),
            header_title: header_title.into(),
            filename: filename.into(),
            slug: slug.into(),
            excerpt: excerpt.into(),
            draft: true,
            release_date: None,
            read_time,
            tags,
        };
        validation::validate(&article, &article_rules())?;
        Ok(article)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        title: impl Into<String>,
        header_title: impl Into<String>,
        filename: impl Into<String>,
        slug: impl Into<String>,
        excerpt: impl Into<String>,
        read_time: i32,
        tags: Vec<Tag>,
    ) -> Result<Article, ValidationErrorSet> {
        let updated = Article {
            updated_at: Utc::now(),
            title: title.into(),
            header_title: header_title.into(),
            filename: filename.into(),
            slug: slug.into(),
            excerpt: excerpt.into(),
            read_time,
            tags,
            ..self.clone()
        };
        validation::validate(&updated, &article_rules())?;
        Ok(updated)
    }

    pub fn publish(mut self, release_date: DateTime<Utc>) -> Article {
        self.draft = false;
        self.release_date = Some(release_date);
        self
    }
}

fn article_rules() -> FieldRules {
    FieldRules::new()
        .field("ID", [Rule::required()])
        .field("Title", [Rule::required(), Rule::min_length(2)])
        .field("HeaderTitle", [Rule::required(), Rule::min_length(2)])
        .field(
            "Excerpt",
            [Rule::required(), Rule::min_length(130), Rule::max_length(160)],
        )
        .field("ReadTime", [Rule::required()])
        .field("Filename", [Rule::required()])
}

impl Validatable for Article {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("ID", self.id.into()),
            ("CreatedAt", self.created_at.into()),
            ("UpdatedAt", self.updated_at.into()),
            ("Title", (&self.title).into()),
            ("HeaderTitle", (&self.header_title).into()),
            ("Filename", (&self.filename).into()),
            ("Slug", (&self.slug).into()),
            ("Excerpt", (&self.excerpt).into()),
            ("Draft", self.draft.into()),
            ("ReleaseDate", self.release_date.into()),
            ("ReadTime", self.read_time.into()),
            (
                "Tags",
                FieldValue::Collection(self.tags.iter().map(|t| (&t.name).into()).collect()),
            ),
        ]
    }
}
