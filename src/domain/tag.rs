use crate::validation::{self, FieldRules, FieldValue, Rule, Validatable, ValidationErrorSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

impl Tag {
    /// Returns a `Tag` if `name` satisfies our constraints on tag names, the field-level errors
    /// otherwise.
    pub fn new(name: impl Into<String>) -> Result<Tag, ValidationErrorSet> {
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.into(),
        };
        tag.validate()?;
        Ok(tag)
    }

    pub fn validate(&self) -> Result<(), ValidationErrorSet> {
        validation::validate(self, &tag_rules())
    }
}

fn tag_rules() -> FieldRules {
    FieldRules::new()
        .field("ID", [Rule::required()])
        .field("Name", [Rule::required(), Rule::min_length(2)])
}

impl Validatable for Tag {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![("ID", self.id.into()), ("Name", (&self.name).into())]
    }
}
