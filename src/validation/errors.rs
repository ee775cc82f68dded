use crate::validation::FieldValue;
use std::collections::BTreeMap;
use std::fmt;

/// Every way a field can fail validation. Compared by value, never by identity.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    #[error("value is required")]
    Required,
    #[error("value is too short")]
    TooShort,
    #[error("value is too long")]
    TooLong,
    #[error("provided email is invalid")]
    InvalidEmail,
    #[error("the two passwords must match")]
    PasswordDontMatch,
}

impl ErrorKind {
    /// A message addressed to a person filling in a form field named `field`.
    pub fn message_for(&self, field: &str) -> String {
        match self {
            ErrorKind::Required => format!("{field} is required"),
            ErrorKind::TooShort => format!("{field} is too short"),
            ErrorKind::TooLong => format!("{field} is too long"),
            ErrorKind::InvalidEmail => format!("{field} must be a valid email address"),
            ErrorKind::PasswordDontMatch => "the two passwords must match".to_string(),
        }
    }
}

/// The outcome of running one field's rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValidation {
    field: &'static str,
    value: FieldValue,
    violations: Vec<ErrorKind>,
}

impl FieldValidation {
    pub fn new(field: &'static str, value: FieldValue) -> Self {
        Self {
            field,
            value,
            violations: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, kind: ErrorKind) {
        self.violations.push(kind);
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Violations in rule-declaration order.
    pub fn violations(&self) -> &[ErrorKind] {
        &self.violations
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }
}

impl fmt::Display for FieldValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let causes = self
            .violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "Field: '{}' with Value: '{}' has Error(s): validation failed due to '{}'",
            self.field, self.value, causes
        )
    }
}

/// The field-addressable aggregate of a failed validation run.
///
/// It only ever holds entries with at least one violation: an empty set means the entity was
/// valid, which is why `validate` returns `Ok(())` instead of an empty set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrorSet(Vec<FieldValidation>);

impl ValidationErrorSet {
    /// Keeps the entries that have at least one violation, in the order they were produced.
    pub fn from_fields(fields: impl IntoIterator<Item = FieldValidation>) -> Self {
        Self(fields.into_iter().filter(|f| f.has_violations()).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldValidation> {
        self.0.iter()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValidation> {
        self.0.iter().find(|f| f.field == field)
    }

    /// The violations recorded for `field`, empty if the field passed.
    pub fn kinds_for(&self, field: &str) -> &[ErrorKind] {
        self.get(field).map(|f| f.violations()).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str, kind: ErrorKind) -> bool {
        self.kinds_for(field).contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human readable messages keyed by field name, ready to be attached to form inputs.
    pub fn form_errors(&self) -> BTreeMap<&'static str, Vec<String>> {
        self.0
            .iter()
            .map(|f| {
                let messages = f.violations.iter().map(|k| k.message_for(f.field)).collect();
                (f.field, messages)
            })
            .collect()
    }
}

impl fmt::Display for ValidationErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.0 {
            write!(f, "{field}; ")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrorSet {}

impl<'a> IntoIterator for &'a ValidationErrorSet {
    type Item = &'a FieldValidation;
    type IntoIter = std::slice::Iter<'a, FieldValidation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
