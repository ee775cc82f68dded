//! Field-by-field validation of domain entities.
//!
//! An entity declares, once, an ordered list of rules per field ([`FieldRules`]) and exposes its
//! fields as [`FieldValue`]s through [`Validatable`]. [`validate`] then runs every rule on every
//! field, without stopping at the first failure, and collects what went wrong into a
//! [`ValidationErrorSet`].
mod errors;
mod rules;
mod value;

pub use errors::{ErrorKind, FieldValidation, ValidationErrorSet};
pub use rules::{is_email_valid, ComparisonRule, Rule, UnaryRule};
pub use value::FieldValue;

/// The rules attached to each field of an entity, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FieldRules(Vec<(&'static str, Vec<Rule>)>);

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.0.push((name, rules.into_iter().collect()));
        self
    }

    pub fn rules_for(&self, name: &str) -> &[Rule] {
        self.0
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, rules)| rules.as_slice())
            .unwrap_or(&[])
    }
}

/// Exposes an entity's fields, in declaration order, as values rules understand.
pub trait Validatable {
    fn fields(&self) -> Vec<(&'static str, FieldValue)>;
}

/// Runs every rule for every field of `entity`.
///
/// Fields are visited in the order `Validatable::fields` yields them, and each field's violations
/// are recorded in rule-declaration order. Fields without rules are never reported.
pub fn validate<T: Validatable + ?Sized>(
    entity: &T,
    rules: &FieldRules,
) -> Result<(), ValidationErrorSet> {
    let outcomes = entity.fields().into_iter().map(|(name, value)| {
        let mut outcome = FieldValidation::new(name, value);
        for rule in rules.rules_for(name) {
            if let Some(kind) = rule.check(outcome.value()) {
                outcome.push(kind);
            }
        }
        outcome
    });

    let errors = ValidationErrorSet::from_fields(outcomes);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
