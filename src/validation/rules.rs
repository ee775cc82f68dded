use crate::validation::{ErrorKind, FieldValue};
use once_cell::sync::Lazy;
use regex::Regex;

/// Deliberately conservative: lowercase local part, a single `@`, a 2 to 4 letter TLD. Valid but
/// unusual addresses (uppercase, long TLDs, quoted local parts) are rejected.
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,4}$").expect("email regex is valid")
});

pub fn is_email_valid(candidate: &str) -> bool {
    EMAIL_REGEX.is_match(candidate)
}

/// A rule that only looks at the field it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryRule {
    Required,
    MinLength(usize),
    MaxLength(usize),
    EmailFormat,
}

impl UnaryRule {
    pub fn is_violated(&self, value: &FieldValue) -> bool {
        match self {
            UnaryRule::Required => value.is_empty(),
            UnaryRule::MinLength(min) => match length_of(value, "MinLength") {
                Some(len) => len < *min,
                None => true,
            },
            UnaryRule::MaxLength(max) => match length_of(value, "MaxLength") {
                Some(len) => len > *max,
                None => true,
            },
            UnaryRule::EmailFormat => match value.as_text() {
                Some(text) => !is_email_valid(text),
                None => {
                    tracing::warn!(
                        value.kind = value.kind(),
                        "EmailFormat rule applied to a non-text value"
                    );
                    true
                }
            },
        }
    }

    pub fn violation(&self) -> ErrorKind {
        match self {
            UnaryRule::Required => ErrorKind::Required,
            UnaryRule::MinLength(_) => ErrorKind::TooShort,
            UnaryRule::MaxLength(_) => ErrorKind::TooLong,
            UnaryRule::EmailFormat => ErrorKind::InvalidEmail,
        }
    }
}

fn length_of(value: &FieldValue, rule: &'static str) -> Option<usize> {
    let length = value.length();
    if length.is_none() {
        tracing::warn!(
            value.kind = value.kind(),
            rule,
            "length rule applied to a value without a length"
        );
    }
    length
}

/// A rule that needs a second operand, e.g. a password confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonRule {
    MatchesOther,
}

impl ComparisonRule {
    pub fn is_violated(&self, value: &FieldValue, other: &FieldValue) -> bool {
        match self {
            ComparisonRule::MatchesOther => value != other,
        }
    }

    pub fn violation(&self) -> ErrorKind {
        match self {
            ComparisonRule::MatchesOther => ErrorKind::PasswordDontMatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Unary(UnaryRule),
    /// The comparison rule together with the operand it was built with.
    Comparison(ComparisonRule, FieldValue),
}

impl Rule {
    pub fn required() -> Self {
        Rule::Unary(UnaryRule::Required)
    }

    pub fn min_length(n: usize) -> Self {
        Rule::Unary(UnaryRule::MinLength(n))
    }

    pub fn max_length(n: usize) -> Self {
        Rule::Unary(UnaryRule::MaxLength(n))
    }

    pub fn email() -> Self {
        Rule::Unary(UnaryRule::EmailFormat)
    }

    pub fn matches(other: impl Into<FieldValue>) -> Self {
        Rule::Comparison(ComparisonRule::MatchesOther, other.into())
    }

    /// Returns the error kind this rule signals if `value` violates it.
    pub fn check(&self, value: &FieldValue) -> Option<ErrorKind> {
        let violated = match self {
            Rule::Unary(rule) => rule.is_violated(value),
            Rule::Comparison(rule, other) => rule.is_violated(value, other),
        };
        violated.then(|| self.violation())
    }

    pub fn violation(&self) -> ErrorKind {
        match self {
            Rule::Unary(rule) => rule.violation(),
            Rule::Comparison(rule, _) => rule.violation(),
        }
    }
}
