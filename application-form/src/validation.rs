use crate::form::{ApplicationForm, AGE};
use std::fmt::Display;

pub const MINIMUM_AGE: f64 = 18.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required fields left empty or containing only whitespace, in form order.
    MissingRequiredFields(Vec<&'static str>),
    Underage,
}

impl ValidationError {
    /// The text shown to the applicant when submission is blocked.
    pub fn alert_message(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredFields(_) => {
                "Please fill in all required fields marked with *"
            }
            ValidationError::Underage => "You must be at least 18 years old to apply",
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingRequiredFields(names) => {
                write!(f, "Missing required fields: {}", names.join(", "))
            }
            ValidationError::Underage => write!(f, "Applicant is under {MINIMUM_AGE}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Runs the required-field check, then the age check. A form without an age field skips the
/// latter.
pub fn validate(form: &ApplicationForm) -> Result<(), ValidationError> {
    let missing = missing_required_fields(form);
    if !missing.is_empty() {
        return Err(ValidationError::MissingRequiredFields(missing));
    }
    match form.value(AGE) {
        Some(age) if !meets_minimum_age(age) => Err(ValidationError::Underage),
        _ => Ok(()),
    }
}

pub fn missing_required_fields(form: &ApplicationForm) -> Vec<&'static str> {
    form.fields()
        .filter(|field| field.is_required() && field.value().trim().is_empty())
        .map(|field| field.name())
        .collect()
}

/// Only plain decimal numbers such as `18` or `18.5` can meet the minimum. Signs, exponents and
/// spellings like `inf` never do.
pub fn meets_minimum_age(age: &str) -> bool {
    let age = age.trim();
    age.chars().all(|c| c.is_ascii_digit() || c == '.')
        && age.parse::<f64>().is_ok_and(|age| age >= MINIMUM_AGE)
}
