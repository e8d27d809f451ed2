use serde::Deserialize;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Rendered in place of any field the applicant did not supply.
pub const PLACEHOLDER: &str = "N/A";

pub const FIRST_NAME: &str = "first-name";
pub const LAST_NAME: &str = "last-name";
pub const EMAIL: &str = "email";
pub const PHONE: &str = "phone";
pub const GENDER: &str = "gender";
pub const AGE: &str = "age";
pub const OCCUPATION: &str = "occupation";
pub const ADDRESS: &str = "address";
pub const CITY_STATE: &str = "city-state";
pub const ZIPCODE: &str = "zipcode";
pub const BANK_NAME: &str = "bank-name";
pub const BANK_NUMBER: &str = "bank-number";

/// The field values posted by the application form.
///
/// No schema is enforced: any JSON object is accepted and keys the mail template does not use
/// are ignored.
#[derive(Deserialize, Debug, Default)]
#[serde(transparent)]
pub struct Submission(Map<String, Value>);

impl Submission {
    /// Returns the value of `name` as it should appear in the mail body.
    ///
    /// Absent, `null` and empty string values yield [`PLACEHOLDER`]. Other non-string values are
    /// rendered as their JSON text.
    pub fn field(&self, name: &str) -> Cow<'_, str> {
        match self.0.get(name) {
            None | Some(Value::Null) => PLACEHOLDER.into(),
            Some(Value::String(value)) if value.is_empty() => PLACEHOLDER.into(),
            Some(Value::String(value)) => value.as_str().into(),
            Some(other) => other.to_string().into(),
        }
    }

    pub fn applicant_email(&self) -> Option<&str> {
        self.0
            .get(EMAIL)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::{Submission, AGE, EMAIL, FIRST_NAME, OCCUPATION, PLACEHOLDER};
    use googletest::prelude::*;
    use serde_json::json;

    fn submission(value: serde_json::Value) -> Submission {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn returns_supplied_string_value() -> Result<()> {
        let subject = submission(json!({ FIRST_NAME: "Ada" }));

        verify_that!(subject.field(FIRST_NAME).as_ref(), eq("Ada"))
    }

    #[test]
    fn returns_placeholder_for_absent_field() -> Result<()> {
        let subject = submission(json!({}));

        verify_that!(subject.field(OCCUPATION).as_ref(), eq(PLACEHOLDER))
    }

    #[googletest::test]
    fn returns_placeholder_for_empty_and_null_fields() {
        let subject = submission(json!({ FIRST_NAME: "", OCCUPATION: null }));

        expect_that!(subject.field(FIRST_NAME).as_ref(), eq(PLACEHOLDER));
        expect_that!(subject.field(OCCUPATION).as_ref(), eq(PLACEHOLDER));
    }

    #[test]
    fn renders_numbers_as_text() -> Result<()> {
        let subject = submission(json!({ AGE: 42 }));

        verify_that!(subject.field(AGE).as_ref(), eq("42"))
    }

    #[test]
    fn rejects_payload_which_is_not_an_object() -> Result<()> {
        verify_that!(
            serde_json::from_str::<Submission>(r#"["first-name", "Ada"]"#),
            err(anything())
        )
    }

    #[test]
    fn applicant_email_ignores_blank_value() -> Result<()> {
        let subject = submission(json!({ EMAIL: "   " }));

        verify_that!(subject.applicant_email(), none())
    }
}
