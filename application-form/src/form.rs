use serde_json::{Map, Value};
use std::fmt::Display;

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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    name: &'static str,
    value: String,
    required: bool,
}

impl FormField {
    pub fn required(name: &'static str) -> Self {
        Self {
            name,
            value: String::new(),
            required: true,
        }
    }

    pub fn optional(name: &'static str) -> Self {
        Self {
            name,
            value: String::new(),
            required: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// The fields of the application form in page order.
#[derive(Debug, Clone)]
pub struct ApplicationForm {
    fields: Vec<FormField>,
}

impl ApplicationForm {
    /// The standard layout; everything except the occupation must be filled in.
    pub fn new() -> Self {
        Self::with_fields([
            FormField::required(FIRST_NAME),
            FormField::required(LAST_NAME),
            FormField::required(EMAIL),
            FormField::required(PHONE),
            FormField::required(GENDER),
            FormField::required(AGE),
            FormField::optional(OCCUPATION),
            FormField::required(ADDRESS),
            FormField::required(CITY_STATE),
            FormField::required(ZIPCODE),
            FormField::required(BANK_NAME),
            FormField::required(BANK_NUMBER),
        ])
    }

    pub fn with_fields(fields: impl IntoIterator<Item = FormField>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), UnknownFieldError> {
        let Some(field) = self.fields.iter_mut().find(|field| field.name == name) else {
            return Err(UnknownFieldError(name.into()));
        };
        field.value = value.into();
        Ok(())
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(FormField::value)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter()
    }

    /// Clears every value, keeping the layout.
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            field.value.clear();
        }
    }

    /// Every field as a JSON string, empty ones included.
    pub fn to_payload(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|field| (field.name.to_owned(), Value::String(field.value.clone())))
            .collect()
    }
}

impl Default for ApplicationForm {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldError(String);

impl Display for UnknownFieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "The form has no field {}", self.0)
    }
}

impl std::error::Error for UnknownFieldError {}
