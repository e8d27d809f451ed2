//! The applicant-facing half of the application form: field model, synchronous validation and
//! the submission to the mail relay endpoint.

pub mod client;
pub mod form;
pub mod validation;
pub mod view;

pub use client::{FormClient, FormClientConfig, SubmissionError, SubmissionState};
pub use form::{ApplicationForm, FormField, UnknownFieldError};
pub use validation::{validate, ValidationError};
pub use view::{FormView, MessageTone};
