use crate::submission::{
    Submission, ADDRESS, AGE, BANK_NAME, BANK_NUMBER, CITY_STATE, EMAIL, FIRST_NAME, GENDER,
    LAST_NAME, OCCUPATION, PHONE, ZIPCODE,
};
use serde::Serialize;
use std::borrow::Cow;
use tinytemplate::{error::Error, format_unescaped, TinyTemplate};

const APPLICATION_MAIL_TEMPLATE_NAME: &str = "application-mail";
const APPLICATION_MAIL_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/application-mail.txt"
));

#[derive(Serialize)]
struct Context<'a> {
    first_name: Cow<'a, str>,
    last_name: Cow<'a, str>,
    email: Cow<'a, str>,
    phone: Cow<'a, str>,
    gender: Cow<'a, str>,
    age: Cow<'a, str>,
    occupation: Cow<'a, str>,
    address: Cow<'a, str>,
    city_state: Cow<'a, str>,
    zipcode: Cow<'a, str>,
    bank_name: Cow<'a, str>,
    bank_number: Cow<'a, str>,
}

impl<'a> From<&'a Submission> for Context<'a> {
    fn from(submission: &'a Submission) -> Self {
        Self {
            first_name: submission.field(FIRST_NAME),
            last_name: submission.field(LAST_NAME),
            email: submission.field(EMAIL),
            phone: submission.field(PHONE),
            gender: submission.field(GENDER),
            age: submission.field(AGE),
            occupation: submission.field(OCCUPATION),
            address: submission.field(ADDRESS),
            city_state: submission.field(CITY_STATE),
            zipcode: submission.field(ZIPCODE),
            bank_name: submission.field(BANK_NAME),
            bank_number: submission.field(BANK_NUMBER),
        }
    }
}

/// Renders the plain-text body of the mail announcing `submission`.
pub fn render_mail_body(submission: &Submission) -> Result<String, Error> {
    let mut tt = TinyTemplate::new();
    // The body is sent as text/plain, so user input is passed through verbatim.
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(APPLICATION_MAIL_TEMPLATE_NAME, APPLICATION_MAIL_TEMPLATE)?;
    tt.render(APPLICATION_MAIL_TEMPLATE_NAME, &Context::from(submission))
}
