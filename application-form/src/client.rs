use crate::{
    form::{ApplicationForm, AGE},
    validation::{validate, ValidationError},
    view::{FormView, MessageTone},
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{borrow::Cow, fmt::Display, time::Duration};
use tracing::{error, info};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/sendmail";
const DEFAULT_REDIRECT: &str = "/thank_you.html";
const REDIRECT_DELAY: Duration = Duration::from_secs(1);

const SUCCESS_MESSAGE: &str = "Message sent successfully!";
const FAILURE_MESSAGE: &str = "Failed to send message.";
const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

#[derive(Debug, Clone)]
pub struct FormClientConfig {
    pub endpoint: Cow<'static, str>,
    pub redirect_delay: Duration,
}

impl FormClientConfig {
    pub fn with_endpoint(endpoint: impl Into<Cow<'static, str>>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

impl Default for FormClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            redirect_delay: REDIRECT_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug)]
pub enum SubmissionError {
    Invalid(ValidationError),
    Rejected { status: StatusCode, message: String },
    Network(reqwest::Error),
}

impl Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionError::Invalid(error) => write!(f, "Invalid submission: {error}"),
            SubmissionError::Rejected { status, message } => {
                write!(f, "Submission rejected with {status}: {message}")
            }
            SubmissionError::Network(error) => write!(f, "Network error: {error}"),
        }
    }
}

impl std::error::Error for SubmissionError {}

#[derive(Deserialize, Default)]
struct RelayResponsePayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    redirect: Option<String>,
}

/// Submits an [`ApplicationForm`] to the mail relay and reflects the outcome on a [`FormView`].
pub struct FormClient<FormViewT: FormView> {
    http_client: Client,
    config: FormClientConfig,
    view: FormViewT,
    state: SubmissionState,
}

impl<FormViewT: FormView> FormClient<FormViewT> {
    pub fn new(view: FormViewT) -> Self {
        Self::with_config(view, FormClientConfig::default())
    }

    pub fn with_config(view: FormViewT, config: FormClientConfig) -> Self {
        Self {
            http_client: Client::new(),
            config,
            view,
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn view(&self) -> &FormViewT {
        &self.view
    }

    /// Validates `form` and, if it passes, posts it to the relay.
    ///
    /// A form failing validation returns the client to [`SubmissionState::Idle`] without any
    /// request. The form is only cleared after a successful submission.
    pub async fn submit(&mut self, form: &mut ApplicationForm) -> Result<(), SubmissionError> {
        self.state = SubmissionState::Submitting;
        self.view.set_busy(true);
        let result = match self.check(form) {
            Ok(()) => self.send(form).await,
            Err(error) => Err(SubmissionError::Invalid(error)),
        };
        self.state = match result {
            Ok(()) => SubmissionState::Succeeded,
            Err(SubmissionError::Invalid(_)) => SubmissionState::Idle,
            Err(_) => SubmissionState::Failed,
        };
        self.view.set_busy(false);
        result
    }

    fn check(&mut self, form: &ApplicationForm) -> Result<(), ValidationError> {
        let result = validate(form);
        let invalid_fields: &[&str] = match &result {
            Err(ValidationError::MissingRequiredFields(missing)) => missing.as_slice(),
            Err(ValidationError::Underage) => &[AGE],
            Ok(()) => &[],
        };
        for field in form
            .fields()
            .filter(|field| field.is_required() || field.name() == AGE)
        {
            self.view
                .mark_field(field.name(), !invalid_fields.contains(&field.name()));
        }
        if let Err(error) = &result {
            self.view.alert(error.alert_message());
        }
        result
    }

    async fn send(&mut self, form: &mut ApplicationForm) -> Result<(), SubmissionError> {
        let request = self
            .http_client
            .post(self.config.endpoint.as_ref())
            .json(&form.to_payload());
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                error!("Error submitting application: {error}");
                self.view
                    .show_message(NETWORK_ERROR_MESSAGE, MessageTone::Failure);
                return Err(SubmissionError::Network(error));
            }
        };

        let status = response.status();
        let payload = response
            .json::<RelayResponsePayload>()
            .await
            .unwrap_or_default();
        if status.is_success() {
            info!("Application submitted");
            self.view.show_message(SUCCESS_MESSAGE, MessageTone::Success);
            form.reset();
            let redirect = payload.redirect.as_deref().unwrap_or(DEFAULT_REDIRECT);
            self.view.redirect_after(self.config.redirect_delay, redirect);
            Ok(())
        } else {
            let message = payload
                .message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| FAILURE_MESSAGE.into());
            error!("Application rejected with {status}: {message}");
            self.view.show_message(&message, MessageTone::Failure);
            Err(SubmissionError::Rejected { status, message })
        }
    }
}
