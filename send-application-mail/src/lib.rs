pub mod mail_body;
pub mod secrets;
pub mod submission;

use async_once_cell::OnceCell;
use lambda_http::{
    http::{header, Method, StatusCode},
    Body, Error, Request, Response,
};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use mail_body::render_mail_body;
use secrets::{MailSettings, SecretRepository};
use serde::Serialize;
use std::borrow::Cow;
use submission::Submission;
use tracing::{error, info};

const SUBJECT: &str = "New Application from Your Website";
const SUCCESS_REDIRECT: &str = "/thank_you.html";

const SMTP_URL: &str = "smtps://smtp.gmail.com";
const ALLOWED_ORIGIN: &str = "*";

const SEND_MAIL_PATH: &str = "/sendmail";
const MAX_PAYLOAD_BYTES: usize = 100 * 1024;

/// Turns a posted application into a plain-text mail to the configured receiver.
pub struct ApplicationMailHandler<SecretRepositoryT: SecretRepository> {
    secrets_repository: SecretRepositoryT,
    settings: OnceCell<MailSettings>,
    mailer: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl<SecretRepositoryT: SecretRepository + Send + Sync> ApplicationMailHandler<SecretRepositoryT> {
    pub async fn new() -> Self {
        Self::with_secrets_repository(SecretRepositoryT::open().await)
    }

    pub fn with_secrets_repository(secrets_repository: SecretRepositoryT) -> Self {
        Self {
            secrets_repository,
            settings: Default::default(),
            mailer: Default::default(),
        }
    }

    pub async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        if event.method() == Method::OPTIONS {
            return Self::preflight_response();
        }
        match self.process_request(&event).await {
            Ok(()) => RelayResponse::success().into_response(StatusCode::OK),
            Err(error) => {
                error.log();
                error.into_response()
            }
        }
    }

    async fn process_request(&self, event: &Request) -> Result<(), RelayError> {
        let submission = Self::parse_submission(event)?;
        let settings = self.settings().await?;
        let email = Self::construct_email_message(settings, &submission)?;
        self.send_email(email, settings).await
    }

    fn parse_submission(event: &Request) -> Result<Submission, RelayError> {
        if event.method() != Method::POST {
            return Err(RelayError::ClientError {
                status: StatusCode::METHOD_NOT_ALLOWED,
                description: "Method not allowed",
            });
        }
        if !event.uri().path().ends_with(SEND_MAIL_PATH) {
            return Err(RelayError::ClientError {
                status: StatusCode::NOT_FOUND,
                description: "Not found",
            });
        }
        let payload = event.body().as_ref();
        if payload.is_empty() {
            return Err(RelayError::ClientError {
                status: StatusCode::BAD_REQUEST,
                description: "Missing request payload",
            });
        }
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(RelayError::ClientError {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                description: "Request payload too large",
            });
        }
        serde_json::from_slice(payload).map_err(|_| RelayError::ClientError {
            status: StatusCode::BAD_REQUEST,
            description: "Invalid JSON format",
        })
    }

    async fn settings(&self) -> Result<&MailSettings, RelayError> {
        self.settings
            .get_or_try_init(MailSettings::load(&self.secrets_repository))
            .await
            .map_err(|error| RelayError::ConfigurationError {
                description: error.to_string(),
            })
    }

    fn construct_email_message(
        settings: &MailSettings,
        submission: &Submission,
    ) -> Result<Message, RelayError> {
        let from: Mailbox = parse_configured_mailbox(&settings.sender_email)?;
        let to: Mailbox = parse_configured_mailbox(&settings.receiver_email)?;
        let body = render_mail_body(submission).map_err(|error| RelayError::ConfigurationError {
            description: format!("Error rendering mail body: {error}"),
        })?;
        let mut builder = Message::builder().from(from).to(to).subject(SUBJECT);
        // An applicant address which does not parse is left out of Reply-To; it never fails the send.
        if let Some(reply_to) = submission
            .applicant_email()
            .and_then(|email| email.parse::<Mailbox>().ok())
        {
            builder = builder.reply_to(reply_to);
        }
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|error| RelayError::TransportFailure {
                description: format!("Error building message: {error}"),
            })
    }

    async fn send_email(&self, email: Message, settings: &MailSettings) -> Result<(), RelayError> {
        let mailer = self
            .mailer
            .get_or_try_init(async { Self::initialise_mailer(settings) })
            .await
            .map_err(|error| RelayError::TransportFailure {
                description: format!("Unable to set up SMTP transport: {error}"),
            })?;
        match mailer.send(email).await {
            Ok(response) => {
                info!("Application mail sent: {}", response.code());
                Ok(())
            }
            Err(error) => Err(RelayError::TransportFailure {
                description: format!("Error sending message: {error}"),
            }),
        }
    }

    fn initialise_mailer(
        settings: &MailSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, lettre::transport::smtp::Error> {
        let smtp_url = Self::smtp_url();
        info!("initialise_mailer: Connecting to {smtp_url}");
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&smtp_url)?
            .authentication(vec![Mechanism::Plain]);

        // Credentials are only ever sent over an implicit TLS connection. A relay which insists on
        // authentication will then reject a misconfigured plain-text URL.
        if smtp_url.starts_with("smtps://") {
            builder = builder.credentials(Credentials::new(
                settings.sender_email.clone(),
                settings.sender_password.clone(),
            ));
        }

        Ok(builder.build())
    }

    fn smtp_url() -> Cow<'static, str> {
        std::env::var("SMTP_URL")
            .map(Cow::Owned)
            .unwrap_or(SMTP_URL.into())
    }

    fn preflight_response() -> Result<Response<Body>, Error> {
        Ok(Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                allowed_origin().as_ref(),
            )
            .header(header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS")
            .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")
            .body(Body::Empty)?)
    }
}

fn parse_configured_mailbox(address: &str) -> Result<Mailbox, RelayError> {
    address
        .parse()
        .map_err(|error| RelayError::ConfigurationError {
            description: format!("Invalid configured address {address}: {error}"),
        })
}

fn allowed_origin() -> Cow<'static, str> {
    std::env::var("ALLOWED_ORIGIN")
        .map(Cow::Owned)
        .unwrap_or(ALLOWED_ORIGIN.into())
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "lowercase")]
enum RelayStatus {
    Success,
    Error,
}

/// The JSON body of every response to the form.
#[derive(Serialize, Debug)]
struct RelayResponse {
    status: RelayStatus,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'static str>,
}

impl RelayResponse {
    fn success() -> Self {
        Self {
            status: RelayStatus::Success,
            message: "Form sent successfully!",
            redirect: Some(SUCCESS_REDIRECT),
        }
    }

    fn error(message: &'static str) -> Self {
        Self {
            status: RelayStatus::Error,
            message,
            redirect: None,
        }
    }

    fn into_response(self, status: StatusCode) -> Result<Response<Body>, Error> {
        Ok(Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .header(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                allowed_origin().as_ref(),
            )
            .body(serde_json::to_string(&self)?.into())?)
    }
}

#[derive(Debug)]
enum RelayError {
    ConfigurationError { description: String },
    TransportFailure { description: String },
    ClientError {
        status: StatusCode,
        description: &'static str,
    },
}

impl RelayError {
    fn log(&self) {
        match self {
            RelayError::ConfigurationError { description } => {
                error!("Mail relay is not configured: {description}");
            }
            RelayError::TransportFailure { description } => {
                error!("Failed to relay application mail: {description}");
            }
            RelayError::ClientError {
                status,
                description,
            } => {
                error!("Client error relaying application mail ({status}): {description}");
            }
        }
    }

    fn into_response(self) -> Result<Response<Body>, Error> {
        match self {
            RelayError::ConfigurationError { .. } => {
                RelayResponse::error("Server is not configured to send emails.")
                    .into_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
            RelayError::TransportFailure { .. } => RelayResponse::error("Failed to send email.")
                .into_response(StatusCode::INTERNAL_SERVER_ERROR),
            RelayError::ClientError {
                status,
                description,
            } => RelayResponse::error(description).into_response(status),
        }
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::ConfigurationError { description } => {
                write!(f, "Configuration error: {description}")
            }
            RelayError::TransportFailure { description } => {
                write!(f, "Transport failure: {description}")
            }
            RelayError::ClientError { description, .. } => {
                write!(f, "Client error: {description}")
            }
        }
    }
}

impl std::error::Error for RelayError {}
