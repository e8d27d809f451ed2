use async_trait::async_trait;
use aws_config::BehaviorVersion;
use std::fmt::Display;
use tracing::warn;

pub const SENDER_EMAIL_NAME: &str = "SENDER_EMAIL";
pub const SENDER_PASSWORD_NAME: &str = "SENDER_PASSWORD";
pub const RECEIVER_EMAIL_NAME: &str = "RECEIVER_EMAIL";

#[async_trait]
pub trait SecretRepository {
    async fn open() -> Self;

    /// Returns `Ok(None)` if no secret called `name` exists.
    async fn get_secret(&self, name: &'static str) -> Result<Option<String>, lambda_http::Error>;
}

/// Reads secrets from environment variables of the same name.
#[derive(Clone, Copy, Default)]
pub struct EnvironmentSecretRepository;

#[async_trait]
impl SecretRepository for EnvironmentSecretRepository {
    async fn open() -> Self {
        Self
    }

    async fn get_secret(&self, name: &'static str) -> Result<Option<String>, lambda_http::Error> {
        Ok(std::env::var(name).ok())
    }
}

pub struct AwsSecretsManagerSecretRepository(aws_sdk_secretsmanager::Client);

#[async_trait]
impl SecretRepository for AwsSecretsManagerSecretRepository {
    async fn open() -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region("eu-north-1");
        if let Ok(url) = std::env::var("AWS_ENDPOINT_URL") {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        let secrets_client = aws_sdk_secretsmanager::Client::new(&config);
        Self(secrets_client)
    }

    async fn get_secret(&self, name: &'static str) -> Result<Option<String>, lambda_http::Error> {
        match self.0.get_secret_value().secret_id(name).send().await {
            Ok(secret) => Ok(secret.secret_string().map(str::to_owned)),
            Err(error) => {
                let error = error.into_service_error();
                if error.is_resource_not_found_exception() {
                    Ok(None)
                } else {
                    Err(Box::new(error))
                }
            }
        }
    }
}

/// The three secrets without which no mail can be sent.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub sender_email: String,
    pub sender_password: String,
    pub receiver_email: String,
}

impl MailSettings {
    /// Fetches every secret, reporting all absent ones at once. Empty values count as absent.
    pub async fn load<SecretRepositoryT: SecretRepository + Sync>(
        secrets_repository: &SecretRepositoryT,
    ) -> Result<Self, EnvironmentError> {
        let sender_email = Self::fetch(secrets_repository, SENDER_EMAIL_NAME).await?;
        let sender_password = Self::fetch(secrets_repository, SENDER_PASSWORD_NAME).await?;
        let receiver_email = Self::fetch(secrets_repository, RECEIVER_EMAIL_NAME).await?;
        match (sender_email, sender_password, receiver_email) {
            (Some(sender_email), Some(sender_password), Some(receiver_email)) => Ok(Self {
                sender_email,
                sender_password,
                receiver_email,
            }),
            (sender_email, sender_password, receiver_email) => {
                let missing = [
                    (SENDER_EMAIL_NAME, sender_email.is_none()),
                    (SENDER_PASSWORD_NAME, sender_password.is_none()),
                    (RECEIVER_EMAIL_NAME, receiver_email.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, missing)| missing.then_some(name))
                .collect();
                Err(EnvironmentError::MissingSecrets(missing))
            }
        }
    }

    async fn fetch<SecretRepositoryT: SecretRepository + Sync>(
        secrets_repository: &SecretRepositoryT,
        name: &'static str,
    ) -> Result<Option<String>, EnvironmentError> {
        match secrets_repository.get_secret(name).await {
            Ok(value) => Ok(value.filter(|value| !value.trim().is_empty())),
            Err(error) => {
                warn!("Could not retrieve secret {name}: {error}");
                Err(EnvironmentError::SecretUnavailable(name, error))
            }
        }
    }
}

#[derive(Debug)]
pub enum EnvironmentError {
    MissingSecrets(Vec<&'static str>),
    SecretUnavailable(&'static str, lambda_http::Error),
}

impl Display for EnvironmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentError::MissingSecrets(names) => {
                write!(f, "Missing secrets {}", names.join(", "))
            }
            EnvironmentError::SecretUnavailable(name, error) => {
                write!(f, "Secret {name} unavailable: {error}")
            }
        }
    }
}

impl std::error::Error for EnvironmentError {}


#[cfg(test)]
mod tests {
    use super::{
        test_support::FakeSecretRepository, EnvironmentError, EnvironmentSecretRepository,
        MailSettings, SecretRepository, RECEIVER_EMAIL_NAME, SENDER_EMAIL_NAME,
        SENDER_PASSWORD_NAME,
    };
    use googletest::prelude::*;
    use serial_test::serial;

    #[tokio::test]
    async fn loads_all_three_secrets() -> Result<()> {
        let repository = FakeSecretRepository::open().await;

        let settings = MailSettings::load(&repository).await;

        verify_that!(
            settings,
            ok(matches_pattern!(MailSettings {
                sender_email: eq("applications@example.com"),
                sender_password: eq("abcd efgh ijkl mnop"),
                receiver_email: eq("hiring@example.com"),
            }))
        )
    }

    #[tokio::test]
    async fn reports_every_missing_secret() -> Result<()> {
        let mut repository = FakeSecretRepository::open().await;
        repository.remove_secret(SENDER_EMAIL_NAME);
        repository.remove_secret(RECEIVER_EMAIL_NAME);

        let settings = MailSettings::load(&repository).await;

        verify_that!(
            settings,
            err(matches_pattern!(EnvironmentError::MissingSecrets(
                elements_are![eq(SENDER_EMAIL_NAME), eq(RECEIVER_EMAIL_NAME)]
            )))
        )
    }

    #[tokio::test]
    async fn treats_blank_secret_as_missing() -> Result<()> {
        let mut repository = FakeSecretRepository::open().await;
        repository.add_secret(SENDER_PASSWORD_NAME, "  ");

        let settings = MailSettings::load(&repository).await;

        verify_that!(
            settings,
            err(matches_pattern!(EnvironmentError::MissingSecrets(
                elements_are![eq(SENDER_PASSWORD_NAME)]
            )))
        )
    }

    #[tokio::test]
    async fn reports_unavailable_backend() -> Result<()> {
        let mut repository = FakeSecretRepository::open().await;
        repository.fail_lookups();

        let settings = MailSettings::load(&repository).await;

        verify_that!(
            settings,
            err(matches_pattern!(EnvironmentError::SecretUnavailable(
                eq(SENDER_EMAIL_NAME),
                anything()
            )))
        )
    }

    #[tokio::test]
    #[serial]
    async fn environment_repository_reads_variables() -> Result<()> {
        std::env::set_var(RECEIVER_EMAIL_NAME, "hiring@example.com");
        let repository = EnvironmentSecretRepository::open().await;

        let value = repository.get_secret(RECEIVER_EMAIL_NAME).await.unwrap();

        std::env::remove_var(RECEIVER_EMAIL_NAME);
        verify_that!(value, some(eq("hiring@example.com")))
    }

    #[tokio::test]
    #[serial]
    async fn environment_repository_returns_none_for_unset_variable() -> Result<()> {
        std::env::remove_var(SENDER_PASSWORD_NAME);
        let repository = EnvironmentSecretRepository::open().await;

        let value = repository.get_secret(SENDER_PASSWORD_NAME).await.unwrap();

        verify_that!(value, none())
    }
}
