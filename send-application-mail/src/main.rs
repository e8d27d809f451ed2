use lambda_http::{run, service_fn, Error};
use send_application_mail::{
    secrets::{AwsSecretsManagerSecretRepository, EnvironmentSecretRepository, SecretRepository},
    ApplicationMailHandler,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    // Local runs keep their secrets in a .env file; deployed functions have none.
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    match std::env::var("SECRETS_SOURCE").as_deref() {
        Ok("aws-secrets-manager") => serve::<AwsSecretsManagerSecretRepository>().await,
        _ => serve::<EnvironmentSecretRepository>().await,
    }
}

async fn serve<SecretRepositoryT: SecretRepository + Send + Sync>() -> Result<(), Error> {
    let handler = ApplicationMailHandler::<SecretRepositoryT>::new().await;
    run(service_fn(|event| handler.handle(event))).await
}
