use googletest::prelude::*;
use lambda_http::{http::Method, Body, Request};
use send_application_mail::{secrets::EnvironmentSecretRepository, ApplicationMailHandler};
use serde_json::{json, Value};
use serial_test::serial;
use std::{sync::OnceLock, time::Duration};
use test_support::{
    fake_smtp::{FakeSmtpServer, ReceivedMail},
    setup_logging,
};
use tokio::time::timeout;

#[googletest::test]
#[tokio::test]
#[serial]
async fn relays_application_using_environment_configuration() -> Result<()> {
    init().await;
    set_mail_environment();
    let handler = ApplicationMailHandler::<EnvironmentSecretRepository>::new().await;

    let response = handler
        .handle(send_mail_request(json!({
            "first-name": "Grace",
            "last-name": "Hopper",
            "email": "grace@example.com",
            "age": "37",
            "city-state": "Arlington, VA",
        })))
        .await
        .unwrap();

    verify_that!(response.status().as_u16(), eq(200))?;
    verify_that!(
        serde_json::from_slice::<Value>(response.body().as_ref()),
        ok(eq(json!({
            "status": "success",
            "message": "Form sent successfully!",
            "redirect": "/thank_you.html",
        })))
    )?;
    verify_that!(
        timeout(Duration::from_secs(10), fake_smtp().last_mail_content()).await,
        ok(ok(all!(
            contains_substring("From: careers@example.com"),
            contains_substring("To: inbox@example.com"),
            contains_substring("Reply-To: grace@example.com"),
            contains_substring("Subject: New Application from Your Website"),
            contains_substring("First Name: Grace"),
            contains_substring("Age: 37"),
            contains_substring("City & State: Arlington, VA"),
            contains_substring("Occupation: N/A"),
            contains_substring("Bank Name: N/A")
        )))
    )
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn delivers_plain_text_mail_to_configured_receiver_without_authenticating_in_clear(
) -> Result<()> {
    init().await;
    set_mail_environment();
    let handler = ApplicationMailHandler::<EnvironmentSecretRepository>::new().await;

    handler
        .handle(send_mail_request(json!({
            "first-name": "Grace",
            "bank-name": "",
            "bank-number": null,
        })))
        .await
        .unwrap();

    let mail = timeout(Duration::from_secs(10), fake_smtp().next_mail()).await;
    verify_that!(
        mail,
        ok(ok(matches_pattern!(ReceivedMail {
            envelope_from: eq("careers@example.com"),
            envelope_to: elements_are![eq("inbox@example.com")],
            authenticated_as: none(),
            content: anything(),
        })))
    )?;
    let mail = mail.unwrap().unwrap();
    verify_that!(mail.header("Content-Type"), some(starts_with("text/plain")))?;
    verify_that!(mail.header("Reply-To"), none())?;
    verify_that!(
        mail.body(),
        all!(
            starts_with("You have received a new application"),
            contains_substring("First Name: Grace"),
            contains_substring("Bank Name: N/A"),
            contains_substring("Account Number: N/A")
        )
    )
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn refuses_to_relay_when_environment_lacks_receiver() -> Result<()> {
    init().await;
    set_mail_environment();
    std::env::remove_var("RECEIVER_EMAIL");
    let handler = ApplicationMailHandler::<EnvironmentSecretRepository>::new().await;

    let response = handler
        .handle(send_mail_request(json!({ "first-name": "Grace" })))
        .await
        .unwrap();

    verify_that!(response.status().as_u16(), eq(500))?;
    verify_that!(
        timeout(Duration::from_secs(1), fake_smtp().last_mail_content()).await,
        err(anything())
    )
}

async fn init() {
    setup_logging();
    FakeSmtpServer::setup_environment();
    fake_smtp().start();
    fake_smtp().flush().await;
}

fn set_mail_environment() {
    std::env::set_var("SENDER_EMAIL", "careers@example.com");
    std::env::set_var("SENDER_PASSWORD", "app password");
    std::env::set_var("RECEIVER_EMAIL", "inbox@example.com");
}

fn send_mail_request(payload: Value) -> Request {
    let mut request = Request::new(Body::Text(payload.to_string()));
    *request.method_mut() = Method::POST;
    *request.uri_mut() = "/sendmail".parse().unwrap();
    request
        .headers_mut()
        .append("Content-Type", "application/json".parse().unwrap());
    request
}

fn fake_smtp() -> &'static FakeSmtpServer {
    static FAKE_SMTP: OnceLock<FakeSmtpServer> = OnceLock::new();
    FAKE_SMTP.get_or_init(FakeSmtpServer::new)
}
