use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::{
    borrow::Cow,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;

const SEND_MAIL_PATH: &str = "/sendmail";

/// A stand-in for the mail relay endpoint which records every payload it receives.
#[derive(Clone)]
pub struct FakeMailRelay {
    redirect: Cow<'static, str>,
    rejection_message: Option<Cow<'static, str>>,
    return_invalid_response: bool,
    received: Arc<Mutex<Vec<Value>>>,
}

#[derive(Serialize)]
struct RelayResponsePayload<'a> {
    status: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'a str>,
}

impl FakeMailRelay {
    pub fn new() -> Self {
        Self {
            redirect: "/thank_you.html".into(),
            rejection_message: None,
            return_invalid_response: false,
            received: Default::default(),
        }
    }

    pub fn redirect_to(self, redirect: impl Into<Cow<'static, str>>) -> Self {
        Self {
            redirect: redirect.into(),
            ..self
        }
    }

    pub fn reject_with_message(self, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            rejection_message: Some(message.into()),
            ..self
        }
    }

    pub fn return_invalid_response(self) -> Self {
        Self {
            return_invalid_response: true,
            ..self
        }
    }

    /// Binds an ephemeral port and serves on a background task of the current runtime.
    pub async fn serve(self) -> RunningMailRelay {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let received = self.received.clone();
        let app = Router::new()
            .route(SEND_MAIL_PATH, post(send_mail))
            .with_state(self);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        RunningMailRelay {
            url: format!("http://{address}{SEND_MAIL_PATH}"),
            received,
        }
    }
}

impl Default for FakeMailRelay {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RunningMailRelay {
    url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl RunningMailRelay {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn received_payloads(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

/// Returns a URL on which nothing listens, so that any request to it fails to connect.
pub async fn unreachable_relay_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{address}{SEND_MAIL_PATH}")
}

async fn send_mail(State(state): State<FakeMailRelay>, Json(payload): Json<Value>) -> Response {
    state.received.lock().unwrap().push(payload);
    if state.return_invalid_response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            "Invalid response",
        )
            .into_response()
    } else if let Some(message) = state.rejection_message.as_deref() {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RelayResponsePayload {
                status: "error",
                message,
                redirect: None,
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::OK,
            Json(RelayResponsePayload {
                status: "success",
                message: "Form sent successfully!",
                redirect: Some(&state.redirect),
            }),
        )
            .into_response()
    }
}
