use log::debug;
use mailin_embedded::{Handler, Server, SslConfig};
use std::{net::IpAddr, sync::Arc, time::Duration};
use tokio::{
    sync::watch::{self, error::RecvError, Receiver, Sender},
    time::timeout,
};

pub const SMTP_PORT: u16 = 4567;
pub const POISONED_SMTP_PORT: u16 = 4568;

const SERVER_NAME: &str = "mail-relay.test";

/// One message as the fake server saw it: the SMTP envelope next to the raw message text.
#[derive(Clone, Debug, Default)]
pub struct ReceivedMail {
    pub envelope_from: String,
    pub envelope_to: Vec<String>,
    /// The identity given with `AUTH PLAIN`, if the client authenticated at all.
    pub authenticated_as: Option<String>,
    pub content: String,
}

impl ReceivedMail {
    /// The message text after the header block.
    pub fn body(&self) -> &str {
        self.content
            .split_once("\r\n\r\n")
            .map_or("", |(_, body)| body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.content
            .lines()
            .take_while(|line| !line.is_empty())
            .find_map(|line| {
                let (header_name, value) = line.split_once(':')?;
                header_name
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim())
            })
    }
}

#[derive(Clone)]
struct SmtpHandler {
    session: ReceivedMail,
    published: Arc<Sender<ReceivedMail>>,
}

impl Handler for SmtpHandler {
    fn data_start(
        &mut self,
        _domain: &str,
        from: &str,
        _is8bit: bool,
        to: &[String],
    ) -> mailin_embedded::Response {
        self.session.envelope_from = from.into();
        self.session.envelope_to = to.to_vec();
        self.session.content.clear();
        mailin_embedded::response::OK
    }

    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        debug!("Got data:\n{}", String::from_utf8_lossy(buf));
        self.session.content.push_str(&String::from_utf8_lossy(buf));
        Ok(())
    }

    fn data_end(&mut self) -> mailin_embedded::Response {
        let mail = ReceivedMail {
            envelope_from: std::mem::take(&mut self.session.envelope_from),
            envelope_to: std::mem::take(&mut self.session.envelope_to),
            authenticated_as: self.session.authenticated_as.clone(),
            content: std::mem::take(&mut self.session.content),
        };
        // The receiving side may be gone between tests; the mail is then simply dropped.
        let _ = self.published.send(mail);
        mailin_embedded::response::OK
    }

    fn auth_plain(
        &mut self,
        authorization_id: &str,
        authentication_id: &str,
        password: &str,
    ) -> mailin_embedded::Response {
        debug!("Got authentication data {authorization_id}, {authentication_id}, {password}");
        self.session.authenticated_as = Some(authentication_id.into());
        mailin_embedded::response::AUTH_OK
    }
}

/// An in-process SMTP server which accepts every message and publishes the most recent one.
pub struct FakeSmtpServer(
    std::sync::Mutex<Option<Server<SmtpHandler>>>,
    tokio::sync::Mutex<Receiver<ReceivedMail>>,
);

impl FakeSmtpServer {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(ReceivedMail::default());
        let handler = SmtpHandler {
            session: ReceivedMail::default(),
            published: Arc::new(sender),
        };
        let mut server = Server::new(handler);
        server
            .with_name(SERVER_NAME)
            .with_ssl(SslConfig::None)
            .unwrap()
            .with_addr(format!("0.0.0.0:{SMTP_PORT}"))
            .unwrap();
        Self(
            std::sync::Mutex::new(Some(server)),
            tokio::sync::Mutex::new(receiver),
        )
    }

    /// Starts serving on a background thread. Calling this again is a no-op.
    pub fn start(&self) {
        let mut guard = self.0.lock().unwrap();
        if let Some(server) = guard.take() {
            std::thread::spawn(move || {
                let _ = server.serve();
            });
        }
    }

    /// Waits for the next message to arrive.
    pub async fn next_mail(&self) -> Result<ReceivedMail, RecvError> {
        let mut receiver = self.1.lock().await;
        receiver.changed().await?;
        let mail = receiver.borrow_and_update().clone();
        drop(receiver);
        Ok(mail)
    }

    /// Waits for the next message to arrive and returns its raw content.
    pub async fn last_mail_content(&self) -> Result<String, RecvError> {
        self.next_mail().await.map(|mail| mail.content)
    }

    /// Discards any message which arrived but was not yet observed.
    pub async fn flush(&self) {
        let mut receiver = self.1.lock().await;
        let _ = timeout(Duration::from_millis(100), receiver.changed()).await;
    }

    pub fn url() -> String {
        format!("smtp://localhost:{SMTP_PORT}")
    }

    pub fn setup_environment() {
        std::env::set_var("SMTP_URL", Self::url());
    }
}

impl Default for FakeSmtpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct PoisonedSmtpHandler;

impl Handler for PoisonedSmtpHandler {
    fn helo(&mut self, _ip: IpAddr, _domain: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }

    fn mail(&mut self, _ip: IpAddr, _domain: &str, _from: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }
}

/// Starts an SMTP server which rejects every session. A second call leaves the first server
/// running, since the port is already taken.
pub fn start_poisoned_smtp_server() {
    let handler = PoisonedSmtpHandler;
    let mut server = Server::new(handler);
    server
        .with_name(SERVER_NAME)
        .with_ssl(SslConfig::None)
        .unwrap()
        .with_addr(format!("0.0.0.0:{POISONED_SMTP_PORT}"))
        .unwrap();
    std::thread::spawn(move || {
        let _ = server.serve();
    });
}

pub fn poisoned_smtp_url() -> String {
    format!("smtp://localhost:{POISONED_SMTP_PORT}")
}
