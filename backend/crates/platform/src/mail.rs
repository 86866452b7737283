//! Mail transports
//!
//! Mail is only ever delivered from background tasks. Templates are named;
//! rendering happens in the relay.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail relay rejected message (status={status}): {body}")]
    Rejected { status: u16, body: String },
}

#[trait_variant::make(MailTransport: Send)]
pub trait LocalMailTransport {
    async fn deliver(&self, recipient: &str, template: &str, data: Value) -> Result<(), MailError>;
}

/// Logs instead of sending. Development only: the log line carries the token.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl MailTransport for LogMailer {
    async fn deliver(&self, recipient: &str, template: &str, data: Value) -> Result<(), MailError> {
        tracing::debug!(recipient, template, %data, "Mail delivery (log transport)");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayMessage<'a> {
    sender: &'a str,
    to: &'a str,
    template: &'a str,
    data: Value,
}

/// Posts a JSON message to an HTTP mail relay
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            sender: sender.into(),
        }
    }
}

impl MailTransport for HttpMailer {
    async fn deliver(&self, recipient: &str, template: &str, data: Value) -> Result<(), MailError> {
        let body = RelayMessage {
            sender: &self.sender,
            to: recipient,
            template,
            data,
        };

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        if status.is_success() {
            tracing::debug!(template, "Mail accepted by relay");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Runtime-selected transport
#[derive(Debug, Clone)]
pub enum Mailer {
    Log(LogMailer),
    Http(HttpMailer),
}

impl MailTransport for Mailer {
    async fn deliver(&self, recipient: &str, template: &str, data: Value) -> Result<(), MailError> {
        match self {
            Mailer::Log(m) => MailTransport::deliver(m, recipient, template, data).await,
            Mailer::Http(m) => MailTransport::deliver(m, recipient, template, data).await,
        }
    }
}

/// A delivered message, as recorded by [`MemoryMailer`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub recipient: String,
    pub template: String,
    pub data: Value,
}

/// Records messages in memory
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl MailTransport for MemoryMailer {
    async fn deliver(&self, recipient: &str, template: &str, data: Value) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMail {
                recipient: recipient.to_owned(),
                template: template.to_owned(),
                data,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::json;
    use std::sync::Arc;

    async fn relay(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let store = received.clone();
        let router = Router::new().route(
            "/send",
            post(move |Json(body): Json<Value>| {
                let store = store.clone();
                async move {
                    store.lock().unwrap().push(body);
                    (status, "relay says hi")
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        (format!("http://{addr}/send"), received)
    }

    #[tokio::test]
    async fn test_http_mailer_posts_template_and_data() {
        let (endpoint, received) = relay(StatusCode::ACCEPTED).await;
        let mailer = HttpMailer::new(endpoint, "noreply@example.com");

        MailTransport::deliver(
            &mailer,
            "user@example.com",
            "registration",
            json!({ "token": "abc" }),
        )
        .await
        .unwrap();

        let bodies = received.lock().unwrap().clone();
        assert_eq!(
            bodies,
            vec![json!({
                "sender": "noreply@example.com",
                "to": "user@example.com",
                "template": "registration",
                "data": { "token": "abc" },
            })]
        );
    }

    #[tokio::test]
    async fn test_http_mailer_reports_rejection() {
        let (endpoint, _) = relay(StatusCode::BAD_GATEWAY).await;
        let mailer = HttpMailer::new(endpoint, "noreply@example.com");

        let err = MailTransport::deliver(&mailer, "user@example.com", "password-reset", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Rejected { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_mailer_dispatches_to_log_transport() {
        let mailer = Mailer::Log(LogMailer);
        MailTransport::deliver(&mailer, "a@example.com", "registration", json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        MailTransport::deliver(&mailer, "a@example.com", "email-change", json!({ "token": "t" }))
            .await
            .unwrap();
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].template, "email-change");
    }
}
