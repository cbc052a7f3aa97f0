//! Outbound email
//!
//! Sends are fire-and-forget from the request's point of view: [`notify`]
//! spawns the delivery and only logs and counts failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{email_templates, metrics};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Failed to send email: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to send email: provider returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl Email {
    pub fn welcome(to: &str, from: &str, first_name: &str) -> Self {
        Self {
            to: to.to_string(),
            from: from.to_string(),
            subject: "Welcome to Our Platform!".to_string(),
            text: email_templates::welcome_text(first_name),
            html: email_templates::welcome_html(first_name),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Deliver `email` in the background
pub fn notify(mailer: Arc<dyn Mailer>, email: Email) -> JoinHandle<()> {
    tokio::spawn(async move {
        match mailer.send(&email).await {
            Ok(()) => {
                metrics::EMAILS_SENT.inc();
                tracing::info!(to = %email.to, subject = %email.subject, "email sent");
            }
            Err(err) => {
                metrics::EMAILS_FAILED.inc();
                tracing::warn!(to = %email.to, subject = %email.subject, error = %err, "email delivery failed");
            }
        }
    })
}

pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SendGridMailer {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            endpoint: SENDGRID_ENDPOINT.to_string(),
        }
    }

    fn payload(email: &Email) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": email.from },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.text },
                { "type": "text/html", "value": email.html },
            ],
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&Self::payload(email))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), %body, "sendgrid rejected email");
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Writes messages to the log instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "email delivery disabled; message logged only");
        Ok(())
    }
}

/// Keeps every message it is given; optionally fails each send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent.lock().await.push(email.clone());
        if self.fail {
            return Err(MailError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}
