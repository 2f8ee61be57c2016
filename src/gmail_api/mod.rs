//! Gmail API module split into logical submodules
//!
//! - auth: token lifecycle (cache, refresh, interactive consent)
//! - consent: the browser-based authorization-code flow
//! - messages: inbox fetching
//! - operations: outbound send

pub mod auth;
pub mod consent;
pub mod messages;
pub mod operations;

use async_trait::async_trait;

use crate::error::{FetchError, SendError};
use crate::types::{EmailMessage, SentMessage};

pub use auth::{Authenticator, Clock, ConsentFlow, SystemClock, SCOPES};
pub use consent::BrowserConsentFlow;

pub const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

// Narrow seam over the two remote mail operations so the agent flows can be
// exercised without live network access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str)
        -> Result<SentMessage, SendError>;
    async fn fetch_latest_inbox_message(&self) -> Result<EmailMessage, FetchError>;
}

/// Authenticated Gmail session wrapping the shared HTTP client.
pub struct GmailClient {
    http: reqwest::Client,
    token: String,
}

impl GmailClient {
    pub fn new(http: reqwest::Client, token: String) -> Self {
        Self { http, token }
    }
}

#[async_trait]
impl MailTransport for GmailClient {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<SentMessage, SendError> {
        operations::send_email(&self.http, &self.token, to, subject, body).await
    }

    async fn fetch_latest_inbox_message(&self) -> Result<EmailMessage, FetchError> {
        messages::fetch_latest_inbox_message(&self.http, &self.token).await
    }
}
