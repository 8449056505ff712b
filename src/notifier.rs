//! Notification dispatch.
//!
//! One `notify` call per gate decision per configured destination. Delivery
//! is best effort: failures are reported to the caller, never retried here.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::NotifyConfig;

/// Outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to one destination.
    async fn notify(&self, destination: &str, message: &str) -> Result<()>;
}

/// SMS delivery through the Twilio Messages REST API.
pub struct SmsNotifier {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsNotifier {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn notify(&self, destination: &str, message: &str) -> Result<()> {
        let params = [
            ("To", destination),
            ("From", self.from_number.as_str()),
            ("Body", message),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .context("SMS request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("SMS delivery rejected with {status}: {body}");
        }

        info!(destination = %destination, "sent detection SMS");
        Ok(())
    }
}
