use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::common::truncate_for_log;

pub trait MailSender {
    async fn send_html(&self, recipients: &[String], subject: &str, html: &str) -> Result<()>;
}

/// Sends through the Gmail API as the mailbox account.
pub struct GmailSender {
    client: Client,
    send_url: String,
    sender: String,
    access_token: String,
}

impl GmailSender {
    pub fn new(client: Client, send_url: &str, sender: &str, access_token: &str) -> Self {
        Self {
            client,
            send_url: send_url.to_string(),
            sender: sender.to_string(),
            access_token: access_token.to_string(),
        }
    }
}

impl MailSender for GmailSender {
    async fn send_html(&self, recipients: &[String], subject: &str, html: &str) -> Result<()> {
        if recipients.is_empty() {
            bail!("Report mail requested without any recipients");
        }
        let message = build_html_message(&self.sender, recipients, subject, html);
        let raw = URL_SAFE.encode(message.as_bytes());

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await
            .context("Report mail request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "Report mail rejected with status {}. Body: {}",
                status,
                truncate_for_log(&body)
            );
        }
        info!(recipients = recipients.len(), "Mail sent");
        Ok(())
    }
}

/// RFC 2822 message with a single HTML part.
pub fn build_html_message(
    sender: &str,
    recipients: &[String],
    subject: &str,
    html: &str,
) -> String {
    format!(
        "From: {sender}\r\nTo: {}\r\nSubject: {subject}\r\nMIME-Version: 1.0\r\n\
         Content-Type: text/html; charset=\"UTF-8\"\r\n\r\n{html}",
        recipients.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_headers_list_all_recipients() {
        let recipients = vec!["a@example.com".to_string(), "b@example.com".to_string()];
        let message =
            build_html_message("bot@example.com", &recipients, "SM1 Report.", "<p>hi</p>");
        assert!(message.starts_with("From: bot@example.com\r\n"));
        assert!(message.contains("To: a@example.com, b@example.com\r\n"));
        assert!(message.contains("Content-Type: text/html"));
        assert!(message.ends_with("\r\n\r\n<p>hi</p>"));
    }
}
