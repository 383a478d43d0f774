//! Second login factors: captcha tokens and emailed one-time access codes.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;

use crate::{constants::ACCESS_CODE_SUBJECT, retry::RetryPolicy};

pub trait CaptchaSolver {
    async fn solve(&self, image: &[u8]) -> Result<String>;
}

pub trait OtpSource {
    /// Code from a message with `subject` received on `day`, if one has arrived.
    async fn find_code(&self, subject: &str, day: NaiveDate) -> Result<Option<String>>;
}

pub async fn solve_captcha<C: CaptchaSolver>(
    solver: &C,
    image: &[u8],
    policy: &RetryPolicy,
) -> Result<String> {
    policy
        .run("Captcha solve", |_: &anyhow::Error| true, async |_| {
            let token = solver.solve(image).await?;
            let token = token.trim();
            if token.is_empty() {
                return Err(anyhow!("captcha solver returned an empty token"));
            }
            Ok(token.to_string())
        })
        .await
        .with_context(|| format!("Failed to solve captcha after {} attempts", policy.attempts()))
}

pub async fn retrieve_access_code<O: OtpSource>(
    source: &O,
    today: NaiveDate,
    policy: &RetryPolicy,
) -> Result<String> {
    policy
        .run("Access code lookup", |_: &anyhow::Error| true, async |_| {
            source
                .find_code(ACCESS_CODE_SUBJECT, today)
                .await?
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty())
                .ok_or_else(|| anyhow!("no access code email received on {today}"))
        })
        .await
        .with_context(|| {
            format!(
                "Failed to retrieve access code after {} attempts",
                policy.attempts()
            )
        })
}
