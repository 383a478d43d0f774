use anyhow::{Context, Result};
use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use tracing::info;

use crate::{
    common::{is_retryable_status, truncate_for_log},
    constants::{AUTHORIZATION_SHEET_NAMES_RANGE, AUTHORIZATION_SHEET_NUMBERS_RANGE},
    retry::RetryPolicy,
};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("request to {target} failed: {source}")]
    Request {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{target} returned status {status}: {body}")]
    Status {
        target: String,
        status: StatusCode,
        body: String,
    },
}

impl SinkError {
    /// Timeouts, dropped connections and throttling/5xx statuses.
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Request { source, .. } => {
                source.is_timeout()
                    || source.is_connect()
                    || source.is_request()
                    || source.is_body()
            }
            SinkError::Status { status, .. } => is_retryable_status(*status),
        }
    }
}

pub trait SpreadsheetSink {
    async fn append_rows(&self, range: &str, rows: &[Vec<String>]) -> Result<(), SinkError>;
}

/// Appends through the Sheets `values:append` endpoint.
pub struct GoogleSheetsSink {
    client: Client,
    base_url: String,
    sheet_id: String,
    access_token: String,
}

impl GoogleSheetsSink {
    pub fn new(client: Client, base_url: &str, sheet_id: &str, access_token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sheet_id: sheet_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn append_url(&self, range: &str) -> Result<Url, SinkError> {
        let mut url = Url::parse(&self.base_url).map_err(|err| SinkError::Status {
            target: self.base_url.clone(),
            status: StatusCode::BAD_REQUEST,
            body: format!("invalid base URL: {err}"),
        })?;
        url.path_segments_mut()
            .map_err(|_| SinkError::Status {
                target: self.base_url.clone(),
                status: StatusCode::BAD_REQUEST,
                body: "base URL cannot carry path segments".to_string(),
            })?
            .push(&self.sheet_id)
            .push("values")
            .push(&format!("{range}:append"));
        Ok(url)
    }
}

impl SpreadsheetSink for GoogleSheetsSink {
    async fn append_rows(&self, range: &str, rows: &[Vec<String>]) -> Result<(), SinkError> {
        let url = self.append_url(range)?;
        let target = format!("sheet range {range}");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({ "values": rows }))
            .send()
            .await
            .map_err(|source| SinkError::Request {
                target: target.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            target,
            status,
            body: truncate_for_log(&body),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRow {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub auth_number: String,
}

/// Clients with a confirmed authorization number, buffered for one append at run end.
#[derive(Debug, Default)]
pub struct AuthorizationSheet {
    rows: Vec<AuthorizationRow>,
}

impl AuthorizationSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&mut self, row: AuthorizationRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[AuthorizationRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sends names and birth dates to one range and authorization numbers to
    /// another. Returns how many clients were written.
    pub async fn flush<S: SpreadsheetSink>(
        &mut self,
        sink: &S,
        policy: &RetryPolicy,
    ) -> Result<usize> {
        if self.rows.is_empty() {
            info!("No clients with a valid authorization number were found, nothing to send");
            return Ok(0);
        }

        let names: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                vec![
                    row.first_name.clone(),
                    row.last_name.clone(),
                    row.date_of_birth.clone(),
                ]
            })
            .collect();
        let numbers: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| vec![row.auth_number.clone()])
            .collect();

        info!(clients = self.rows.len(), "Sending client authorizations to the spreadsheet");
        append_with_retry(sink, AUTHORIZATION_SHEET_NAMES_RANGE, &names, policy).await?;
        append_with_retry(sink, AUTHORIZATION_SHEET_NUMBERS_RANGE, &numbers, policy).await?;

        let written = self.rows.len();
        self.rows.clear();
        Ok(written)
    }
}

async fn append_with_retry<S: SpreadsheetSink>(
    sink: &S,
    range: &str,
    rows: &[Vec<String>],
    policy: &RetryPolicy,
) -> Result<()> {
    policy
        .run(
            &format!("Append to {range}"),
            SinkError::is_retryable,
            async |_| sink.append_rows(range, rows).await,
        )
        .await
        .with_context(|| format!("Failed appending {} rows to {range}", rows.len()))
}
