mod args;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info};

use args::Args;
use eap_benefits_verification::{
    config::{CredentialSource, Credentials, JsonFileCredentials, RunConfig, RunMode},
    constants::{ACTION_LOG_FILE_NAME, DEFAULT_REPORT_RECIPIENTS, MAILBOX_GROUP},
    mail::GmailSender,
    replay::PortalExport,
    retry::RetryPolicy,
    run::{RunSinks, run},
    sheets::GoogleSheetsSink,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    if let Err(err) = run_from_args(args).await {
        error!("Benefits verification run failed: {err:#}");
        return Err(err);
    }
    Ok(())
}

async fn run_from_args(args: Args) -> Result<()> {
    let config = build_config(&args);
    info!(
        mode = ?config.mode,
        today = %config.today,
        insurers = config.insurers.len(),
        "Starting benefits verification run"
    );

    let credentials = JsonFileCredentials::new(&args.credentials).load()?;
    let (mut portal, mut payer) = PortalExport::from_path(&args.queue)?.into_portals();

    let client = Client::builder()
        .user_agent("eap-benefits-verification/0.1")
        .build()
        .context("Failed building HTTP client")?;

    let sheet_id = credentials.field(MAILBOX_GROUP, sheet_id_field(config.mode))?;
    let access_token = credentials.field(MAILBOX_GROUP, "access_token")?;
    let sheet = GoogleSheetsSink::new(
        client.clone(),
        &args.sheets_api_base_url,
        sheet_id,
        access_token,
    );
    let mailer = build_mailer(&config, &credentials, client, &args.gmail_send_url)?;

    let outcome = run(
        &config,
        &mut portal,
        &mut payer,
        RunSinks {
            sheet: &sheet,
            mailer: mailer.as_ref(),
        },
    )
    .await;

    let action_log = config.output_dir.join(ACTION_LOG_FILE_NAME);
    portal.write_action_log(&action_log)?;

    let summary = outcome?;
    info!(
        records = summary.records,
        verified = summary.verified,
        cash_pay = summary.cash_pay,
        escalated = summary.escalated,
        sheet_rows = summary.sheet_rows,
        report = %summary.csv_path.display(),
        actions = %action_log.display(),
        "Run complete"
    );
    Ok(())
}

fn build_config(args: &Args) -> RunConfig {
    let today = args
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut config = RunConfig::new(args.mode, today, &args.output_dir);
    if !args.insurers.is_empty() {
        config.insurers = args.insurers.clone();
    }
    config.report_template = args.report_template.clone();
    config.report_recipients = if args.report_recipients.is_empty() {
        DEFAULT_REPORT_RECIPIENTS
            .iter()
            .map(|r| r.to_string())
            .collect()
    } else {
        args.report_recipients.clone()
    };

    config.retry.ui_read =
        RetryPolicy::fixed(args.max_retries, Duration::from_millis(args.retry_delay_ms));
    config
}

fn sheet_id_field(mode: RunMode) -> &'static str {
    if mode.is_production() {
        "sheet_id"
    } else {
        "test_sheet_id"
    }
}

fn build_mailer(
    config: &RunConfig,
    credentials: &Credentials,
    client: Client,
    send_url: &str,
) -> Result<Option<GmailSender>> {
    if !config.mode.is_production() {
        return Ok(None);
    }
    let sender = credentials.field(MAILBOX_GROUP, "login")?;
    let access_token = credentials.field(MAILBOX_GROUP, "access_token")?;
    Ok(Some(GmailSender::new(client, send_url, sender, access_token)))
}
