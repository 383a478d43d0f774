use clap::Parser;
use std::path::PathBuf;

use eap_benefits_verification::{
    config::RunMode,
    constants::{GMAIL_SEND_URL, SHEETS_API_BASE_URL, UI_READ_ATTEMPTS},
    domain::Insurer,
};

#[derive(Debug, Parser)]
#[command(name = "eap-benefits-verification")]
#[command(about = "Verify queued EAP benefit authorizations and report the outcomes")]
pub struct Args {
    /// `local` runs without changing portal records, against the test sheet, without mailing.
    #[arg(value_enum, default_value = "production")]
    pub mode: RunMode,

    /// JSON file with the claims_portal, payer_portal, mailbox and captcha credential groups.
    #[arg(long, env = "EAP_CREDENTIALS")]
    pub credentials: PathBuf,

    /// JSON export of the benefit-verification queue to replay.
    #[arg(long)]
    pub queue: PathBuf,

    /// Directory for the CSV/HTML report and the portal action log.
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// HTML template containing `{{ report }}`. Defaults to the built-in layout.
    #[arg(long)]
    pub report_template: Option<PathBuf>,

    /// Reference date (YYYY-MM-DD) for benefit-year checks. Defaults to today.
    #[arg(long)]
    pub today: Option<chrono::NaiveDate>,

    /// Insurer queues to process, in order. Defaults to Cigna then United Health Care.
    #[arg(long = "insurer", value_enum)]
    pub insurers: Vec<Insurer>,

    /// Report recipients. Defaults to the operations distribution list.
    #[arg(long = "report-recipient")]
    pub report_recipients: Vec<String>,

    /// Max attempts for transient portal reads.
    #[arg(long, default_value_t = UI_READ_ATTEMPTS)]
    pub max_retries: u32,

    /// Delay between portal read attempts.
    #[arg(long, default_value_t = 250)]
    pub retry_delay_ms: u64,

    /// Sheets API base URL.
    #[arg(long, default_value = SHEETS_API_BASE_URL)]
    pub sheets_api_base_url: String,

    /// Gmail API send endpoint.
    #[arg(long, default_value = GMAIL_SEND_URL)]
    pub gmail_send_url: String,
}
