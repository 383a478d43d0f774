use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::{
    config::RunConfig,
    constants::{REPORT_CSV_FILE_NAME, REPORT_HTML_FILE_NAME, REPORT_MAIL_SUBJECT},
    domain::Insurer,
    mail::MailSender,
    portal::{ClaimsPortal, PayerPortal},
    processor::RecordProcessor,
    report::ReportAccumulator,
    sheets::{AuthorizationSheet, SpreadsheetSink},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub verified: usize,
    pub cash_pay: usize,
    pub escalated: usize,
    pub sheet_rows: usize,
    pub csv_path: PathBuf,
    pub html_path: PathBuf,
}

/// Collaborators a run needs besides the portals.
pub struct RunSinks<'a, S, M> {
    pub sheet: &'a S,
    /// `None` disables the report mail regardless of run mode.
    pub mailer: Option<&'a M>,
}

/// Processes every configured insurer's queue, then flushes the spreadsheet,
/// exports the report and mails it in production.
///
/// If a queue fails part way, the rows gathered so far are still exported
/// before the error is returned.
pub async fn run<P, Q, S, M>(
    config: &RunConfig,
    portal: &mut P,
    payer: &mut Q,
    sinks: RunSinks<'_, S, M>,
) -> Result<RunSummary>
where
    P: ClaimsPortal,
    Q: PayerPortal,
    S: SpreadsheetSink,
    M: MailSender,
{
    let mut report = ReportAccumulator::new();
    let mut sheet = AuthorizationSheet::new();

    let mut loop_result = Ok(());
    for insurer in &config.insurers {
        if let Err(err) =
            process_queue(config, *insurer, portal, payer, &mut sheet, &mut report).await
        {
            error!(%insurer, "Queue processing stopped: {err:#}");
            loop_result = Err(err);
            break;
        }
    }

    let sheet_rows = match sheet.flush(sinks.sheet, &config.retry.sheet_write).await {
        Ok(written) => written,
        Err(err) => {
            error!("Failed sending client authorizations to the spreadsheet: {err:#}");
            0
        }
    };

    let csv_path = config.output_dir.join(REPORT_CSV_FILE_NAME);
    report.export_csv(&csv_path)?;
    let html_path = config.output_dir.join(REPORT_HTML_FILE_NAME);
    let html = report.export_html(&html_path, config.report_template.as_deref())?;
    info!(
        records = report.len(),
        csv = %csv_path.display(),
        html = %html_path.display(),
        "Report exported"
    );

    loop_result?;

    if config.mode.is_production() {
        match sinks.mailer {
            Some(mailer) => mailer
                .send_html(&config.report_recipients, REPORT_MAIL_SUBJECT, &html)
                .await
                .context("Failed sending report mail")?,
            None => warn!("No mail sender configured; report was not mailed"),
        }
    }

    Ok(RunSummary {
        records: report.len(),
        verified: report.verified_count(),
        cash_pay: report.cash_pay_count(),
        escalated: report.escalated_count(),
        sheet_rows,
        csv_path,
        html_path,
    })
}

/// Selecting the insurer is the only fatal step. A queue that cannot be
/// sorted or counted is logged and skipped so the remaining insurers still run.
async fn process_queue<P: ClaimsPortal, Q: PayerPortal>(
    config: &RunConfig,
    insurer: Insurer,
    portal: &mut P,
    payer: &mut Q,
    sheet: &mut AuthorizationSheet,
    report: &mut ReportAccumulator,
) -> Result<()> {
    info!(%insurer, "Processing insurer queue");
    portal
        .select_insurer(insurer)
        .await
        .with_context(|| format!("Failed selecting insurer {insurer}"))?;

    let total = match load_queue(portal).await {
        Ok(total) => total,
        Err(err) => {
            error!(%insurer, "Skipping insurer queue: {err:#}");
            return Ok(());
        }
    };
    info!(%insurer, records = total, "Queue loaded");

    let mut processor = RecordProcessor::new(config, portal, payer, sheet);
    for row in 1..=total {
        let outcome = processor.process(insurer, row).await;
        report.add(outcome);
    }
    Ok(())
}

async fn load_queue<P: ClaimsPortal>(portal: &mut P) -> Result<usize> {
    portal
        .sort_queue_by_days_in_queue()
        .await
        .context("Failed sorting queue by days in queue")?;
    let total = portal
        .queue_len()
        .await
        .context("Failed counting queue records")?;
    Ok(total)
}
