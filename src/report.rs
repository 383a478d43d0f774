use anyhow::{Context, Result};
use std::{fs, io::Write, path::Path};

use crate::common::write_atomically;

const DEFAULT_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>EAP Benefits Verification Report</title>
<style>
table { border-collapse: collapse; font-family: sans-serif; font-size: 13px; }
th, td { border: 1px solid #999; padding: 4px 8px; text-align: left; }
th { background: #eee; }
</style>
</head>
<body>
<h2>EAP Benefits Verification Report</h2>
<table>
{{ report }}
</table>
</body>
</html>
"#;

/// Placeholder in an HTML template that receives the report table rows.
pub const REPORT_PLACEHOLDER: &str = "{{ report }}";

/// Outcome flags for one processed queue record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRow {
    pub claim_type: String,
    pub client: String,
    pub blank_member_number: bool,
    pub blank_client_email: bool,
    pub blank_authorization_number: bool,
    pub had_processing_or_processed_row: bool,
    pub missing_edit_control: bool,
    pub set_for_cash_pay: bool,
    pub verified_mark_as_worked: bool,
    pub escalated: bool,
}

impl ReportRow {
    pub const FIELD_NAMES: [&'static str; 10] = [
        "claim_type",
        "client",
        "blank_member_number",
        "blank_client_email",
        "blank_authorization_number",
        "had_processing_or_processed_row",
        "missing_edit_control",
        "set_for_cash_pay",
        "verified_mark_as_worked",
        "escalated",
    ];

    pub fn new(claim_type: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            ..Self::default()
        }
    }

    fn cells(&self) -> [String; 10] {
        let flag = |v: bool| u8::from(v).to_string();
        [
            self.claim_type.clone(),
            self.client.clone(),
            flag(self.blank_member_number),
            flag(self.blank_client_email),
            flag(self.blank_authorization_number),
            flag(self.had_processing_or_processed_row),
            flag(self.missing_edit_control),
            flag(self.set_for_cash_pay),
            flag(self.verified_mark_as_worked),
            flag(self.escalated),
        ]
    }
}

/// Append-only report for one run, in processing order.
#[derive(Debug, Default)]
pub struct ReportAccumulator {
    rows: Vec<ReportRow>,
}

impl ReportAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn export_csv(&self, path: &Path) -> Result<()> {
        write_atomically(path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer
                .write_record(ReportRow::FIELD_NAMES)
                .context("Failed writing report header")?;
            for row in &self.rows {
                writer
                    .write_record(row.cells())
                    .context("Failed writing report row")?;
            }
            writer.flush().context("Failed flushing report writer")?;
            Ok(())
        })
        .with_context(|| format!("Failed exporting report CSV {}", path.display()))
    }

    /// Replaces `{{ report }}` in the template with escaped table rows.
    pub fn render_html(&self, template: &str) -> String {
        let mut table = String::from("<tr>");
        for name in ReportRow::FIELD_NAMES {
            table.push_str(&format!("<th>{}</th>", escape_html(name)));
        }
        table.push_str("</tr>\n");
        for row in &self.rows {
            table.push_str("<tr>");
            for cell in row.cells() {
                table.push_str(&format!("<td>{}</td>", escape_html(&cell)));
            }
            table.push_str("</tr>\n");
        }
        template.replace(REPORT_PLACEHOLDER, &table)
    }

    /// Renders the report into `path`. Without a template file the built-in
    /// layout is used.
    pub fn export_html(&self, path: &Path, template: Option<&Path>) -> Result<String> {
        let template_text = match template {
            Some(template_path) => fs::read_to_string(template_path).with_context(|| {
                format!("Failed reading report template {}", template_path.display())
            })?,
            None => DEFAULT_HTML_TEMPLATE.to_string(),
        };
        let html = self.render_html(&template_text);
        write_atomically(path, |file| {
            file.write_all(html.as_bytes())
                .context("Failed writing report HTML")?;
            Ok(())
        })
        .with_context(|| format!("Failed exporting report HTML {}", path.display()))?;
        Ok(html)
    }

    pub fn verified_count(&self) -> usize {
        self.rows.iter().filter(|r| r.verified_mark_as_worked).count()
    }

    pub fn cash_pay_count(&self) -> usize {
        self.rows.iter().filter(|r| r.set_for_cash_pay).count()
    }

    pub fn escalated_count(&self) -> usize {
        self.rows.iter().filter(|r| r.escalated).count()
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
