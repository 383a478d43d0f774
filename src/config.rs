use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};

use crate::{
    constants::REQUIRED_CREDENTIAL_GROUPS,
    domain::Insurer,
    retry::RetrySettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Development run: no portal mutations, test spreadsheet, no report mail.
    Local,
    Production,
}

impl RunMode {
    /// Outcome actions are only applied to the portal in production; a local
    /// run closes the record instead.
    pub fn is_production(self) -> bool {
        matches!(self, RunMode::Production)
    }
}

/// Named credential groups, each a map of field name to value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Credentials {
    groups: BTreeMap<String, BTreeMap<String, String>>,
}

impl Credentials {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid credentials JSON")
    }

    pub fn group(&self, name: &str) -> Result<&BTreeMap<String, String>> {
        self.groups
            .get(name)
            .with_context(|| format!("Credential group {name:?} is missing"))
    }

    pub fn field(&self, group: &str, field: &str) -> Result<&str> {
        self.group(group)?
            .get(field)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("Credential field {group}.{field} is missing"))
    }

    /// Every collaborator's group must be present before a run starts.
    pub fn require_groups(&self) -> Result<()> {
        let missing: Vec<&str> = REQUIRED_CREDENTIAL_GROUPS
            .iter()
            .copied()
            .filter(|group| !self.groups.contains_key(*group))
            .collect();
        if !missing.is_empty() {
            bail!("Missing credential groups: {}", missing.join(", "));
        }
        Ok(())
    }
}

pub trait CredentialSource {
    fn load(&self) -> Result<Credentials>;
}

/// Credential groups exported to a JSON file.
pub struct JsonFileCredentials {
    path: PathBuf,
}

impl JsonFileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialSource for JsonFileCredentials {
    fn load(&self) -> Result<Credentials> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed reading credentials {}", self.path.display()))?;
        let credentials = Credentials::from_json_str(&text)
            .with_context(|| format!("Failed parsing credentials {}", self.path.display()))?;
        credentials.require_groups()?;
        Ok(credentials)
    }
}

/// Run-wide settings, built once in `main` and borrowed by every component.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    pub today: NaiveDate,
    pub insurers: Vec<Insurer>,
    pub output_dir: PathBuf,
    pub report_template: Option<PathBuf>,
    pub report_recipients: Vec<String>,
    pub retry: RetrySettings,
}

impl RunConfig {
    pub fn new(mode: RunMode, today: NaiveDate, output_dir: &Path) -> Self {
        Self {
            mode,
            today,
            insurers: vec![Insurer::Cigna, Insurer::UnitedHealthCare],
            output_dir: output_dir.to_path_buf(),
            report_template: None,
            report_recipients: Vec::new(),
            retry: RetrySettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "claims_portal": {"url": "https://admin.example.test", "login": "bot", "password": "pw"},
        "payer_portal": {"url": "https://payer.example.test", "login": "bot", "password": "pw"},
        "mailbox": {
            "login": "bot@example.test",
            "access_token": "tok",
            "sheet_id": "prod",
            "test_sheet_id": "test"
        },
        "captcha": {"api_key": "key"}
    }"#;

    #[test]
    fn reads_groups_and_fields() {
        let creds = Credentials::from_json_str(SAMPLE).unwrap();
        creds.require_groups().unwrap();
        assert_eq!(creds.field("captcha", "api_key").unwrap(), "key");
        assert!(creds.field("captcha", "secret").is_err());
        assert!(creds.group("vault").is_err());
    }

    #[test]
    fn missing_group_is_reported_by_name() {
        let creds = Credentials::from_json_str(r#"{"claims_portal": {}}"#).unwrap();
        let err = creds.require_groups().unwrap_err().to_string();
        assert!(err.contains("payer_portal"));
        assert!(err.contains("captcha"));
    }

    #[test]
    fn blank_field_counts_as_missing() {
        let creds = Credentials::from_json_str(r#"{"mailbox": {"access_token": "  "}}"#).unwrap();
        assert!(creds.field("mailbox", "access_token").is_err());
    }

    #[test]
    fn json_file_source_validates_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        fs::write(&path, SAMPLE).unwrap();
        assert!(JsonFileCredentials::new(&path).load().is_ok());

        fs::write(&path, r#"{"mailbox": {}}"#).unwrap();
        assert!(JsonFileCredentials::new(&path).load().is_err());
    }

    #[test]
    fn only_production_applies_actions() {
        assert!(!RunMode::Local.is_production());
        assert!(RunMode::Production.is_production());
    }
}
