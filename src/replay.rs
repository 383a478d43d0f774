//! Portal driver backed by a JSON export of the benefit-verification queue.
//!
//! The export mirrors what the portal shows as text (dates in `m/d/Y`,
//! status labels, payer spans), so the same mapping into domain types runs as
//! for a live driver. Every requested change is appended to an action log.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::{
    common::write_atomically,
    domain::{AuthorizationTerms, ClaimRow, ClaimSnapshot, Insurer},
    portal::{
        ClaimsPortal, ClientProfile, FetchedClaim, InsuranceEntry, InsuranceUpdate,
        PayerAuthorization, PayerPortal, PortalError, RecordAction,
    },
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortalExport {
    #[serde(default)]
    pub queues: BTreeMap<Insurer, Vec<ExportedRecord>>,
    #[serde(default)]
    pub payer_authorizations: Vec<ExportedPayerAuthorization>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportedRecord {
    pub client: String,
    #[serde(default)]
    pub days_in_queue: u32,
    #[serde(default)]
    pub eap: bool,
    /// Reads of this row that fail as stale before one succeeds.
    #[serde(default)]
    pub stale_reads: u32,
    #[serde(default)]
    pub member_number: String,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub authorization: ExportedAuthorization,
    #[serde(default)]
    pub missing_edit_control: bool,
    #[serde(default)]
    pub claims: Vec<ExportedClaimRow>,
    #[serde(default)]
    pub insurances: Vec<ExportedInsurance>,
    #[serde(default)]
    pub profile: ExportedProfile,
    /// Outcome actions on this record fail in the portal.
    #[serde(default)]
    pub reject_actions: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportedAuthorization {
    #[serde(default)]
    pub sessions: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportedClaimRow {
    pub status: String,
    #[serde(default)]
    pub payer: String,
    #[serde(default)]
    pub date_of_service: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportedInsurance {
    pub title: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub auth_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportedProfile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportedPayerAuthorization {
    pub auth_number: String,
    pub client_name: String,
    #[serde(default)]
    pub sessions: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

impl PortalExport {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid portal export JSON")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed reading portal export {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Failed parsing portal export {}", path.display()))
    }

    pub fn into_portals(self) -> (ReplayPortal, ReplayPayerPortal) {
        (
            ReplayPortal::new(self.queues),
            ReplayPayerPortal {
                authorizations: self.payer_authorizations,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionLogEntry {
    pub insurer: String,
    pub client: String,
    pub action: String,
    pub detail: String,
}

#[derive(Debug)]
pub struct ReplayPortal {
    queues: BTreeMap<Insurer, Vec<ExportedRecord>>,
    insurer: Option<Insurer>,
    queue: Vec<ExportedRecord>,
    stale_left: Vec<u32>,
    open: Option<usize>,
    actions: Vec<ActionLogEntry>,
}

impl ReplayPortal {
    pub fn new(queues: BTreeMap<Insurer, Vec<ExportedRecord>>) -> Self {
        Self {
            queues,
            insurer: None,
            queue: Vec::new(),
            stale_left: Vec::new(),
            open: None,
            actions: Vec::new(),
        }
    }

    pub fn actions(&self) -> &[ActionLogEntry] {
        &self.actions
    }

    pub fn write_action_log(&self, path: &Path) -> Result<()> {
        write_atomically(path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            for entry in &self.actions {
                writer
                    .serialize(entry)
                    .context("Failed writing action log entry")?;
            }
            writer.flush().context("Failed flushing action log")?;
            Ok(())
        })
        .with_context(|| format!("Failed writing action log {}", path.display()))
    }

    fn row(&self, row: usize) -> Result<&ExportedRecord, PortalError> {
        row.checked_sub(1)
            .and_then(|index| self.queue.get(index))
            .ok_or_else(|| PortalError::NotFound(format!("queue row {row}")))
    }

    fn consume_stale_read(&mut self, row: usize, what: &str) -> Result<(), PortalError> {
        let left = row
            .checked_sub(1)
            .and_then(|index| self.stale_left.get_mut(index))
            .ok_or_else(|| PortalError::NotFound(format!("queue row {row}")))?;
        if *left > 0 {
            *left -= 1;
            return Err(PortalError::Transient(format!("reading {what} of row {row}")));
        }
        Ok(())
    }

    fn open_record_ref(&self) -> Result<&ExportedRecord, PortalError> {
        self.open
            .and_then(|index| self.queue.get(index))
            .ok_or_else(|| PortalError::Fatal("no record is open".to_string()))
    }

    fn log(&mut self, action: &str, detail: impl Into<String>) -> Result<(), PortalError> {
        let client = self.open_record_ref()?.client.clone();
        self.actions.push(ActionLogEntry {
            insurer: self
                .insurer
                .map(|insurer| insurer.portal_label().to_string())
                .unwrap_or_default(),
            client,
            action: action.to_string(),
            detail: detail.into(),
        });
        Ok(())
    }
}

impl ClaimsPortal for ReplayPortal {
    async fn select_insurer(&mut self, insurer: Insurer) -> Result<(), PortalError> {
        let queue = self.queues.get(&insurer).cloned().ok_or_else(|| {
            PortalError::NotFound(format!("insurer option {}", insurer.portal_label()))
        })?;
        self.insurer = Some(insurer);
        self.queue = queue;
        self.stale_left = self.queue.iter().map(|record| record.stale_reads).collect();
        self.open = None;
        Ok(())
    }

    async fn sort_queue_by_days_in_queue(&mut self) -> Result<(), PortalError> {
        let mut rows: Vec<(ExportedRecord, u32)> = self
            .queue
            .drain(..)
            .zip(self.stale_left.drain(..))
            .collect();
        rows.sort_by(|a, b| b.0.days_in_queue.cmp(&a.0.days_in_queue));
        let (queue, stale_left): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        self.queue = queue;
        self.stale_left = stale_left;
        Ok(())
    }

    async fn queue_len(&mut self) -> Result<usize, PortalError> {
        if self.insurer.is_none() {
            return Err(PortalError::Fatal("no insurer selected".to_string()));
        }
        Ok(self.queue.len())
    }

    async fn read_client_name(&mut self, row: usize) -> Result<String, PortalError> {
        self.consume_stale_read(row, "client name")?;
        Ok(self.row(row)?.client.clone())
    }

    async fn read_eap_flag(&mut self, row: usize) -> Result<bool, PortalError> {
        Ok(self.row(row)?.eap)
    }

    async fn open_record(&mut self, row: usize) -> Result<(), PortalError> {
        self.row(row)?;
        self.open = Some(row - 1);
        Ok(())
    }

    async fn member_number(&mut self) -> Result<String, PortalError> {
        Ok(self.open_record_ref()?.member_number.clone())
    }

    async fn fetch_claim(
        &mut self,
        insurer: Insurer,
        member_number: &str,
    ) -> Result<FetchedClaim, PortalError> {
        let record = self.open_record_ref()?;
        let auth = &record.authorization;
        let terms =
            AuthorizationTerms::resolve(
                &auth.sessions,
                &auth.start_date,
                &auth.end_date,
                &auth.notes,
            );
        let rows = record
            .claims
            .iter()
            .map(|row| ClaimRow::from_portal_text(&row.status, &row.payer, &row.date_of_service))
            .collect();
        Ok(FetchedClaim {
            snapshot: ClaimSnapshot::new(insurer, member_number, terms, rows),
            missing_edit_control: record.missing_edit_control,
        })
    }

    async fn client_email(&mut self) -> Result<Option<String>, PortalError> {
        Ok(self.open_record_ref()?.client_email.clone())
    }

    async fn insurance_entries(
        &mut self,
        _client_email: &str,
    ) -> Result<Vec<InsuranceEntry>, PortalError> {
        Ok(self
            .open_record_ref()?
            .insurances
            .iter()
            .map(|entry| InsuranceEntry {
                title: entry.title.clone(),
                deleted: entry.deleted,
                auth_number: entry.auth_number.clone(),
            })
            .collect())
    }

    async fn client_profile(&mut self) -> Result<ClientProfile, PortalError> {
        let profile = &self.open_record_ref()?.profile;
        Ok(ClientProfile {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            date_of_birth: profile.date_of_birth.clone(),
        })
    }

    async fn update_insurance(
        &mut self,
        entry_index: usize,
        update: &InsuranceUpdate,
    ) -> Result<(), PortalError> {
        let mut detail = format!(
            "entry={} company={} policy={}",
            entry_index, update.company_name, update.policy_number
        );
        if let Some(sessions) = &update.session_count {
            detail.push_str(&format!(" sessions={sessions}"));
        }
        if let (Some(start), Some(end)) = (&update.start_date, &update.end_date) {
            detail.push_str(&format!(" window={start}-{end}"));
        }
        self.log("update_insurance", detail)
    }

    async fn set_record_policy_number(&mut self, number: &str) -> Result<(), PortalError> {
        self.log("set_policy_number", number)
    }

    async fn add_client_note(&mut self, note: &str) -> Result<(), PortalError> {
        self.log("add_note", note)
    }

    async fn perform(&mut self, action: RecordAction) -> Result<(), PortalError> {
        if self.open_record_ref()?.reject_actions {
            return Err(PortalError::Fatal(format!(
                "{} button did not respond",
                action.as_str()
            )));
        }
        self.log(action.as_str(), "")?;
        self.open = None;
        Ok(())
    }

    async fn close_record(&mut self) -> Result<(), PortalError> {
        if self.open.is_some() {
            self.log("close_record", "")?;
            self.open = None;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ReplayPayerPortal {
    authorizations: Vec<ExportedPayerAuthorization>,
}

impl PayerPortal for ReplayPayerPortal {
    async fn find_authorization(
        &mut self,
        auth_number: &str,
    ) -> Result<Option<PayerAuthorization>, PortalError> {
        Ok(self
            .authorizations
            .iter()
            .find(|found| found.auth_number.trim() == auth_number.trim())
            .map(|found| PayerAuthorization {
                auth_number: found.auth_number.clone(),
                client_name: found.client_name.clone(),
                session_count: found.sessions.clone(),
                start_date: found.start_date.clone(),
                end_date: found.end_date.clone(),
            }))
    }
}
