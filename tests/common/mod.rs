#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use eap_benefits_verification::{
    config::{RunConfig, RunMode},
    domain::Insurer,
    mail::MailSender,
    portal::{
        ClaimsPortal, ClientProfile, FetchedClaim, InsuranceEntry, InsuranceUpdate, PortalError,
        RecordAction,
    },
    replay::{PortalExport, ReplayPayerPortal, ReplayPortal},
    retry::RetrySettings,
    sheets::{SinkError, SpreadsheetSink},
};
use reqwest::StatusCode;
use std::{cell::RefCell, path::Path};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Run date used by every scenario; Cigna numbers must start with `24`.
pub fn today() -> NaiveDate {
    date(2024, 5, 1)
}

pub fn config(mode: RunMode, output_dir: &Path) -> RunConfig {
    let mut config = RunConfig::new(mode, today(), output_dir);
    config.retry = RetrySettings::immediate();
    config.report_recipients = vec!["ops@example.test".to_string()];
    config
}

pub fn portals(export_json: &str) -> (ReplayPortal, ReplayPayerPortal) {
    PortalExport::from_json_str(export_json)
        .unwrap()
        .into_portals()
}

/// Portals with the given insurer's queue already selected and sorted.
pub async fn portals_for(insurer: Insurer, export_json: &str) -> (ReplayPortal, ReplayPayerPortal) {
    let (mut portal, payer) = portals(export_json);
    portal.select_insurer(insurer).await.unwrap();
    portal.sort_queue_by_days_in_queue().await.unwrap();
    (portal, payer)
}

pub fn action_names(portal: &ReplayPortal) -> Vec<String> {
    portal
        .actions()
        .iter()
        .map(|entry| entry.action.clone())
        .collect()
}

#[derive(Default)]
pub struct RecordingSink {
    pub appended: RefCell<Vec<(String, Vec<Vec<String>>)>>,
    pub reject_with: Option<StatusCode>,
}

impl SpreadsheetSink for RecordingSink {
    async fn append_rows(&self, range: &str, rows: &[Vec<String>]) -> Result<(), SinkError> {
        if let Some(status) = self.reject_with {
            return Err(SinkError::Status {
                target: range.to_string(),
                status,
                body: "rejected".to_string(),
            });
        }
        self.appended
            .borrow_mut()
            .push((range.to_string(), rows.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: RefCell<Vec<(Vec<String>, String, String)>>,
}

impl MailSender for RecordingMailer {
    async fn send_html(&self, recipients: &[String], subject: &str, html: &str) -> Result<()> {
        self.sent.borrow_mut().push((
            recipients.to_vec(),
            subject.to_string(),
            html.to_string(),
        ));
        Ok(())
    }
}

/// Replay portal whose queue sort fails for one insurer.
pub struct UnsortablePortal {
    pub inner: ReplayPortal,
    pub unsortable: Insurer,
    selected: Option<Insurer>,
}

impl UnsortablePortal {
    pub fn new(inner: ReplayPortal, unsortable: Insurer) -> Self {
        Self {
            inner,
            unsortable,
            selected: None,
        }
    }
}

impl ClaimsPortal for UnsortablePortal {
    async fn select_insurer(&mut self, insurer: Insurer) -> Result<(), PortalError> {
        self.selected = Some(insurer);
        self.inner.select_insurer(insurer).await
    }

    async fn sort_queue_by_days_in_queue(&mut self) -> Result<(), PortalError> {
        if self.selected == Some(self.unsortable) {
            return Err(PortalError::Fatal("days in queue header is missing".to_string()));
        }
        self.inner.sort_queue_by_days_in_queue().await
    }

    async fn queue_len(&mut self) -> Result<usize, PortalError> {
        self.inner.queue_len().await
    }

    async fn read_client_name(&mut self, row: usize) -> Result<String, PortalError> {
        self.inner.read_client_name(row).await
    }

    async fn read_eap_flag(&mut self, row: usize) -> Result<bool, PortalError> {
        self.inner.read_eap_flag(row).await
    }

    async fn open_record(&mut self, row: usize) -> Result<(), PortalError> {
        self.inner.open_record(row).await
    }

    async fn member_number(&mut self) -> Result<String, PortalError> {
        self.inner.member_number().await
    }

    async fn fetch_claim(
        &mut self,
        insurer: Insurer,
        member_number: &str,
    ) -> Result<FetchedClaim, PortalError> {
        self.inner.fetch_claim(insurer, member_number).await
    }

    async fn client_email(&mut self) -> Result<Option<String>, PortalError> {
        self.inner.client_email().await
    }

    async fn insurance_entries(
        &mut self,
        client_email: &str,
    ) -> Result<Vec<InsuranceEntry>, PortalError> {
        self.inner.insurance_entries(client_email).await
    }

    async fn client_profile(&mut self) -> Result<ClientProfile, PortalError> {
        self.inner.client_profile().await
    }

    async fn update_insurance(
        &mut self,
        entry_index: usize,
        update: &InsuranceUpdate,
    ) -> Result<(), PortalError> {
        self.inner.update_insurance(entry_index, update).await
    }

    async fn set_record_policy_number(&mut self, number: &str) -> Result<(), PortalError> {
        self.inner.set_record_policy_number(number).await
    }

    async fn add_client_note(&mut self, note: &str) -> Result<(), PortalError> {
        self.inner.add_client_note(note).await
    }

    async fn perform(&mut self, action: RecordAction) -> Result<(), PortalError> {
        self.inner.perform(action).await
    }

    async fn close_record(&mut self) -> Result<(), PortalError> {
        self.inner.close_record().await
    }
}
