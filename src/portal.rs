//! Interfaces to the claims portal and the payer portal.
//!
//! Drivers map portal reads into domain types and carry out the actions the
//! processor requests. Locators and page mechanics stay behind these traits.

use crate::domain::{ClaimSnapshot, Insurer};

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Stale element or element not found within its wait.
    #[error("transient portal failure while {0}")]
    Transient(String),
    #[error("{0} not found in portal")]
    NotFound(String),
    #[error("portal failure: {0}")]
    Fatal(String),
}

impl PortalError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PortalError::Transient(_))
    }
}

/// What the portal yields when a record's claims are looked up by number.
#[derive(Debug, Clone)]
pub struct FetchedClaim {
    pub snapshot: ClaimSnapshot,
    /// No qualifying row offered an edit-insurance control to read terms from.
    pub missing_edit_control: bool,
}

/// An insurance listed under a client's payment types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsuranceEntry {
    pub title: String,
    pub deleted: bool,
    pub auth_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsuranceUpdate {
    pub company_name: String,
    pub policy_number: String,
    pub session_count: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientProfile {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
}

impl ClientProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Outcome actions that change a record's state in the claims portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    MarkVerified,
    SetUpCashPay,
}

impl RecordAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordAction::MarkVerified => "mark_verified",
            RecordAction::SetUpCashPay => "set_up_cash_pay",
        }
    }
}

pub trait ClaimsPortal {
    async fn select_insurer(&mut self, insurer: Insurer) -> Result<(), PortalError>;

    /// Sorts the benefit-verification queue by days in queue, descending.
    async fn sort_queue_by_days_in_queue(&mut self) -> Result<(), PortalError>;

    async fn queue_len(&mut self) -> Result<usize, PortalError>;

    /// Rows are 1-based, in queue display order.
    async fn read_client_name(&mut self, row: usize) -> Result<String, PortalError>;

    async fn read_eap_flag(&mut self, row: usize) -> Result<bool, PortalError>;

    async fn open_record(&mut self, row: usize) -> Result<(), PortalError>;

    /// Member or authorization number on the open record; empty when blank.
    async fn member_number(&mut self) -> Result<String, PortalError>;

    async fn fetch_claim(
        &mut self,
        insurer: Insurer,
        member_number: &str,
    ) -> Result<FetchedClaim, PortalError>;

    async fn client_email(&mut self) -> Result<Option<String>, PortalError>;

    async fn insurance_entries(&mut self, client_email: &str)
    -> Result<Vec<InsuranceEntry>, PortalError>;

    async fn client_profile(&mut self) -> Result<ClientProfile, PortalError>;

    async fn update_insurance(
        &mut self,
        entry_index: usize,
        update: &InsuranceUpdate,
    ) -> Result<(), PortalError>;

    async fn set_record_policy_number(&mut self, number: &str) -> Result<(), PortalError>;

    async fn add_client_note(&mut self, note: &str) -> Result<(), PortalError>;

    async fn perform(&mut self, action: RecordAction) -> Result<(), PortalError>;

    /// Leaves the open record without changing it.
    async fn close_record(&mut self) -> Result<(), PortalError>;
}

/// Authorization found in the payer's provider portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayerAuthorization {
    pub auth_number: String,
    pub client_name: String,
    pub session_count: String,
    pub start_date: String,
    pub end_date: String,
}

pub trait PayerPortal {
    async fn find_authorization(
        &mut self,
        auth_number: &str,
    ) -> Result<Option<PayerAuthorization>, PortalError>;
}
