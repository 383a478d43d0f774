use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::LazyLock};
use tracing::warn;

use crate::constants::{EAP_MARKER, PORTAL_DATE_FORMAT};

static NOTES_SESSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Sessions:\s(\d+)").expect("static regex"));
static NOTES_START_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Start Date:\s(\d+/\d+/\d+)").expect("static regex"));
static NOTES_END_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"End Date:\s(\d+/\d+/\d+)").expect("static regex"));

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Insurer {
    Cigna,
    UnitedHealthCare,
    Optum,
}

/// Which authorization-number format an insurer's records carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberRule {
    Cigna,
    Optum,
}

impl Insurer {
    /// Label the claims portal uses in its insurance selector.
    pub fn portal_label(self) -> &'static str {
        match self {
            Insurer::Cigna => "Cigna",
            Insurer::UnitedHealthCare => "United Health Care",
            Insurer::Optum => "Optum",
        }
    }

    /// Company name written onto a client's EAP insurance once verified.
    pub fn eap_company_name(self) -> &'static str {
        match self {
            Insurer::Cigna => "Cigna",
            Insurer::UnitedHealthCare | Insurer::Optum => "Optum",
        }
    }

    pub fn number_rule(self) -> NumberRule {
        match self {
            Insurer::Cigna => NumberRule::Cigna,
            Insurer::UnitedHealthCare | Insurer::Optum => NumberRule::Optum,
        }
    }

    /// Days after the authorization end date during which a service still counts.
    pub fn grace_days(self) -> u64 {
        match self {
            Insurer::Cigna => 30,
            Insurer::UnitedHealthCare | Insurer::Optum => 0,
        }
    }

    /// Whether a claim row must carry the EAP payer marker to count against the authorization.
    pub fn requires_eap_payer(self) -> bool {
        !matches!(self, Insurer::Cigna)
    }
}

impl fmt::Display for Insurer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.portal_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Processing,
    Proposed,
    Other,
}

impl ClaimStatus {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Processing" => ClaimStatus::Processing,
            "Proposed" => ClaimStatus::Proposed,
            _ => ClaimStatus::Other,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, ClaimStatus::Processing | ClaimStatus::Proposed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRow {
    pub status: ClaimStatus,
    pub payer_label: String,
    /// `None` when the row's date could not be read or parsed.
    pub date_of_service: Option<NaiveDate>,
}

impl ClaimRow {
    pub fn new(
        status: ClaimStatus,
        payer_label: impl Into<String>,
        date_of_service: NaiveDate,
    ) -> Self {
        Self {
            status,
            payer_label: payer_label.into(),
            date_of_service: Some(date_of_service),
        }
    }

    /// Builds a row from the text the claims table shows.
    pub fn from_portal_text(status: &str, payer_label: &str, date_of_service: &str) -> Self {
        let parsed = parse_portal_date(date_of_service);
        if parsed.is_none() {
            warn!(date_of_service, "Unreadable date of service on claim row");
        }
        Self {
            status: ClaimStatus::from_label(status),
            payer_label: payer_label.trim().to_string(),
            date_of_service: parsed,
        }
    }

    /// Rows that count against an authorization for the given insurer.
    pub fn qualifies_for(&self, insurer: Insurer) -> bool {
        self.status.is_open()
            && (!insurer.requires_eap_payer() || self.payer_label.contains(EAP_MARKER))
    }
}

/// Session limit and validity window of a benefit authorization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorizationTerms {
    pub session_count: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AuthorizationTerms {
    pub fn is_absent(&self) -> bool {
        self.session_count.is_none() && self.start_date.is_none() && self.end_date.is_none()
    }

    /// Resolves terms from the insurance form, falling back to the free-text
    /// authorization notes when any structured field is blank.
    pub fn resolve(sessions: &str, start_date: &str, end_date: &str, notes: &str) -> Self {
        let blank = |s: &str| s.trim().is_empty();
        if !blank(sessions) && !blank(start_date) && !blank(end_date) {
            return Self::from_fields(sessions, start_date, end_date);
        }
        match Self::from_notes(notes) {
            Some(terms) => terms,
            None => {
                warn!("Authorization notes do not carry recognizable sessions and dates");
                Self::default()
            }
        }
    }

    /// Parses each structured field independently; a field that fails to parse is dropped.
    pub fn from_fields(sessions: &str, start_date: &str, end_date: &str) -> Self {
        let session_count = sessions.trim().parse::<u32>().ok();
        if session_count.is_none() {
            warn!(sessions, "Failed converting authorized session count");
        }
        let start = parse_portal_date(start_date);
        if start.is_none() {
            warn!(start_date, "Failed converting authorization start date");
        }
        let end = parse_portal_date(end_date);
        if end.is_none() {
            warn!(end_date, "Failed converting authorization end date");
        }
        Self {
            session_count,
            start_date: start,
            end_date: end,
        }
    }

    /// All three of `Sessions:`, `Start Date:` and `End Date:` must be present.
    pub fn from_notes(notes: &str) -> Option<Self> {
        let sessions = NOTES_SESSIONS.captures(notes)?.get(1)?.as_str();
        let start = NOTES_START_DATE.captures(notes)?.get(1)?.as_str();
        let end = NOTES_END_DATE.captures(notes)?.get(1)?.as_str();
        Some(Self {
            session_count: Some(sessions.parse().ok()?),
            start_date: Some(parse_portal_date(start)?),
            end_date: Some(parse_portal_date(end)?),
        })
    }
}

/// One queued claim at decision time. Owned by the iteration that evaluates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSnapshot {
    pub insurer: Insurer,
    pub member_or_auth_number: String,
    pub authorized_session_count: Option<u32>,
    pub authorization_start_date: Option<NaiveDate>,
    pub authorization_end_date: Option<NaiveDate>,
    /// Portal display order; only used for log context.
    pub claim_rows: Vec<ClaimRow>,
}

impl ClaimSnapshot {
    pub fn new(
        insurer: Insurer,
        member_or_auth_number: impl Into<String>,
        terms: AuthorizationTerms,
        claim_rows: Vec<ClaimRow>,
    ) -> Self {
        Self {
            insurer,
            member_or_auth_number: member_or_auth_number.into(),
            authorized_session_count: terms.session_count,
            authorization_start_date: terms.start_date,
            authorization_end_date: terms.end_date,
            claim_rows,
        }
    }

    pub fn terms(&self) -> AuthorizationTerms {
        AuthorizationTerms {
            session_count: self.authorized_session_count,
            start_date: self.authorization_start_date,
            end_date: self.authorization_end_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CashPayReason {
    InvalidNumber,
    ServiceAfterWindow {
        row: usize,
        date_of_service: NaiveDate,
        window_end: NaiveDate,
    },
    SessionsExceeded {
        qualifying: usize,
        authorized: u32,
    },
    UnconfirmedAuthorization,
}

impl fmt::Display for CashPayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CashPayReason::InvalidNumber => f.write_str("member number has an invalid format"),
            CashPayReason::ServiceAfterWindow {
                row,
                date_of_service,
                window_end,
            } => write!(
                f,
                "row {row} date of service {date_of_service} is not before {window_end}"
            ),
            CashPayReason::SessionsExceeded {
                qualifying,
                authorized,
            } => write!(
                f,
                "{qualifying} open claims exceed {authorized} authorized sessions"
            ),
            CashPayReason::UnconfirmedAuthorization => {
                f.write_str("EAP authorization number could not be confirmed")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimDecision {
    Verified,
    CashPay(CashPayReason),
    Escalate(String),
}

impl ClaimDecision {
    pub fn label(&self) -> &'static str {
        match self {
            ClaimDecision::Verified => "verified",
            ClaimDecision::CashPay(_) => "cash_pay",
            ClaimDecision::Escalate(_) => "escalate",
        }
    }
}

pub fn parse_portal_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), PORTAL_DATE_FORMAT).ok()
}
