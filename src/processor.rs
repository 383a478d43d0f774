use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::{
    config::{RunConfig, RunMode},
    constants::{EAP_MARKER, INVALID_AUTHORIZATION_NOTE},
    domain::{CashPayReason, ClaimDecision, Insurer, NumberRule},
    evaluator::evaluate,
    portal::{
        ClaimsPortal, InsuranceEntry, InsuranceUpdate, PayerPortal, PortalError, RecordAction,
    },
    report::ReportRow,
    retry::RetryPolicy,
    sheets::{AuthorizationRow, AuthorizationSheet},
    validator::{AuthorizationValidator, NumberCheck, clean_cigna_number},
};

/// Where a record is in its processing. Every record ends in `Recorded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Idle,
    FetchingSnapshot,
    Validating,
    AlternateEmailLookup,
    Evaluating,
    ActingOnDecision,
    Escalate,
    Recorded,
}

impl RecordState {
    pub fn can_advance_to(self, next: RecordState) -> bool {
        use RecordState::*;
        match (self, next) {
            (Recorded, _) => false,
            (_, Escalate) | (_, Recorded) => true,
            (Idle, FetchingSnapshot) => true,
            (FetchingSnapshot, Validating) => true,
            (Validating, AlternateEmailLookup | Evaluating | ActingOnDecision) => true,
            (AlternateEmailLookup, Evaluating | ActingOnDecision) => true,
            (Evaluating, ActingOnDecision) => true,
            _ => false,
        }
    }
}

/// Drives one queue record at a time through lookup, validation, evaluation
/// and the resulting portal action.
pub struct RecordProcessor<'a, P, Q> {
    mode: RunMode,
    validator: AuthorizationValidator,
    ui_read: RetryPolicy,
    portal: &'a mut P,
    payer: &'a mut Q,
    sheet: &'a mut AuthorizationSheet,
    state: RecordState,
}

impl<'a, P: ClaimsPortal, Q: PayerPortal> RecordProcessor<'a, P, Q> {
    pub fn new(
        config: &RunConfig,
        portal: &'a mut P,
        payer: &'a mut Q,
        sheet: &'a mut AuthorizationSheet,
    ) -> Self {
        Self {
            mode: config.mode,
            validator: AuthorizationValidator::new(config.today),
            ui_read: config.retry.ui_read,
            portal,
            payer,
            sheet,
            state: RecordState::Idle,
        }
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    fn advance(&mut self, next: RecordState) {
        if !self.state.can_advance_to(next) {
            warn!(from = ?self.state, to = ?next, "Unexpected record state transition");
        }
        debug!(from = ?self.state, to = ?next, "Record state");
        self.state = next;
    }

    /// Processes the queue row and returns its report row. Failures inside the
    /// record are logged and marked as escalated; they never propagate.
    pub async fn process(&mut self, insurer: Insurer, row: usize) -> ReportRow {
        self.state = RecordState::Idle;
        let mut report = ReportRow::new(insurer.portal_label());

        report.client = self.read_client_name(row).await;
        let is_eap = self.read_eap_flag(row).await;

        if is_eap {
            info!(record = row, client = %report.client, %insurer, "Processing EAP record");
            if let Err(err) = self.process_eap_record(insurer, row, &mut report).await {
                error!(record = row, client = %report.client, "Record failed: {err:#}");
                self.advance(RecordState::Escalate);
                report.escalated = true;
                if let Err(close_err) = self.portal.close_record().await {
                    warn!(record = row, "Failed closing record after error: {close_err}");
                }
            }
        } else {
            debug!(record = row, "Skipping non-EAP record");
        }

        self.advance(RecordState::Recorded);
        report
    }

    /// Exhausted reads degrade to an empty name.
    async fn read_client_name(&mut self, row: usize) -> String {
        let policy = self.ui_read;
        let portal = &mut *self.portal;
        policy
            .run(
                &format!("Reading client name of record {row}"),
                PortalError::is_transient,
                async |_| portal.read_client_name(row).await,
            )
            .await
            .unwrap_or_else(|err| {
                warn!(record = row, "Giving up reading client name: {err}");
                String::new()
            })
    }

    /// Exhausted reads treat the record as non-EAP.
    async fn read_eap_flag(&mut self, row: usize) -> bool {
        let policy = self.ui_read;
        let portal = &mut *self.portal;
        policy
            .run(
                &format!("Reading EAP flag of record {row}"),
                PortalError::is_transient,
                async |_| portal.read_eap_flag(row).await,
            )
            .await
            .unwrap_or_else(|err| {
                warn!(record = row, "Giving up reading EAP flag: {err}");
                false
            })
    }

    async fn process_eap_record(
        &mut self,
        insurer: Insurer,
        row: usize,
        report: &mut ReportRow,
    ) -> Result<()> {
        self.advance(RecordState::FetchingSnapshot);
        self.portal
            .open_record(row)
            .await
            .with_context(|| format!("Failed opening record {row}"))?;
        let number = self
            .portal
            .member_number()
            .await
            .context("Failed reading member number")?;

        self.advance(RecordState::Validating);
        match self.validator.check(insurer, &number) {
            NumberCheck::Absent => {
                report.blank_member_number = true;
                self.advance(RecordState::AlternateEmailLookup);
                self.alternate_email_lookup(insurer, report).await
            }
            NumberCheck::Invalid => {
                info!(
                    member_number = %number,
                    "Member number is invalid. Setting up client for cash pay"
                );
                self.advance(RecordState::ActingOnDecision);
                self.act_on_decision(&ClaimDecision::CashPay(CashPayReason::InvalidNumber), report)
                    .await
            }
            NumberCheck::Valid => {
                info!(member_number = %number, "Member number satisfies requirements");
                let fetched = self
                    .portal
                    .fetch_claim(insurer, &number)
                    .await
                    .with_context(|| format!("Failed fetching claims for {number}"))?;
                report.missing_edit_control = fetched.missing_edit_control;

                self.advance(RecordState::Evaluating);
                let decision = evaluate(&fetched.snapshot);
                info!(member_number = %number, decision = decision.label(), "Claim evaluated");

                self.advance(RecordState::ActingOnDecision);
                self.act_on_decision(&decision, report).await
            }
        }
    }

    async fn act_on_decision(
        &mut self,
        decision: &ClaimDecision,
        report: &mut ReportRow,
    ) -> Result<()> {
        match decision {
            ClaimDecision::Verified => {
                report.had_processing_or_processed_row = true;
                report.verified_mark_as_worked = true;
                self.perform(RecordAction::MarkVerified, report).await
            }
            ClaimDecision::CashPay(reason) => {
                info!(%reason, "Setting up client for cash pay");
                report.set_for_cash_pay = true;
                self.perform(RecordAction::SetUpCashPay, report).await
            }
            ClaimDecision::Escalate(reason) => {
                warn!(%reason, "Claim escalated for manual review");
                self.advance(RecordState::Escalate);
                report.escalated = true;
                self.portal
                    .close_record()
                    .await
                    .context("Failed closing escalated record")
            }
        }
    }

    /// A failing action is logged and marks the record escalated; the record
    /// is still recorded.
    async fn perform(&mut self, action: RecordAction, report: &mut ReportRow) -> Result<()> {
        let outcome = if self.mode.is_production() {
            self.portal.perform(action).await
        } else {
            info!(action = action.as_str(), "Local run; closing record without applying action");
            self.portal.close_record().await
        };
        if let Err(err) = outcome {
            error!(action = action.as_str(), "Portal action failed: {err}");
            self.advance(RecordState::Escalate);
            report.escalated = true;
        }
        Ok(())
    }

    async fn alternate_email_lookup(
        &mut self,
        insurer: Insurer,
        report: &mut ReportRow,
    ) -> Result<()> {
        let email = self
            .portal
            .client_email()
            .await
            .context("Failed reading client email")?
            .filter(|email| !email.trim().is_empty());

        let Some(email) = email else {
            report.blank_client_email = true;
            info!("No member number and no client email present, adding to the report");
            return self
                .portal
                .close_record()
                .await
                .context("Failed closing record without member number or email");
        };

        info!(client_email = %email, "Member number is empty; checking client insurances");
        let entries = self
            .portal
            .insurance_entries(&email)
            .await
            .with_context(|| format!("Failed listing insurances for {email}"))?;

        let Some((entry_index, entry)) = find_active_eap(&entries) else {
            info!(client_email = %email, "No active EAP insurance found");
            return self
                .portal
                .close_record()
                .await
                .context("Failed closing record without EAP insurance");
        };

        let auth_number = entry.auth_number.trim().to_string();
        if auth_number.is_empty() {
            info!("No authorization number was found, verifying the record");
            report.blank_authorization_number = true;
            report.verified_mark_as_worked = true;
            self.advance(RecordState::ActingOnDecision);
            return self.perform(RecordAction::MarkVerified, report).await;
        }

        info!(auth_number = %auth_number, "Found authorization number");
        self.advance(RecordState::Evaluating);
        let confirmed = match self.validator.check(insurer, &auth_number) {
            NumberCheck::Valid => match insurer.number_rule() {
                NumberRule::Cigna => {
                    self.apply_cigna_authorization(insurer, entry_index, &auth_number)
                        .await?;
                    true
                }
                NumberRule::Optum => {
                    self.confirm_with_payer(insurer, entry_index, &auth_number)
                        .await?
                }
            },
            NumberCheck::Invalid | NumberCheck::Absent => {
                info!(auth_number = %auth_number, "Authorization number is invalid");
                false
            }
        };

        self.advance(RecordState::ActingOnDecision);
        if confirmed {
            report.verified_mark_as_worked = true;
            return self.perform(RecordAction::MarkVerified, report).await;
        }

        info!("Making note and setting up client for cash pay");
        self.portal
            .add_client_note(INVALID_AUTHORIZATION_NOTE)
            .await
            .context("Failed adding client note")?;
        report.set_for_cash_pay = true;
        self.perform(RecordAction::SetUpCashPay, report).await
    }

    async fn apply_cigna_authorization(
        &mut self,
        insurer: Insurer,
        entry_index: usize,
        auth_number: &str,
    ) -> Result<()> {
        let clean = clean_cigna_number(auth_number).to_string();
        let update = InsuranceUpdate {
            company_name: insurer.eap_company_name().to_string(),
            policy_number: clean.clone(),
            ..InsuranceUpdate::default()
        };
        self.portal
            .update_insurance(entry_index, &update)
            .await
            .context("Failed updating EAP insurance")?;

        let profile = self
            .portal
            .client_profile()
            .await
            .context("Failed reading client profile")?;
        self.sheet.add_client(AuthorizationRow {
            first_name: profile.first_name,
            last_name: profile.last_name,
            date_of_birth: profile.date_of_birth,
            auth_number: auth_number.to_string(),
        });

        self.portal
            .set_record_policy_number(&clean)
            .await
            .context("Failed setting record policy number")
    }

    /// The payer must know the number and list it under the same client name.
    async fn confirm_with_payer(
        &mut self,
        insurer: Insurer,
        entry_index: usize,
        auth_number: &str,
    ) -> Result<bool> {
        let Some(found) = self
            .payer
            .find_authorization(auth_number)
            .await
            .with_context(|| format!("Failed searching payer portal for {auth_number}"))?
        else {
            info!(auth_number, "No payer account with this authorization number");
            return Ok(false);
        };

        let profile = self
            .portal
            .client_profile()
            .await
            .context("Failed reading client profile")?;
        let client_name = profile.display_name();
        if !found.client_name.trim().eq_ignore_ascii_case(&client_name) {
            info!(
                payer_client = %found.client_name,
                portal_client = %client_name,
                "Payer client name does not match"
            );
            return Ok(false);
        }

        let update = InsuranceUpdate {
            company_name: insurer.eap_company_name().to_string(),
            policy_number: found.auth_number,
            session_count: Some(found.session_count),
            start_date: Some(found.start_date),
            end_date: Some(found.end_date),
        };
        self.portal
            .update_insurance(entry_index, &update)
            .await
            .context("Failed updating EAP insurance with payer details")?;
        Ok(true)
    }
}

fn find_active_eap(entries: &[InsuranceEntry]) -> Option<(usize, &InsuranceEntry)> {
    entries
        .iter()
        .enumerate()
        .find(|(_, entry)| !entry.deleted && entry.title.contains(EAP_MARKER))
}
