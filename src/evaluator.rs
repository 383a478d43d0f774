use chrono::Days;

use crate::domain::{CashPayReason, ClaimDecision, ClaimSnapshot};

/// Decides whether a claim is covered by its authorization.
///
/// Missing terms are no basis to deny, so a snapshot without any terms is
/// verified. The start date plays no part in the decision; without a
/// session count or an end date the claim cannot be checked and is escalated.
pub fn evaluate(snapshot: &ClaimSnapshot) -> ClaimDecision {
    let terms = snapshot.terms();
    if terms.is_absent() {
        return ClaimDecision::Verified;
    }

    let (Some(authorized), Some(end_date)) = (terms.session_count, terms.end_date) else {
        return ClaimDecision::Escalate(format!(
            "incomplete authorization terms for {}: sessions={:?} end={:?}",
            snapshot.member_or_auth_number, terms.session_count, terms.end_date
        ));
    };

    let insurer = snapshot.insurer;
    let Some(window_end) = end_date.checked_add_days(Days::new(insurer.grace_days())) else {
        return ClaimDecision::Escalate(format!(
            "authorization end date {end_date} is out of range"
        ));
    };

    let mut qualifying = 0usize;
    for (index, row) in snapshot.claim_rows.iter().enumerate() {
        if !row.qualifies_for(insurer) {
            continue;
        }
        qualifying += 1;
        let Some(date_of_service) = row.date_of_service else {
            return ClaimDecision::Escalate(format!(
                "claim row {} has no readable date of service",
                index + 1
            ));
        };
        if date_of_service >= window_end {
            return ClaimDecision::CashPay(CashPayReason::ServiceAfterWindow {
                row: index + 1,
                date_of_service,
                window_end,
            });
        }
    }

    if qualifying <= authorized as usize {
        ClaimDecision::Verified
    } else {
        ClaimDecision::CashPay(CashPayReason::SessionsExceeded {
            qualifying,
            authorized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuthorizationTerms, ClaimRow, ClaimStatus, Insurer};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn terms(sessions: u32, end: NaiveDate) -> AuthorizationTerms {
        AuthorizationTerms {
            session_count: Some(sessions),
            start_date: Some(date(2023, 7, 1)),
            end_date: Some(end),
        }
    }

    fn open_row(payer: &str, dos: NaiveDate) -> ClaimRow {
        ClaimRow::new(ClaimStatus::Processing, payer, dos)
    }

    #[test]
    fn no_terms_is_verified_regardless_of_rows() {
        let rows = (1..=10)
            .map(|d| open_row("Cigna", date(2030, 1, d)))
            .collect();
        let snapshot =
            ClaimSnapshot::new(Insurer::Cigna, "241234567", AuthorizationTerms::default(), rows);
        assert_eq!(evaluate(&snapshot), ClaimDecision::Verified);
    }

    #[test]
    fn session_count_boundary() {
        let end = date(2024, 6, 30);
        let mut rows = vec![
            open_row("Cigna", date(2024, 1, 10)),
            ClaimRow::new(ClaimStatus::Proposed, "Cigna", date(2024, 2, 10)),
        ];
        let snapshot = ClaimSnapshot::new(Insurer::Cigna, "241234567", terms(2, end), rows.clone());
        assert_eq!(evaluate(&snapshot), ClaimDecision::Verified);

        rows.push(open_row("Cigna", date(2024, 3, 10)));
        let snapshot = ClaimSnapshot::new(Insurer::Cigna, "241234567", terms(2, end), rows);
        assert_eq!(
            evaluate(&snapshot),
            ClaimDecision::CashPay(CashPayReason::SessionsExceeded {
                qualifying: 3,
                authorized: 2,
            })
        );
    }

    #[test]
    fn closed_rows_do_not_count() {
        let rows = vec![
            open_row("Cigna", date(2024, 1, 10)),
            ClaimRow::new(ClaimStatus::Other, "Cigna", date(2024, 9, 10)),
            ClaimRow::new(ClaimStatus::Other, "Cigna", date(2024, 9, 11)),
        ];
        let snapshot =
            ClaimSnapshot::new(Insurer::Cigna, "241234567", terms(1, date(2024, 6, 30)), rows);
        assert_eq!(evaluate(&snapshot), ClaimDecision::Verified);
    }

    #[test]
    fn grace_period_applies_only_to_cigna() {
        let end = date(2024, 1, 1);
        let cigna = ClaimSnapshot::new(
            Insurer::Cigna,
            "231234567",
            terms(4, end),
            vec![open_row("Cigna", date(2024, 1, 20))],
        );
        assert_eq!(evaluate(&cigna), ClaimDecision::Verified);

        let united = ClaimSnapshot::new(
            Insurer::UnitedHealthCare,
            "ABCDEF-1",
            terms(4, end),
            vec![open_row("UHC EAP", date(2024, 1, 20))],
        );
        assert!(matches!(
            evaluate(&united),
            ClaimDecision::CashPay(CashPayReason::ServiceAfterWindow { row: 1, .. })
        ));
    }

    #[test]
    fn window_end_is_exclusive() {
        let end = date(2024, 1, 1);
        let on_grace_end = ClaimSnapshot::new(
            Insurer::Cigna,
            "231234567",
            terms(4, end),
            vec![open_row("Cigna", date(2024, 1, 31))],
        );
        assert!(matches!(evaluate(&on_grace_end), ClaimDecision::CashPay(_)));

        let on_end = ClaimSnapshot::new(
            Insurer::UnitedHealthCare,
            "ABCDEF-1",
            terms(4, end),
            vec![open_row("UHC EAP", end)],
        );
        assert!(matches!(evaluate(&on_end), ClaimDecision::CashPay(_)));
    }

    #[test]
    fn united_ignores_non_eap_rows() {
        let end = date(2024, 6, 30);
        let rows = vec![
            open_row("UHC EAP", date(2024, 2, 1)),
            open_row("UHC Commercial", date(2024, 12, 1)),
            open_row("UHC Commercial", date(2024, 12, 2)),
        ];
        let snapshot =
            ClaimSnapshot::new(Insurer::UnitedHealthCare, "ABCDEF-1", terms(1, end), rows);
        assert_eq!(evaluate(&snapshot), ClaimDecision::Verified);
    }

    #[test]
    fn missing_start_date_is_still_evaluated() {
        let terms = AuthorizationTerms {
            session_count: Some(4),
            start_date: None,
            end_date: Some(date(2024, 6, 30)),
        };
        let snapshot = ClaimSnapshot::new(
            Insurer::Cigna,
            "241234567",
            terms,
            vec![open_row("Cigna", date(2024, 2, 1))],
        );
        assert_eq!(evaluate(&snapshot), ClaimDecision::Verified);
    }

    #[test]
    fn missing_session_count_or_end_date_is_escalated() {
        let rows = vec![open_row("Cigna", date(2024, 2, 1))];
        let no_end = AuthorizationTerms {
            session_count: Some(4),
            start_date: Some(date(2024, 1, 1)),
            end_date: None,
        };
        let snapshot = ClaimSnapshot::new(Insurer::Cigna, "241234567", no_end, rows.clone());
        assert!(matches!(evaluate(&snapshot), ClaimDecision::Escalate(_)));

        let no_sessions = AuthorizationTerms {
            session_count: None,
            start_date: None,
            end_date: Some(date(2024, 6, 30)),
        };
        let snapshot = ClaimSnapshot::new(Insurer::Cigna, "241234567", no_sessions, rows);
        assert!(matches!(evaluate(&snapshot), ClaimDecision::Escalate(_)));
    }

    #[test]
    fn first_failing_row_short_circuits() {
        let end = date(2024, 6, 30);
        let rows = vec![
            open_row("Cigna", date(2024, 2, 1)),
            open_row("Cigna", date(2024, 9, 1)),
            ClaimRow {
                status: ClaimStatus::Processing,
                payer_label: "Cigna".to_string(),
                date_of_service: None,
            },
        ];
        let snapshot = ClaimSnapshot::new(Insurer::Cigna, "241234567", terms(5, end), rows);
        assert!(matches!(
            evaluate(&snapshot),
            ClaimDecision::CashPay(CashPayReason::ServiceAfterWindow { row: 2, .. })
        ));
    }

    #[test]
    fn unreadable_date_escalates() {
        let rows = vec![ClaimRow::from_portal_text("Processing", "Cigna", "")];
        let snapshot =
            ClaimSnapshot::new(Insurer::Cigna, "241234567", terms(5, date(2024, 6, 30)), rows);
        assert!(matches!(evaluate(&snapshot), ClaimDecision::Escalate(_)));
    }

    #[test]
    fn partial_terms_escalate() {
        let partial = AuthorizationTerms {
            session_count: Some(3),
            start_date: None,
            end_date: None,
        };
        let snapshot = ClaimSnapshot::new(Insurer::Cigna, "241234567", partial, Vec::new());
        assert!(matches!(evaluate(&snapshot), ClaimDecision::Escalate(_)));
    }
}
