use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

use crate::domain::{Insurer, NumberRule};

/// Suffixes that mark a Cigna number as issued in the prior benefit year.
///
/// Portal data carries both the letter form and the digit form, so both are
/// accepted until the real-world format is confirmed.
pub const PRIOR_YEAR_MARKERS: &[&str] = &["*O", "*0"];

// Worked portal examples carry eight digits while issued numbers carry nine.
static CIGNA_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8,9}(?:\*[O0])?$").expect("static regex"));
static OPTUM_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w{6}-[12]$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberCheck {
    Valid,
    Invalid,
    /// Nothing was entered; the caller falls back to the client-email lookup.
    Absent,
}

/// Format and benefit-year checks for member and authorization numbers.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationValidator {
    today: NaiveDate,
}

impl AuthorizationValidator {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn check(&self, insurer: Insurer, number: &str) -> NumberCheck {
        let number = number.trim();
        if number.is_empty() {
            return NumberCheck::Absent;
        }
        let valid = match insurer.number_rule() {
            NumberRule::Cigna => is_cigna_number_valid(number, self.today),
            NumberRule::Optum => is_optum_number_valid(number),
        };
        if valid {
            NumberCheck::Valid
        } else {
            NumberCheck::Invalid
        }
    }

    pub fn validate(&self, insurer: Insurer, number: &str) -> bool {
        self.check(insurer, number) == NumberCheck::Valid
    }
}

pub fn validate(insurer: Insurer, number: &str, today: NaiveDate) -> bool {
    AuthorizationValidator::new(today).validate(insurer, number)
}

/// On or after April 1 only the current year's prefix is accepted; before it
/// the previous benefit year is still open.
pub fn is_cigna_number_valid(number: &str, today: NaiveDate) -> bool {
    if !CIGNA_NUMBER.is_match(number) {
        return false;
    }
    let Some(rollover) = NaiveDate::from_ymd_opt(today.year(), 4, 1) else {
        return false;
    };
    let current = year_prefix(today.year());
    if today >= rollover {
        number.starts_with(&current)
    } else {
        number.starts_with(&current) || number.starts_with(&year_prefix(today.year() - 1))
    }
}

pub fn is_optum_number_valid(number: &str) -> bool {
    OPTUM_NUMBER.is_match(number)
}

/// Strips the prior-year marker before the number is written anywhere else.
pub fn clean_cigna_number(number: &str) -> &str {
    let number = number.trim();
    PRIOR_YEAR_MARKERS
        .iter()
        .find_map(|marker| number.strip_suffix(marker))
        .unwrap_or(number)
}

fn year_prefix(year: i32) -> String {
    format!("{:02}", year.rem_euclid(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cigna_grace_period_accepts_previous_year_before_april() {
        let today = date(2024, 2, 1);
        assert!(validate(Insurer::Cigna, "23123456*O", today));
        assert!(validate(Insurer::Cigna, "231234567", today));
        assert!(validate(Insurer::Cigna, "241234567", today));
        assert!(!validate(Insurer::Cigna, "221234567", today));
    }

    #[test]
    fn cigna_after_rollover_only_current_year() {
        let today = date(2024, 5, 1);
        assert!(!validate(Insurer::Cigna, "23123456", today));
        assert!(validate(Insurer::Cigna, "24123456", today));
    }

    #[test]
    fn cigna_rollover_day_is_inclusive() {
        let april_first = date(2024, 4, 1);
        assert!(!validate(Insurer::Cigna, "231234567", april_first));
        assert!(validate(Insurer::Cigna, "231234567", date(2024, 3, 31)));
    }

    #[test]
    fn cigna_rejects_bad_shapes() {
        let today = date(2024, 5, 1);
        assert!(!validate(Insurer::Cigna, "2412345", today));
        assert!(!validate(Insurer::Cigna, "2412345678", today));
        assert!(!validate(Insurer::Cigna, "24123456*X", today));
        assert!(!validate(Insurer::Cigna, "24ABC4567", today));
    }

    #[test]
    fn prior_year_marker_accepts_letter_and_digit() {
        let today = date(2024, 1, 15);
        assert!(validate(Insurer::Cigna, "231234567*O", today));
        assert!(validate(Insurer::Cigna, "231234567*0", today));
    }

    #[test]
    fn optum_numbers() {
        let today = date(2024, 5, 1);
        assert!(validate(Insurer::Optum, "ABCDEF-1", today));
        assert!(validate(Insurer::UnitedHealthCare, "A1B2C3-2", today));
        assert!(!validate(Insurer::Optum, "AB12-3", today));
        assert!(!validate(Insurer::Optum, "ABCDEF-3", today));
        assert!(!validate(Insurer::Optum, "ABCDEFG-1", today));
    }

    #[test]
    fn empty_number_is_absent_not_invalid() {
        let validator = AuthorizationValidator::new(date(2024, 5, 1));
        assert_eq!(validator.check(Insurer::Cigna, ""), NumberCheck::Absent);
        assert_eq!(validator.check(Insurer::Optum, "   "), NumberCheck::Absent);
        assert_eq!(validator.check(Insurer::Optum, "nope"), NumberCheck::Invalid);
    }

    #[test]
    fn clean_strips_marker_only() {
        assert_eq!(clean_cigna_number("231234567*O"), "231234567");
        assert_eq!(clean_cigna_number("231234567*0"), "231234567");
        assert_eq!(clean_cigna_number("231234567"), "231234567");
    }
}
