pub const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

pub const AUTHORIZATION_SHEET_NAMES_RANGE: &str = "Sondermind EAP Authorizations!A1:C1";
pub const AUTHORIZATION_SHEET_NUMBERS_RANGE: &str = "Sondermind EAP Authorizations!G1";

pub const DEFAULT_REPORT_RECIPIENTS: &[&str] = &[
    "bhardy@sondermind.com",
    "jwebb@sondermind.com",
    "kortega@sondermind.com",
];
pub const REPORT_MAIL_SUBJECT: &str = "SM1 Report.";
pub const REPORT_CSV_FILE_NAME: &str = "benefits_verification_report.csv";
pub const REPORT_HTML_FILE_NAME: &str = "benefits_verification_report.html";
pub const ACTION_LOG_FILE_NAME: &str = "portal_actions.csv";

pub const ACCESS_CODE_SUBJECT: &str = "Access Code Notification";
pub const INVALID_AUTHORIZATION_NOTE: &str = "Invalid EAP Authorization number";

/// Payer label marker for Employee Assistance Program claims and insurances.
pub const EAP_MARKER: &str = "EAP";

/// Date format the claims portal renders in tables and insurance forms.
pub const PORTAL_DATE_FORMAT: &str = "%m/%d/%Y";

pub const CLAIMS_PORTAL_GROUP: &str = "claims_portal";
pub const PAYER_PORTAL_GROUP: &str = "payer_portal";
pub const MAILBOX_GROUP: &str = "mailbox";
pub const CAPTCHA_GROUP: &str = "captcha";
pub const REQUIRED_CREDENTIAL_GROUPS: &[&str] = &[
    CLAIMS_PORTAL_GROUP,
    PAYER_PORTAL_GROUP,
    MAILBOX_GROUP,
    CAPTCHA_GROUP,
];

pub const UI_READ_ATTEMPTS: u32 = 5;
pub const CAPTCHA_ATTEMPTS: u32 = 10;
pub const OTP_ATTEMPTS: u32 = 4;
pub const SHEET_WRITE_ATTEMPTS: u32 = 4;
pub const SHEET_WRITE_INITIAL_DELAY_SECS: u64 = 5;
pub const SHEET_WRITE_BACKOFF_FACTOR: u32 = 2;
