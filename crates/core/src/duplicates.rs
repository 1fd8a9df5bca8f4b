//! Duplicate-conflict warnings.
//!
//! The backend reports duplicate conflicts as prose, for example:
//!
//! ```text
//! Procedure 'Metformin 500mg' (ID: PROC-7) is already scheduled for Enrollee 'Ada Obi'
//! (ID: ENR-1001). Existing end date: 2026-12-31, New start date: 2026-11-02
//! ```
//!
//! All text parsing lives in this module. Every field is matched on its own, so a sentence with
//! a missing or reworded part still yields a record with the remaining fields filled in.
//! Parsing never fails.

use crate::constants::UNKNOWN_FIELD;
use crate::draft::DeliveryDraft;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use utoipa::ToSchema;

/// One reconstructed duplicate conflict, shown to the user for confirmation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateWarning {
    pub enrollee_id: String,
    pub enrollee_name: String,
    pub procedure_name: String,
    pub procedure_id: String,
    pub existing_end_date: String,
    pub new_start_date: String,
}

/// Values used for fields a warning does not mention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateDefaults {
    pub enrollee_id: String,
    pub enrollee_name: String,
    pub procedure_name: String,
    pub procedure_id: String,
    pub new_start_date: String,
}

impl Default for DuplicateDefaults {
    fn default() -> Self {
        Self {
            enrollee_id: UNKNOWN_FIELD.into(),
            enrollee_name: UNKNOWN_FIELD.into(),
            procedure_name: UNKNOWN_FIELD.into(),
            procedure_id: UNKNOWN_FIELD.into(),
            new_start_date: UNKNOWN_FIELD.into(),
        }
    }
}

impl DuplicateDefaults {
    /// Defaults drawn from the draft being submitted: its enrollee, first procedure and start
    /// date. Blank draft values fall back to `"Unknown"`.
    pub fn from_draft(draft: &DeliveryDraft) -> Self {
        let first = draft.procedures.first();
        Self {
            enrollee_id: or_unknown(&draft.enrollee.id),
            enrollee_name: or_unknown(&draft.enrollee.name),
            procedure_name: or_unknown(first.map_or("", |p| p.name.as_str())),
            procedure_id: or_unknown(first.map_or("", |p| p.id.as_str())),
            new_start_date: draft
                .start_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| UNKNOWN_FIELD.into()),
        }
    }
}

fn or_unknown(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        UNKNOWN_FIELD.into()
    } else {
        value.to_owned()
    }
}

struct Patterns {
    procedure_name: Regex,
    procedure_id: Regex,
    enrollee_name: Regex,
    enrollee_id: Regex,
    existing_end_date: DatePatterns,
    new_start_date: DatePatterns,
}

/// A date-shaped capture, and a looser one for dates written some other way.
struct DatePatterns {
    shaped: Regex,
    loose: Regex,
}

impl DatePatterns {
    fn new(label: &str) -> Self {
        Self {
            shaped: compile(&format!(r"(?i){label}\s*:\s*{DATE}")),
            loose: compile(&format!(r"(?i){label}\s*:\s*([^,;]*)")),
        }
    }

    fn capture(&self, text: &str) -> Option<String> {
        capture(&self.shaped, text).or_else(|| capture(&self.loose, text))
    }
}

/// ISO `2026-12-31`, numeric `31/12/2026`, or written `Dec 31, 2026`.
const DATE: &str =
    r"(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4}|[a-z]{3,9}\.?\s+\d{1,2},\s*\d{4})";

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        procedure_name: compile(r"(?i)procedure\s+'([^']*)'"),
        procedure_id: compile(r"(?i)procedure\s+'[^']*'\s*\(\s*id\s*:\s*([^)]*)\)"),
        enrollee_name: compile(r"(?i)enrollee\s+'([^']*)'"),
        enrollee_id: compile(r"(?i)enrollee\s+'[^']*'\s*\(\s*id\s*:\s*([^)]*)\)"),
        existing_end_date: DatePatterns::new(r"existing\s+end\s+date"),
        new_start_date: DatePatterns::new(r"new\s+start\s+date"),
    })
}

// Patterns are literals exercised by the tests below.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("duplicate warning pattern is a valid regex")
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    let value = re.captures(text)?.get(1)?.as_str();
    let value = value.trim().trim_end_matches('.').trim();
    (!value.is_empty()).then(|| value.to_owned())
}

/// Reconstruct one warning. Missing fields take their value from `defaults`.
pub fn parse_warning(text: &str, defaults: &DuplicateDefaults) -> DuplicateWarning {
    let p = patterns();
    DuplicateWarning {
        enrollee_id: capture(&p.enrollee_id, text).unwrap_or_else(|| defaults.enrollee_id.clone()),
        enrollee_name: capture(&p.enrollee_name, text)
            .unwrap_or_else(|| defaults.enrollee_name.clone()),
        procedure_name: capture(&p.procedure_name, text)
            .unwrap_or_else(|| defaults.procedure_name.clone()),
        procedure_id: capture(&p.procedure_id, text)
            .unwrap_or_else(|| defaults.procedure_id.clone()),
        existing_end_date: p
            .existing_end_date
            .capture(text)
            .unwrap_or_else(|| UNKNOWN_FIELD.into()),
        new_start_date: p
            .new_start_date
            .capture(text)
            .unwrap_or_else(|| defaults.new_start_date.clone()),
    }
}

/// Reconstruct every warning, one record per input string.
pub fn parse_warnings<S: AsRef<str>>(
    warnings: &[S],
    defaults: &DuplicateDefaults,
) -> Vec<DuplicateWarning> {
    warnings
        .iter()
        .map(|w| parse_warning(w.as_ref(), defaults))
        .collect()
}
