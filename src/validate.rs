//! Pre-flight checks for an export before it is accepted as input.
//!
//! Separate from the load pipeline, which tolerates bad rows. Here every
//! problem is reported, split into hard errors and soft warnings.

use serde::Serialize;

use crate::models::{
    ClassCode, RawRow, CLASS_NAME, FIRST_NAME, LAST_NAME, MINUTE_COUNT, ONLINE_DONATIONS,
    ONLINE_DONATIONS_TYPO, POTENTIAL_ONLINE_DONATIONS, TOTAL_PLUS_POTENTIAL,
};
use crate::normalize::parse_number;

const EMAIL_ADDRESS: &str = "Email Address";
const TOTAL: &str = "Total";
const ONLINE_MONEY: &str = "Online Donation $";
const POTENTIAL_ONLINE_MONEY: &str = "Potential Online Donation $";
const OFFLINE_MONEY: &str = "Offline Donation $";

const REQUIRED: [&str; 3] = [FIRST_NAME, LAST_NAME, CLASS_NAME];

/// Summed into the cross-total check.
const MONEY: [&str; 3] = [ONLINE_MONEY, POTENTIAL_ONLINE_MONEY, OFFLINE_MONEY];

/// Non-numeric values here are hard errors; in other numeric columns they
/// only warn.
const STRICT_NUMERIC: [&str; 5] = [
    ONLINE_MONEY,
    POTENTIAL_ONLINE_MONEY,
    OFFLINE_MONEY,
    TOTAL_PLUS_POTENTIAL,
    TOTAL,
];

const LENIENT_NUMERIC: [&str; 5] = [
    MINUTE_COUNT,
    ONLINE_DONATIONS,
    POTENTIAL_ONLINE_DONATIONS,
    "Requests Sent",
    "Requests Delivered",
];

/// Absolute floor of the money mismatch tolerance.
const MISMATCH_FLOOR: f64 = 5.0;
/// Relative money mismatch tolerance.
const MISMATCH_RATIO: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Issue {
    MissingField { field: String },
    BadClassFormat { value: String },
    NotNumber { field: String, value: String },
    Negative { field: String, value: f64 },
    BadEmail { value: String },
    TypoOnline,
    TotalMismatch { money_expected: f64, declared: f64, diff: f64 },
}

impl Issue {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::BadClassFormat { .. } => "bad_class_format",
            Self::NotNumber { .. } => "not_number",
            Self::Negative { .. } => "negative",
            Self::BadEmail { .. } => "bad_email",
            Self::TypoOnline => "typo_online",
            Self::TotalMismatch { .. } => "total_mismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowProblem {
    /// 1-based line in the file.
    pub line: u64,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub rows_parsed: usize,
    pub problems: Vec<RowProblem>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.problems.iter().map(|p| p.errors.len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.problems.iter().map(|p| p.warnings.len()).sum()
    }
}

fn is_footer(row: &RawRow) -> bool {
    row.get(LAST_NAME)
        .or_else(|| row.get(FIRST_NAME))
        .is_some_and(|name| name.eq_ignore_ascii_case("total"))
}

pub fn validate_rows(rows: &[RawRow]) -> ValidationReport {
    let data: Vec<&RawRow> = rows.iter().filter(|row| !is_footer(row)).collect();
    let problems: Vec<RowProblem> = data.iter().copied().filter_map(validate_row).collect();

    ValidationReport {
        ok: problems.iter().all(|p| p.errors.is_empty()),
        rows_parsed: data.len(),
        problems,
    }
}

fn validate_row(row: &RawRow) -> Option<RowProblem> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for field in REQUIRED {
        if row.get(field).is_none() {
            errors.push(Issue::MissingField {
                field: field.to_string(),
            });
        }
    }

    if let Some(class_name) = row.get(CLASS_NAME) {
        if ClassCode::parse(class_name).is_none() {
            errors.push(Issue::BadClassFormat {
                value: class_name.to_string(),
            });
        }
    }

    for (fields, strict) in [(&STRICT_NUMERIC, true), (&LENIENT_NUMERIC, false)] {
        for &field in fields {
            if !row.has_column(field) {
                continue;
            }
            let value = row.get(field).unwrap_or_default();
            match parse_number(value) {
                Some(n) if n < 0.0 => errors.push(Issue::Negative {
                    field: field.to_string(),
                    value: n,
                }),
                Some(_) => {}
                None => {
                    let issue = Issue::NotNumber {
                        field: field.to_string(),
                        value: value.to_string(),
                    };
                    if strict {
                        errors.push(issue);
                    } else {
                        warnings.push(issue);
                    }
                }
            }
        }
    }

    if let Some(email) = row.get(EMAIL_ADDRESS) {
        if !email.contains('@') {
            warnings.push(Issue::BadEmail {
                value: email.to_string(),
            });
        }
    }

    if row.has_column(ONLINE_DONATIONS_TYPO) && !row.has_column(ONLINE_DONATIONS) {
        warnings.push(Issue::TypoOnline);
    }

    if let Some(mismatch) = money_mismatch(row) {
        warnings.push(mismatch);
    }

    if errors.is_empty() && warnings.is_empty() {
        None
    } else {
        Some(RowProblem {
            line: row.line,
            errors,
            warnings,
        })
    }
}

fn number(row: &RawRow, field: &str) -> Option<f64> {
    row.get(field).and_then(parse_number)
}

fn money_mismatch(row: &RawRow) -> Option<Issue> {
    let money_expected: f64 = MONEY.iter().filter_map(|f| number(row, f)).sum();
    let declared = number(row, TOTAL_PLUS_POTENTIAL)
        .or_else(|| number(row, TOTAL))
        .unwrap_or(0.0);

    if money_expected == 0.0 && declared == 0.0 {
        return None;
    }

    let diff = (money_expected - declared).abs();
    let threshold = MISMATCH_FLOOR.max(declared.abs() * MISMATCH_RATIO);
    (diff > threshold).then_some(Issue::TotalMismatch {
        money_expected,
        declared,
        diff,
    })
}
