use tracing::{info, warn};

use crate::config::Config;
use crate::error::LoadError;
use crate::models::{
    ClassCode, RawRow, Student, CLASS_NAME, FIRST_NAME, LAST_NAME, MINUTE_COUNT,
    ONLINE_DONATIONS, ONLINE_DONATIONS_TYPO, POTENTIAL_ONLINE_DONATIONS, TOTAL_PLUS_POTENTIAL,
};
use crate::names::cleanup_name;

const GENERAL_CLASS: &str = "General";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoClass,
    GeneralClass,
    TotalFooter,
    BadClassCode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct Normalized {
    pub students: Vec<Student>,
    pub skipped: Vec<SkippedRow>,
}

/// Turns export rows into one student fragment per usable row.
///
/// Rows without a usable class are skipped and reported; a well-formed class
/// code naming an unknown campus means the export itself is wrong and fails
/// the whole load.
pub fn normalize(rows: Vec<RawRow>, config: &Config) -> Result<Normalized, LoadError> {
    let mut out = Normalized::default();

    for row in rows {
        let skip = |reason| SkippedRow {
            line: row.line,
            reason,
        };

        let Some(class_name) = row.get(CLASS_NAME) else {
            out.skipped.push(skip(SkipReason::NoClass));
            continue;
        };
        if class_name == GENERAL_CLASS {
            out.skipped.push(skip(SkipReason::GeneralClass));
            continue;
        }
        if row
            .get(LAST_NAME)
            .is_some_and(|name| name.eq_ignore_ascii_case("total"))
        {
            out.skipped.push(skip(SkipReason::TotalFooter));
            continue;
        }

        let Some(class) = ClassCode::parse(class_name) else {
            warn!(line = row.line, class_name, "failed to match class name");
            out.skipped
                .push(skip(SkipReason::BadClassCode(class_name.to_string())));
            continue;
        };
        if !config.is_known_campus(&class.campus) {
            return Err(LoadError::UnknownCampus {
                campus: class.campus,
                class_name: class_name.to_string(),
            });
        }

        let first_name = cleanup_name(row.get(FIRST_NAME).unwrap_or_default());
        let last_name = cleanup_name(row.get(LAST_NAME).unwrap_or_default());

        let online = row
            .get(ONLINE_DONATIONS)
            .map(|_| ONLINE_DONATIONS)
            .unwrap_or(ONLINE_DONATIONS_TYPO);

        let mut student = Student::new(first_name, last_name, class);
        student.pledges_online =
            (count(&row, online) + count(&row, POTENTIAL_ONLINE_DONATIONS)) as u32;
        student.minutes = count(&row, MINUTE_COUNT);
        student.expected_raised = amount(&row, TOTAL_PLUS_POTENTIAL);
        student.raw.push(row);
        out.students.push(student);
    }

    info!(
        kept = out.students.len(),
        skipped = out.skipped.len(),
        "normalized export rows"
    );
    Ok(out)
}

/// Accepts thousands separators (`1,234`).
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Blank is 0; anything unparseable is 0 with a warning.
fn amount(row: &RawRow, column: &str) -> f64 {
    let Some(value) = row.get(column) else {
        return 0.0;
    };
    parse_number(value).unwrap_or_else(|| {
        warn!(line = row.line, column, value, "not a number, using 0");
        0.0
    })
}

fn count(row: &RawRow, column: &str) -> u64 {
    let n = amount(row, column);
    if n < 0.0 {
        warn!(line = row.line, column, value = n, "negative count, using 0");
        return 0;
    }
    n.round() as u64
}
