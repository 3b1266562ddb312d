use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

pub const FIRST_NAME: &str = "First Name";
pub const LAST_NAME: &str = "Last Name";
pub const CLASS_NAME: &str = "Class Name";
pub const MINUTE_COUNT: &str = "Minute Count";
pub const ONLINE_DONATIONS: &str = "Online Donation #";
pub const ONLINE_DONATIONS_TYPO: &str = "ONline Donation #";
pub const POTENTIAL_ONLINE_DONATIONS: &str = "Potential Online Donation #";
pub const TOTAL_PLUS_POTENTIAL: &str = "Total + Potential";
pub const PLEDGES: &str = "Pledges";

static CLASS_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9KT])([A-Za-z]{2,})([A-Za-z]{3})(.*)$").expect("class code pattern is valid")
});

/// One CSV line keyed by header. Kept verbatim for the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line in the source file.
    pub line: u64,
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    /// Trimmed cell value; empty cells read as absent.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }
}

/// Grade, mascot and campus encoded in a class name such as `1MonkeyCAR`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassCode {
    pub grade_code: char,
    pub animal: String,
    pub campus: String,
}

impl ClassCode {
    /// Matches the grade/animal/campus shape only; campus membership is
    /// checked by the caller. Trailing characters after the campus are ignored.
    pub fn parse(class_name: &str) -> Option<Self> {
        let caps = CLASS_CODE.captures(class_name.trim())?;
        Some(Self {
            grade_code: caps[1].chars().next()?,
            animal: caps[2].to_string(),
            campus: caps[3].to_string(),
        })
    }

    /// Kindergarten is 0 and Transitional Kindergarten is -1.
    pub fn grade(&self) -> i8 {
        match self.grade_code {
            'K' => 0,
            'T' => -1,
            c => c.to_digit(10).map(|d| d as i8).unwrap_or_default(),
        }
    }

    pub fn code(&self) -> String {
        self.to_string()
    }

    pub fn animal_label(&self) -> String {
        humanize(&self.animal)
    }
}

impl fmt::Display for ClassCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.grade_code, self.animal, self.campus)
    }
}

pub fn grade_label(grade: i8) -> String {
    match grade {
        -1 => "TK".to_string(),
        0 => "K".to_string(),
        n => n.to_string(),
    }
}

/// `SeaTurtle` -> `Sea Turtle`.
pub fn humanize(animal: &str) -> String {
    let mut out = String::with_capacity(animal.len() + 2);
    let mut prev_lower = false;
    for c in animal.chars() {
        if c.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = c.is_lowercase();
        out.push(c);
    }
    out
}

pub fn student_id(class: &ClassCode, last_name: &str, first_name: &str) -> String {
    [
        class.campus.as_str(),
        &class.grade_code.to_string(),
        class.animal.as_str(),
        last_name,
        first_name,
    ]
    .join("|")
}

/// A student as seen by the pipeline. Fresh from the normalizer it is a
/// single-row fragment; after deduplication it is the merged record.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub class: ClassCode,
    pub pledges_online: u32,
    pub pledges_offline: u32,
    pub minutes: u64,
    pub expected_raised: f64,
    /// Self-reported class code replaced by the roster.
    pub moved_from: Option<String>,
    /// Nickname replaced by a configured legal name.
    pub renamed_from: Option<String>,
    pub raw: Vec<RawRow>,
}

impl Student {
    pub fn new(first_name: String, last_name: String, class: ClassCode) -> Self {
        let display_name = full_name(&first_name, &last_name);
        let mut student = Self {
            id: String::new(),
            first_name,
            last_name,
            display_name,
            class,
            pledges_online: 0,
            pledges_offline: 0,
            minutes: 0,
            expected_raised: 0.0,
            moved_from: None,
            renamed_from: None,
            raw: Vec::new(),
        };
        student.refresh_id();
        student
    }

    pub fn refresh_id(&mut self) {
        self.id = student_id(&self.class, &self.last_name, &self.first_name);
    }

    pub fn pledges(&self) -> u32 {
        self.pledges_online + self.pledges_offline
    }

    pub fn campus(&self) -> &str {
        &self.class.campus
    }

    pub fn grade(&self) -> i8 {
        self.class.grade()
    }

    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

pub fn full_name(first_name: &str, last_name: &str) -> String {
    if last_name.is_empty() {
        first_name.to_string()
    } else {
        format!("{first_name} {last_name}")
    }
}
