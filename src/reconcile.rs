use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{ClassCode, RawRow, Student, CLASS_NAME, FIRST_NAME, LAST_NAME, PLEDGES};
use crate::names::cleanup_name;
use crate::normalize::parse_number;

type NameKey = (String, String);

/// Which classrooms the school has each student enrolled in.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: HashMap<NameKey, BTreeSet<ClassCode>>,
}

impl Roster {
    pub fn from_rows(rows: Vec<RawRow>, config: &Config) -> Self {
        let mut roster = Self::default();
        for row in rows {
            let Some((first, last, class)) = named_class(&row, config) else {
                continue;
            };
            roster.insert(first, last, class);
        }
        info!(students = roster.entries.len(), "loaded roster");
        roster
    }

    pub fn insert(&mut self, first_name: String, last_name: String, class: ClassCode) {
        self.entries
            .entry((first_name, last_name))
            .or_default()
            .insert(class);
    }

    pub fn classes(&self, first_name: &str, last_name: &str) -> Option<&BTreeSet<ClassCode>> {
        self.entries
            .get(&(first_name.to_string(), last_name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pledges collected on paper, keyed by student name and class code.
#[derive(Debug, Clone, Default)]
pub struct OfflineLedger {
    pledges: HashMap<(String, String, String), u32>,
}

impl OfflineLedger {
    pub fn from_rows(rows: Vec<RawRow>, config: &Config) -> Self {
        let mut ledger = Self::default();
        for row in rows {
            let Some((first, last, class)) = named_class(&row, config) else {
                continue;
            };
            let pledges = match row.get(PLEDGES).map(parse_number) {
                Some(Some(n)) if n >= 0.0 => n.round() as u32,
                Some(_) => {
                    warn!(line = row.line, "offline pledge count is not a number, skipping");
                    continue;
                }
                None => 0,
            };
            ledger.add(first, last, &class, pledges);
        }
        info!(entries = ledger.pledges.len(), "loaded offline pledges");
        ledger
    }

    pub fn add(&mut self, first_name: String, last_name: String, class: &ClassCode, pledges: u32) {
        *self
            .pledges
            .entry((first_name, last_name, class.code()))
            .or_default() += pledges;
    }

    fn get(&self, key: &(String, String, String)) -> Option<u32> {
        self.pledges.get(key).copied()
    }

    /// Entries no student claimed, in name order.
    fn unclaimed<'a>(
        &'a self,
        claimed: &HashSet<(String, String, String)>,
    ) -> Vec<(&'a (String, String, String), u32)> {
        let mut left: Vec<_> = self
            .pledges
            .iter()
            .filter(|(key, pledges)| **pledges > 0 && !claimed.contains(*key))
            .map(|(key, pledges)| (key, *pledges))
            .collect();
        left.sort_unstable();
        left
    }
}

fn named_class(row: &RawRow, config: &Config) -> Option<(String, String, ClassCode)> {
    let class_name = row.get(CLASS_NAME)?;
    let Some(class) = ClassCode::parse(class_name) else {
        warn!(line = row.line, class_name, "unparseable class name in reference data");
        return None;
    };
    if !config.is_known_campus(&class.campus) {
        warn!(line = row.line, class_name, "unknown campus in reference data");
        return None;
    }
    let first = cleanup_name(row.get(FIRST_NAME).unwrap_or_default());
    let last = cleanup_name(row.get(LAST_NAME).unwrap_or_default());
    Some((first, last, class))
}

/// Why a student's class assignment was or was not touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterNote {
    Renamed { from: String, to: String },
    Moved { student: String, from: String, to: String },
    GradeMismatch { student: String, reported: String, roster: String },
    Ambiguous { student: String, candidates: Vec<String> },
    NotOnRoster { student: String },
    /// Offline pledges whose name and class match no student in the export.
    UnmatchedOffline {
        first_name: String,
        last_name: String,
        class: String,
        pledges: u32,
    },
}

#[derive(Debug, Default)]
pub struct Reconciled {
    pub students: Vec<Student>,
    pub notes: Vec<RosterNote>,
}

/// Applies name exceptions, roster corrections and offline pledges.
///
/// A class is only replaced when the roster names exactly one classroom and
/// it is in the same grade. Offline pledges are assigned once per student, so
/// running this over already reconciled students changes nothing.
pub fn reconcile(
    students: Vec<Student>,
    roster: &Roster,
    ledger: &OfflineLedger,
    config: &Config,
) -> Reconciled {
    let mut out = Reconciled::default();
    let mut claimed: HashSet<(String, String, String)> = HashSet::new();

    for mut student in students {
        if let Some((first, last)) = config.legal_name(&student.first_name, &student.last_name) {
            let from = student.full_name();
            student.first_name = first.to_string();
            student.last_name = last.to_string();
            student.display_name = student.full_name();
            student.renamed_from.get_or_insert(from.clone());
            student.refresh_id();
            debug!(from = %from, to = %student.display_name, "applied name exception");
            out.notes.push(RosterNote::Renamed {
                from,
                to: student.display_name.clone(),
            });
        }

        match roster.classes(&student.first_name, &student.last_name) {
            None if !roster.is_empty() => {
                debug!(student = %student.id, "not on roster");
                out.notes.push(RosterNote::NotOnRoster {
                    student: student.id.clone(),
                });
            }
            None => {}
            Some(classes) if classes.len() == 1 => {
                if let Some(note) = apply_roster_class(&mut student, classes) {
                    out.notes.push(note);
                }
            }
            Some(classes) => {
                let candidates: Vec<String> = classes.iter().map(ClassCode::code).collect();
                warn!(
                    student = %student.id,
                    candidates = ?candidates,
                    "name matches several roster classrooms, leaving class as reported"
                );
                out.notes.push(RosterNote::Ambiguous {
                    student: student.id.clone(),
                    candidates,
                });
            }
        }

        let key = (
            student.first_name.clone(),
            student.last_name.clone(),
            student.class.code(),
        );
        if !claimed.contains(&key) {
            if let Some(pledges) = ledger.get(&key) {
                student.pledges_offline = pledges;
                claimed.insert(key);
            }
        }

        out.students.push(student);
    }

    for ((first_name, last_name, class), pledges) in ledger.unclaimed(&claimed) {
        warn!(
            first_name = %first_name,
            last_name = %last_name,
            class = %class,
            pledges,
            "offline pledges match no student, not counted"
        );
        out.notes.push(RosterNote::UnmatchedOffline {
            first_name: first_name.clone(),
            last_name: last_name.clone(),
            class: class.clone(),
            pledges,
        });
    }

    out
}

fn apply_roster_class(student: &mut Student, classes: &BTreeSet<ClassCode>) -> Option<RosterNote> {
    let roster_class = classes.iter().next()?;
    if *roster_class == student.class {
        return None;
    }

    let reported = student.class.code();
    if roster_class.grade_code != student.class.grade_code {
        warn!(
            student = %student.id,
            reported = %reported,
            roster = %roster_class,
            "roster puts student in another grade, not moving"
        );
        return Some(RosterNote::GradeMismatch {
            student: student.id.clone(),
            reported,
            roster: roster_class.code(),
        });
    }

    info!(student = %student.id, from = %reported, to = %roster_class, "moved student to roster class");
    student.class = roster_class.clone();
    student.moved_from.get_or_insert(reported.clone());
    student.refresh_id();
    Some(RosterNote::Moved {
        student: student.id.clone(),
        from: reported,
        to: roster_class.code(),
    })
}
