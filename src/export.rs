use std::io;
use std::sync::Arc;

use crate::aggregate::{CampusResults, Classroom, StudentRanking};
use crate::models::{grade_label, ClassCode};
use crate::ranking::{winners, CompetitionRank};

/// Downstream spreadsheets key on these names; keep them byte for byte.
pub const HEADER: [&str; 8] = [
    "Campus",
    "Grade",
    "Class",
    "Competition",
    "Rank",
    "Score",
    "Last name",
    "First name",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Competition {
    CampusReader,
    CampusPledger,
    GradeReader,
    GradePledger,
    GradeClass,
    ClassReader,
    ClassPledger,
}

impl Competition {
    pub fn label(self) -> &'static str {
        match self {
            Self::CampusReader => "Campus top reader",
            Self::CampusPledger => "Campus top pledger",
            Self::GradeReader => "Grade top reader",
            Self::GradePledger => "Grade top pledger",
            Self::GradeClass => "Grade top class",
            Self::ClassReader => "Class top reader",
            Self::ClassPledger => "Class top pledger",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrizeRow {
    pub campus: String,
    pub grade: String,
    pub class: String,
    pub competition: Competition,
    pub rank: usize,
    pub score: f64,
    pub last_name: String,
    pub first_name: String,
}

impl PrizeRow {
    fn located(class: &ClassCode, competition: Competition, rank: usize, score: f64) -> Self {
        Self {
            campus: class.campus.clone(),
            grade: grade_label(class.grade()),
            class: class.animal_label(),
            competition,
            rank,
            score,
            last_name: String::new(),
            first_name: String::new(),
        }
    }

    pub fn record(&self) -> [String; 8] {
        [
            self.campus.clone(),
            self.grade.clone(),
            self.class.clone(),
            self.competition.label().to_string(),
            self.rank.to_string(),
            format_score(self.score),
            self.last_name.clone(),
            self.first_name.clone(),
        ]
    }
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        format!("{score:.1}")
    }
}

fn student_rows(ranking: &StudentRanking, competition: Competition) -> impl Iterator<Item = PrizeRow> + '_ {
    winners(ranking).map(move |r| PrizeRow {
        last_name: r.item.last_name.clone(),
        first_name: r.item.first_name.clone(),
        ..PrizeRow::located(&r.item.class, competition, r.rank, r.score)
    })
}

fn class_rows(
    ranking: &[CompetitionRank<Arc<Classroom>>],
) -> impl Iterator<Item = PrizeRow> + '_ {
    winners(ranking).map(|r| PrizeRow::located(&r.item.class, Competition::GradeClass, r.rank, r.score))
}

/// Every prize winner on a campus: campus tier first, then each grade league
/// in grade order, then each classroom.
pub fn prize_rows(campus: &CampusResults) -> Vec<PrizeRow> {
    let mut rows: Vec<PrizeRow> = Vec::new();
    rows.extend(student_rows(&campus.top_readers, Competition::CampusReader));
    rows.extend(student_rows(&campus.top_pledgers, Competition::CampusPledger));

    for league in campus.leagues.values() {
        rows.extend(student_rows(&league.top_readers, Competition::GradeReader));
        rows.extend(student_rows(&league.top_pledgers, Competition::GradePledger));
        rows.extend(class_rows(&league.classrooms));
    }

    for classroom in campus.classrooms.values() {
        rows.extend(student_rows(&classroom.top_readers, Competition::ClassReader));
        rows.extend(student_rows(&classroom.top_pledgers, Competition::ClassPledger));
    }

    rows
}

pub fn write_prizes<'a, W: io::Write>(
    campuses: impl IntoIterator<Item = &'a CampusResults>,
    out: W,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(HEADER)?;
    for campus in campuses {
        for row in prize_rows(campus) {
            writer.write_record(row.record())?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::config::{Config, PrizeCounts};
    use crate::models::Student;
    use chrono::NaiveDate;

    fn student(first: &str, last: &str, code: &str, minutes: u64, pledges: u32) -> Student {
        let mut s = Student::new(
            first.to_string(),
            last.to_string(),
            ClassCode::parse(code).unwrap(),
        );
        s.minutes = minutes;
        s.pledges_online = pledges;
        s
    }

    fn export(students: Vec<Student>, config: &Config) -> String {
        let when = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let results = aggregate(students, config, when);
        let mut out = Vec::new();
        write_prizes(results.campuses.values(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn empty_export_still_has_header() {
        let csv = export(Vec::new(), &Config::default());
        assert_eq!(csv, "Campus,Grade,Class,Competition,Rank,Score,Last name,First name\n");
    }

    #[test]
    fn lists_winners_of_every_tier() {
        let config = Config {
            prizes: PrizeCounts {
                campus_readers: 1,
                campus_pledgers: 1,
                grade_readers: 1,
                grade_pledgers: 1,
                grade_classrooms: 1,
                class_readers: 1,
                class_pledgers: 0,
                campus_standings: 0,
            },
            ..Config::default()
        };
        let csv = export(
            vec![
                student("Jane", "Doe", "KSeaTurtleCAR", 25, 0),
                student("Max", "Li", "KSeaTurtleCAR", 5, 2),
            ],
            &config,
        );

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Campus,Grade,Class,Competition,Rank,Score,Last name,First name",
                "CAR,K,Sea Turtle,Campus top reader,1,25,Doe,Jane",
                "CAR,K,Sea Turtle,Campus top pledger,1,2,Li,Max",
                "CAR,K,Sea Turtle,Grade top reader,1,25,Doe,Jane",
                "CAR,K,Sea Turtle,Grade top pledger,1,2,Li,Max",
                "CAR,K,Sea Turtle,Grade top class,1,30,,",
                "CAR,K,Sea Turtle,Class top reader,1,25,Doe,Jane",
            ]
        );
    }

    #[test]
    fn scores_keep_one_decimal_when_fractional() {
        assert_eq!(format_score(12.0), "12");
        assert_eq!(format_score(12.5), "12.5");
    }
}
