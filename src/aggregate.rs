use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::config::{Config, PrizeCounts};
use crate::models::{ClassCode, Student};
use crate::names::display_names;
use crate::ranking::{descending, rank_by, CompetitionRank};

pub type StudentRanking = Vec<CompetitionRank<Arc<Student>>>;

#[derive(Debug, Clone)]
pub struct Classroom {
    pub class: ClassCode,
    pub teacher: Option<String>,
    pub students: Vec<Arc<Student>>,
    pub pledges: u32,
    pub minutes: u64,
    pub top_readers: StudentRanking,
    pub top_pledgers: StudentRanking,
}

/// Classrooms of one grade on one campus, competing with each other.
#[derive(Debug, Clone)]
pub struct GradeLeague {
    pub grade: i8,
    pub classrooms: Vec<CompetitionRank<Arc<Classroom>>>,
    pub top_readers: StudentRanking,
    pub top_pledgers: StudentRanking,
}

#[derive(Debug, Clone)]
pub struct CampusResults {
    pub campus: String,
    pub name: String,
    pub students: Vec<Arc<Student>>,
    /// Keyed by `(grade, animal)`.
    pub classrooms: BTreeMap<(i8, String), Arc<Classroom>>,
    pub leagues: BTreeMap<i8, GradeLeague>,
    pub top_readers: StudentRanking,
    pub top_pledgers: StudentRanking,
    pub missing_teachers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampusSummary {
    pub campus: String,
    pub name: String,
    pub minutes: u64,
    pub pledges: u32,
    pub expected_raised: f64,
    pub active_classrooms: usize,
}

impl CampusSummary {
    pub fn pledges_per_classroom(&self) -> f64 {
        if self.active_classrooms == 0 {
            0.0
        } else {
            self.pledges as f64 / self.active_classrooms as f64
        }
    }
}

/// Everything a presentation or export layer needs from one load.
#[derive(Debug, Clone)]
pub struct Results {
    pub last_update: NaiveDateTime,
    pub campuses: BTreeMap<String, CampusResults>,
    pub standings: Vec<CompetitionRank<CampusSummary>>,
}

fn by_minutes(a: &Arc<Student>, b: &Arc<Student>) -> Ordering {
    descending(a.minutes as f64, b.minutes as f64)
        .then_with(|| descending(a.pledges() as f64, b.pledges() as f64))
        .then_with(|| a.display_name.cmp(&b.display_name))
}

fn by_pledges(a: &Arc<Student>, b: &Arc<Student>) -> Ordering {
    descending(a.pledges() as f64, b.pledges() as f64)
        .then_with(|| descending(a.minutes as f64, b.minutes as f64))
        .then_with(|| a.display_name.cmp(&b.display_name))
}

fn by_class_minutes(a: &Arc<Classroom>, b: &Arc<Classroom>) -> Ordering {
    descending(a.minutes as f64, b.minutes as f64)
        .then_with(|| descending(a.pledges as f64, b.pledges as f64))
        .then_with(|| a.class.animal.cmp(&b.class.animal))
}

fn by_pledges_per_classroom(a: &CampusSummary, b: &CampusSummary) -> Ordering {
    descending(a.pledges_per_classroom(), b.pledges_per_classroom())
        .then_with(|| a.campus.cmp(&b.campus))
}

fn readers(students: Vec<Arc<Student>>, prize_count: usize) -> StudentRanking {
    rank_by(students, by_minutes, |s| s.minutes as f64, prize_count)
}

fn pledgers(students: Vec<Arc<Student>>, prize_count: usize) -> StudentRanking {
    rank_by(students, by_pledges, |s| s.pledges() as f64, prize_count)
}

fn pledging(students: &[Arc<Student>]) -> Vec<Arc<Student>> {
    students.iter().filter(|s| s.pledges() > 0).cloned().collect()
}

/// Rolls deduplicated students up into classrooms, grade leagues, campuses
/// and the cross-campus standings.
pub fn aggregate(students: Vec<Student>, config: &Config, last_update: NaiveDateTime) -> Results {
    let mut by_campus: BTreeMap<String, Vec<Student>> = BTreeMap::new();
    for student in students {
        by_campus
            .entry(student.campus().to_string())
            .or_default()
            .push(student);
    }

    let campuses: BTreeMap<String, CampusResults> = by_campus
        .into_iter()
        .map(|(campus, students)| {
            let results = build_campus(&campus, students, config);
            (campus, results)
        })
        .collect();

    let summaries: Vec<CampusSummary> = campuses.values().map(summarize).collect();
    let standings = rank_by(
        summaries,
        by_pledges_per_classroom,
        CampusSummary::pledges_per_classroom,
        config.prizes.campus_standings,
    );

    Results {
        last_update,
        campuses,
        standings,
    }
}

fn build_campus(campus: &str, mut students: Vec<Student>, config: &Config) -> CampusResults {
    let prizes = &config.prizes;

    let names = display_names(
        students
            .iter()
            .map(|s| (s.first_name.as_str(), s.last_name.as_str())),
    );
    for student in &mut students {
        if let Some(display) = names.get(&(student.first_name.clone(), student.last_name.clone())) {
            student.display_name = display.clone();
        }
    }
    let students: Vec<Arc<Student>> = students.into_iter().map(Arc::new).collect();

    let mut members: BTreeMap<(i8, String), Vec<Arc<Student>>> = BTreeMap::new();
    for student in &students {
        members
            .entry((student.grade(), student.class.animal.clone()))
            .or_default()
            .push(Arc::clone(student));
    }

    let mut missing_teachers = Vec::new();
    let classrooms: BTreeMap<(i8, String), Arc<Classroom>> = members
        .into_iter()
        .map(|(key, members)| {
            let classroom = build_classroom(members, config, prizes);
            if classroom.teacher.is_none() {
                missing_teachers.push(classroom.class.code());
            }
            (key, Arc::new(classroom))
        })
        .collect();

    let mut by_grade: BTreeMap<i8, Vec<Arc<Classroom>>> = BTreeMap::new();
    for classroom in classrooms.values() {
        by_grade
            .entry(classroom.class.grade())
            .or_default()
            .push(Arc::clone(classroom));
    }
    let leagues: BTreeMap<i8, GradeLeague> = by_grade
        .into_iter()
        .map(|(grade, classes)| (grade, build_league(grade, classes, prizes)))
        .collect();

    let top_readers = readers(students.clone(), prizes.campus_readers);
    let top_pledgers = pledgers(students.clone(), prizes.campus_pledgers);

    info!(
        campus,
        students = students.len(),
        classrooms = classrooms.len(),
        "aggregated campus"
    );

    CampusResults {
        campus: campus.to_string(),
        name: config.campus_name(campus).to_string(),
        students,
        classrooms,
        leagues,
        top_readers,
        top_pledgers,
        missing_teachers,
    }
}

fn build_classroom(students: Vec<Arc<Student>>, config: &Config, prizes: &PrizeCounts) -> Classroom {
    // Grouping never yields an empty classroom.
    let class = students[0].class.clone();
    let code = class.code();
    let teacher = config.teacher(&code).map(str::to_string);
    if teacher.is_none() {
        warn!(class = %code, "no teacher found");
    }

    Classroom {
        pledges: students.iter().map(|s| s.pledges()).sum(),
        minutes: students.iter().map(|s| s.minutes).sum(),
        top_readers: readers(students.clone(), prizes.class_readers),
        top_pledgers: pledgers(pledging(&students), prizes.class_pledgers),
        class,
        teacher,
        students,
    }
}

fn build_league(
    grade: i8,
    classrooms: Vec<Arc<Classroom>>,
    prizes: &PrizeCounts,
) -> GradeLeague {
    let students: Vec<Arc<Student>> = classrooms
        .iter()
        .flat_map(|c| c.students.iter().cloned())
        .collect();

    GradeLeague {
        grade,
        classrooms: rank_by(
            classrooms,
            by_class_minutes,
            |c| c.minutes as f64,
            prizes.grade_classrooms,
        ),
        top_readers: readers(students.clone(), prizes.grade_readers),
        top_pledgers: pledgers(pledging(&students), prizes.grade_pledgers),
    }
}

fn summarize(campus: &CampusResults) -> CampusSummary {
    let active: BTreeSet<(i8, &str)> = campus
        .students
        .iter()
        .map(|s| (s.grade(), s.class.animal.as_str()))
        .collect();

    CampusSummary {
        campus: campus.campus.clone(),
        name: campus.name.clone(),
        minutes: campus.students.iter().map(|s| s.minutes).sum(),
        pledges: campus.students.iter().map(|s| s.pledges()).sum(),
        expected_raised: campus.students.iter().map(|s| s.expected_raised).sum(),
        active_classrooms: active.len(),
    }
}
