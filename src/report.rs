use std::fmt::Write;

use crate::aggregate::{CampusResults, StudentRanking};
use crate::models::grade_label;
use crate::normalize::SkipReason;
use crate::pipeline::Load;
use crate::reconcile::RosterNote;

fn rank_cell(rank: usize, prize: bool, score: f64) -> String {
    match (prize, score > 0.0) {
        (true, _) => format!("🏆 {rank}"),
        (false, true) => rank.to_string(),
        (false, false) => "-".to_string(),
    }
}

fn write_students(output: &mut String, title: &str, ranking: &StudentRanking, limit: usize, unit: &str) {
    let _ = writeln!(output, "### {title}");
    if ranking.first().map_or(true, |r| r.score <= 0.0) {
        let _ = writeln!(output, "Nobody yet.");
        let _ = writeln!(output);
        return;
    }

    for entry in ranking.iter().take(limit.max(ranking.iter().filter(|r| r.prize).count())) {
        let _ = writeln!(
            output,
            "- {} {} ({} {}, {}) {} {}",
            rank_cell(entry.rank, entry.prize, entry.score),
            entry.item.display_name,
            grade_label(entry.item.grade()),
            entry.item.class.animal_label(),
            entry.item.campus(),
            entry.score,
            unit
        );
    }
    let _ = writeln!(output);
}

fn write_campus(output: &mut String, campus: &CampusResults) {
    let _ = writeln!(output, "## {} campus", campus.name);
    let _ = writeln!(output);

    write_students(output, "Top readers", &campus.top_readers, 10, "minutes");
    write_students(output, "Top pledgers", &campus.top_pledgers, 10, "pledges");

    for league in campus.leagues.values() {
        let _ = writeln!(output, "### Grade {} classrooms", grade_label(league.grade));
        for entry in &league.classrooms {
            let classroom = &entry.item;
            let _ = writeln!(
                output,
                "- {} {} ({}) {} minutes, {} pledges",
                rank_cell(entry.rank, entry.prize, entry.score),
                classroom.class.animal_label(),
                classroom.teacher.as_deref().unwrap_or("teacher unknown"),
                classroom.minutes,
                classroom.pledges
            );
        }
        let _ = writeln!(output);

        let label = grade_label(league.grade);
        write_students(output, &format!("Grade {label} top readers"), &league.top_readers, 5, "minutes");
        write_students(output, &format!("Grade {label} top pledgers"), &league.top_pledgers, 3, "pledges");
    }
}

fn describe_note(note: &RosterNote) -> String {
    match note {
        RosterNote::Renamed { from, to } => format!("renamed {from} to {to}"),
        RosterNote::Moved { student, from, to } => format!("moved {student} from {from} to {to}"),
        RosterNote::GradeMismatch {
            student,
            reported,
            roster,
        } => format!("{student} reported {reported} but roster says {roster}; not moved"),
        RosterNote::Ambiguous {
            student,
            candidates,
        } => format!("{student} matches several classes: {}", candidates.join(", ")),
        RosterNote::NotOnRoster { student } => format!("{student} is not on the roster"),
        RosterNote::UnmatchedOffline {
            first_name,
            last_name,
            class,
            pledges,
        } => format!("{pledges} offline pledges for {first_name} {last_name} ({class}) match no student"),
    }
}

fn write_data_quality(output: &mut String, load: &Load, campus: Option<&str>) {
    let bad_classes: Vec<String> = load
        .skipped
        .iter()
        .filter_map(|row| match &row.reason {
            SkipReason::BadClassCode(class_name) => Some(format!("line {}: {class_name}", row.line)),
            _ => None,
        })
        .collect();
    let notes: Vec<&RosterNote> = load
        .notes
        .iter()
        .filter(|note| !matches!(note, RosterNote::NotOnRoster { .. }))
        .collect();
    let missing_teachers: Vec<&str> = load
        .results
        .campuses
        .values()
        .filter(|c| campus.map_or(true, |code| c.campus == code))
        .flat_map(|c| c.missing_teachers.iter().map(String::as_str))
        .collect();

    let _ = writeln!(output, "## Data quality");
    let _ = writeln!(
        output,
        "Source {}: {} rows skipped, {} roster notes.",
        load.file_name,
        load.skipped.len(),
        load.notes.len()
    );
    for class_name in &bad_classes {
        let _ = writeln!(output, "- unrecognised class name at {class_name}");
    }
    for note in notes {
        let _ = writeln!(output, "- {}", describe_note(note));
    }
    if !missing_teachers.is_empty() {
        let _ = writeln!(output, "- no teacher on file for {}", missing_teachers.join(", "));
    }
}

/// Markdown leaderboard for one campus, or every campus when `campus` is
/// `None`. Campus standings always cover every campus.
pub fn build_report(load: &Load, campus: Option<&str>) -> String {
    let results = &load.results;
    let mut output = String::new();

    let _ = writeln!(output, "# Readathon Standings");
    let _ = writeln!(output, "Last updated {}", results.last_update.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Campuses");

    if results.standings.is_empty() {
        let _ = writeln!(output, "No data loaded.");
    } else {
        for entry in &results.standings {
            let _ = writeln!(
                output,
                "- {} {} {:.1} pledges per class ({} pledges, {} classes, {} minutes, ${:.0} expected)",
                rank_cell(entry.rank, entry.prize, entry.score),
                entry.item.name,
                entry.score,
                entry.item.pledges,
                entry.item.active_classrooms,
                entry.item.minutes,
                entry.item.expected_raised
            );
        }
    }
    let _ = writeln!(output);

    for selected in results
        .campuses
        .values()
        .filter(|c| campus.map_or(true, |code| c.campus == code))
    {
        write_campus(&mut output, selected);
    }

    write_data_quality(&mut output, load, campus);
    output
}
