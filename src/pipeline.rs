use tracing::info;

use crate::aggregate::{aggregate, Results};
use crate::config::Config;
use crate::dedup::merge_duplicates;
use crate::error::LoadError;
use crate::normalize::{normalize, SkippedRow};
use crate::reconcile::{reconcile, OfflineLedger, RosterNote, Roster};
use crate::source::{read_sources, SourcePaths, Sources};

/// One complete load: the result bundle plus every data-quality issue met on
/// the way.
#[derive(Debug)]
pub struct Load {
    pub file_name: String,
    pub results: Results,
    pub skipped: Vec<SkippedRow>,
    pub notes: Vec<RosterNote>,
}

pub async fn load(paths: &SourcePaths, config: &Config) -> Result<Load, LoadError> {
    let sources = read_sources(paths).await?;
    build(sources, config)
}

/// Runs normalize, reconcile, merge and aggregate over sources already in
/// memory. Either the whole bundle is produced or nothing is.
pub fn build(sources: Sources, config: &Config) -> Result<Load, LoadError> {
    let Sources {
        file_name,
        last_update,
        export,
        roster,
        offline,
    } = sources;

    let normalized = normalize(export, config)?;
    let roster = Roster::from_rows(roster, config);
    let ledger = OfflineLedger::from_rows(offline, config);

    let reconciled = reconcile(normalized.students, &roster, &ledger, config);
    let students = merge_duplicates(reconciled.students);
    let results = aggregate(students, config, last_update);

    info!(
        file = %file_name,
        campuses = results.campuses.len(),
        skipped = normalized.skipped.len(),
        roster_notes = reconciled.notes.len(),
        "load complete"
    );

    Ok(Load {
        file_name,
        results,
        skipped: normalized.skipped,
        notes: reconciled.notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
First Name,Last Name,Class Name,Minute Count,Online Donation #,Potential Online Donation #,Total + Potential
Jane,Doe,1MonkeyCAR,10,1,0,25
JANE,DOE,1MonkeyCAR,15,0,1,10
max,li,1TigerCAR,30,0,0,0
Ann,Lee,General,99,9,9,0
Cy,Ng,2OwlCHE,5,2,0,40
,Total,,59,3,1,75
";

    fn write_fixture(dir: &std::path::Path) -> SourcePaths {
        std::fs::write(dir.join("2025-03-14T0930.csv"), EXPORT).unwrap();
        std::fs::write(dir.join("2025-03-13T0930.csv"), "First Name\n").unwrap();
        std::fs::write(
            dir.join("offline.csv"),
            "First Name,Last Name,Class Name,Pledges\nMax,Li,1TigerCAR,3\n",
        )
        .unwrap();
        SourcePaths::in_dir(dir, None, Some(dir.join("offline.csv"))).unwrap()
    }

    #[tokio::test]
    async fn loads_and_merges_an_export_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_fixture(dir.path());

        let load = load(&paths, &Config::default()).await.unwrap();
        assert_eq!(load.file_name, "2025-03-14T0930.csv");
        assert_eq!(load.results.last_update.to_string(), "2025-03-14 09:30:00");
        assert_eq!(load.skipped.len(), 2);

        let car = &load.results.campuses["CAR"];
        assert_eq!(car.students.len(), 2);
        let jane = car
            .students
            .iter()
            .find(|s| s.id == "CAR|1|Monkey|Doe|Jane")
            .unwrap();
        assert_eq!(jane.minutes, 25);
        assert_eq!(jane.pledges(), 2);
        assert_eq!(jane.raw.len(), 2);

        let max = car.students.iter().find(|s| s.first_name == "Max").unwrap();
        assert_eq!(max.pledges_offline, 3);
        assert_eq!(car.classrooms[&(1, "Tiger".to_string())].pledges, 3);

        let order: Vec<&str> = load
            .results
            .standings
            .iter()
            .map(|r| r.item.campus.as_str())
            .collect();
        assert_eq!(order, vec!["CAR", "CHE"]);
    }

    #[tokio::test]
    async fn unknown_campus_aborts_the_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2025-03-14T0930.csv"),
            "First Name,Last Name,Class Name\nJane,Doe,1MonkeyZZZ\n",
        )
        .unwrap();
        let paths = SourcePaths::in_dir(dir.path(), None, None).unwrap();

        assert!(matches!(
            load(&paths, &Config::default()).await,
            Err(LoadError::UnknownCampus { .. })
        ));
    }
}
