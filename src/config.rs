use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;

/// Curated reference data for one fundraiser. Loaded once and passed by
/// reference into the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Campus code to display name. Any other code in an export is fatal.
    pub campuses: BTreeMap<String, String>,
    /// Classroom code (`1MonkeyCAR`) to teacher name.
    pub teachers: BTreeMap<String, String>,
    pub name_exceptions: Vec<NameException>,
    pub prizes: PrizeCounts,
}

/// Maps a name as students type it to the name the school rosters use.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NameException {
    pub first_name: String,
    pub last_name: String,
    pub legal_first_name: String,
    pub legal_last_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrizeCounts {
    pub campus_readers: usize,
    pub campus_pledgers: usize,
    pub grade_readers: usize,
    pub grade_pledgers: usize,
    pub grade_classrooms: usize,
    pub class_readers: usize,
    pub class_pledgers: usize,
    pub campus_standings: usize,
}

impl Default for PrizeCounts {
    fn default() -> Self {
        Self {
            campus_readers: 10,
            campus_pledgers: 5,
            grade_readers: 5,
            grade_pledgers: 3,
            grade_classrooms: 1,
            class_readers: 1,
            class_pledgers: 1,
            campus_standings: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let campuses = [("CAR", "Carolyn"), ("CHE", "Chestnut"), ("MLK", "MLK")]
            .into_iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();

        Self {
            campuses,
            teachers: BTreeMap::new(),
            name_exceptions: Vec::new(),
            prizes: PrizeCounts::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, LoadError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_toml(&text)
    }

    pub fn is_known_campus(&self, code: &str) -> bool {
        self.campuses.contains_key(code)
    }

    pub fn campus_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.campuses.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn teacher(&self, class_code: &str) -> Option<&str> {
        self.teachers.get(class_code).map(String::as_str)
    }

    /// Legal name for a known nickname, if one is configured.
    pub fn legal_name(&self, first_name: &str, last_name: &str) -> Option<(&str, &str)> {
        self.name_exceptions
            .iter()
            .find(|e| e.first_name == first_name && e.last_name == last_name)
            .map(|e| (e.legal_first_name.as_str(), e.legal_last_name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_three_campuses() {
        let config = Config::default();
        assert!(config.is_known_campus("CAR"));
        assert!(config.is_known_campus("MLK"));
        assert!(!config.is_known_campus("XYZ"));
        assert_eq!(config.prizes.campus_readers, 10);
        assert_eq!(config.prizes.campus_standings, 0);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = Config::from_toml(
            r#"
            [teachers]
            "1MonkeyCAR" = "Ms. Rivera"

            [prizes]
            campus_readers = 3

            [[name_exceptions]]
            first_name = "Jimmy"
            last_name = "Doe"
            legal_first_name = "James"
            legal_last_name = "Doe"
            "#,
        )
        .unwrap();

        assert_eq!(config.teacher("1MonkeyCAR"), Some("Ms. Rivera"));
        assert_eq!(config.teacher("1TigerCAR"), None);
        assert_eq!(config.prizes.campus_readers, 3);
        assert_eq!(config.prizes.campus_pledgers, 5);
        assert_eq!(config.campus_name("CHE"), "Chestnut");
        assert_eq!(config.legal_name("Jimmy", "Doe"), Some(("James", "Doe")));
        assert_eq!(config.legal_name("Jane", "Doe"), None);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            Config::from_toml("campuses = 3"),
            Err(LoadError::Config(_))
        ));
    }
}
