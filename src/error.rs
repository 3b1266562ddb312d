use std::path::PathBuf;

use thiserror::Error;

/// Conditions that abort a load. Everything else is a data-quality warning.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no export matching YYYY-MM-DDThhmm.csv found in {0}")]
    NoExport(PathBuf),

    #[error("failed to parse date from {0}")]
    BadTimestamp(String),

    #[error("unknown campus {campus} in class name {class_name}")]
    UnknownCampus { campus: String, class_name: String },

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
