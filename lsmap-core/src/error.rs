use lsmap_scanner::ScanError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to fetch directory {url}: {source}")]
    Directory {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch archive {location}: {source}")]
    ArchiveFetch {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read archive {location}: {source}")]
    Archive {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse table {name}: {source}")]
    Table {
        name: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Log writer failed: {0}")]
    Writer(String),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
