// Record source: the hints directory and the cache archives it lists

use crate::error::{CoreError, Result};
use flate2::read::GzDecoder;
use lsmap_scanner::CandidateRecord;
use reqwest::Client;
use std::io::Read;
use tar::Archive;
use tracing::{debug, info, warn};

pub const DEFAULT_HINTS_URL: &str = "http://www.perfsonar.net/ls.cache.hints";

/// One regular file from a cache archive, reduced to its locator column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTable {
    pub name: String,
    pub locators: Vec<String>,
}

impl ArchiveTable {
    /// Provenance tag for every record in this table
    pub fn origin(&self, location: &str) -> String {
        format!("cache,{},{}", self.name, location)
    }

    pub fn records(&self, location: &str) -> Vec<CandidateRecord> {
        let origin = self.origin(location);
        self.locators
            .iter()
            .map(|locator| CandidateRecord::new(locator.clone(), origin.clone()))
            .collect()
    }
}

/// Split a directory body into archive locations, skipping blank lines
pub fn parse_directory(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fetch the hints directory. Any failure here ends the run.
pub async fn fetch_directory(client: &Client, url: &str) -> Result<Vec<String>> {
    let directory_err = |source: reqwest::Error| CoreError::Directory {
        url: url.to_string(),
        source,
    };

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(directory_err)?;
    let body = response.bytes().await.map_err(directory_err)?;

    let locations = parse_directory(&String::from_utf8_lossy(&body));
    info!(url = %url, locations = locations.len(), "Fetched directory");
    Ok(locations)
}

/// Download one cache archive and unpack its tables
pub async fn fetch_archive(client: &Client, location: &str) -> Result<Vec<ArchiveTable>> {
    let fetch_err = |source: reqwest::Error| CoreError::ArchiveFetch {
        location: location.to_string(),
        source,
    };

    info!(location = %location, "Getting cache archive");
    let response = client
        .get(location)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?;
    let body = response.bytes().await.map_err(fetch_err)?;

    // Decompression is synchronous, keep it off the async workers
    let location_owned = location.to_string();
    tokio::task::spawn_blocking(move || parse_archive(&location_owned, &body))
        .await
        .map_err(|e| CoreError::Archive {
            location: location.to_string(),
            source: e.into(),
        })?
}

/// Unpack a gzip-compressed tar of pipe-delimited tables.
///
/// Directory and special entries are skipped. A table that fails to parse
/// is logged and skipped; a broken container fails the whole archive.
pub fn parse_archive(location: &str, data: &[u8]) -> Result<Vec<ArchiveTable>> {
    let archive_err = |source: std::io::Error| CoreError::Archive {
        location: location.to_string(),
        source,
    };

    let mut archive = Archive::new(GzDecoder::new(data));
    let mut tables = Vec::new();

    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        let entry_type = entry.header().entry_type();
        if !entry_type.is_file() {
            debug!(location = %location, "Skipping {:?} entry", entry_type);
            continue;
        }

        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        match parse_table(&mut entry) {
            Ok(locators) => tables.push(ArchiveTable { name, locators }),
            Err(source) => {
                warn!(location = %location, "{}", CoreError::Table { name, source });
            }
        }
    }

    Ok(tables)
}

/// Read a `|`-delimited table and return the first field of every row.
///
/// Quoting is lenient: stray quotes in unquoted fields are kept, rows may
/// have any number of fields and bytes need not be UTF-8.
pub fn parse_table<R: Read>(reader: R) -> std::result::Result<Vec<String>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut locators = Vec::new();
    for record in rdr.byte_records() {
        let record = record?;
        if let Some(field) = record.get(0) {
            locators.push(String::from_utf8_lossy(field).into_owned());
        }
    }
    Ok(locators)
}
