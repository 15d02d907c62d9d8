use std::fs;
use std::path::{Path, PathBuf};

use tg_core::classify::ReferenceTables;
use tg_core::config::TrackerConfig;

use crate::optimizer::{dedupe_entries, DedupeStats};
use crate::parser::{parse_blocklist, BlocklistEntry};
use crate::tld::parse_tld_risk;

/// Error type for reference data files.
#[derive(Debug, thiserror::Error)]
pub enum RefDataError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid data in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// What a load produced.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub tld_entries: usize,
    pub blocklist: DedupeStats,
    pub failures: Vec<RefDataError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn read(path: &Path) -> Result<String, RefDataError> {
    fs::read_to_string(path).map_err(|source| RefDataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_tld_risk(path: &Path) -> Result<Vec<(String, u8)>, RefDataError> {
    let text = read(path)?;
    parse_tld_risk(&text).map_err(|source| RefDataError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Entries without a description are labelled with the file name.
pub fn load_blocklist(path: &Path) -> Result<Vec<BlocklistEntry>, RefDataError> {
    let text = read(path)?;
    let fallback = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_blocklist(&text, &fallback).map_err(|source| RefDataError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Assemble classifier tables from parsed data.
pub fn build_tables(tld_risk: Vec<(String, u8)>, mut blocklist: Vec<BlocklistEntry>) -> (ReferenceTables, DedupeStats) {
    let stats = dedupe_entries(&mut blocklist);
    let mut tables = ReferenceTables::new();

    for (tld, risk) in &tld_risk {
        tables.insert_tld_risk(tld, *risk);
    }
    for entry in &blocklist {
        tables.insert_blocklist(&entry.domain, &entry.description);
    }

    (tables, stats)
}

/// Load every configured file. A file that fails to load contributes an
/// empty table; the failure is logged and kept in the report.
pub fn load_reference_tables(tld_path: Option<&Path>, blocklist_paths: &[PathBuf]) -> (ReferenceTables, LoadReport) {
    let mut report = LoadReport::default();

    let tld_risk = match tld_path.map(load_tld_risk) {
        Some(Ok(entries)) => entries,
        Some(Err(err)) => {
            log::warn!("TLD risk table unavailable: {err}");
            report.failures.push(err);
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut blocklist = Vec::new();
    for path in blocklist_paths {
        match load_blocklist(path) {
            Ok(entries) => {
                log::debug!("loaded {} blocklist entries from {}", entries.len(), path.display());
                blocklist.extend(entries);
            }
            Err(err) => {
                log::warn!("blocklist unavailable: {err}");
                report.failures.push(err);
            }
        }
    }

    let (tables, stats) = build_tables(tld_risk, blocklist);
    report.tld_entries = tables.tld_risk_len();
    report.blocklist = stats;

    log::info!(
        "reference data: {} TLD risk entries, {} blocklisted domains ({} duplicates dropped)",
        report.tld_entries,
        stats.after,
        stats.deduped
    );

    (tables, report)
}

pub fn load_from_config(config: &TrackerConfig) -> (ReferenceTables, LoadReport) {
    load_reference_tables(config.tld_risk_path.as_deref(), &config.blocklist_paths)
}
