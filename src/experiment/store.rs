// JSON-backed store for capture rows plus the markdown export that goes
// into the lab notebook.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::SecondsFormat;
use thiserror::Error;
use tracing::debug;

use super::record::{CaptureRecord, RowIssue};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("capture log i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed capture log: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// All rows of one measurement campaign, in logging order
#[derive(Debug, Default)]
pub struct CaptureLog {
    records: Vec<CaptureRecord>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a log from disk; a missing file is an empty log, so the first
    /// `add` of a campaign needs no setup step.
    pub fn load(path: &Path) -> Result<Self, LogError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No capture log at {}, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(err) => return Err(err.into()),
        };
        let records = serde_json::from_str(&text)?;
        Ok(Self { records })
    }

    pub fn save(&self, path: &Path) -> Result<(), LogError> {
        let text = serde_json::to_string_pretty(&self.records)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn append(&mut self, record: CaptureRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[CaptureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Row indices with their issues; clean rows are omitted
    pub fn check(&self) -> Vec<(usize, Vec<RowIssue>)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let issues = record.check();
                if issues.is_empty() {
                    None
                } else {
                    Some((index, issues))
                }
            })
            .collect()
    }

    /// GitHub-flavored table with one row per capture
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(
            "| antenna | board | receiver | carrier (MHz) | offset (MHz) \
             | sample rate (Hz) | samples | center (MHz) | ambient start | measurement start |\n",
        );
        out.push_str(
            "|---------|-------|----------|---------------|--------------\
             |------------------|---------|--------------|---------------|-------------------|\n",
        );
        for record in &self.records {
            let ambient = record
                .ambient_started_at
                .to_rfc3339_opts(SecondsFormat::Secs, true);
            let measurement = record
                .measurement_started_at
                .to_rfc3339_opts(SecondsFormat::Secs, true);
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
                record.antenna,
                record.board,
                record.receiver,
                record.carrier_mhz,
                record.offset_mhz,
                record.sample_rate_hz,
                record.sample_count,
                record.center_mhz,
                ambient,
                measurement,
            ));
        }
        out
    }
}
