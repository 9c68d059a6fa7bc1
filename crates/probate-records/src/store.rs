use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{group_by_month, sheet, CaseRecord, Result};

const MIRROR_FILE: &str = "all_records.json";

/// What one `persist` call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Records not seen before this call.
    pub added: usize,
    /// Records held by the store after this call.
    pub total: usize,
    /// Month keys that were (re)written.
    pub months: Vec<String>,
}

/// Sink for extracted records.
///
/// The resumption cursor is a query on the store so a run never depends on
/// state left over from a previous process.
pub trait RecordStore {
    /// Merge `records` into the store. Records already present are skipped.
    fn persist(&mut self, records: &[CaseRecord]) -> Result<ExportSummary>;

    /// Latest parseable filing date among persisted records.
    fn latest_filing_date(&self) -> Result<Option<NaiveDate>>;
}

/// Append the records of `incoming` not already in `existing`.
///
/// Only previously persisted rows are matched; one batch is never deduped
/// against itself.
fn merge(existing: &mut Vec<CaseRecord>, incoming: &[CaseRecord]) -> usize {
    let seen: HashSet<_> = existing.iter().filter_map(CaseRecord::dedup_key).collect();
    let before = existing.len();
    existing.extend(
        incoming
            .iter()
            .filter(|r| !matches!(r.dedup_key(), Some(key) if seen.contains(&key)))
            .cloned(),
    );
    existing.len() - before
}

fn latest(records: &[CaseRecord]) -> Option<NaiveDate> {
    records.iter().filter_map(CaseRecord::filing_date_parsed).max()
}

/// In-memory store, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<CaseRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }
}

impl RecordStore for MemoryStore {
    fn persist(&mut self, records: &[CaseRecord]) -> Result<ExportSummary> {
        let added = merge(&mut self.records, records);
        Ok(ExportSummary {
            added,
            total: self.records.len(),
            months: group_by_month(&self.records).into_keys().collect(),
        })
    }

    fn latest_filing_date(&self) -> Result<Option<NaiveDate>> {
        Ok(latest(&self.records))
    }
}

/// Store backed by a directory: `all_records.json` plus one
/// `records-<month>.csv` sheet per filing month.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.dir.join(MIRROR_FILE)
    }

    pub fn sheet_path(&self, month: &str) -> PathBuf {
        self.dir.join(format!("records-{month}.csv"))
    }

    /// Previously persisted records; empty if nothing was written yet.
    pub fn load(&self) -> Result<Vec<CaseRecord>> {
        let path = self.mirror_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_mirror(&self, records: &[CaseRecord]) -> Result<()> {
        let path = self.mirror_path();
        let tmp = path.with_extension("json.tmp");
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl RecordStore for DirectoryStore {
    fn persist(&mut self, records: &[CaseRecord]) -> Result<ExportSummary> {
        fs::create_dir_all(&self.dir)?;

        let mut all = self.load()?;
        let added = merge(&mut all, records);
        self.write_mirror(&all)?;

        let grouped = group_by_month(&all);
        let mut months = Vec::with_capacity(grouped.len());
        for (month, rows) in &grouped {
            let path = self.sheet_path(month);
            let file = fs::File::create(&path)?;
            sheet::write_sheet(BufWriter::new(file), rows)?;
            debug!("Wrote {} rows to {}", rows.len(), path.display());
            months.push(month.clone());
        }

        info!(
            "Persisted {} new records ({} total, {} months) to {}",
            added,
            all.len(),
            months.len(),
            self.dir.display()
        );

        Ok(ExportSummary {
            added,
            total: all.len(),
            months,
        })
    }

    fn latest_filing_date(&self) -> Result<Option<NaiveDate>> {
        Ok(latest(&self.load()?))
    }
}
