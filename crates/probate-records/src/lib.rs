//! Probate case records and the month-grouped export sink.
//!
//! A detail-view visit produces one [`DecedentInfo`], the [`CaseIds`] parsed
//! from the detail URL and zero or more [`Representative`]s.
//! [`CaseRecord::expand`] turns them into output rows, and a [`RecordStore`]
//! persists those rows grouped by filing month.

mod sheet;
mod store;

pub use sheet::{write_sheet, HEADERS};
pub use store::{DirectoryStore, ExportSummary, MemoryStore, RecordStore};

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Month bucket for records whose filing date cannot be parsed.
pub const UNKNOWN_MONTH: &str = "Unknown";

static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b").expect("invalid regex: date token")
});

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fields read from the "Decedent & Estate Info" tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecedentInfo {
    pub case_file_number: Option<String>,
    pub filing_date: String,
    pub date_of_death: String,
    pub decedent_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representative {
    pub name: String,
    pub address: String,
}

impl Representative {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Site-internal identifiers carried in the detail frame's query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseIds {
    pub case_file_id: String,
    pub case_file_num: String,
}

/// One output row: a case's decedent fields joined with one representative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    #[serde(default)]
    pub case_file_number: Option<String>,
    pub filing_date: String,
    #[serde(default)]
    pub date_of_death: String,
    pub decedent_address: String,
    pub representative_name: String,
    pub representative_address: String,
    #[serde(rename = "caseFileId")]
    pub case_file_id: String,
    #[serde(rename = "caseFileNum")]
    pub case_file_num_alt: String,
}

impl CaseRecord {
    /// Cross product of one detail view with its representatives.
    ///
    /// A view without representatives still yields exactly one row, with
    /// empty representative fields, so decedent-only cases are counted.
    pub fn expand(
        decedent: &DecedentInfo,
        ids: &CaseIds,
        representatives: &[Representative],
    ) -> Vec<CaseRecord> {
        let base = CaseRecord {
            case_file_number: decedent.case_file_number.clone(),
            filing_date: decedent.filing_date.clone(),
            date_of_death: decedent.date_of_death.clone(),
            decedent_address: decedent.decedent_address.clone(),
            representative_name: String::new(),
            representative_address: String::new(),
            case_file_id: ids.case_file_id.clone(),
            case_file_num_alt: ids.case_file_num.clone(),
        };

        if representatives.is_empty() {
            return vec![base];
        }

        representatives
            .iter()
            .map(|rep| CaseRecord {
                representative_name: rep.name.clone(),
                representative_address: rep.address.clone(),
                ..base.clone()
            })
            .collect()
    }

    pub fn filing_date_parsed(&self) -> Option<NaiveDate> {
        parse_filing_date(&self.filing_date)
    }

    /// `YYYY-MM` of the filing date, or [`UNKNOWN_MONTH`].
    pub fn month_key(&self) -> String {
        self.filing_date_parsed()
            .map(|d| d.format("%Y-%m").to_string())
            .unwrap_or_else(|| UNKNOWN_MONTH.to_string())
    }

    /// Identity used when merging a run into previously persisted rows.
    ///
    /// `None` without a case id: such rows cannot be told apart and are
    /// always kept.
    pub fn dedup_key(&self) -> Option<(String, String, String)> {
        if self.case_file_id.is_empty() {
            return None;
        }
        let case_number = self
            .case_file_number
            .clone()
            .unwrap_or_else(|| self.case_file_num_alt.clone());
        Some((
            self.case_file_id.clone(),
            case_number,
            self.representative_name.clone(),
        ))
    }
}

/// Join address fragments with `", "`, skipping empty ones.
pub fn join_address<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse the first `M/D/YYYY` or `M/D/YY` token in `text`.
///
/// Two-digit years follow the usual pivot: `00`–`68` are 20xx, `69`–`99`
/// are 19xx.
pub fn parse_filing_date(text: &str) -> Option<NaiveDate> {
    let caps = DATE_TOKEN.captures(text.trim())?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year_text = &caps[3];
    let mut year: i32 = year_text.parse().ok()?;
    if year_text.len() == 2 {
        year += if year <= 68 { 2000 } else { 1900 };
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Group records by filing month, months in ascending order.
///
/// Records keep their original order within a month.
pub fn group_by_month(records: &[CaseRecord]) -> BTreeMap<String, Vec<&CaseRecord>> {
    let mut by_month: BTreeMap<String, Vec<&CaseRecord>> = BTreeMap::new();
    for record in records {
        by_month.entry(record.month_key()).or_default().push(record);
    }
    by_month
}
