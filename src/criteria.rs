use crate::{Error, Result};
use chrono::{Local, NaiveDate};
use std::fmt;

/// Date format of the portal's search form.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Inclusive filing-date range of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCriteria {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

impl SearchCriteria {
    /// Build from `MM/DD/YYYY` strings; `to` defaults to today.
    pub fn new(from: &str, to: Option<&str>) -> Result<Self> {
        let from_date = Self::parse_date(from)?;
        let to_date = match to {
            Some(to) => Self::parse_date(to)?,
            None => Local::now().date_naive(),
        };
        Self::from_dates(from_date, to_date)
    }

    pub fn from_dates(from_date: NaiveDate, to_date: NaiveDate) -> Result<Self> {
        if from_date > to_date {
            return Err(Error::InvalidCriteria(format!(
                "from date {} is after to date {}",
                from_date.format(DATE_FORMAT),
                to_date.format(DATE_FORMAT)
            )));
        }
        Ok(Self { from_date, to_date })
    }

    pub fn parse_date(text: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map_err(|e| {
            Error::InvalidCriteria(format!("'{}' is not a MM/DD/YYYY date: {}", text, e))
        })
    }

    /// `from_date` as typed into the form.
    pub fn from_text(&self) -> String {
        self.from_date.format(DATE_FORMAT).to_string()
    }

    /// `to_date` as typed into the form.
    pub fn to_text(&self) -> String {
        self.to_date.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.from_text(), self.to_text())
    }
}
