/// Date-range normalization and year shifting.
use crate::domain::DateInterval;
use crate::errors::{AnalysisError, AnalysisResult};
use chrono::{Datelike, Days, NaiveDate};
use tracing::debug;

pub fn parse_date(raw: &str) -> AnalysisResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AnalysisError::InvalidDateFormat(raw.to_string()))
}

/// Normalize two `YYYY-MM-DD` strings into a non-empty interval.
///
/// When `start >= end` the end moves forward one day. A range reversed by
/// more than a day still ends up one day past `start`.
pub fn normalize(start: &str, end: &str) -> AnalysisResult<DateInterval> {
    let start = parse_date(start)?;
    let mut end = parse_date(end)?;

    if start >= end {
        end = next_day(end)?;
        if start >= end {
            end = next_day(start)?;
        }
        debug!(%start, %end, "adjusted degenerate date range");
    }

    Ok(DateInterval { start, end })
}

fn next_day(date: NaiveDate) -> AnalysisResult<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| AnalysisError::InvalidInput(format!("Date out of range: {}", date)))
}

/// Same month and day, one calendar year earlier. Feb 29 has no counterpart.
pub fn shift_back_one_year(date: NaiveDate) -> AnalysisResult<NaiveDate> {
    date.with_year(date.year() - 1).ok_or_else(|| {
        AnalysisError::InvalidInput(format!("{} has no counterpart in {}", date, date.year() - 1))
    })
}

impl DateInterval {
    /// The same window one calendar year earlier.
    pub fn previous_year(&self) -> AnalysisResult<DateInterval> {
        Ok(DateInterval {
            start: shift_back_one_year(self.start)?,
            end: shift_back_one_year(self.end)?,
        })
    }
}
