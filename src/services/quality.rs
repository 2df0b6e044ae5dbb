/// Acquisition quality classification and date deduplication.
use crate::clients::RawAcquisition;
use crate::domain::{AcquisitionRecord, Quality};
use crate::utils::{millis_to_date, num, round_to};
use chrono::TimeZone;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Most recent acquisitions requested from the catalog.
pub const CATALOG_LIMIT: usize = 30;
/// Distinct dates reported back to the caller.
pub const REPORT_LIMIT: usize = 10;

pub fn quality_for(cloud_cover: f64) -> Quality {
    if cloud_cover < 20.0 {
        Quality::Good
    } else if cloud_cover < 50.0 {
        Quality::Medium
    } else {
        Quality::Poor
    }
}

/// Why a single catalog entry could not be turned into a record
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("timestamp is not numeric: {0}")]
    Timestamp(String),
    #[error("timestamp out of range: {0}")]
    OutOfRange(i64),
    #[error("cloud cover is not numeric: {0}")]
    CloudCover(String),
}

/// Convert one catalog entry.
///
/// `Ok(None)` means the entry has no timestamp and is dropped silently.
pub fn classify<Tz: TimeZone>(
    raw: &RawAcquisition,
    tz: &Tz,
) -> Result<Option<AcquisitionRecord>, RecordError> {
    let millis = match &raw.time_start {
        None => return Ok(None),
        Some(v) if v.is_null() => return Ok(None),
        Some(v) => num(v)
            .filter(|m| m.is_finite())
            .ok_or_else(|| RecordError::Timestamp(v.to_string()))?,
    };
    let millis = millis as i64;
    if millis == 0 {
        return Ok(None);
    }

    let cloud_cover = match &raw.cloud_cover {
        None => 0.0,
        Some(v) if v.is_null() => 0.0,
        Some(v) => num(v)
            .filter(|c| c.is_finite())
            .ok_or_else(|| RecordError::CloudCover(v.to_string()))?,
    };

    let date = millis_to_date(millis, tz).ok_or(RecordError::OutOfRange(millis))?;

    Ok(Some(AcquisitionRecord {
        date,
        cloud_coverage: round_to(cloud_cover, 2),
        quality: quality_for(cloud_cover),
    }))
}

/// Classify the first [`CATALOG_LIMIT`] entries of a newest-first batch,
/// keep the first record per date and the first [`REPORT_LIMIT`] dates.
/// Bad entries are skipped one by one.
pub fn summarize<Tz: TimeZone>(batch: &[RawAcquisition], tz: &Tz) -> Vec<AcquisitionRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for (i, raw) in batch.iter().take(CATALOG_LIMIT).enumerate() {
        match classify(raw, tz) {
            Ok(Some(record)) => {
                if seen.insert(record.date) {
                    records.push(record);
                }
            }
            Ok(None) => debug!(position = i, "acquisition without timestamp skipped"),
            Err(e) => debug!(position = i, error = %e, "malformed acquisition skipped"),
        }
    }

    records.truncate(REPORT_LIMIT);
    records
}
