/// Domain models for the application
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::AnalysisError;

/// Canonical region of interest sent to the imagery service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Region {
    /// Disc around a point, radius in meters
    Disc { center: [f64; 2], radius_m: f64 },
    /// Polygon given as rings of `[lon, lat]` pairs
    Polygon { rings: Vec<Vec<[f64; 2]>> },
    /// Any other geometry, forwarded untouched
    Raw { geometry: Value },
}

/// Half-open `[start, end)` interval of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Serialize for DateInterval {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DateRange::from(*self).serialize(serializer)
    }
}

/// Date range echoed back in responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl From<DateInterval> for DateRange {
    fn from(interval: DateInterval) -> Self {
        Self {
            start: interval.start.format("%Y-%m-%d").to_string(),
            end: interval.end.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Spectral index supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IndexName {
    #[serde(rename = "NDVI")]
    Ndvi,
    #[serde(rename = "NDMI")]
    Ndmi,
    #[serde(rename = "RECI")]
    Reci,
}

impl IndexName {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexName::Ndvi => "NDVI",
            IndexName::Ndmi => "NDMI",
            IndexName::Reci => "RECI",
        }
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexName {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NDVI" => Ok(IndexName::Ndvi),
            "NDMI" => Ok(IndexName::Ndmi),
            "RECI" => Ok(IndexName::Reci),
            other => Err(AnalysisError::UnknownParameter(other.to_string())),
        }
    }
}

/// Usability of an acquisition derived from its cloud cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Medium,
    Poor,
}

/// One classified satellite pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionRecord {
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    pub cloud_coverage: f64,
    pub quality: Quality,
}

fn serialize_date<S: serde::Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
}

/// Availability report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResult {
    pub total_images: u64,
    pub available_dates: Vec<AcquisitionRecord>,
    pub date_range: DateRange,
}

/// Index statistic report
///
/// Serializes as a flat object keyed by index name, e.g.
/// `{"NDVI": 0.41, "dateRange": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticResult {
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub date_range: DateRange,
}

/// Rendering parameters attached to a tile request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
}

/// Tile layer report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationResult {
    pub tile_url: String,
    pub parameter: IndexName,
    pub vis_params: VisParams,
    pub date_range: DateRange,
}

/// Raw key/value mapping returned by a region reduction
pub type ReducedValues = Map<String, Value>;
