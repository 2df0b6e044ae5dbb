/// Application configuration module
use crate::errors::{AnalysisError, AnalysisResult};
use std::env;

pub const DEFAULT_API_URL: &str = "https://imagery.example.com";
pub const DEFAULT_COLLECTION: &str = "COPERNICUS/S2_SR_HARMONIZED";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub project_id: String,
    pub api_url: String,
    pub api_token: Option<String>,
    pub collection: String,
    pub timeout_seconds: Option<u64>,
    pub reduction: ReductionSettings,
}

/// Parameters forwarded with every best-effort reduction request
#[derive(Clone, Debug, PartialEq)]
pub struct ReductionSettings {
    pub scale_meters: f64,
    pub max_pixels: f64,
}

impl Default for ReductionSettings {
    fn default() -> Self {
        Self {
            scale_meters: 10.0,
            max_pixels: 1e9,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AnalysisResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AnalysisResult<Self> {
        let project_id = lookup("GEE_PROJECT_ID")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AnalysisError::Configuration("GEE_PROJECT_ID not set".to_string()))?;

        let api_url = lookup("IMAGERY_API_URL")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let api_token = lookup("IMAGERY_API_TOKEN").filter(|s| !s.is_empty());

        let collection = lookup("IMAGERY_COLLECTION")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let defaults = ReductionSettings::default();
        let reduction = ReductionSettings {
            scale_meters: parse_or(&lookup, "IMAGERY_SCALE_METERS", defaults.scale_meters),
            max_pixels: parse_or(&lookup, "IMAGERY_MAX_PIXELS", defaults.max_pixels),
        };

        let timeout_seconds = lookup("IMAGERY_TIMEOUT_SECONDS").and_then(|s| s.parse().ok());

        Ok(Self {
            project_id,
            api_url,
            api_token,
            collection,
            timeout_seconds,
            reduction,
        })
    }
}

fn parse_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(default)
}
