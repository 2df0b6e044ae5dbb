/// Command handlers: each one resolves its inputs once, talks to the
/// imagery service, and builds the response document.
use crate::clients::{CatalogQuery, ImageryService, TileRequest};
use crate::config::ReductionSettings;
use crate::domain::{AvailabilityResult, IndexName, StatisticResult, VisualizationResult};
use crate::errors::AnalysisResult;
use crate::services::fallback::{FallbackController, MAX_CLOUD_COVER};
use crate::services::formula::{statistic_index, vis_params, IndexExpression};
use crate::services::geometry::{self, RadiusSource};
use crate::services::{dates, quality};
use chrono::TimeZone;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Raw positional inputs shared by every command
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub geometry: String,
    pub start_date: String,
    pub end_date: String,
}

impl AnalysisRequest {
    pub fn new(geometry: &str, start_date: &str, end_date: &str) -> Self {
        Self {
            geometry: geometry.to_string(),
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
        }
    }
}

/// Which acquisitions exist over the region and how usable each is
pub async fn check_availability<S: ImageryService, Tz: TimeZone>(
    service: &S,
    request: &AnalysisRequest,
    tz: &Tz,
) -> AnalysisResult<AvailabilityResult> {
    let interval = dates::normalize(&request.start_date, &request.end_date)?;
    let region = geometry::resolve_str(&request.geometry, RadiusSource::TopLevel)?;

    let query = CatalogQuery {
        region,
        interval,
        max_cloud_cover: None,
    };

    let batch = match service.list_acquisitions(&query, quality::CATALOG_LIMIT).await {
        Ok(batch) => batch,
        Err(e) => {
            warn!(error = %e, "acquisition listing failed, reporting none");
            Vec::new()
        }
    };
    let available_dates = quality::summarize(&batch, tz);

    let total_images = service.count(&query).await?;
    info!(
        total_images,
        distinct_dates = available_dates.len(),
        window = %interval,
        "availability checked"
    );

    Ok(AvailabilityResult {
        total_images,
        available_dates,
        date_range: interval.into(),
    })
}

/// Mean index value over the region, with previous-year fallback
pub async fn compute_statistic<S: ImageryService>(
    service: &S,
    settings: &ReductionSettings,
    request: &AnalysisRequest,
    index: &str,
) -> AnalysisResult<StatisticResult> {
    let index = statistic_index(index);
    let interval = dates::normalize(&request.start_date, &request.end_date)?;
    let region = geometry::resolve_str(&request.geometry, RadiusSource::TopLevel)?;

    let resolution = FallbackController::new(service, settings)
        .resolve(&region, interval, index)
        .await;
    info!(%index, value = resolution.value, source = ?resolution.source, "statistic resolved");

    let note = resolution.note();
    Ok(StatisticResult {
        values: BTreeMap::from([(index.as_str().to_string(), resolution.value)]),
        note,
        error: None,
        date_range: interval.into(),
    })
}

/// Tile layer for a median composite of the index
pub async fn render_visualization<S: ImageryService>(
    service: &S,
    request: &AnalysisRequest,
    parameter: &str,
) -> AnalysisResult<VisualizationResult> {
    let interval = dates::normalize(&request.start_date, &request.end_date)?;
    let region = geometry::resolve_str(&request.geometry, RadiusSource::TopLevelOrProperties)?;
    let index: IndexName = parameter.parse()?;

    let vis = vis_params(index);
    let tile_request = TileRequest {
        query: CatalogQuery {
            region,
            interval,
            max_cloud_cover: Some(MAX_CLOUD_COVER),
        },
        expression: IndexExpression::for_visualization(index),
        vis_params: vis.clone(),
    };
    let tile_url = service.tile_url(&tile_request).await?;
    info!(%index, window = %interval, "tile layer created");

    Ok(VisualizationResult {
        tile_url,
        parameter: index,
        vis_params: vis,
        date_range: interval.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::RawAcquisition;
    use crate::domain::{Quality, Region};
    use crate::errors::AnalysisError;
    use crate::services::fallback::DEFAULT_NOTE;
    use crate::services::formula::FormulaVariant;
    use crate::testing::FakeImagery;
    use chrono::Utc;
    use serde_json::json;

    const DAY_MS: i64 = 86_400_000;
    // 2024-06-30T10:00:00Z
    const BASE_MS: i64 = 1_719_741_600_000;

    fn request(geometry: serde_json::Value, start: &str, end: &str) -> AnalysisRequest {
        AnalysisRequest::new(&geometry.to_string(), start, end)
    }

    fn point() -> serde_json::Value {
        json!({"type": "Point", "coordinates": [69.116, 53.170]})
    }

    fn batch(n: i64) -> Vec<RawAcquisition> {
        (0..n)
            .map(|i| RawAcquisition {
                time_start: Some(json!(BASE_MS - i * DAY_MS)),
                cloud_cover: Some(json!(i * 5)),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_availability_caps_dates_but_not_total() {
        let fake = FakeImagery::new().list_ok(batch(30)).count_ok(57);
        let req = request(point(), "2024-01-01", "2024-12-31");

        let result = check_availability(&fake, &req, &Utc).await.unwrap();

        assert_eq!(result.total_images, 57);
        assert_eq!(result.available_dates.len(), 10);
        assert_eq!(result.available_dates[0].quality, Quality::Good);
        assert_eq!(result.available_dates[4].quality, Quality::Medium);
        assert_eq!(result.date_range.end, "2024-12-31");

        let (query, limit) = &fake.list_calls()[0];
        assert_eq!(*limit, 30);
        assert_eq!(query.max_cloud_cover, None);
        assert_eq!(
            query.region,
            Region::Disc {
                center: [69.116, 53.170],
                radius_m: 5000.0
            }
        );
    }

    #[tokio::test]
    async fn test_availability_echoes_adjusted_end() {
        let fake = FakeImagery::new().list_ok(Vec::new()).count_ok(0);
        let req = request(point(), "2024-06-01", "2024-06-01");

        let result = check_availability(&fake, &req, &Utc).await.unwrap();
        let body = serde_json::to_value(&result).unwrap();

        assert_eq!(
            body,
            json!({
                "totalImages": 0,
                "availableDates": [],
                "dateRange": {"start": "2024-06-01", "end": "2024-06-02"}
            })
        );
    }

    #[tokio::test]
    async fn test_availability_listing_failure_is_empty() {
        let fake = FakeImagery::new().list_err("boom").count_ok(3);
        let req = request(point(), "2024-01-01", "2024-02-01");

        let result = check_availability(&fake, &req, &Utc).await.unwrap();
        assert_eq!(result.total_images, 3);
        assert!(result.available_dates.is_empty());
    }

    #[tokio::test]
    async fn test_availability_count_failure_is_fatal() {
        let fake = FakeImagery::new().list_ok(batch(2)).count_err("unavailable");
        let req = request(point(), "2024-01-01", "2024-02-01");

        let err = check_availability(&fake, &req, &Utc).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_availability_missing_type_before_any_query() {
        let fake = FakeImagery::new();
        let req = request(json!({"coordinates": [1, 2]}), "2024-01-01", "2024-02-01");

        let err = check_availability(&fake, &req, &Utc).await.unwrap_err();
        assert_eq!(err.to_string(), "Geometry type not found");
        assert!(fake.list_calls().is_empty());
        assert!(fake.count_calls().is_empty());
    }

    #[tokio::test]
    async fn test_statistic_default_after_two_empty_windows() {
        let fake = FakeImagery::new().reduce_empty().reduce_empty();
        let req = request(point(), "2024-06-01", "2024-06-01");

        let result = compute_statistic(&fake, &ReductionSettings::default(), &req, "NDVI")
            .await
            .unwrap();
        let body = serde_json::to_value(&result).unwrap();

        assert_eq!(
            body,
            json!({
                "NDVI": 0.0,
                "note": DEFAULT_NOTE,
                "dateRange": {"start": "2024-06-01", "end": "2024-06-02"}
            })
        );
    }

    #[tokio::test]
    async fn test_statistic_unknown_index_is_ndvi() {
        let fake = FakeImagery::new().reduce_ok(json!({"NDVI": 0.5}));
        let req = request(point(), "2024-06-01", "2024-07-01");

        let result = compute_statistic(&fake, &ReductionSettings::default(), &req, "FOO")
            .await
            .unwrap();

        assert_eq!(result.values.get("NDVI"), Some(&0.5));
        assert_eq!(result.note, None);
        assert_eq!(fake.reduce_calls()[0].expression.variant, FormulaVariant::Ndvi);
    }

    #[tokio::test]
    async fn test_statistic_is_deterministic() {
        let settings = ReductionSettings::default();
        let req = request(point(), "2024-06-01", "2024-07-01");

        let first = FakeImagery::new().reduce_empty().reduce_ok(json!({"NDMI": 0.2}));
        let second = FakeImagery::new().reduce_empty().reduce_ok(json!({"NDMI": 0.2}));

        let a = compute_statistic(&first, &settings, &req, "NDMI").await.unwrap();
        let b = compute_statistic(&second, &settings, &req, "NDMI").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(first.reduce_calls(), second.reduce_calls());
    }

    #[tokio::test]
    async fn test_statistic_bad_date_is_fatal() {
        let fake = FakeImagery::new();
        let req = request(point(), "June 1st", "2024-07-01");

        let err = compute_statistic(&fake, &ReductionSettings::default(), &req, "NDVI")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidDateFormat(_)));
        assert!(fake.reduce_calls().is_empty());
    }

    #[tokio::test]
    async fn test_visualization_unknown_parameter() {
        let fake = FakeImagery::new();
        let req = request(point(), "2024-06-01", "2024-07-01");

        let err = render_visualization(&fake, &req, "FOO").await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown parameter: FOO");
        assert!(fake.tile_calls().is_empty());
    }

    #[tokio::test]
    async fn test_visualization_reci_uses_product_variant() {
        let fake = FakeImagery::new().tile_ok("https://tiles.example.com/{z}/{x}/{y}");
        let geometry = json!({
            "type": "Point",
            "coordinates": [69.116, 53.170],
            "properties": {"radius": 1200}
        });
        let req = request(geometry, "2024-06-01", "2024-06-01");

        let result = render_visualization(&fake, &req, "RECI").await.unwrap();
        let body = serde_json::to_value(&result).unwrap();

        assert_eq!(
            body,
            json!({
                "tile_url": "https://tiles.example.com/{z}/{x}/{y}",
                "parameter": "RECI",
                "vis_params": {"min": 0.0, "max": 10.0, "palette": ["yellow", "orange", "red"]},
                "date_range": {"start": "2024-06-01", "end": "2024-06-02"}
            })
        );

        let call = &fake.tile_calls()[0];
        assert_eq!(call.expression.variant, FormulaVariant::ReciProduct);
        assert_eq!(call.query.max_cloud_cover, Some(20.0));
        assert_eq!(
            call.query.region,
            Region::Disc {
                center: [69.116, 53.170],
                radius_m: 1200.0
            }
        );
    }
}
