/// Geometry normalization.
use crate::domain::Region;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::utils::num;
use serde_json::Value;

/// Buffer applied to a bare point, in meters.
pub const DEFAULT_RADIUS_M: f64 = 5000.0;

/// Where a point's buffer radius may be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusSource {
    /// Only `radius` at the top level of the description.
    TopLevel,
    /// Top-level `radius`, then `properties.radius` (visualization requests).
    TopLevelOrProperties,
}

/// Resolve a parsed geometry description into a [`Region`].
pub fn resolve(geometry: &Value, radius_source: RadiusSource) -> AnalysisResult<Region> {
    let geom_type = geometry
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or(AnalysisError::MissingGeometryType)?;

    match geom_type {
        "Point" => {
            let center = point_coordinates(geometry.get("coordinates"))?;
            let radius_m = radius(geometry, radius_source)?;
            Ok(Region::Disc { center, radius_m })
        }
        "Polygon" => {
            let rings = polygon_rings(geometry.get("coordinates"))?;
            Ok(Region::Polygon { rings })
        }
        _ => Ok(Region::Raw {
            geometry: geometry.clone(),
        }),
    }
}

/// Parse a raw JSON string and resolve it.
pub fn resolve_str(raw: &str, radius_source: RadiusSource) -> AnalysisResult<Region> {
    let geometry: Value = serde_json::from_str(raw)?;
    resolve(&geometry, radius_source)
}

fn radius(geometry: &Value, source: RadiusSource) -> AnalysisResult<f64> {
    let candidate = match source {
        RadiusSource::TopLevel => geometry.get("radius"),
        RadiusSource::TopLevelOrProperties => geometry
            .get("radius")
            .or_else(|| geometry.get("properties").and_then(|p| p.get("radius"))),
    };

    let Some(value) = candidate else {
        return Ok(DEFAULT_RADIUS_M);
    };

    match num(value) {
        Some(r) if r.is_finite() && r > 0.0 => Ok(r),
        _ => Err(AnalysisError::InvalidInput(format!(
            "Invalid point radius: {}",
            value
        ))),
    }
}

fn position(value: &Value) -> Option<[f64; 2]> {
    let arr = value.as_array()?;
    if arr.len() < 2 {
        return None;
    }
    let lon = arr[0].as_f64()?;
    let lat = arr[1].as_f64()?;
    Some([lon, lat])
}

fn point_coordinates(value: Option<&Value>) -> AnalysisResult<[f64; 2]> {
    value
        .and_then(position)
        .ok_or_else(|| AnalysisError::InvalidInput("Invalid Point coordinates".to_string()))
}

fn ring(value: &Value) -> Option<Vec<[f64; 2]>> {
    value.as_array()?.iter().map(position).collect()
}

/// Accepts either a list of rings or a single bare ring.
fn polygon_rings(value: Option<&Value>) -> AnalysisResult<Vec<Vec<[f64; 2]>>> {
    let invalid = || AnalysisError::InvalidInput("Invalid Polygon coordinates".to_string());
    let items = value.and_then(Value::as_array).ok_or_else(invalid)?;
    if items.is_empty() {
        return Err(invalid());
    }

    if position(&items[0]).is_some() {
        return items
            .iter()
            .map(position)
            .collect::<Option<Vec<_>>>()
            .map(|r| vec![r])
            .ok_or_else(invalid);
    }

    items
        .iter()
        .map(ring)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid)
}
