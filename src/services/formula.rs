/// Spectral index formulas.
///
/// Nothing here touches pixels. A formula is an expression tree that the
/// imagery service evaluates per pixel before reducing or rendering it.
use crate::domain::{IndexName, VisParams};
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Band names for each spectral role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectralBands {
    pub nir: &'static str,
    pub red: &'static str,
    pub swir: &'static str,
    pub red_edge: &'static str,
}

impl SpectralBands {
    /// Sentinel-2 MSI band assignment
    pub const fn sentinel2() -> Self {
        Self {
            nir: "B8",
            red: "B4",
            swir: "B11",
            red_edge: "B5",
        }
    }
}

/// Concrete formula selected for an index.
///
/// RECI is computed differently by the statistic and the tile-rendering
/// operations. Both forms are kept as separate variants pending product
/// review; neither is the "right" one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaVariant {
    /// (NIR - RED) / (NIR + RED)
    Ndvi,
    /// (NIR - SWIR) / (NIR + SWIR)
    Ndmi,
    /// (NIR / RED_EDGE) - 1, used for statistics
    ReciRatio,
    /// ((NIR / RED) - 1) * (RED_EDGE / RED), used for map tiles
    ReciProduct,
}

impl FormulaVariant {
    /// Formula used when reducing an index to a regional mean.
    pub fn for_statistic(index: IndexName) -> Self {
        match index {
            IndexName::Ndvi => FormulaVariant::Ndvi,
            IndexName::Ndmi => FormulaVariant::Ndmi,
            IndexName::Reci => FormulaVariant::ReciRatio,
        }
    }

    /// Formula used when rendering an index as map tiles.
    pub fn for_visualization(index: IndexName) -> Self {
        match index {
            IndexName::Ndvi => FormulaVariant::Ndvi,
            IndexName::Ndmi => FormulaVariant::Ndmi,
            IndexName::Reci => FormulaVariant::ReciProduct,
        }
    }
}

/// Statistic requests never fail on the index name: anything unknown is NDVI.
pub fn statistic_index(raw: &str) -> IndexName {
    raw.parse().unwrap_or_else(|_| {
        warn!(requested = raw, "unknown index, using NDVI");
        IndexName::Ndvi
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    Band { name: String },
    Constant { value: f64 },
    Add { left: Box<Expr>, right: Box<Expr> },
    Subtract { left: Box<Expr>, right: Box<Expr> },
    Multiply { left: Box<Expr>, right: Box<Expr> },
    Divide { left: Box<Expr>, right: Box<Expr> },
}

fn band(name: &str) -> Expr {
    Expr::Band {
        name: name.to_string(),
    }
}

fn constant(value: f64) -> Expr {
    Expr::Constant { value }
}

fn add(left: Expr, right: Expr) -> Expr {
    Expr::Add {
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn sub(left: Expr, right: Expr) -> Expr {
    Expr::Subtract {
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn mul(left: Expr, right: Expr) -> Expr {
    Expr::Multiply {
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn div(left: Expr, right: Expr) -> Expr {
    Expr::Divide {
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn normalized_difference(a: &str, b: &str) -> Expr {
    div(sub(band(a), band(b)), add(band(a), band(b)))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Band { name } => f.write_str(name),
            Expr::Constant { value } => write!(f, "{}", value),
            Expr::Add { left, right } => write!(f, "({} + {})", left, right),
            Expr::Subtract { left, right } => write!(f, "({} - {})", left, right),
            Expr::Multiply { left, right } => write!(f, "({} * {})", left, right),
            Expr::Divide { left, right } => write!(f, "({} / {})", left, right),
        }
    }
}

/// A named per-pixel formula ready to hand to the imagery service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexExpression {
    pub index: IndexName,
    pub variant: FormulaVariant,
    pub bands: Vec<String>,
    pub expr: Expr,
}

impl IndexExpression {
    pub fn build(index: IndexName, variant: FormulaVariant, bands: &SpectralBands) -> Self {
        let (expr, used) = match variant {
            FormulaVariant::Ndvi => (
                normalized_difference(bands.nir, bands.red),
                vec![bands.nir, bands.red],
            ),
            FormulaVariant::Ndmi => (
                normalized_difference(bands.nir, bands.swir),
                vec![bands.nir, bands.swir],
            ),
            FormulaVariant::ReciRatio => (
                sub(div(band(bands.nir), band(bands.red_edge)), constant(1.0)),
                vec![bands.nir, bands.red_edge],
            ),
            FormulaVariant::ReciProduct => (
                mul(
                    sub(div(band(bands.nir), band(bands.red)), constant(1.0)),
                    div(band(bands.red_edge), band(bands.red)),
                ),
                vec![bands.nir, bands.red, bands.red_edge],
            ),
        };

        Self {
            index,
            variant,
            bands: used.into_iter().map(str::to_string).collect(),
            expr,
        }
    }

    pub fn for_statistic(index: IndexName) -> Self {
        Self::build(index, FormulaVariant::for_statistic(index), &SpectralBands::sentinel2())
    }

    pub fn for_visualization(index: IndexName) -> Self {
        Self::build(index, FormulaVariant::for_visualization(index), &SpectralBands::sentinel2())
    }
}

/// Display range and palette for rendered index tiles.
pub fn vis_params(index: IndexName) -> VisParams {
    let (min, max, palette) = match index {
        IndexName::Ndvi => (-1.0, 1.0, ["red", "yellow", "green"]),
        IndexName::Ndmi => (-1.0, 1.0, ["blue", "cyan", "green"]),
        IndexName::Reci => (0.0, 10.0, ["yellow", "orange", "red"]),
    };
    VisParams {
        min,
        max,
        palette: palette.iter().map(|c| c.to_string()).collect(),
    }
}
