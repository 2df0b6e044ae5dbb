/// Command-line surface.
///
/// Every invocation writes exactly one JSON document to stdout. The exit
/// code, not the presence of an `error` key, tells the caller whether the
/// command succeeded.
use crate::clients::{ImageryClient, ImageryService};
use crate::config::{AppConfig, ReductionSettings};
use crate::errors::{AnalysisError, AnalysisResult, ErrorResponse};
use crate::handlers::{check_availability, compute_statistic, render_visualization, AnalysisRequest};
use crate::services::dates;
use crate::services::geometry::{self, RadiusSource};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// Satellite index analysis over a region of interest.
#[derive(Debug, Parser)]
#[command(name = "rust_agro")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List recent acquisitions over a region and rate their cloud cover.
    Availability(AvailabilityArgs),
    /// Mean index value over a region, falling back to the previous year.
    Statistic(StatisticArgs),
    /// Tile layer URL for an index composite.
    Visualize(VisualizeArgs),
}

#[derive(Debug, Args)]
pub struct AvailabilityArgs {
    /// Geometry as JSON, e.g. {"type":"Point","coordinates":[lon,lat]}
    pub geometry: String,
    /// First day of the window (YYYY-MM-DD)
    #[arg(default_value = "2024-01-01")]
    pub start_date: String,
    /// Day after the window (YYYY-MM-DD)
    #[arg(default_value = "2024-12-31")]
    pub end_date: String,
}

#[derive(Debug, Args)]
pub struct StatisticArgs {
    /// Geometry as JSON
    pub geometry: String,
    #[arg(default_value = "2024-01-01")]
    pub start_date: String,
    #[arg(default_value = "2024-12-31")]
    pub end_date: String,
    /// NDVI, NDMI or RECI; anything else is treated as NDVI
    #[arg(default_value = "NDVI")]
    pub index: String,
}

#[derive(Debug, Args)]
pub struct VisualizeArgs {
    /// Geometry as JSON; a point radius may also sit under `properties`
    pub geometry: String,
    pub start_date: String,
    pub end_date: String,
    /// NDVI, NDMI or RECI
    pub parameter: String,
}

/// Document to print and the process exit code
#[derive(Debug)]
pub struct Outcome {
    pub body: Value,
    pub exit_code: u8,
}

impl Outcome {
    fn success<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(body) => Self { body, exit_code: 0 },
            Err(e) => Self::failure(&AnalysisError::from(e), &[]),
        }
    }

    pub fn failure(err: &AnalysisError, context: &[(&str, &str)]) -> Self {
        error!(kind = err.kind(), "{}", err);
        let response = context
            .iter()
            .fold(err.to_response(), |r, (k, v)| r.with(k, *v));
        Self {
            body: to_body(&response),
            exit_code: err.exit_code(),
        }
    }

    /// Argument parsing failed before any command ran.
    pub fn usage(message: &str) -> Self {
        Self {
            body: to_body(&ErrorResponse::new(message)),
            exit_code: 1,
        }
    }
}

fn to_body(response: &ErrorResponse) -> Value {
    serde_json::to_value(response)
        .unwrap_or_else(|_| serde_json::json!({ "error": response.error.clone() }))
}

impl Commands {
    /// Extra fields attached to this command's error documents.
    fn error_context(&self) -> Vec<(&str, &str)> {
        match self {
            Commands::Visualize(args) => vec![("parameter", args.parameter.as_str())],
            _ => Vec::new(),
        }
    }

    fn request(&self) -> AnalysisRequest {
        match self {
            Commands::Availability(a) => AnalysisRequest::new(&a.geometry, &a.start_date, &a.end_date),
            Commands::Statistic(a) => AnalysisRequest::new(&a.geometry, &a.start_date, &a.end_date),
            Commands::Visualize(a) => AnalysisRequest::new(&a.geometry, &a.start_date, &a.end_date),
        }
    }

    fn radius_source(&self) -> RadiusSource {
        match self {
            Commands::Visualize(_) => RadiusSource::TopLevelOrProperties,
            _ => RadiusSource::TopLevel,
        }
    }

    /// Reject bad dates and geometry before any configuration is loaded.
    fn validate(&self) -> AnalysisResult<()> {
        let request = self.request();
        dates::normalize(&request.start_date, &request.end_date)?;
        geometry::resolve_str(&request.geometry, self.radius_source())?;
        Ok(())
    }
}

/// Load configuration, connect to the imagery service, run the command.
pub async fn execute(cli: Cli) -> Outcome {
    run(&cli.command, AppConfig::from_env).await
}

async fn run(command: &Commands, load: impl FnOnce() -> AnalysisResult<AppConfig>) -> Outcome {
    let context = command.error_context();
    let connected = async move {
        command.validate()?;
        let config = load()?;
        let client = ImageryClient::connect(&config).await?;
        AnalysisResult::Ok((config, client))
    }
    .await;

    match connected {
        Ok((config, client)) => dispatch(&client, &config.reduction, command).await,
        Err(e) => Outcome::failure(&e, &context),
    }
}

/// Run a command against an already-initialized service.
pub async fn dispatch<S: ImageryService>(
    service: &S,
    settings: &ReductionSettings,
    command: &Commands,
) -> Outcome {
    let context = command.error_context();
    let request = command.request();
    let result = match command {
        Commands::Availability(_) => check_availability(service, &request, &Local)
            .await
            .map(|r| Outcome::success(&r)),
        Commands::Statistic(args) => compute_statistic(service, settings, &request, &args.index)
            .await
            .map(|r| Outcome::success(&r)),
        Commands::Visualize(args) => render_visualization(service, &request, &args.parameter)
            .await
            .map(|r| Outcome::success(&r)),
    };

    result.unwrap_or_else(|e| Outcome::failure(&e, &context))
}
