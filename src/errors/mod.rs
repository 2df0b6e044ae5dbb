/// Unified error handling module
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Unified error response format
///
/// Every fatal outcome is reported as a single `{"error": ...}` object on
/// stdout. Some commands attach extra context fields next to the message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(flatten)]
    pub context: serde_json::Map<String, Value>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            context: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Geometry type not found")]
    MissingGeometryType,

    #[error("Invalid date format: '{0}' does not match YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("External API error: {0}")]
    ExternalApi(#[from] reqwest::Error),

    #[error("Imagery service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AnalysisError {
    fn from(err: anyhow::Error) -> Self {
        AnalysisError::Internal(format!("{:#}", err))
    }
}

impl AnalysisError {
    /// Short machine-readable kind, used in log lines only.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Configuration(_) => "CONFIGURATION_ERROR",
            AnalysisError::InvalidInput(_)
            | AnalysisError::MissingGeometryType
            | AnalysisError::InvalidDateFormat(_)
            | AnalysisError::Json(_) => "INVALID_INPUT",
            AnalysisError::UnknownParameter(_) => "UNKNOWN_PARAMETER",
            AnalysisError::ExternalApi(_) | AnalysisError::Upstream { .. } => "UPSTREAM_ERROR",
            AnalysisError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// All fatal errors terminate the process with exit code 1.
    pub fn exit_code(&self) -> u8 {
        1
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.to_string())
    }
}

/// Type alias for analysis results
pub type AnalysisResult<T> = Result<T, AnalysisError>;
