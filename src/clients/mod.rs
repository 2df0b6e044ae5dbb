/// External imagery service clients module
use crate::config::{AppConfig, ReductionSettings};
use crate::domain::{DateInterval, ReducedValues, Region, VisParams};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::services::formula::IndexExpression;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Catalog filter shared by count and listing queries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub region: Region,
    pub interval: DateInterval,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cloud_cover: Option<f64>,
}

/// Acquisition metadata as returned by the catalog, before any validation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAcquisition {
    #[serde(default)]
    pub time_start: Option<Value>,
    #[serde(default)]
    pub cloud_cover: Option<Value>,
}

/// Median composite of an index expression reduced to a regional mean
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceRequest {
    pub query: CatalogQuery,
    pub expression: IndexExpression,
    pub output_band: String,
    pub reducer: &'static str,
    pub scale: f64,
    pub max_pixels: f64,
    pub best_effort: bool,
}

impl ReduceRequest {
    pub fn mean(
        query: CatalogQuery,
        expression: IndexExpression,
        output_band: &str,
        settings: &ReductionSettings,
    ) -> Self {
        Self {
            query,
            expression,
            output_band: output_band.to_string(),
            reducer: "mean",
            scale: settings.scale_meters,
            max_pixels: settings.max_pixels,
            best_effort: true,
        }
    }
}

/// Median composite of an index expression rendered as map tiles
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileRequest {
    pub query: CatalogQuery,
    pub expression: IndexExpression,
    pub vis_params: VisParams,
}

/// Operations the engine needs from the remote imagery service.
///
/// Each call is a single blocking round trip from the caller's point of
/// view; implementations must not fan out concurrent requests.
#[allow(async_fn_in_trait)]
pub trait ImageryService {
    /// Total number of acquisitions matching the query
    async fn count(&self, query: &CatalogQuery) -> AnalysisResult<u64>;

    /// Acquisition metadata, newest first, at most `limit` entries
    async fn list_acquisitions(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> AnalysisResult<Vec<RawAcquisition>>;

    /// Reduced values for the region, `None` when nothing matched
    async fn reduce_region(&self, request: &ReduceRequest) -> AnalysisResult<Option<ReducedValues>>;

    /// Tile URL template for the rendered layer
    async fn tile_url(&self, request: &TileRequest) -> AnalysisResult<String>;
}

/// HTTP client wrapper with common configuration
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout_seconds: Option<u64>) -> AnalysisResult<Self> {
        let mut builder = Client::builder().user_agent("rust-agro/0.1");
        if let Some(secs) = timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    acquisitions: Vec<RawAcquisition>,
}

#[derive(Deserialize)]
struct ReduceResponse {
    #[serde(default)]
    values: Option<ReducedValues>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TileResponse {
    tile_url: String,
}

#[derive(Serialize)]
struct ListBody<'a> {
    #[serde(flatten)]
    query: &'a CatalogQuery,
    sort: &'static str,
    limit: usize,
}

/// JSON gateway client for the imagery service
pub struct ImageryClient {
    http_client: HttpClient,
    base_url: String,
    project_id: String,
    collection: String,
    token: Option<String>,
}

impl ImageryClient {
    pub fn new(config: &AppConfig) -> AnalysisResult<Self> {
        Ok(Self {
            http_client: HttpClient::new(config.timeout_seconds)?,
            base_url: config.api_url.clone(),
            project_id: config.project_id.clone(),
            collection: config.collection.clone(),
            token: config.api_token.clone(),
        })
    }

    /// Build the client and verify the project is reachable.
    ///
    /// Any failure here is a configuration problem, not a data problem.
    pub async fn connect(config: &AppConfig) -> AnalysisResult<Self> {
        let client = Self::new(config).map_err(init_error)?;
        client.initialize().await.map_err(init_error)?;
        Ok(client)
    }

    async fn initialize(&self) -> AnalysisResult<()> {
        let url = format!("{}/v1/projects/{}", self.base_url, self.project_id);
        let resp = self.authorize(self.http_client.get_client().get(&url)).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::Upstream { status, body });
        }
        debug!(project = %self.project_id, "imagery service initialized");
        Ok(())
    }

    fn collection_url(&self, method: &str) -> String {
        format!(
            "{}/v1/projects/{}/collections/{}:{}",
            self.base_url, self.project_id, self.collection, method
        )
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> AnalysisResult<T> {
        let url = self.collection_url(method);
        debug!(%url, "imagery request");
        let resp = self
            .authorize(self.http_client.get_client().post(&url).json(body))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::Upstream { status, body });
        }

        let json = resp.json().await?;
        Ok(json)
    }
}

fn init_error(err: AnalysisError) -> AnalysisError {
    AnalysisError::Configuration(format!("Failed to initialize imagery service: {}", err))
}

impl ImageryService for ImageryClient {
    async fn count(&self, query: &CatalogQuery) -> AnalysisResult<u64> {
        let resp: CountResponse = self.post("count", query).await?;
        Ok(resp.count)
    }

    async fn list_acquisitions(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> AnalysisResult<Vec<RawAcquisition>> {
        let body = ListBody {
            query,
            sort: "-system:time_start",
            limit,
        };
        let resp: ListResponse = self.post("list", &body).await?;
        Ok(resp.acquisitions)
    }

    async fn reduce_region(&self, request: &ReduceRequest) -> AnalysisResult<Option<ReducedValues>> {
        let resp: ReduceResponse = self.post("reduce", request).await?;
        Ok(resp.values)
    }

    async fn tile_url(&self, request: &TileRequest) -> AnalysisResult<String> {
        let resp: TileResponse = self.post("tiles", request).await?;
        Ok(resp.tile_url)
    }
}
