/// Scripted imagery service for unit tests.
use crate::clients::{CatalogQuery, ImageryService, RawAcquisition, ReduceRequest, TileRequest};
use crate::domain::ReducedValues;
use crate::errors::{AnalysisError, AnalysisResult};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

type Scripted<T> = Mutex<VecDeque<Result<T, String>>>;

/// Replays queued responses in order and records every request.
///
/// A call with nothing queued fails like an unreachable service would.
#[derive(Default)]
pub struct FakeImagery {
    counts: Scripted<u64>,
    listings: Scripted<Vec<RawAcquisition>>,
    reductions: Scripted<Option<ReducedValues>>,
    tiles: Scripted<String>,
    count_log: Mutex<Vec<CatalogQuery>>,
    list_log: Mutex<Vec<(CatalogQuery, usize)>>,
    reduce_log: Mutex<Vec<ReduceRequest>>,
    tile_log: Mutex<Vec<TileRequest>>,
}

fn push<T>(queue: &Scripted<T>, item: Result<T, String>) {
    queue.lock().unwrap().push_back(item);
}

fn pop<T>(queue: &Scripted<T>, what: &str) -> AnalysisResult<T> {
    match queue.lock().unwrap().pop_front() {
        Some(Ok(v)) => Ok(v),
        Some(Err(body)) => Err(AnalysisError::Upstream { status: 500, body }),
        None => Err(AnalysisError::Internal(format!("unexpected {} call", what))),
    }
}

impl FakeImagery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_ok(self, n: u64) -> Self {
        push(&self.counts, Ok(n));
        self
    }

    pub fn count_err(self, msg: &str) -> Self {
        push(&self.counts, Err(msg.to_string()));
        self
    }

    pub fn list_ok(self, items: Vec<RawAcquisition>) -> Self {
        push(&self.listings, Ok(items));
        self
    }

    pub fn list_err(self, msg: &str) -> Self {
        push(&self.listings, Err(msg.to_string()));
        self
    }

    pub fn reduce_ok(self, values: Value) -> Self {
        push(&self.reductions, Ok(values.as_object().cloned()));
        self
    }

    pub fn reduce_empty(self) -> Self {
        push(&self.reductions, Ok(None));
        self
    }

    pub fn reduce_err(self, msg: &str) -> Self {
        push(&self.reductions, Err(msg.to_string()));
        self
    }

    pub fn tile_ok(self, url: &str) -> Self {
        push(&self.tiles, Ok(url.to_string()));
        self
    }

    pub fn tile_err(self, msg: &str) -> Self {
        push(&self.tiles, Err(msg.to_string()));
        self
    }

    pub fn count_calls(&self) -> Vec<CatalogQuery> {
        self.count_log.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<(CatalogQuery, usize)> {
        self.list_log.lock().unwrap().clone()
    }

    pub fn reduce_calls(&self) -> Vec<ReduceRequest> {
        self.reduce_log.lock().unwrap().clone()
    }

    pub fn tile_calls(&self) -> Vec<TileRequest> {
        self.tile_log.lock().unwrap().clone()
    }
}

impl ImageryService for FakeImagery {
    async fn count(&self, query: &CatalogQuery) -> AnalysisResult<u64> {
        self.count_log.lock().unwrap().push(query.clone());
        pop(&self.counts, "count")
    }

    async fn list_acquisitions(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> AnalysisResult<Vec<RawAcquisition>> {
        self.list_log.lock().unwrap().push((query.clone(), limit));
        pop(&self.listings, "list")
    }

    async fn reduce_region(&self, request: &ReduceRequest) -> AnalysisResult<Option<ReducedValues>> {
        self.reduce_log.lock().unwrap().push(request.clone());
        pop(&self.reductions, "reduce")
    }

    async fn tile_url(&self, request: &TileRequest) -> AnalysisResult<String> {
        self.tile_log.lock().unwrap().push(request.clone());
        pop(&self.tiles, "tiles")
    }
}
