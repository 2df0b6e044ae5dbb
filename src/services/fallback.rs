/// Previous-year fallback for index statistics.
///
/// ```text
/// Initial -> QueryCurrent -> Done
///                         -> QueryPreviousYear -> Done
///                                              -> DoneWithDefault
/// ```
///
/// Failures inside a query attempt never escape this module. They are
/// folded into a [`QueryOutcome`] so the controller can tell "nothing
/// there" apart from "something broke" in its logs, even though both lead
/// to the same transition.
use crate::clients::{CatalogQuery, ImageryService, ReduceRequest};
use crate::config::ReductionSettings;
use crate::domain::{DateInterval, IndexName, ReducedValues, Region};
use crate::services::formula::IndexExpression;
use tracing::{debug, info, warn};

/// Acquisitions at or above this cloud cover are excluded from statistics.
pub const MAX_CLOUD_COVER: f64 = 20.0;

pub const DEFAULT_NOTE: &str = "No data found or GEE error";

/// Result of a single reduction attempt
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Value(f64),
    /// The service matched nothing
    Empty,
    /// A mapping came back without a usable value for the index
    Malformed(String),
    /// The request itself failed
    Failed(String),
}

impl QueryOutcome {
    fn from_values(values: Option<ReducedValues>, key: &str) -> Self {
        let Some(values) = values else {
            return QueryOutcome::Empty;
        };
        if values.is_empty() {
            return QueryOutcome::Empty;
        }
        match values.get(key) {
            None => QueryOutcome::Malformed(format!("missing key {}", key)),
            Some(v) => match v.as_f64() {
                Some(x) if x.is_finite() => QueryOutcome::Value(x),
                _ => QueryOutcome::Malformed(format!("{} = {}", key, v)),
            },
        }
    }
}

/// Which window the final value came from
#[derive(Debug, Clone, PartialEq)]
pub enum WindowSource {
    Current,
    PreviousYear(DateInterval),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub index: IndexName,
    pub value: f64,
    pub source: WindowSource,
}

impl Resolution {
    pub fn note(&self) -> Option<String> {
        match &self.source {
            WindowSource::Current => None,
            WindowSource::PreviousYear(window) => Some(format!(
                "No usable imagery in the requested window; using previous year {}",
                window
            )),
            WindowSource::Default => Some(DEFAULT_NOTE.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Initial,
    QueryCurrent,
    QueryPreviousYear,
    Done(Resolution),
    DoneWithDefault,
}

pub struct FallbackController<'a, S> {
    service: &'a S,
    settings: &'a ReductionSettings,
}

impl<'a, S: ImageryService> FallbackController<'a, S> {
    pub fn new(service: &'a S, settings: &'a ReductionSettings) -> Self {
        Self { service, settings }
    }

    /// Resolve a statistic for `index`, trying the requested window first
    /// and the same window one year earlier second. Always returns a value.
    pub async fn resolve(&self, region: &Region, interval: DateInterval, index: IndexName) -> Resolution {
        let expression = IndexExpression::for_statistic(index);
        let mut state = State::Initial;

        loop {
            let next = match state {
                State::Initial => State::QueryCurrent,
                State::QueryCurrent => match self.attempt(region, interval, &expression).await {
                    QueryOutcome::Value(value) => State::Done(Resolution {
                        index,
                        value,
                        source: WindowSource::Current,
                    }),
                    outcome => {
                        info!(window = %interval, ?outcome, "no statistic for requested window");
                        State::QueryPreviousYear
                    }
                },
                State::QueryPreviousYear => match interval.previous_year() {
                    Err(e) => {
                        warn!(window = %interval, error = %e, "cannot shift window back a year");
                        State::DoneWithDefault
                    }
                    Ok(previous) => match self.attempt(region, previous, &expression).await {
                        QueryOutcome::Value(value) => State::Done(Resolution {
                            index,
                            value,
                            source: WindowSource::PreviousYear(previous),
                        }),
                        outcome => {
                            info!(window = %previous, ?outcome, "no statistic for previous year");
                            State::DoneWithDefault
                        }
                    },
                },
                State::Done(resolution) => return resolution,
                State::DoneWithDefault => {
                    return Resolution {
                        index,
                        value: 0.0,
                        source: WindowSource::Default,
                    }
                }
            };
            debug!(?next, "fallback transition");
            state = next;
        }
    }

    async fn attempt(
        &self,
        region: &Region,
        interval: DateInterval,
        expression: &IndexExpression,
    ) -> QueryOutcome {
        let key = expression.index.as_str();
        let request = ReduceRequest::mean(
            CatalogQuery {
                region: region.clone(),
                interval,
                max_cloud_cover: Some(MAX_CLOUD_COVER),
            },
            expression.clone(),
            key,
            self.settings,
        );

        debug!(window = %interval, expr = %expression.expr, "reducing index");
        match self.service.reduce_region(&request).await {
            Ok(values) => QueryOutcome::from_values(values, key),
            Err(e) => QueryOutcome::Failed(e.to_string()),
        }
    }
}
