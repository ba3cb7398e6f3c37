pub mod http;
pub mod mock;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use self::{http::HttpDataService, mock::MockDataService};
use crate::{
    error::ServiceError,
    record::{normalize, ResultSet},
    state::{FilterMap, QueryState, Selection},
};

const UNKNOWN_ERROR: &str = "Unknown error";

/// The body posted to the analysis service: one level per dimension plus
/// the row filters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnalyseRequest {
    #[serde(flatten)]
    pub selection: Selection,
    #[serde(default)]
    pub filters: FilterMap,
}

impl AnalyseRequest {
    #[must_use]
    pub fn from_state(state: &QueryState) -> Self {
        Self {
            selection: *state.selection(),
            filters: state.filters().clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub dimension_count: usize,
    #[serde(default)]
    pub record_count: usize,
    /// The exact attribute columns present in every returned record.
    #[serde(default)]
    pub dimension_columns: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AnalyseResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
    /// Echo of the requested levels.
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: ResponseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalyseResponse {
    /// Turns a successful response into a normalized data set.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Rejected`] carrying the service's own message
    /// when `success` is false.
    pub fn into_result_set(self) -> Result<ResultSet, ServiceError> {
        if !self.success {
            return Err(ServiceError::Rejected(
                self.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            ));
        }
        Ok(ResultSet::new(
            normalize(self.data),
            self.metadata.dimension_columns,
        ))
    }
}

/// The remote aggregation engine. Given a selection and filters it returns
/// pre-aggregated rows; it never sees navigation state.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn analyse(&self, request: &AnalyseRequest) -> Result<AnalyseResponse>;
}
