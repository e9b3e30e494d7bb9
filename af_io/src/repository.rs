//! Search and build queries against the repository service.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use af_core::{BuildNumber, Error, FindQuery, SearchResultEntry, SearchResults};

use crate::traits::HttpClient;

pub const SEARCH_ENDPOINT: &str = "search/aql";
pub const LATEST_BUILD_ENDPOINT: &str = "build/patternArtifacts";

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Run a find query and return its items.
    async fn search(&self, query: &FindQuery) -> Result<Vec<SearchResultEntry>, Error>;

    /// Resolve `LATEST` / `LAST_RELEASE` to a concrete build number, or
    /// `None` when the build does not exist.
    async fn latest_build_number(
        &self,
        build_name: &str,
        number: &BuildNumber,
    ) -> Result<Option<String>, Error>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatternResult {
    #[serde(default)]
    build_number: Option<String>,
}

/// [`Repository`] backed by the service's REST API.
pub struct HttpRepository {
    client: Arc<dyn HttpClient>,
    base_url: String,
}

impl HttpRepository {
    pub fn new(client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl Repository for HttpRepository {
    async fn search(&self, query: &FindQuery) -> Result<Vec<SearchResultEntry>, Error> {
        let body = query.to_string();
        debug!(query = %body, "Searching");

        let response = self
            .client
            .post_text(&self.api_url(SEARCH_ENDPOINT), body)
            .await
            .map_err(|e| Error::SearchFailure {
                message: e.to_string(),
            })?;
        let results: SearchResults =
            serde_json::from_slice(&response).map_err(|e| Error::SearchFailure {
                message: format!("failed to parse search results: {e}"),
            })?;

        debug!(count = results.results.len(), "Search returned");
        Ok(results.results)
    }

    async fn latest_build_number(
        &self,
        build_name: &str,
        number: &BuildNumber,
    ) -> Result<Option<String>, Error> {
        let request = json!([{ "buildName": build_name, "buildNumber": number.to_string() }]);
        let response = self
            .client
            .post_json(&self.api_url(LATEST_BUILD_ENDPOINT), request)
            .await?;
        let results: Vec<Option<PatternResult>> =
            serde_json::from_slice(&response).map_err(|e| Error::SearchFailure {
                message: format!("failed to parse build lookup response: {e}"),
            })?;

        Ok(results
            .into_iter()
            .next()
            .flatten()
            .and_then(|r| r.build_number)
            .filter(|n| !n.trim().is_empty()))
    }
}
