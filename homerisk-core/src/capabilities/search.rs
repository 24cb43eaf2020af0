//! Web-search capability over a SerpAPI-compatible endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{CapabilityError, Evidence, SearchProvider};

pub struct SerpSearch {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl SerpSearch {
    pub fn new(endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for SerpSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerpSearch")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    snippet: Option<String>,
    #[serde(default)]
    link: String,
    date: Option<String>,
}

#[async_trait]
impl SearchProvider for SerpSearch {
    async fn search(&self, query: &str) -> Result<Vec<Evidence>, CapabilityError> {
        // Spanish-language, Chile-localized results, matching the queries the
        // collectors build.
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", &self.api_key),
                ("hl", "es"),
                ("gl", "cl"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: SerpResponse = response.json().await?;
        let evidence: Vec<Evidence> = body
            .organic_results
            .into_iter()
            .filter_map(|result| {
                result.snippet.map(|snippet| Evidence {
                    title: result.title,
                    snippet,
                    link: result.link,
                    date: result.date,
                })
            })
            .collect();
        debug!(query, hits = evidence.len(), "search complete");
        Ok(evidence)
    }
}

/// Search stub for dev mode (no API key configured): every query returns no
/// evidence, which drives the pipeline down the no-data fallback path.
#[derive(Debug, Default)]
pub struct StubSearch;

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, _query: &str) -> Result<Vec<Evidence>, CapabilityError> {
        Ok(Vec::new())
    }
}
