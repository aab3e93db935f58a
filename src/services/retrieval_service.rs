//! Reference-text retrieval.
//!
//! The similarity index itself lives outside this service. Vertex AI Search
//! (Discovery Engine) fronts it; we only ask for the top-k segments for a query.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tokio::process::Command;

use crate::config::VertexConfig;

pub const DEFAULT_TOP_K: usize = 4;

/// gcloud tokens live for an hour; refresh well before that.
const TOKEN_LIFETIME: Duration = Duration::from_secs(50 * 60);

#[derive(Debug)]
pub enum RetrievalError {
    HttpError(reqwest::Error),
    AuthError(String),
    ResponseError(String),
}

impl fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalError::HttpError(err) => write!(f, "HTTP error: {}", err),
            RetrievalError::AuthError(msg) => write!(f, "Authentication error: {}", msg),
            RetrievalError::ResponseError(msg) => write!(f, "Response error: {}", msg),
        }
    }
}

impl std::error::Error for RetrievalError {}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        RetrievalError::HttpError(err)
    }
}

#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Segments ordered by relevance; may be empty.
    async fn retrieve_top_k(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError>;
}

/// Top-k segments for `need`, joined by blank lines.
///
/// A failing index degrades to an empty context rather than failing the round.
pub async fn retrieve_context(retriever: &dyn ContextRetriever, need: &str, k: usize) -> String {
    match retriever.retrieve_top_k(need, k).await {
        Ok(chunks) => {
            debug!("Retrieved {} reference segments", chunks.len());
            chunks
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .take(k)
                .collect::<Vec<_>>()
                .join("\n\n")
        }
        Err(e) => {
            warn!("Reference retrieval failed, continuing without context: {}", e);
            String::new()
        }
    }
}

/// Used when no data store is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopRetriever;

#[async_trait]
impl ContextRetriever for NoopRetriever {
    async fn retrieve_top_k(&self, _query: &str, _k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Serialize)]
struct VertexSearchRequest<'a> {
    query: &'a str,
    #[serde(rename = "pageSize")]
    page_size: usize,
    #[serde(rename = "contentSearchSpec")]
    content_search_spec: ContentSearchSpec,
}

#[derive(Debug, Serialize)]
struct ContentSearchSpec {
    #[serde(rename = "snippetSpec")]
    snippet_spec: SnippetSpec,
    #[serde(rename = "extractiveContentSpec")]
    extractive_content_spec: ExtractiveContentSpec,
}

#[derive(Debug, Serialize)]
struct SnippetSpec {
    #[serde(rename = "returnSnippet")]
    return_snippet: bool,
}

#[derive(Debug, Serialize)]
struct ExtractiveContentSpec {
    #[serde(rename = "maxExtractiveSegmentCount")]
    max_extractive_segment_count: u32,
}

#[derive(Debug, Deserialize)]
struct VertexSearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    document: Document,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(rename = "structData", default)]
    struct_data: Option<serde_json::Value>,
    #[serde(rename = "derivedStructData", default)]
    derived_struct_data: Option<serde_json::Value>,
}

impl Document {
    /// Best text we can get out of a hit: an extractive segment, then a
    /// snippet, then a `content`/`text` field of the stored document.
    fn text(&self) -> Option<String> {
        let derived = self.derived_struct_data.as_ref();
        let from_derived = |list: &str, field: &str| {
            derived
                .and_then(|d| d.get(list))
                .and_then(|v| v.as_array())
                .and_then(|items| items.first())
                .and_then(|item| item.get(field))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        };

        from_derived("extractive_segments", "content")
            .or_else(|| from_derived("snippets", "snippet"))
            .or_else(|| {
                let data = self.struct_data.as_ref()?;
                data.get("content")
                    .or_else(|| data.get("text"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            })
    }
}

#[derive(Debug)]
struct TokenCache {
    slot: Mutex<Option<(String, Instant)>>,
    lifetime: Duration,
}

impl TokenCache {
    fn new(lifetime: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            lifetime,
        }
    }

    fn get(&self, now: Instant) -> Option<String> {
        let slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        slot.as_ref()
            .filter(|(_, fetched_at)| now.saturating_duration_since(*fetched_at) < self.lifetime)
            .map(|(token, _)| token.clone())
    }

    fn put(&self, token: &str, now: Instant) {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = Some((token.to_string(), now));
    }

    fn invalidate(&self) {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

#[derive(Clone)]
pub struct VertexRetriever {
    client: Client,
    config: VertexConfig,
    token_cache: Arc<TokenCache>,
}

impl VertexRetriever {
    pub fn new(config: VertexConfig, timeout: Duration) -> Result<Self, RetrievalError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            config,
            token_cache: Arc::new(TokenCache::new(TOKEN_LIFETIME)),
        })
    }

    fn search_url(&self) -> String {
        format!(
            "https://discoveryengine.googleapis.com/v1/projects/{}/locations/{}/dataStores/{}/servingConfigs/{}:search",
            self.config.project_id,
            self.config.location,
            self.config.data_store_id,
            self.config.serving_config
        )
    }

    async fn get_access_token(&self) -> Result<String, RetrievalError> {
        // Prefer an injected token; fall back to the local gcloud login.
        if let Ok(token) = env::var("GOOGLE_CLOUD_ACCESS_TOKEN") {
            return Ok(token);
        }
        if let Some(token) = self.token_cache.get(Instant::now()) {
            return Ok(token);
        }

        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| RetrievalError::AuthError(format!("Failed to get gcloud token: {}", e)))?;
        if !output.status.success() {
            return Err(RetrievalError::AuthError(format!(
                "gcloud command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        let token = String::from_utf8(output.stdout)
            .map_err(|e| RetrievalError::AuthError(format!("Invalid UTF-8 in token: {}", e)))?
            .trim()
            .to_string();

        debug!("Fetched a new gcloud access token");
        self.token_cache.put(&token, Instant::now());
        Ok(token)
    }
}

#[async_trait]
impl ContextRetriever for VertexRetriever {
    async fn retrieve_top_k(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        let access_token = self.get_access_token().await?;
        let request = VertexSearchRequest {
            query,
            page_size: k,
            content_search_spec: ContentSearchSpec {
                snippet_spec: SnippetSpec {
                    return_snippet: true,
                },
                extractive_content_spec: ExtractiveContentSpec {
                    max_extractive_segment_count: 1,
                },
            },
        };

        let response = self
            .client
            .post(self.search_url())
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.token_cache.invalidate();
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RetrievalError::ResponseError(format!(
                "Search request failed with status {}: {}",
                status, error_text
            )));
        }

        let search_response: VertexSearchResponse = response.json().await.map_err(|e| {
            RetrievalError::ResponseError(format!("Failed to parse response: {}", e))
        })?;

        Ok(search_response
            .results
            .iter()
            .filter_map(|r| r.document.text())
            .take(k)
            .collect())
    }
}
