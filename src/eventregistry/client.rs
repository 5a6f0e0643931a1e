use std::collections::HashMap;
use std::env;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::types::{
    Article, QuerySpec, SearchRequest, SearchResponse, SourceSuggestion, SuggestSourcesRequest,
};

const API_BASE: &str = "https://eventregistry.org/api/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum NewsApiError {
    #[error("EVENT_REGISTRY_API_KEY not set. Get one at https://eventregistry.org")]
    ApiKeyNotSet,

    #[error("API key rejected: {0}")]
    AuthRejected(String),

    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Abstraction over the remote article index. Implemented by
/// `EventRegistryClient` for production; mock implementations used in tests.
pub trait ArticleSearch {
    async fn search(&self, spec: &QuerySpec) -> Result<Vec<Article>, NewsApiError>;
}

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

pub struct EventRegistryClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
    /// Domain -> resolved source URI, per client instance.
    source_uris: Mutex<HashMap<String, String>>,
}

impl EventRegistryClient {
    pub fn from_env(http: Client) -> Result<Self, NewsApiError> {
        let api_key = env::var("EVENT_REGISTRY_API_KEY").map_err(|_| NewsApiError::ApiKeyNotSet)?;
        if api_key.trim().is_empty() {
            return Err(NewsApiError::ApiKeyNotSet);
        }
        Ok(Self {
            http,
            api_key: ApiKey(api_key.trim().to_string()),
            base_url: API_BASE.to_string(),
            source_uris: Mutex::new(HashMap::new()),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            base_url: base_url.to_string(),
            source_uris: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a news source domain to the index's source URI, the same
    /// lookup the service exposes as `suggestSourcesFast`. Falls back to the
    /// lowercased domain when the index has no suggestion for it.
    async fn resolve_source_uri(&self, domain: &str) -> Result<String, NewsApiError> {
        if let Some(uri) = self.source_uris.lock().await.get(domain) {
            return Ok(uri.clone());
        }

        let url = format!("{}/suggestSourcesFast", self.base_url);
        let request = SuggestSourcesRequest {
            prefix: domain.to_string(),
            count: 5,
            api_key: self.api_key.0.clone(),
        };

        let response = self
            .http
            .post(&url)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Event Registry rate limited during source resolution");
            return Err(NewsApiError::RateLimited);
        }
        if !status.is_success() {
            return Err(status_error(status.as_u16(), response.text().await.unwrap_or_default()));
        }

        let suggestions: Vec<SourceSuggestion> = response.json().await?;
        let uri = suggestions
            .into_iter()
            .find_map(|s| s.uri.filter(|uri| !uri.is_empty()))
            .unwrap_or_else(|| {
                debug!(domain, "no source suggestion, using domain as source URI");
                domain.to_lowercase()
            });

        self.source_uris
            .lock()
            .await
            .insert(domain.to_string(), uri.clone());
        Ok(uri)
    }

    async fn try_search(&self, spec: &QuerySpec) -> Result<Vec<Article>, NewsApiError> {
        let source_uri = self.resolve_source_uri(&spec.source_domain).await?;
        self.run_search(spec, &source_uri).await
    }

    async fn run_search(
        &self,
        spec: &QuerySpec,
        source_uri: &str,
    ) -> Result<Vec<Article>, NewsApiError> {
        let url = format!("{}/article/getArticles", self.base_url);
        let request = SearchRequest::new(spec, source_uri.to_string(), self.api_key.0.clone());

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Event Registry rate limited");
            return Err(NewsApiError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<SearchResponse>(&text)
                && let Some(message) = body.error
            {
                let classified = classify_api_error(status.as_u16(), message);
                warn!(error = %classified, "Event Registry error");
                return Err(classified);
            }
            warn!(status = %status, "Event Registry error (no structured body)");
            return Err(status_error(status.as_u16(), text));
        }

        let body: SearchResponse = response.json().await?;

        // The service reports auth and quota failures inside HTTP-200 bodies.
        if let Some(message) = body.error {
            let classified = classify_api_error(status.as_u16(), message);
            warn!(error = %classified, "Event Registry error in 200 response");
            return Err(classified);
        }

        let results = body.articles.map(|page| page.results).unwrap_or_default();
        debug!(
            keyword = %spec.keyword,
            source = %spec.source_domain,
            results = results.len(),
            "article search complete"
        );
        Ok(results)
    }
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

impl ArticleSearch for EventRegistryClient {
    async fn search(&self, spec: &QuerySpec) -> Result<Vec<Article>, NewsApiError> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            // Resolution is inside the retry policy too; the cache makes it
            // free on all but the first attempt.
            match self.try_search(spec).await {
                Ok(articles) => return Ok(articles),
                Err(e) if is_retriable(&e) => {
                    last_err = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        let delay_ms = jittered_backoff(attempt);
                        debug!(
                            attempt = attempt + 1,
                            delay_ms, "retrying after transient error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(NewsApiError::RateLimited))
    }
}

fn is_retriable(e: &NewsApiError) -> bool {
    matches!(
        e,
        NewsApiError::RateLimited
            | NewsApiError::Api {
                code: 500..=599,
                ..
            }
    )
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(attempt: u32) -> u64 {
    let base = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

fn classify_api_error(code: u16, message: String) -> NewsApiError {
    let lowered = message.to_lowercase();
    if lowered.contains("api key") || lowered.contains("apikey") {
        return NewsApiError::AuthRejected(message);
    }
    if code == 429 || lowered.contains("rate limit") {
        return NewsApiError::RateLimited;
    }
    NewsApiError::Api { code, message }
}

fn status_error(code: u16, text: String) -> NewsApiError {
    // The body is remote-controlled; truncate on a char boundary.
    let snippet = match text.char_indices().nth(200) {
        Some((i, _)) => &text[..i],
        None => &text,
    };
    NewsApiError::Api {
        code,
        message: format!("HTTP {code}: {snippet}"),
    }
}
