use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::DiscoveryError;
use super::extract::{FeedExtractor, FeedResultSet};
use super::fetcher::ContentFetcher;
use super::pool::{WorkerPool, DEFAULT_POOL_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use super::search::{
    SearchResolver, DEFAULT_SEARCH_ENDPOINT, DEFAULT_USER_AGENT, MAX_SEARCH_CANDIDATES,
};
use crate::util::BufferPool;

/// One or more `label.` segments followed by an alphabetic TLD of 2+ letters.
static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}$").expect("domain pattern is valid")
});

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// How a raw query will be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Fetch this URL (and whatever it links to) directly
    Url(Url),
    /// Hand the phrase to the web search
    Phrase(String),
}

/// Classifies a query as a URL or a search phrase.
///
/// Absolute URLs with a host, whatever their scheme, and bare domain names
/// (`example.com`) are URLs; bare domains get the `http` scheme. Everything
/// else is a phrase. Schemes the fetcher cannot serve fail on the direct
/// path rather than being searched for.
pub fn classify(query: &str) -> QueryKind {
    let query = query.trim();

    if let Ok(url) = Url::parse(query) {
        if url.has_host() {
            return QueryKind::Url(url);
        }
    }

    if DOMAIN_PATTERN.is_match(query) {
        if let Ok(url) = Url::parse(&format!("http://{query}")) {
            return QueryKind::Url(url);
        }
    }

    QueryKind::Phrase(query.to_owned())
}

/// Discovers feeds for `query` with default settings.
///
/// Shorthand for [`Discoverer::new`] followed by [`Discoverer::search`]; keep
/// a [`Discoverer`] around instead when searching repeatedly.
pub async fn search(query: &str) -> Result<FeedResultSet, DiscoveryError> {
    Discoverer::new(DiscoverySettings::default())?
        .search(query)
        .await
}

/// Runtime knobs for a [`Discoverer`].
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub search_endpoint: String,
    pub user_agent: String,
    pub max_candidates: usize,
    pub workers: usize,
    pub queue_capacity: usize,
    /// Shared deadline for one fan-out over search results
    pub pool_timeout: Duration,
    /// Client-level limit on any single request
    pub request_timeout: Duration,
    pub max_body_size: usize,
    pub block_private_addresses: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_candidates: MAX_SEARCH_CANDIDATES,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pool_timeout: DEFAULT_POOL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            block_private_addresses: true,
        }
    }
}

/// Entry point for feed discovery.
///
/// Cheap to clone; clones share the HTTP client and buffer pool.
#[derive(Debug, Clone)]
pub struct Discoverer {
    extractor: Arc<FeedExtractor>,
    resolver: SearchResolver,
}

impl Discoverer {
    /// Builds a discoverer with its own HTTP client.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Client`] if the TLS backend cannot be initialized.
    pub fn new(settings: DiscoverySettings) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(DiscoveryError::Client)?;
        Ok(Self::with_client(client, settings))
    }

    /// Builds a discoverer around a caller-configured client.
    pub fn with_client(client: reqwest::Client, settings: DiscoverySettings) -> Self {
        let fetcher = ContentFetcher::new(
            client,
            BufferPool::new(),
            settings.max_body_size,
            settings.block_private_addresses,
        );
        let extractor = Arc::new(FeedExtractor::new(fetcher));
        let pool = WorkerPool::new(
            settings.workers,
            settings.queue_capacity,
            settings.pool_timeout,
        );
        let resolver = SearchResolver::new(
            Arc::clone(&extractor),
            pool,
            settings.search_endpoint,
            settings.user_agent,
            settings.max_candidates,
        );

        Self {
            extractor,
            resolver,
        }
    }

    /// Discovers feeds for a URL or a search phrase.
    ///
    /// # Returns
    ///
    /// Feeds keyed by the URL they were fetched from. The map may be empty.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::InvalidQuery`] for a blank query
    /// - [`DiscoveryError::ByUrl`] when a URL query fails on every scheme tried
    /// - search request failures, or the last candidate failure when a
    ///   search produced no feeds at all
    pub async fn search(&self, query: &str) -> Result<FeedResultSet, DiscoveryError> {
        match classify(query) {
            QueryKind::Url(url) => self.search_by_url(url).await,
            QueryKind::Phrase(phrase) if phrase.is_empty() => {
                Err(DiscoveryError::InvalidQuery("query is empty".to_owned()))
            }
            QueryKind::Phrase(phrase) => self.resolver.resolve_by_query(&phrase).await,
        }
    }

    /// Fetches a URL query directly, preferring `https` for `http` URLs.
    async fn search_by_url(&self, url: Url) -> Result<FeedResultSet, DiscoveryError> {
        tracing::info!(url = %url, "Searching for feeds from url");

        // The direct path is a single chain with no deadline of its own
        let token = CancellationToken::new();

        if url.scheme() == "http" {
            let mut secure = url.clone();
            if secure.set_scheme("https").is_ok() {
                match self.extractor.fetch_and_extract(&token, &secure).await {
                    Ok(feeds) => {
                        tracing::debug!(count = feeds.len(), "Found feeds");
                        return Ok(feeds);
                    }
                    Err(e) => {
                        tracing::debug!(
                            url = %secure,
                            error = %e,
                            "HTTPS attempt failed, retrying with http"
                        );
                    }
                }
            }
        }

        let feeds = self
            .extractor
            .fetch_and_extract(&token, &url)
            .await
            .map_err(|e| DiscoveryError::ByUrl {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        tracing::debug!(count = feeds.len(), "Found feeds");
        Ok(feeds)
    }
}
