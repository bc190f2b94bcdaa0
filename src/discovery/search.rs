use std::sync::Arc;

use reqwest::header::USER_AGENT;
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::DiscoveryError;
use super::extract::{FeedExtractor, FeedResultSet};
use super::pool::WorkerPool;
use crate::util::validate_url;

/// Upper bound on result links taken from one search page.
pub const MAX_SEARCH_CANDIDATES: usize = 40;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Some search backends refuse clients that do not look like a browser.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.16; rv:85.0) Gecko/20100101 Firefox/85.0";

const RESULT_LINK_SELECTOR: &str = "a.result__url";
const REDIRECT_TARGET_PARAM: &str = "uddg";

/// Turns a free-text phrase into feeds by way of a web search.
#[derive(Debug, Clone)]
pub struct SearchResolver {
    extractor: Arc<FeedExtractor>,
    pool: WorkerPool,
    endpoint: String,
    user_agent: String,
    max_candidates: usize,
}

impl SearchResolver {
    /// `max_candidates` is clamped to [`MAX_SEARCH_CANDIDATES`].
    pub fn new(
        extractor: Arc<FeedExtractor>,
        pool: WorkerPool,
        endpoint: impl Into<String>,
        user_agent: impl Into<String>,
        max_candidates: usize,
    ) -> Self {
        Self {
            extractor,
            pool,
            endpoint: endpoint.into(),
            user_agent: user_agent.into(),
            max_candidates: max_candidates.min(MAX_SEARCH_CANDIDATES),
        }
    }

    /// Searches the web for `query` and discovers feeds on the result pages.
    ///
    /// # Errors
    ///
    /// Building or executing the search request fails immediately. Failures
    /// on individual result links only surface if no result produced a feed.
    pub async fn resolve_by_query(&self, query: &str) -> Result<FeedResultSet, DiscoveryError> {
        tracing::info!(query = %query, "Searching for feeds via web search");

        let search_url = Url::parse_with_params(&self.endpoint, &[("q", query)]).map_err(
            |source| DiscoveryError::SearchRequest {
                query: query.to_owned(),
                source,
            },
        )?;

        let request = self
            .extractor
            .fetcher()
            .client()
            .get(search_url.as_str())
            .header(USER_AGENT, &self.user_agent);

        let page = self
            .extractor
            .fetcher()
            .execute(&CancellationToken::new(), request, &search_url)
            .await
            .map_err(DiscoveryError::SearchFailed)?;
        let links = extract_result_links(&page.to_string_lossy(), &search_url);
        drop(page);

        tracing::debug!(query = %query, links = ?links, "Found result links");

        let candidates = parse_candidates(links, self.max_candidates);
        let extractor = Arc::clone(&self.extractor);
        let feeds = self
            .pool
            .run(candidates, move |token, url| {
                let extractor = Arc::clone(&extractor);
                async move { extractor.fetch_and_extract(&token, &url).await }
            })
            .await?;

        tracing::debug!(query = %query, count = feeds.len(), "Found feeds");
        Ok(feeds)
    }
}

/// Pulls result URLs out of a search result page.
///
/// `data-href` wins over `href`. Hrefs starting with `/` are search-engine
/// redirects whose destination sits in the `uddg` query parameter.
fn extract_result_links(html: &str, search_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(RESULT_LINK_SELECTOR).expect("result selector is valid");

    document
        .select(&selector)
        .filter_map(|anchor| {
            let element = anchor.value();
            let href = element
                .attr("data-href")
                .or_else(|| element.attr("href"))
                .unwrap_or("")
                .trim();

            if href.is_empty() {
                None
            } else if href.starts_with('/') {
                unwrap_redirect(href, search_url)
            } else {
                Some(href.to_owned())
            }
        })
        .collect()
}

fn unwrap_redirect(href: &str, search_url: &Url) -> Option<String> {
    let redirect = search_url.join(href).ok()?;
    redirect
        .query_pairs()
        .find(|(key, _)| key == REDIRECT_TARGET_PARAM)
        .map(|(_, target)| target.into_owned())
        .filter(|target| !target.is_empty())
}

/// Caps the link list, then keeps the links that parse as absolute http(s)
/// URLs. Rejected links are logged and dropped.
fn parse_candidates(mut links: Vec<String>, max: usize) -> Vec<Url> {
    links.truncate(max);

    links
        .into_iter()
        .filter_map(|link| match validate_url(&link, false) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(link = %link, error = %e, "Skipping search result link");
                None
            }
        })
        .collect()
}
