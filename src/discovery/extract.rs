use std::collections::HashMap;
use std::sync::LazyLock;

use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::DiscoveryError;
use super::fetcher::{ContentFetcher, FetchError};
use super::parser::{self, Feed, FeedFormat};

/// Discovered feeds keyed by the exact URL they were fetched from.
pub type FeedResultSet = HashMap<String, Feed>;

static COMMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));
static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<link\s([^>]+)>").expect("link pattern is valid"));
static HREF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[\s"'])href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("href pattern is valid")
});

const RSS_TYPE_DOUBLE: &str = r#""application/rss+xml""#;
const RSS_TYPE_SINGLE: &str = "'application/rss+xml'";

/// Fetches candidate URLs and turns them into feeds, following HTML
/// autodiscovery links when a page is not a feed itself.
#[derive(Debug)]
pub struct FeedExtractor {
    fetcher: ContentFetcher,
    formats: Vec<FeedFormat>,
}

impl FeedExtractor {
    pub fn new(fetcher: ContentFetcher) -> Self {
        Self::with_formats(fetcher, FeedFormat::DISCOVERY_ORDER.to_vec())
    }

    pub fn with_formats(fetcher: ContentFetcher, formats: Vec<FeedFormat>) -> Self {
        Self { fetcher, formats }
    }

    pub fn fetcher(&self) -> &ContentFetcher {
        &self.fetcher
    }

    /// Fetches `url` and returns every feed reachable from it.
    ///
    /// - A feed document yields a one-entry set keyed by `url`.
    /// - Any other document is scanned for `application/rss+xml` links, each
    ///   of which is fetched recursively under the same `token`.
    /// - Cancellation through `token` yields an empty set, not an error.
    ///
    /// Links back to a page already on the current recursion chain are
    /// skipped, so self-referencing or mutually-referencing pages terminate.
    ///
    /// # Errors
    ///
    /// Non-cancellation fetch failures, malformed autodiscovery hrefs, and
    /// any failure in a recursive branch fail the whole extraction.
    pub fn fetch_and_extract<'a>(
        &'a self,
        token: &'a CancellationToken,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<FeedResultSet, DiscoveryError>> {
        self.visit(token, url, &[])
    }

    fn visit<'a>(
        &'a self,
        token: &'a CancellationToken,
        url: &'a Url,
        ancestors: &'a [String],
    ) -> BoxFuture<'a, Result<FeedResultSet, DiscoveryError>> {
        async move {
            tracing::debug!(url = %url, "Downloading content");

            let body = match self.fetcher.fetch(token, url).await {
                Ok(body) => body,
                Err(FetchError::Cancelled) => {
                    tracing::info!(url = %url, "Download timed out");
                    return Ok(FeedResultSet::new());
                }
                Err(e) => return Err(e.into()),
            };

            let key = url.to_string();
            let links = match parser::decode(&body, &key, &self.formats) {
                Ok(feed) => {
                    tracing::debug!(url = %url, format = %feed.format, "Found feed");
                    return Ok(FeedResultSet::from([(key, feed)]));
                }
                Err(e) => {
                    tracing::debug!(url = %url, reason = %e, "Not a feed, scanning for autodiscovery links");
                    autodiscovery_links(&body.to_string_lossy(), url)?
                }
            };
            drop(body);

            let mut chain = ancestors.to_vec();
            chain.push(key);

            let mut feeds = FeedResultSet::new();
            for link in &links {
                if chain.iter().any(|seen| seen == link.as_str()) {
                    tracing::debug!(url = %url, link = %link, "Skipping autodiscovery cycle");
                    continue;
                }
                let found = self.visit(token, link, &chain).await?;
                feeds.extend(found);
            }

            Ok(feeds)
        }
        .boxed()
    }
}

/// Finds `application/rss+xml` `<link>` declarations in `html` and resolves
/// their hrefs against `page`.
///
/// Commented-out markup is ignored. Tags without an href are skipped.
///
/// # Errors
///
/// [`DiscoveryError::MalformedMarkup`] for the first href that is not a URL.
pub fn autodiscovery_links(html: &str, page: &Url) -> Result<Vec<Url>, DiscoveryError> {
    let html = COMMENT_PATTERN.replace_all(html, "");

    let mut links = Vec::new();
    for tag in LINK_PATTERN.captures_iter(&html) {
        let attrs = &tag[1];
        if !attrs.contains(RSS_TYPE_DOUBLE) && !attrs.contains(RSS_TYPE_SINGLE) {
            continue;
        }

        let Some(href) = href_value(attrs) else {
            tracing::debug!(tag = attrs, "Feed link without href");
            continue;
        };

        let resolved =
            resolve_href(&href, page).map_err(|source| DiscoveryError::MalformedMarkup {
                href: href.clone(),
                source,
            })?;
        links.push(resolved);
    }

    Ok(links)
}

/// Reads the quoted `href` value out of a tag's attribute text.
fn href_value(attrs: &str) -> Option<String> {
    let caps = HREF_PATTERN.captures(attrs)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    Some(raw.trim().replace("&amp;", "&"))
}

/// Absolute hrefs are used unchanged; relative ones are resolved against
/// the scheme and host of `page`, not its path.
fn resolve_href(href: &str, page: &Url) -> Result<Url, url::ParseError> {
    match Url::parse(href) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => page.join("/")?.join(href),
        Err(e) => Err(e),
    }
}
