use thiserror::Error;

use super::fetcher::FetchError;

/// Errors surfaced by feed discovery.
///
/// Cancellation never appears here: a fetch cut short by the pool deadline
/// is a soft skip and yields an empty result instead.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The query cannot be turned into a request
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// The HTTP client could not be constructed
    #[error("building HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// Fetching a candidate failed (transport, status, size, address policy)
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// An autodiscovery `<link>` carried an href that is not a URL
    #[error("parsing feed href {href}: {source}")]
    MalformedMarkup {
        href: String,
        #[source]
        source: url::ParseError,
    },
    /// The search endpoint plus query did not form a valid URL
    #[error("creating feed search query with {query}: {source}")]
    SearchRequest {
        query: String,
        #[source]
        source: url::ParseError,
    },
    /// The search page itself could not be fetched
    #[error("executing feed search request: {0}")]
    SearchFailed(#[source] FetchError),
    /// The direct URL path failed on every scheme it tried
    #[error("searching by url {url}: {source}")]
    ByUrl {
        url: String,
        #[source]
        source: Box<DiscoveryError>,
    },
}
