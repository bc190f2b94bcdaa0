//! Feed discovery from a URL or a free-text search phrase.
//!
//! - **Routing**: classify the query and pick the direct or search path
//! - **Search**: scrape result links from a web search page
//! - **Pool**: fetch candidates concurrently under one shared deadline
//! - **Extraction**: decode feeds, or follow HTML autodiscovery links to them
//!
//! # Architecture
//!
//! - `router` - [`Discoverer`], the entry point, and query classification
//! - `search` - search-page scraping and candidate capping
//! - `pool` - bounded worker pool with result merging
//! - `extract` - recursive fetch/decode/autodiscovery
//! - `fetcher` - cancellable GET into pooled buffers
//! - `parser` - RSS 2.0 / Atom / RSS 1.0 decoding via `feed-rs`
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> Result<(), feedscout::discovery::DiscoveryError> {
//! use feedscout::discovery::{Discoverer, DiscoverySettings};
//!
//! let discoverer = Discoverer::new(DiscoverySettings::default())?;
//! for (url, feed) in discoverer.search("example.com").await? {
//!     println!("{url}: {}", feed.title);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod extract;
mod fetcher;
mod parser;
mod pool;
mod router;
mod search;

pub use error::DiscoveryError;
pub use extract::{autodiscovery_links, FeedExtractor, FeedResultSet};
pub use fetcher::{ContentFetcher, FetchError};
pub use parser::{decode, DecodeError, Feed, FeedArticle, FeedFormat};
pub use pool::{WorkerPool, DEFAULT_POOL_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
pub use router::{
    classify, search, Discoverer, DiscoverySettings, QueryKind, DEFAULT_MAX_BODY_SIZE,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use search::{
    SearchResolver, DEFAULT_SEARCH_ENDPOINT, DEFAULT_USER_AGENT, MAX_SEARCH_CANDIDATES,
};
