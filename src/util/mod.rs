//! Utility functions shared by the discovery engine and the CLI.
//!
//! - **URL validation**: candidate URLs must be absolute http(s), optionally
//!   refusing loopback and private addresses
//! - **Buffer pooling**: reusable byte buffers for response bodies
//! - **Text processing**: sanitizing feed text and fitting it to terminal columns
//!
//! # Examples
//!
//! ```
//! use feedscout::util::{validate_url, truncate_to_width, BufferPool};
//!
//! let url = validate_url("https://example.com/feed.xml", true).unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
//!
//! let pool = BufferPool::new();
//! let mut buf = pool.acquire();
//! buf.extend_from_slice(b"<rss/>");
//! ```

mod buffer_pool;
mod text;
mod url_validator;

pub use buffer_pool::{BufferPool, PooledBuffer};
pub use text::{collapse_whitespace, pad_to_width, strip_control_chars, truncate_to_width};
pub use url_validator::{check_candidate, validate_url, UrlValidationError};
