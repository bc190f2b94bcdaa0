use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::util::{check_candidate, BufferPool, PooledBuffer, UrlValidationError};

/// Classified failure of a single GET.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be built (bad header value, unusable URL)
    #[error("building request for {url}: {source}")]
    RequestBuild {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Network-level failure (DNS, connect, TLS, client timeout)
    #[error("getting link {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Response with a non-2xx status code
    #[error("getting link {url}, invalid status code: {status} ({reason})")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },
    /// Response body exceeded the configured size limit
    #[error("getting link {url}: response larger than {limit} bytes")]
    TooLarge { url: String, limit: usize },
    /// The address policy refused the URL before any request was made
    #[error("refusing to fetch {url}: {source}")]
    Refused {
        url: String,
        #[source]
        source: UrlValidationError,
    },
    /// The caller's cancellation token fired mid-request
    #[error("request cancelled")]
    Cancelled,
}

/// Performs single GET requests bound to a cancellation token.
///
/// Bodies are read into buffers borrowed from a shared [`BufferPool`]; the
/// buffer goes back to the pool when the returned guard is dropped, and on
/// every error path before that.
#[derive(Debug, Clone)]
pub struct ContentFetcher {
    client: reqwest::Client,
    buffers: Arc<BufferPool>,
    max_body_size: usize,
    block_private: bool,
}

impl ContentFetcher {
    pub fn new(
        client: reqwest::Client,
        buffers: Arc<BufferPool>,
        max_body_size: usize,
        block_private: bool,
    ) -> Self {
        Self {
            client,
            buffers,
            max_body_size,
            block_private,
        }
    }

    /// The underlying transport, for callers that need a custom request.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GETs `url` and returns its body.
    pub async fn fetch(
        &self,
        token: &CancellationToken,
        url: &Url,
    ) -> Result<PooledBuffer, FetchError> {
        self.execute(token, self.client.get(url.as_str()), url).await
    }

    /// Sends a caller-built request for `url` and returns its body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Cancelled`] if `token` fires before the body is read
    /// - [`FetchError::Refused`] if `url` fails the address policy
    /// - [`FetchError::RequestBuild`] / [`FetchError::Transport`] from reqwest
    /// - [`FetchError::Status`] for non-2xx responses
    /// - [`FetchError::TooLarge`] when the body exceeds the size limit
    pub async fn execute(
        &self,
        token: &CancellationToken,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<PooledBuffer, FetchError> {
        check_candidate(url, self.block_private).map_err(|source| FetchError::Refused {
            url: url.to_string(),
            source,
        })?;

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(FetchError::Cancelled),
            result = self.download(request, url) => result,
        }
    }

    async fn download(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<PooledBuffer, FetchError> {
        let response = request.send().await.map_err(|source| {
            if source.is_builder() {
                FetchError::RequestBuild {
                    url: url.to_string(),
                    source,
                }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_owned(),
            });
        }

        let mut body = self.buffers.acquire();
        self.read_limited(response, &mut body, url).await?;
        Ok(body)
    }

    async fn read_limited(
        &self,
        response: reqwest::Response,
        body: &mut Vec<u8>,
        url: &Url,
    ) -> Result<(), FetchError> {
        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_body_size,
        };

        // Fast path: Content-Length already over the limit
        if let Some(len) = response.content_length() {
            if len > self.max_body_size as u64 {
                return Err(too_large());
            }
        }

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
            if body.len().saturating_add(chunk.len()) > self.max_body_size {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(())
    }
}
