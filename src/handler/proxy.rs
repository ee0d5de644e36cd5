//! Streaming reverse proxy.
//!
//! The upstream body is forwarded as it arrives, one chunk per upstream
//! read, using chunked transfer encoding. Once upstream is exhausted the
//! SHA-256 digest and byte count of everything forwarded are sent as
//! trailers.
//!
//! The upstream client is blocking; every call into it runs on the
//! blocking pool so only this connection waits on it.

use std::io::{self, Read};
use std::sync::Arc;

use async_std::task;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ProxyConfig;
use crate::handler::{Handler, responses};
use crate::http::headers::HeaderMap;
use crate::http::request::Request;
use crate::http::response::{ResponseWriter, WriterError, default_headers};
use crate::http::status::StatusCode;

pub const DIGEST_TRAILER: &str = "X-Content-SHA256";
pub const LENGTH_TRAILER: &str = "X-Content-Length";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Source of upstream bodies.
pub trait Upstream: Send + Sync {
    /// Issues a GET for `url` and returns the response body as a stream.
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + Send>, UpstreamError>;
}

/// [`Upstream`] backed by a blocking `reqwest` client.
pub struct HttpUpstream {
    client: reqwest::blocking::Client,
}

impl HttpUpstream {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl Upstream for HttpUpstream {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + Send>, UpstreamError> {
        let response = self.client.get(url).send()?;
        debug!(url, status = %response.status(), "upstream responded");
        Ok(Box::new(response))
    }
}

pub struct ProxyHandler {
    prefix: String,
    upstream_base: String,
    chunk_size: usize,
    upstream: Arc<dyn Upstream>,
}

impl ProxyHandler {
    pub fn new(config: &ProxyConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            prefix: config.prefix.clone(),
            upstream_base: config.upstream.clone(),
            chunk_size: config.chunk_size.max(1),
            upstream,
        }
    }

    pub fn matches(&self, target: &str) -> bool {
        target.starts_with(&self.prefix)
    }

    fn upstream_url(&self, target: &str) -> String {
        let rest = target.strip_prefix(&self.prefix).unwrap_or(target);
        format!("{}{}", self.upstream_base, rest)
    }

    async fn forward(
        &self,
        writer: &mut ResponseWriter<'_>,
        body: Box<dyn Read + Send>,
    ) -> Result<(), WriterError> {
        writer.write_status_line(StatusCode::OK).await?;
        let mut headers = default_headers(0);
        headers.remove("Content-Length");
        headers.replace("Transfer-Encoding", "chunked");
        headers.set("Trailer", &format!("{DIGEST_TRAILER}, {LENGTH_TRAILER}"));
        writer.write_headers(&headers).await?;

        let mut hasher = Sha256::new();
        let mut total = 0usize;
        let mut body = body;
        let mut buffer = vec![0; self.chunk_size];

        loop {
            let (returned_body, returned_buffer, read) = task::spawn_blocking(move || {
                let mut body = body;
                let mut buffer = buffer;
                let read = body.read(&mut buffer);
                (body, buffer, read)
            })
            .await;
            body = returned_body;
            buffer = returned_buffer;

            match read {
                Ok(0) => break,
                Ok(n) => {
                    debug!(bytes = n, "forwarding chunk");
                    writer.write_chunked_body(&buffer[..n]).await?;
                    hasher.update(&buffer[..n]);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(cause = %e, "failed to read upstream body");
                    break;
                }
            }
        }

        writer.write_chunked_body_done().await?;

        let mut trailers = HeaderMap::new();
        trailers.set(DIGEST_TRAILER, &hex::encode(hasher.finalize()));
        trailers.set(LENGTH_TRAILER, &total.to_string());
        writer.write_trailers(&trailers).await?;

        info!(bytes = total, "proxied response complete");
        Ok(())
    }
}

#[async_trait]
impl Handler for ProxyHandler {
    async fn handle(&self, writer: &mut ResponseWriter<'_>, request: &Request) {
        let url = self.upstream_url(request.target());
        info!(url = %url, "proxying");

        let upstream = Arc::clone(&self.upstream);
        let fetch_url = url.clone();
        let body = match task::spawn_blocking(move || upstream.fetch(&fetch_url)).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, cause = %e, "upstream fetch failed");
                responses::internal_server_error(writer).await;
                return;
            }
        };

        if let Err(e) = self.forward(writer, body).await {
            error!(url = %url, cause = %e, "proxying aborted");
        }
    }
}
