//! Request handlers.
//!
//! The server hands every successfully parsed request to a [`Handler`]
//! together with a [`ResponseWriter`] bound to the connection. The handler
//! drives the writer through its sections; the connection is closed as soon
//! as it returns.

mod proxy;
mod responses;
mod router;

use async_trait::async_trait;
use tracing::error;

use crate::http::request::Request;
use crate::http::response::{ResponseWriter, WriterError, default_headers};
use crate::http::status::StatusCode;

pub use proxy::{HttpUpstream, ProxyHandler, Upstream, UpstreamError};
pub use router::Router;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, writer: &mut ResponseWriter<'_>, request: &Request);
}

/// A status code and a plain-text message, written as a complete
/// fixed-length response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub status: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new<S: ToString>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }

    pub async fn write(&self, writer: &mut ResponseWriter<'_>) -> Result<(), WriterError> {
        let body = self.message.as_bytes();
        writer.write_status_line(self.status).await?;
        writer.write_headers(&default_headers(body.len())).await?;
        writer.write_body(body).await?;
        Ok(())
    }
}

/// Writes `body` as a complete response with the given content type.
pub(crate) async fn write_full(
    writer: &mut ResponseWriter<'_>,
    status: StatusCode,
    content_type: &str,
    body: &[u8],
) {
    let mut headers = default_headers(body.len());
    headers.replace("Content-Type", content_type);

    let result = async {
        writer.write_status_line(status).await?;
        writer.write_headers(&headers).await?;
        writer.write_body(body).await?;
        Ok::<_, WriterError>(())
    }
    .await;

    if let Err(e) = result {
        error!(status = status.as_u16(), cause = %e, "failed to write response");
    }
}
