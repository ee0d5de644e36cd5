use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::ProxyConfig;
use crate::handler::proxy::{HttpUpstream, ProxyHandler, Upstream};
use crate::handler::{Handler, responses};
use crate::http::request::Request;
use crate::http::response::ResponseWriter;

/// Dispatches on the request target: proxied paths go upstream, two fixed
/// paths answer with an error page, everything else gets a success page.
pub struct Router {
    proxy: ProxyHandler,
}

impl Router {
    pub fn new(config: &ProxyConfig) -> Self {
        Self::with_upstream(config, Arc::new(HttpUpstream::new()))
    }

    pub fn with_upstream(config: &ProxyConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            proxy: ProxyHandler::new(config, upstream),
        }
    }
}

#[async_trait]
impl Handler for Router {
    async fn handle(&self, writer: &mut ResponseWriter<'_>, request: &Request) {
        info!(method = request.method(), target = request.target(), "routing request");

        match request.target() {
            target if self.proxy.matches(target) => self.proxy.handle(writer, request).await,
            "/yourproblem" => responses::bad_request(writer).await,
            "/myproblem" => responses::internal_server_error(writer).await,
            _ => responses::success(writer).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::UpstreamError;
    use std::io::Read;

    struct NoUpstream;

    impl Upstream for NoUpstream {
        fn fetch(&self, _url: &str) -> Result<Box<dyn Read + Send>, UpstreamError> {
            Err(UpstreamError::Io {
                source: std::io::Error::other("unreachable"),
            })
        }
    }

    async fn route(target: &str) -> String {
        let router = Router::with_upstream(&ProxyConfig::default(), Arc::new(NoUpstream));
        let mut request = Request::default();
        request.request_line.method = "GET".to_string();
        request.request_line.target = target.to_string();

        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        router.handle(&mut writer, &request).await;
        String::from_utf8(sink).unwrap()
    }

    #[async_std::test]
    async fn fixed_routes() {
        let ok = route("/").await;
        assert!(ok.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(ok.contains("Content-Type: text/html\r\n"));
        assert!(ok.contains("Success!"));

        let bad = route("/yourproblem").await;
        assert!(bad.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        let err = route("/myproblem").await;
        assert!(err.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[async_std::test]
    async fn proxy_prefix_goes_upstream() {
        let response = route("/httpbin/get").await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }
}
