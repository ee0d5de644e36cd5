use crate::http::headers::HeaderMap;

/// The first line of a request: `METHOD target HTTP/version`.
///
/// `version` holds only the numeric part (`"1.1"`); `target` is kept as
/// received, without any path or query validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

/// A parsed request head.
///
/// Built once per connection by [`read_request`](crate::http::parser::read_request).
/// When the client closes the stream before the blank line ending the
/// headers, whatever was parsed so far is returned; callers that need a
/// complete head should check [`Request::is_complete`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: HeaderMap,
    pub(crate) complete: bool,
}

impl Request {
    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn target(&self) -> &str {
        &self.request_line.target
    }

    /// `true` once the header block was terminated by its blank line.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}
