//! HTTP/1.1 message framing: header map, request-head parser, response
//! writer and status codes.

pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;

pub use headers::{HeaderError, HeaderMap};
pub use parser::{RequestError, RequestParser, read_request};
pub use request::{Request, RequestLine};
pub use response::{ResponseWriter, WriterError, WriterState, default_headers};
pub use status::StatusCode;

/// Line terminator for start-lines, header fields and chunk framing.
pub(crate) const CRLF: &[u8] = b"\r\n";
