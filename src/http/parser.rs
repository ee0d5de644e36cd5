//! Incremental request-head parser.
//!
//! [`RequestParser`] is a small state machine fed with whatever bytes have
//! been buffered so far. It reports how many bytes it consumed so the caller
//! can compact its buffer; a return of zero consumed bytes is the "need more
//! data" signal, never an error.
//!
//! [`read_request`] drives the parser from an async byte stream using a
//! growable buffer that starts small and doubles when full.

use std::io;

use async_std::io::Read;
use async_std::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::config::ParserConfig;
use crate::http::CRLF;
use crate::http::headers::{HeaderError, HeaderMap, find_crlf};
use crate::http::request::{Request, RequestLine};

const SUPPORTED_SCHEME: &str = "HTTP";
const SUPPORTED_VERSION: &str = "1.1";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed start-line: {0:?}")]
    MalformedStartLine(String),

    #[error("invalid method: {0:?}")]
    InvalidMethod(String),

    #[error("unsupported HTTP version: {0:?}")]
    UnsupportedVersion(String),

    #[error(transparent)]
    MalformedHeader(#[from] HeaderError),

    #[error("request head exceeds the {limit} byte limit")]
    HeadersTooLarge { limit: usize },

    #[error("parser fed after the request head was complete")]
    InvalidState,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl RequestError {
    /// Transport failures are logged and the connection dropped; every other
    /// variant is the client's fault and answered with a 400.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Initialized,
    ParsingHeaders,
    Done,
}

#[derive(Debug)]
pub struct RequestParser {
    state: ParserState,
    request: Request,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Initialized,
            request: Request::default(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    /// Consumes as many complete lines from `data` as possible and returns
    /// the number of bytes used. Unconsumed bytes must be passed again,
    /// followed by new data, on the next call.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, RequestError> {
        if self.state == ParserState::Done {
            return Err(RequestError::InvalidState);
        }

        let mut consumed = 0;
        loop {
            match self.state {
                ParserState::Initialized => {
                    let Some((line, n)) = parse_request_line(&data[consumed..])? else {
                        return Ok(consumed);
                    };
                    self.request.request_line = line;
                    consumed += n;
                    self.state = ParserState::ParsingHeaders;
                }
                ParserState::ParsingHeaders => {
                    let (n, done) = self.request.headers.parse_one(&data[consumed..])?;
                    if n == 0 && !done {
                        return Ok(consumed);
                    }
                    consumed += n;
                    if done {
                        self.request.complete = true;
                        self.state = ParserState::Done;
                    }
                }
                ParserState::Done => return Ok(consumed),
            }
        }
    }

    /// Hands back the request built so far.
    pub fn finish(self) -> Request {
        self.request
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.request.headers
    }
}

/// Reads one request head from `reader`.
///
/// End of stream before the head is complete is not an error: the partial
/// request is returned as is (see [`Request::is_complete`]). Any parse error
/// aborts immediately and no request is returned.
pub async fn read_request<R>(reader: &mut R, config: &ParserConfig) -> Result<Request, RequestError>
where
    R: Read + Unpin + ?Sized,
{
    let mut parser = RequestParser::new();
    let mut buffer = vec![0; config.initial_buffer_size.max(1)];
    let mut read_to_index = 0;

    while !parser.is_done() {
        if read_to_index >= buffer.len() {
            if buffer.len() >= config.max_buffer_size {
                return Err(RequestError::HeadersTooLarge {
                    limit: config.max_buffer_size,
                });
            }
            let grown = (buffer.len() * 2).min(config.max_buffer_size);
            buffer.resize(grown, 0);
        }

        let n = match reader.read(&mut buffer[read_to_index..]).await {
            Ok(0) => {
                debug!(buffered = read_to_index, "stream ended before end of headers");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        read_to_index += n;

        let parsed = parser.parse(&buffer[..read_to_index])?;
        buffer.copy_within(parsed..read_to_index, 0);
        read_to_index -= parsed;
    }

    Ok(parser.finish())
}

/// Returns the parsed start-line and the bytes it spans including CRLF, or
/// `None` if no full line is buffered yet.
fn parse_request_line(data: &[u8]) -> Result<Option<(RequestLine, usize)>, RequestError> {
    let Some(idx) = find_crlf(data) else {
        return Ok(None);
    };
    let request_line = request_line_from_bytes(&data[..idx])?;
    Ok(Some((request_line, idx + CRLF.len())))
}

/// Only the method and version tokens are checked; the target is taken as
/// is, with invalid UTF-8 replaced.
fn request_line_from_bytes(line: &[u8]) -> Result<RequestLine, RequestError> {
    let malformed = || RequestError::MalformedStartLine(String::from_utf8_lossy(line).into_owned());

    let parts: Vec<&[u8]> = line.split(|b| *b == b' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(malformed());
    };

    if method.is_empty() || !method.iter().all(|b| b.is_ascii_uppercase()) {
        return Err(RequestError::InvalidMethod(
            String::from_utf8_lossy(method).into_owned(),
        ));
    }

    let Some(slash) = version.iter().position(|b| *b == b'/') else {
        return Err(malformed());
    };
    let (scheme, number) = (&version[..slash], &version[slash + 1..]);
    if number.contains(&b'/') {
        return Err(malformed());
    }
    if scheme != SUPPORTED_SCHEME.as_bytes() || number != SUPPORTED_VERSION.as_bytes() {
        return Err(RequestError::UnsupportedVersion(
            String::from_utf8_lossy(version).into_owned(),
        ));
    }

    Ok(RequestLine {
        method: String::from_utf8_lossy(method).into_owned(),
        target: String::from_utf8_lossy(target).into_owned(),
        version: SUPPORTED_VERSION.to_string(),
    })
}
