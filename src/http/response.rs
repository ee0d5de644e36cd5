//! Response serialization.
//!
//! A [`ResponseWriter`] writes straight onto the connection and enforces
//! the order of the sections: status line, then headers, then either a
//! fixed body or a chunked body followed by trailers. Calling an operation
//! in the wrong section returns [`WriterError::InvalidState`] and writes
//! nothing.

use std::fmt;
use std::io;

use async_std::io::Write;
use async_std::prelude::*;
use thiserror::Error;

use crate::http::CRLF;
use crate::http::headers::HeaderMap;
use crate::http::status::StatusCode;

const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    StatusLine,
    Headers,
    Body,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriterState::StatusLine => "status line",
            WriterState::Headers => "headers",
            WriterState::Body => "body",
        })
    }
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("cannot {operation} while in the {state} state")]
    InvalidState {
        operation: &'static str,
        state: WriterState,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Headers every plain response starts from.
///
/// Switching to chunked transfer means removing `Content-Length` and
/// setting `Transfer-Encoding: chunked` on the returned map.
pub fn default_headers(content_length: usize) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.set("Content-Length", &content_length.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}

pub struct ResponseWriter<'a> {
    state: WriterState,
    sink: &'a mut (dyn Write + Unpin + Send),
}

impl<'a> ResponseWriter<'a> {
    pub fn new(sink: &'a mut (dyn Write + Unpin + Send)) -> Self {
        Self {
            state: WriterState::StatusLine,
            sink,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), WriterError> {
        self.expect_state(WriterState::StatusLine, "write the status line")?;
        let line = format!("HTTP/1.1 {} {}\r\n", status.as_u16(), status.reason());
        self.sink.write_all(line.as_bytes()).await?;
        self.state = WriterState::Headers;
        Ok(())
    }

    pub async fn write_headers(&mut self, headers: &HeaderMap) -> Result<(), WriterError> {
        self.expect_state(WriterState::Headers, "write headers")?;
        self.write_field_block(headers).await?;
        self.state = WriterState::Body;
        Ok(())
    }

    /// Writes a complete fixed-length body. The writer is then ready for a
    /// new status line.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, WriterError> {
        self.expect_state(WriterState::Body, "write the body")?;
        self.sink.write_all(body).await?;
        self.sink.flush().await?;
        self.state = WriterState::StatusLine;
        Ok(body.len())
    }

    /// Writes one chunk: hex length, CRLF, the bytes, CRLF. Returns the
    /// number of bytes put on the wire.
    ///
    /// An empty slice writes nothing, since a zero-length chunk would end
    /// the body.
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<usize, WriterError> {
        self.expect_state(WriterState::Body, "write a body chunk")?;
        if chunk.is_empty() {
            return Ok(0);
        }
        let size_line = format!("{:x}\r\n", chunk.len());
        self.sink.write_all(size_line.as_bytes()).await?;
        self.sink.write_all(chunk).await?;
        self.sink.write_all(CRLF).await?;
        Ok(size_line.len() + chunk.len() + CRLF.len())
    }

    /// Writes the zero-length chunk. Stays in the body state so trailers
    /// can follow.
    pub async fn write_chunked_body_done(&mut self) -> Result<usize, WriterError> {
        self.expect_state(WriterState::Body, "finish the chunked body")?;
        self.sink.write_all(LAST_CHUNK).await?;
        self.sink.flush().await?;
        Ok(LAST_CHUNK.len())
    }

    /// Writes trailer fields and the closing blank line.
    ///
    /// The fields should have been announced in a `Trailer` header; that is
    /// not checked here.
    pub async fn write_trailers(&mut self, trailers: &HeaderMap) -> Result<(), WriterError> {
        self.expect_state(WriterState::Body, "write trailers")?;
        self.write_field_block(trailers).await?;
        self.sink.flush().await?;
        self.state = WriterState::StatusLine;
        Ok(())
    }

    async fn write_field_block(&mut self, fields: &HeaderMap) -> Result<(), WriterError> {
        let mut block = fields.stringify();
        block.push_str("\r\n");
        self.sink.write_all(block.as_bytes()).await?;
        Ok(())
    }

    fn expect_state(&self, expected: WriterState, operation: &'static str) -> Result<(), WriterError> {
        if self.state != expected {
            return Err(WriterError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal chunked-body decoder: returns the payload and whatever
    /// follows the last chunk.
    fn decode_chunked(mut wire: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut body = Vec::new();
        loop {
            let line_end = wire.windows(2).position(|w| w == b"\r\n").unwrap();
            let size_str = std::str::from_utf8(&wire[..line_end]).unwrap();
            let size = usize::from_str_radix(size_str, 16).unwrap();
            wire = &wire[line_end + 2..];
            if size == 0 {
                return (body, wire.to_vec());
            }
            body.extend_from_slice(&wire[..size]);
            assert_eq!(&wire[size..size + 2], b"\r\n");
            wire = &wire[size + 2..];
        }
    }

    #[async_std::test]
    async fn writes_fixed_length_response() {
        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        let mut headers = HeaderMap::new();
        headers.set("Content-Length", "5");

        writer.write_status_line(StatusCode::OK).await.unwrap();
        writer.write_headers(&headers).await.unwrap();
        assert_eq!(writer.write_body(b"hello").await.unwrap(), 5);
        assert_eq!(writer.state(), WriterState::StatusLine);

        assert_eq!(
            sink,
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec()
        );
    }

    #[async_std::test]
    async fn status_line_uses_reason_table() {
        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        writer.write_status_line(StatusCode::BAD_REQUEST).await.unwrap();
        assert_eq!(sink, b"HTTP/1.1 400 Bad Request\r\n".to_vec());

        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        writer.write_status_line(StatusCode(299)).await.unwrap();
        assert_eq!(sink, b"HTTP/1.1 299 \r\n".to_vec());
    }

    #[async_std::test]
    async fn rejects_out_of_order_calls() {
        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        let headers = default_headers(0);

        assert!(matches!(
            writer.write_headers(&headers).await,
            Err(WriterError::InvalidState { state: WriterState::StatusLine, .. })
        ));
        assert!(writer.write_body(b"x").await.is_err());
        assert!(writer.write_chunked_body(b"x").await.is_err());
        assert!(writer.write_chunked_body_done().await.is_err());
        assert!(writer.write_trailers(&headers).await.is_err());

        writer.write_status_line(StatusCode::OK).await.unwrap();
        assert!(writer.write_status_line(StatusCode::OK).await.is_err());
        assert!(matches!(
            writer.write_body(b"x").await,
            Err(WriterError::InvalidState { state: WriterState::Headers, .. })
        ));

        writer.write_headers(&headers).await.unwrap();
        assert!(writer.write_headers(&headers).await.is_err());

        assert_eq!(sink, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\nContent-Type: text/plain\r\n\r\n".to_vec());
    }

    #[async_std::test]
    async fn chunked_body_round_trips() {
        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        writer.write_status_line(StatusCode::OK).await.unwrap();
        writer.write_headers(&HeaderMap::new()).await.unwrap();

        let pieces: [&[u8]; 4] = [b"ab", b"cde", &[0xff; 300], b"\r\n"];
        for piece in pieces {
            writer.write_chunked_body(piece).await.unwrap();
        }
        writer.write_chunked_body_done().await.unwrap();
        assert_eq!(writer.state(), WriterState::Body);

        let body_start = b"HTTP/1.1 200 OK\r\n\r\n".len();
        let (body, rest) = decode_chunked(&sink[body_start..]);
        assert_eq!(body, pieces.concat());
        assert_eq!(rest, b"\r\n".to_vec());
    }

    #[async_std::test]
    async fn empty_chunk_does_not_end_body() {
        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        writer.write_status_line(StatusCode::OK).await.unwrap();
        writer.write_headers(&HeaderMap::new()).await.unwrap();

        writer.write_chunked_body(b"ab").await.unwrap();
        assert_eq!(writer.write_chunked_body(b"").await.unwrap(), 0);
        writer.write_chunked_body(b"cd").await.unwrap();
        writer.write_chunked_body_done().await.unwrap();

        let body_start = b"HTTP/1.1 200 OK\r\n\r\n".len();
        let (body, rest) = decode_chunked(&sink[body_start..]);
        assert_eq!(body, b"abcd".to_vec());
        assert_eq!(rest, b"\r\n".to_vec());
    }

    #[async_std::test]
    async fn empty_chunk_still_checks_state() {
        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        assert!(matches!(
            writer.write_chunked_body(b"").await,
            Err(WriterError::InvalidState { state: WriterState::StatusLine, .. })
        ));
    }

    #[async_std::test]
    async fn chunk_sizes_are_lowercase_hex() {
        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        writer.write_status_line(StatusCode::OK).await.unwrap();
        writer.write_headers(&HeaderMap::new()).await.unwrap();
        let written = writer.write_chunked_body(&[b'a'; 26]).await.unwrap();
        assert_eq!(written, 4 + 26 + 2);
        let expected = [b"1a\r\n".as_slice(), &[b'a'; 26][..], b"\r\n".as_slice()].concat();
        assert!(sink.ends_with(&expected));
    }

    #[async_std::test]
    async fn trailers_follow_last_chunk() {
        let mut sink: Vec<u8> = Vec::new();
        let mut writer = ResponseWriter::new(&mut sink);
        writer.write_status_line(StatusCode::OK).await.unwrap();
        writer.write_headers(&HeaderMap::new()).await.unwrap();
        writer.write_chunked_body(b"hi").await.unwrap();
        writer.write_chunked_body_done().await.unwrap();

        let mut trailers = HeaderMap::new();
        trailers.set("X-Content-Length", "2");
        writer.write_trailers(&trailers).await.unwrap();
        assert_eq!(writer.state(), WriterState::StatusLine);

        assert!(sink.ends_with(b"2\r\nhi\r\n0\r\n\r\nX-Content-Length: 2\r\n\r\n"));
    }

    #[test]
    fn default_headers_describe_plain_text() {
        let headers = default_headers(42);
        assert_eq!(headers.get("content-length"), Some("42"));
        assert_eq!(headers.get("connection"), Some("close"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }
}
