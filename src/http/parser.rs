use thiserror::Error;

use crate::http::headers::Headers;
use crate::http::request::{BodyFraming, Method, Request};
use crate::http::response::ResponseHead;

/// Largest request or response head accepted, in bytes.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid request line")]
    InvalidRequest,
    #[error("invalid method token")]
    InvalidMethod,
    #[error("invalid header line")]
    InvalidHeader,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("invalid chunked body")]
    InvalidChunk,
    #[error("message head exceeds 64 KiB")]
    HeadersTooLarge,
    #[error("invalid status line")]
    InvalidStatus,
    #[error("incomplete message")]
    Incomplete,
}

/// Parses one request head from the front of `buf`.
///
/// Returns the request and the number of bytes its head occupied. The body
/// is not read here: bytes after the head stay in the caller's buffer and
/// `Request::body` says how far they extend.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    // Stray CRLFs between pipelined requests are ignored
    let skipped = buf
        .iter()
        .take_while(|b| **b == b'\r' || **b == b'\n')
        .count();
    let buf = &buf[skipped..];

    let headers_end = locate_head(buf)?;
    let headers_str =
        std::str::from_utf8(&buf[..headers_end]).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    let headers = parse_header_lines(lines)?;
    let body = body_framing(&headers)?;

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body,
    };

    Ok((request, skipped + headers_end + 4))
}

/// Chunked coding wins over `Content-Length` when both are present.
fn body_framing(headers: &Headers) -> Result<BodyFraming, ParseError> {
    if headers.has_token("Transfer-Encoding", "chunked") {
        return Ok(BodyFraming::Chunked);
    }

    let length = headers
        .get("Content-Length")
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| ParseError::InvalidContentLength)
        })
        .transpose()?;

    Ok(match length {
        Some(0) | None => BodyFraming::Empty,
        Some(len) => BodyFraming::Length(len),
    })
}

/// Parses a response status line and headers from the front of `buf`.
///
/// Returns the head and the number of bytes it occupied; body bytes are left
/// to the caller.
pub fn parse_response_head(buf: &[u8]) -> Result<(ResponseHead, usize), ParseError> {
    let headers_end = locate_head(buf)?;
    let head_str =
        std::str::from_utf8(&buf[..headers_end]).map_err(|_| ParseError::InvalidStatus)?;

    let mut lines = head_str.split("\r\n");
    let status_line = lines.next().ok_or(ParseError::InvalidStatus)?;
    let mut parts = status_line.splitn(3, ' ');

    let version = parts.next().ok_or(ParseError::InvalidStatus)?;
    if !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidStatus);
    }

    let code = parts.next().ok_or(ParseError::InvalidStatus)?;
    if code.len() != 3 {
        return Err(ParseError::InvalidStatus);
    }
    let status = code.parse::<u16>().map_err(|_| ParseError::InvalidStatus)?;
    let reason = parts.next().unwrap_or("");

    let headers = parse_header_lines(lines)?;

    let head = ResponseHead {
        version: version.to_string(),
        status,
        reason: reason.to_string(),
        headers,
    };

    Ok((head, headers_end + 4))
}

fn parse_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Headers, ParseError> {
    let mut headers = Headers::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::InvalidHeader);
        }

        headers.append(key, value.trim());
    }

    Ok(headers)
}

/// Offset of the `\r\n\r\n` terminating the head.
fn locate_head(buf: &[u8]) -> Result<usize, ParseError> {
    match find_headers_end(buf) {
        Some(end) if end > MAX_HEAD_BYTES => Err(ParseError::HeadersTooLarge),
        Some(end) => Ok(end),
        None if buf.len() > MAX_HEAD_BYTES => Err(ParseError::HeadersTooLarge),
        None => Err(ParseError::Incomplete),
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
