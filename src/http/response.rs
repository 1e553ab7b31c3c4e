use crate::http::headers::Headers;

/// Status codes the proxy produces on its own.
///
/// Upstream statuses are relayed verbatim through [`ResponseHead`] and never
/// pass through this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 400 Bad Request
    BadRequest,
    /// 502 Bad Gateway
    BadGateway,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use basic_auth_proxy::http::response::StatusCode;
    /// assert_eq!(StatusCode::BadGateway.as_u16(), 502);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::BadRequest => 400,
            StatusCode::BadGateway => 502,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::BadRequest => "Bad Request",
            StatusCode::BadGateway => "Bad Gateway",
        }
    }
}

/// A response generated by the proxy itself, ready to be sent to a client.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use basic_auth_proxy::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::BadGateway)
///     .header("Content-Type", "text/plain")
///     .body(b"upstream unreachable".to_vec())
///     .build();
///
/// assert_eq!(response.headers.get("Content-Length"), Some("20"));
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the final Response.
    ///
    /// Adds Content-Length from the body size unless already present.
    pub fn build(mut self) -> Response {
        if !self.headers.contains("Content-Length") {
            self.headers
                .insert("Content-Length", self.body.len().to_string());
        }

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    /// 400 for requests the parser rejected. Always closes the connection.
    pub fn bad_request() -> Self {
        ResponseBuilder::new(StatusCode::BadRequest)
            .header("Content-Type", "text/plain")
            .header("Connection", "close")
            .body(b"400 Bad Request".to_vec())
            .build()
    }

    /// 502 for an upstream that could not be reached or answered garbage.
    pub fn bad_gateway() -> Self {
        ResponseBuilder::new(StatusCode::BadGateway)
            .header("Content-Type", "text/plain")
            .header("Connection", "close")
            .body(b"502 Bad Gateway\r\n\r\nFailed to connect to upstream server.".to_vec())
            .build()
    }
}

/// Status line and headers of a response read from the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
}

impl ResponseHead {
    /// Whether the client can find the end of this response without the
    /// connection being closed.
    pub fn is_self_delimiting(&self, head_request: bool) -> bool {
        head_request
            || (100..200).contains(&self.status)
            || self.status == 204
            || self.status == 304
            || self.headers.has_token("Transfer-Encoding", "chunked")
            || self.headers.contains("Content-Length")
    }
}
