use std::fmt;

use crate::http::headers::Headers;

/// HTTP request methods.
///
/// Methods outside the common set (WebDAV's `PROPFIND`, `PURGE`, ...) are
/// kept verbatim in [`Method::Extension`] and forwarded like any other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// CONNECT - Establish a tunnel
    CONNECT,
    /// TRACE - Message loop-back test
    TRACE,
    /// Any other method token
    Extension(String),
}

/// How a request body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body follows the head
    Empty,
    /// Exactly this many bytes follow (`Content-Length`)
    Length(u64),
    /// `Transfer-Encoding: chunked`; framing is forwarded as is
    Chunked,
}

/// The head of a request from a client.
///
/// The body is not buffered: it stays on the client socket and is streamed
/// upstream according to `body`.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target as sent by the client (e.g. "/teams/jx?x=1")
    pub path: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers, in arrival order
    pub headers: Headers,
    /// Framing of the body that follows the head
    pub body: BodyFraming,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// Method names are case-sensitive; anything that is not an HTTP token
    /// is rejected.
    ///
    /// # Example
    ///
    /// ```
    /// # use basic_auth_proxy::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(
    ///     Method::from_str("PROPFIND"),
    ///     Some(Method::Extension("PROPFIND".to_string()))
    /// );
    /// assert_eq!(Method::from_str("GE(T"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let method = match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            "CONNECT" => Method::CONNECT,
            "TRACE" => Method::TRACE,
            other if is_token(other) => Method::Extension(other.to_string()),
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::CONNECT => "CONNECT",
            Method::TRACE => "TRACE",
            Method::Extension(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 9110 `token`: one or more `tchar`.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

impl Request {
    /// Retrieves a header value by name, case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Determines whether the client connection should stay open after the
    /// response.
    ///
    /// HTTP/1.1 defaults to keep-alive, HTTP/1.0 to close; an explicit
    /// `Connection` header wins.
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_token("Connection", "close") {
            return false;
        }
        if self.headers.has_token("Connection", "keep-alive") {
            return true;
        }
        self.version != "HTTP/1.0"
    }

    /// Whether this is a protocol upgrade handshake (`Connection: Upgrade`
    /// plus an `Upgrade` header).
    pub fn is_upgrade(&self) -> bool {
        self.headers.contains("Upgrade") && self.headers.has_token("Connection", "upgrade")
    }
}
