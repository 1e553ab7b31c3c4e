//! Upstream connection and request forwarding
//!
//! Every forwarded request opens a fresh connection to the target and asks
//! it to close after responding, so the response body can be streamed back
//! to the client until EOF without re-parsing its framing.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::Target;
use crate::error::ProxyError;
use crate::http::parser::{ParseError, parse_response_head};
use crate::http::request::Request;
use crate::http::response::ResponseHead;
use crate::http::writer::{serialize_request, serialize_response_head};

/// Default buffer size for upstream reads
pub const BUFFER_SIZE: usize = 8192;

/// The fixed origin requests are forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    target: Target,
}

/// An upstream response whose head has been read and whose body is still on
/// the wire.
pub struct UpstreamResponse {
    pub head: ResponseHead,
    stream: TcpStream,
    buffered: BytesMut,
    head_request: bool,
}

impl Upstream {
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    pub async fn connect(&self) -> Result<TcpStream, ProxyError> {
        let addr = self.target.authority();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ProxyError::UpstreamUnreachable { addr, source })?;

        tracing::trace!(upstream = %self.target.authority(), "Connected to upstream");
        Ok(stream)
    }

    /// Adjusts a client request for a one-shot upstream connection.
    ///
    /// `Host` is left as the client sent it and only filled in when missing.
    /// Plain requests get `Connection: close`; upgrade handshakes keep their
    /// `Connection: Upgrade`.
    pub fn prepare_request(&self, request: &mut Request) {
        if !request.headers.contains("Host") {
            request.headers.insert("Host", self.target.authority());
        }

        if !request.is_upgrade() {
            request.headers.insert("Connection", "close");
        }
    }

    /// Opens a fresh connection for `request` and writes its head.
    ///
    /// The body, if any, is left to the caller to stream.
    pub async fn open(&self, mut request: Request) -> Result<TcpStream, ProxyError> {
        self.prepare_request(&mut request);

        let mut stream = self.connect().await?;
        stream
            .write_all(&serialize_request(&request))
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Upstream write failed");
                ProxyError::UpstreamClosed
            })?;

        tracing::trace!("Request head sent to upstream");
        Ok(stream)
    }
}

impl UpstreamResponse {
    /// Waits for the response head on a connection opened by
    /// [`Upstream::open`].
    pub async fn read(mut stream: TcpStream, head_request: bool) -> Result<Self, ProxyError> {
        let mut buffered = BytesMut::with_capacity(BUFFER_SIZE);
        let head = read_response_head(&mut stream, &mut buffered).await?;

        Ok(Self {
            head,
            stream,
            buffered,
            head_request,
        })
    }

    /// Streams the response to the client.
    ///
    /// Returns whether the client connection may carry another request.
    pub async fn relay_to<W>(
        mut self,
        client: &mut W,
        client_keep_alive: bool,
    ) -> Result<bool, ProxyError>
    where
        W: AsyncWrite + Unpin,
    {
        let keep_alive = client_keep_alive && self.head.is_self_delimiting(self.head_request);
        self.head
            .headers
            .insert("Connection", if keep_alive { "keep-alive" } else { "close" });

        client.write_all(&serialize_response_head(&self.head)).await?;
        client.write_all(&self.buffered).await?;
        let streamed = tokio::io::copy(&mut self.stream, client).await?;
        client.flush().await?;

        tracing::trace!(
            bytes = self.buffered.len() as u64 + streamed,
            "Response body relayed"
        );

        Ok(keep_alive)
    }
}

/// Reads until a complete response head is buffered.
///
/// On success the head bytes are consumed from `buffer`; any body bytes read
/// along with them stay in it.
pub async fn read_response_head<R>(
    stream: &mut R,
    buffer: &mut BytesMut,
) -> Result<ResponseHead, ProxyError>
where
    R: AsyncRead + Unpin,
{
    loop {
        match parse_response_head(buffer) {
            Ok((head, consumed)) => {
                buffer.advance(consumed);
                return Ok(head);
            }
            Err(ParseError::Incomplete) => {}
            Err(e) => return Err(ProxyError::InvalidUpstreamResponse(e)),
        }

        let n = stream
            .read_buf(buffer)
            .await
            .map_err(|_| ProxyError::UpstreamClosed)?;

        if n == 0 {
            return Err(ProxyError::UpstreamClosed);
        }
    }
}
