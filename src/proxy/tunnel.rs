//! WebSocket upgrade bridging.
//!
//! The handshake is forwarded like any other request. Once the upstream
//! answers `101 Switching Protocols` the proxy stops interpreting bytes and
//! copies them in both directions until both sides have closed.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProxyError;
use crate::http::request::{Method, Request};
use crate::http::writer::{serialize_request, serialize_response_head};
use crate::proxy::client::client_gone;
use crate::proxy::upstream::{BUFFER_SIZE, Upstream, read_response_head};

const SWITCHING_PROTOCOLS: u16 = 101;

/// Rejects anything other than a `GET` asking for `Upgrade: websocket`.
pub fn validate_upgrade(request: &Request) -> Result<(), ProxyError> {
    if request.method != Method::GET {
        return Err(ProxyError::MalformedUpgrade(format!(
            "{} cannot upgrade",
            request.method
        )));
    }

    match request.header("Upgrade") {
        Some(protocol) if protocol.trim().eq_ignore_ascii_case("websocket") => Ok(()),
        other => Err(ProxyError::MalformedUpgrade(format!(
            "unsupported protocol {:?}",
            other.unwrap_or_default()
        ))),
    }
}

/// Bridges `client` to the upstream.
///
/// `head` holds bytes the client sent after the handshake that were already
/// read off its socket; they are delivered upstream right after it.
pub async fn bridge<C>(
    client: &mut C,
    request: &Request,
    head: &[u8],
    upstream: &Upstream,
) -> Result<(), ProxyError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    validate_upgrade(request)?;

    let mut server = upstream.connect().await?;

    let mut handshake = serialize_request(request);
    handshake.extend_from_slice(head);
    server.write_all(&handshake).await?;

    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    let mut early = Vec::new();
    let response = tokio::select! {
        response = read_response_head(&mut server, &mut buffer) => response?,
        () = client_gone(&mut *client, &mut early) => {
            tracing::debug!(path = %request.path, "Client left during WebSocket handshake");
            return Ok(());
        }
    };

    client.write_all(&serialize_response_head(&response)).await?;
    client.write_all(&buffer).await?;

    if response.status != SWITCHING_PROTOCOLS {
        tracing::warn!(
            status = response.status,
            path = %request.path,
            "Upstream refused WebSocket upgrade"
        );

        // Relay the refusal body, then close
        let declared = response
            .headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok());
        match declared {
            Some(len) => {
                let rest = len.saturating_sub(buffer.len() as u64);
                tokio::io::copy(&mut (&mut server).take(rest), client).await?;
            }
            None => {
                tokio::io::copy(&mut server, client).await?;
            }
        }
        client.flush().await?;
        return Ok(());
    }

    client.flush().await?;
    server.write_all(&early).await?;

    let (to_upstream, to_client) = tokio::io::copy_bidirectional(client, &mut server).await?;

    tracing::debug!(
        path = %request.path,
        to_upstream,
        to_client,
        "WebSocket bridge closed"
    );

    Ok(())
}
