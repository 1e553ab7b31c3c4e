//! Client-side reads while a request is in flight.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProxyError;
use crate::http::body::BodyTracker;
use crate::http::parser::MAX_HEAD_BYTES;
use crate::http::request::BodyFraming;
use crate::proxy::upstream::BUFFER_SIZE;

/// Copies a request body from the client to the upstream as it arrives.
///
/// `pending` holds bytes already read past the request head. On return it
/// holds whatever followed the body (a pipelined request).
pub async fn stream_body<C, U>(
    client: &mut C,
    pending: &mut Vec<u8>,
    framing: BodyFraming,
    upstream: &mut U,
) -> Result<(), ProxyError>
where
    C: AsyncRead + Unpin,
    U: AsyncWrite + Unpin,
{
    let Some(mut body) = BodyTracker::new(framing) else {
        return Ok(());
    };

    loop {
        let n = body.advance(pending).map_err(ProxyError::MalformedRequest)?;
        if n > 0 {
            upstream.write_all(&pending[..n]).await.map_err(|e| {
                tracing::debug!(error = %e, "Upstream write failed");
                ProxyError::UpstreamClosed
            })?;
            pending.drain(..n);
        }

        if body.is_done() {
            return Ok(());
        }

        pending.reserve(BUFFER_SIZE);
        match client.read_buf(pending).await {
            Ok(0) | Err(_) => return Err(ProxyError::ClientClosed),
            Ok(_) => {}
        }
    }
}

/// Resolves once the client has closed its connection or failed.
///
/// Bytes the client sends meanwhile are appended to `pending`; reading stops
/// once a full request head's worth is buffered.
pub async fn client_gone<C>(client: &mut C, pending: &mut Vec<u8>)
where
    C: AsyncRead + Unpin,
{
    loop {
        if pending.len() >= MAX_HEAD_BYTES {
            std::future::pending::<()>().await;
        }

        pending.reserve(BUFFER_SIZE);
        match client.read_buf(pending).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}
