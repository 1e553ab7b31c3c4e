use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::proxy::{UpstreamResponse, client_gone, inject_credentials, stream_body, tunnel};
use crate::server::listener::ProxyContext;

/// Request target that stops the proxy instead of being forwarded.
pub const SHUTDOWN_PATH: &str = "/shutdown-proxy";

pub struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
    state: ConnectionState,
    context: Arc<ProxyContext>,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Forwarding(Request),
    Upgrading(Request),
    /// A proxy-generated error response; the connection closes after it
    Responding(ResponseWriter),
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, context: Arc<ProxyContext>) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(4096),
            state: ConnectionState::Reading,
            context,
        }
    }

    pub async fn run(&mut self) -> Result<(), ProxyError> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await {
                        Ok(Some(req)) => ConnectionState::Processing(req),
                        Ok(None) => ConnectionState::Closed,
                        Err(ProxyError::MalformedRequest(e)) => {
                            debug!(error = %e, "Rejecting malformed request");
                            ConnectionState::Responding(ResponseWriter::new(&Response::bad_request()))
                        }
                        Err(e) => return Err(e),
                    };
                }

                ConnectionState::Processing(req) => {
                    self.state = self.process(req);
                }

                ConnectionState::Forwarding(req) => {
                    self.state = self.forward(req).await?;
                }

                ConnectionState::Upgrading(req) => {
                    let head = std::mem::take(&mut self.buffer);
                    tunnel::bridge(&mut self.stream, &req, &head, &self.context.upstream).await?;
                }

                ConnectionState::Responding(mut writer) => {
                    writer.write_to_stream(&mut self.stream).await?;
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    pub async fn read_request(&mut self) -> Result<Option<Request>, ProxyError> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.drain(..consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {}

                Err(e) => return Err(ProxyError::MalformedRequest(e)),
            }

            let mut temp = [0u8; 8192];
            let n = self.stream.read(&mut temp).await?;

            if n == 0 {
                // Client closed connection
                return Ok(None);
            }

            self.buffer.extend_from_slice(&temp[..n]);
        }
    }

    /// Routes a request: shutdown, upgrade, or plain forward.
    fn process(&self, mut req: Request) -> ConnectionState {
        if req.path == SHUTDOWN_PATH {
            info!("Terminating proxy");
            self.context.lifecycle.request_shutdown();
            // No response is written; dropping the socket is the answer
            return ConnectionState::Closed;
        }

        let injected = inject_credentials(&mut req.headers, self.context.auth_value.as_deref());
        debug!(method = %req.method, path = %req.path, injected, "Proxying request");

        if req.is_upgrade() {
            self.context.upstream.prepare_request(&mut req);
            ConnectionState::Upgrading(req)
        } else {
            ConnectionState::Forwarding(req)
        }
    }

    async fn forward(&mut self, req: Request) -> Result<ConnectionState, ProxyError> {
        let keep_alive = req.keep_alive();
        let head_request = req.method == Method::HEAD;
        let framing = req.body;
        let method = req.method.clone();
        let path = req.path.clone();

        let upstream = &self.context.upstream;
        let buffer = &mut self.buffer;
        let (mut reader, mut writer) = self.stream.split();

        let sent = async {
            let mut server = upstream.open(req).await?;
            stream_body(&mut reader, &mut *buffer, framing, &mut server).await?;
            Ok::<_, ProxyError>(server)
        };
        let server = match sent.await {
            Ok(server) => server,
            Err(ProxyError::ClientClosed) => {
                debug!(%method, %path, "Client closed mid-request");
                return Ok(ConnectionState::Closed);
            }
            Err(e) => return failure_response(&method, &path, e),
        };

        // The client is watched until the response is through; if it goes
        // away the upstream connection is dropped with the relay.
        let relay = async {
            let response = UpstreamResponse::read(server, head_request).await?;
            let status = response.head.status;
            let reuse = response.relay_to(&mut writer, keep_alive).await?;
            Ok::<_, ProxyError>((status, reuse))
        };
        let relayed = tokio::select! {
            relayed = relay => relayed,
            () = client_gone(&mut reader, buffer) => {
                debug!(%method, %path, "Client went away, abandoning upstream request");
                return Ok(ConnectionState::Closed);
            }
        };

        match relayed {
            Ok((status, reuse)) => {
                debug!(%method, %path, status, "Request forwarded");
                Ok(if reuse {
                    ConnectionState::Reading
                } else {
                    ConnectionState::Closed
                })
            }
            Err(e) => failure_response(&method, &path, e),
        }
    }
}

/// Maps a forwarding failure to the response the client still gets.
fn failure_response(
    method: &Method,
    path: &str,
    e: ProxyError,
) -> Result<ConnectionState, ProxyError> {
    match e {
        ProxyError::MalformedRequest(e) => {
            debug!(%method, %path, error = %e, "Rejecting malformed request body");
            Ok(ConnectionState::Responding(ResponseWriter::new(&Response::bad_request())))
        }
        e if e.is_gateway_failure() => {
            warn!(%method, %path, error = %e, "Upstream request failed");
            Ok(ConnectionState::Responding(ResponseWriter::new(
                &Response::bad_gateway(),
            )))
        }
        e => Err(e),
    }
}
