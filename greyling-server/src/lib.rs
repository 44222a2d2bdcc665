//! Server front-end (C7): accept loop plus per-request worker dispatch,
//! bounded by the worker semaphore, per §4.7.

use std::sync::Arc;

use greyling_admin::{AccountingSink, LogLevel};
use greyling_engine::Engine;
use greyling_proto::ProtocolCodec;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::Semaphore;
use tracing::{error, warn};

/// Shared handles every worker task needs. Constructed once at startup
/// and cloned (cheaply, via `Arc`) into each spawned task — no
/// process-wide singleton.
pub struct Context {
    pub engine: Arc<Engine>,
    pub codec: Arc<dyn ProtocolCodec>,
    pub semaphore: Arc<Semaphore>,
    pub accounting: Arc<dyn AccountingSink>,
}

/// Runs the stream (TCP) accept loop until the listener is dropped or a
/// non-retryable accept error occurs. Per §4.7, EINTR is retried; any
/// other error terminates the loop (and with it, the listener).
pub async fn run_stream_server(listener: TcpListener, ctx: Arc<Context>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                warn!(error = %e, "stream accept interrupted, retrying");
                continue;
            }
            Err(e) => {
                error!(error = %e, "stream accept failed, shutting down listener");
                return;
            }
        };

        let permit = match ctx.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                ctx.accounting
                    .log(LogLevel::Warning, "thread count limit reached");
                drop(stream);
                continue;
            }
        };

        let ctx = ctx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            handle_stream_request(stream, &ctx).await;
            let _ = peer;
        });
    }
}

async fn handle_stream_request(mut stream: tokio::net::TcpStream, ctx: &Context) {
    let mut buf = Vec::with_capacity(256);
    let mut chunk = [0u8; 256];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "stream read failed");
                return;
            }
        };
        buf.extend_from_slice(&chunk[..n]);
        if buf.contains(&b'\n') {
            break;
        }
    }

    let triple = match ctx.codec.decode_request(&buf) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = ?e, "malformed request, dropping connection");
            return;
        }
    };

    let verdict = ctx.engine.classify(&triple).await;
    let reply = ctx.codec.encode_verdict(verdict.into());
    if let Err(e) = stream.write_all(&reply).await {
        warn!(error = %e, "stream write failed");
    }
}

/// Runs the datagram (UDP) accept loop until the socket errors fatally.
/// Each datagram is one self-contained request; the reply datagram is
/// addressed back to the sender. Per §4.7, EINTR is retried; any other
/// error terminates the loop.
pub async fn run_datagram_server(socket: Arc<UdpSocket>, ctx: Arc<Context>) {
    let mut buf = [0u8; 512];
    loop {
        let (n, peer) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                warn!(error = %e, "datagram recv interrupted, retrying");
                continue;
            }
            Err(e) => {
                error!(error = %e, "datagram recv failed, shutting down listener");
                return;
            }
        };

        let permit = match ctx.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                ctx.accounting
                    .log(LogLevel::Warning, "thread count limit reached");
                continue;
            }
        };

        let payload = buf[..n].to_vec();
        let ctx = ctx.clone();
        let socket = socket.clone();
        tokio::spawn(async move {
            let _permit = permit;
            handle_datagram_request(&payload, peer, &socket, &ctx).await;
        });
    }
}

async fn handle_datagram_request(
    payload: &[u8],
    peer: std::net::SocketAddr,
    socket: &UdpSocket,
    ctx: &Context,
) {
    let triple = match ctx.codec.decode_request(payload) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = ?e, "malformed datagram request, dropping");
            return;
        }
    };

    let verdict = ctx.engine.classify(&triple).await;
    let reply = ctx.codec.encode_verdict(verdict.into());
    if let Err(e) = socket.send_to(&reply, peer).await {
        warn!(error = %e, "datagram reply send failed");
    }
}
