use std::sync::Arc;
use std::time::Duration;

use greyling_bloom::BloomRing;
use greyling_net::Frame;
use greyling_queue::UpdateSender;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::session::{run_session, PeerWriter};
use crate::state::{Backoff, PeerLinkState};

/// Owns one outbound peer link and its reconnect loop, per §4.5's state
/// machine: `Disconnected -> Connected -> InSync`, with exponential
/// backoff (capped at 60s) between attempts. Peer links are symmetric —
/// the same frames flow in both directions — so a `SyncManager` is also
/// the thing an inbound connection from that peer is handed off to via
/// [`SyncManager::adopt_inbound`].
pub struct SyncManager {
    addr: String,
    ring: Arc<BloomRing>,
    queue_tx: UpdateSender,
    aggregate_interval: Duration,
    state: RwLock<PeerLinkState>,
    writer: RwLock<Option<PeerWriter>>,
}

impl SyncManager {
    pub fn new(
        addr: String,
        ring: Arc<BloomRing>,
        queue_tx: UpdateSender,
        aggregate_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(SyncManager {
            addr,
            ring,
            queue_tx,
            aggregate_interval,
            state: RwLock::new(PeerLinkState::Disconnected),
            writer: RwLock::new(None),
        })
    }

    pub async fn link_state(&self) -> PeerLinkState {
        *self.state.read().await
    }

    /// Sends one operational update to this peer if currently connected.
    /// Fire-and-forget: a disconnected peer simply misses it, and catches
    /// up on reconnect via the next aggregate sync.
    pub async fn send_operational(&self, frame: &Frame) {
        let writer = self.writer.read().await;
        if let Some(w) = writer.as_ref() {
            if let Err(e) = w.send(frame).await {
                warn!(peer = %self.addr, error = %e, "operational send failed");
            }
        }
    }

    /// Runs the dial loop forever: connect, run the session to
    /// completion, then reconnect after a backoff delay. Intended to be
    /// spawned as its own task for the lifetime of the server.
    pub async fn run(self: Arc<Self>) {
        let mut backoff = Backoff::default();
        loop {
            *self.state.write().await = PeerLinkState::Disconnected;
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => {
                    info!(peer = %self.addr, "connected to peer");
                    backoff.reset();
                    self.run_connected(stream).await;
                }
                Err(e) => {
                    warn!(peer = %self.addr, error = %e, "peer connect failed");
                }
            }
            let delay = backoff.next_delay();
            tokio::time::sleep(delay).await;
        }
    }

    async fn run_connected(&self, stream: TcpStream) {
        *self.state.write().await = PeerLinkState::Connected;
        let this_writer = &self.writer;
        let state = &self.state;
        let addr = &self.addr;
        run_session(
            stream,
            self.ring.clone(),
            self.queue_tx.clone(),
            self.aggregate_interval,
            |w| {
                // Closures passed to `run_session` must be synchronous, so
                // stash the writer with `try_write`: nothing else holds
                // this lock across an await at this point in the call.
                if let Ok(mut guard) = this_writer.try_write() {
                    *guard = Some(w);
                }
                if let Ok(mut guard) = state.try_write() {
                    *guard = PeerLinkState::InSync;
                }
            },
        )
        .await;
        info!(peer = %addr, "peer session ended");
        *self.writer.write().await = None;
    }

}

/// Accepts inbound peer connections and runs each against the shared
/// ring/queue. Peer links are symmetric: an inbound connection applies
/// frames exactly as an outbound [`SyncManager::run`] session would,
/// it just isn't the side driving the reconnect loop. The connecting
/// peer's own `SyncManager` handles backoff and reconnection.
pub async fn accept_peer_connections(
    listener: TcpListener,
    ring: Arc<BloomRing>,
    queue_tx: UpdateSender,
    aggregate_interval: Duration,
) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                warn!(error = %e, "peer listener accept interrupted, retrying");
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "peer listener accept failed, shutting down");
                return;
            }
        };
        info!(peer = %remote, "accepted inbound peer connection");
        let ring = ring.clone();
        let queue_tx = queue_tx.clone();
        tokio::spawn(async move {
            run_session(stream, ring, queue_tx, aggregate_interval, |_w| {}).await;
            info!(peer = %remote, "inbound peer session ended");
        });
    }
}
