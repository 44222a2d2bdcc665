use std::sync::Arc;
use std::time::Duration;

use greyling_bloom::BloomRing;
use greyling_net::Frame;
use greyling_queue::{UpdateMsg, UpdateSender};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A handle for sending frames to one connected peer. Operational sends
/// and aggregate sends share the same socket and the same mutex, so they
/// never interleave their bytes — the mutex is the "no torn frames on the
/// wire" guarantee, not a concurrency-control mechanism for the ring.
#[derive(Clone)]
pub struct PeerWriter {
    half: Arc<Mutex<OwnedWriteHalf>>,
}

impl PeerWriter {
    pub async fn send(&self, frame: &Frame) -> std::io::Result<()> {
        let mut half = self.half.lock().await;
        half.write_all(&frame.encode()).await
    }
}

async fn send_aggregate(writer: &PeerWriter, ring: &BloomRing) -> std::io::Result<()> {
    let snapshots = ring.snapshot_all().await;
    for (i, payload) in snapshots.into_iter().enumerate() {
        writer
            .send(&Frame::Aggregate {
                filter_index: i as u8,
                payload,
            })
            .await?;
    }
    Ok(())
}

/// Runs one peer connection to completion: sends the initial aggregate,
/// then concurrently reads incoming frames (applying them to the local
/// queue) and periodically resends the aggregate to re-converge after any
/// dropped operational updates. Returns once the connection drops, after
/// which the caller should reconnect.
///
/// `on_writer` is called with a [`PeerWriter`] as soon as the connection
/// is usable, so the caller can route operational sends to it while this
/// function is still running the read/resync loop.
pub async fn run_session(
    stream: TcpStream,
    ring: Arc<BloomRing>,
    queue_tx: UpdateSender,
    aggregate_interval: Duration,
    on_writer: impl FnOnce(PeerWriter),
) {
    let (mut read_half, write_half) = stream.into_split();
    let writer = PeerWriter {
        half: Arc::new(Mutex::new(write_half)),
    };

    if let Err(e) = send_aggregate(&writer, &ring).await {
        warn!(error = %e, "initial aggregate send failed");
        return;
    }
    on_writer(writer.clone());

    let reader = async {
        let mut buf = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];
        loop {
            let n = match read_half.read(&mut chunk).await {
                Ok(0) => {
                    debug!("peer closed connection");
                    return;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "peer read failed");
                    return;
                }
            };
            buf.extend_from_slice(&chunk[..n]);

            loop {
                match Frame::decode(&buf) {
                    Ok(Some((frame, consumed))) => {
                        apply_incoming(&queue_tx, frame);
                        buf.drain(..consumed);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "malformed peer frame, dropping connection");
                        return;
                    }
                }
            }
        }
    };

    let resync = async {
        let mut ticker = tokio::time::interval(aggregate_interval);
        ticker.tick().await; // first tick fires immediately; already sent above
        loop {
            ticker.tick().await;
            if let Err(e) = send_aggregate(&writer, &ring).await {
                warn!(error = %e, "periodic aggregate resend failed");
                return;
            }
        }
    };

    tokio::select! {
        _ = reader => {}
        _ = resync => {}
    }
}

fn apply_incoming(queue_tx: &UpdateSender, frame: Frame) {
    let msg = match frame {
        Frame::Operational(d) => UpdateMsg::AbsoluteUpdate(d),
        Frame::Aggregate { filter_index, payload } => UpdateMsg::SyncAggregate {
            filter_index: filter_index as usize,
            payload,
        },
    };
    if queue_tx.try_put(msg).is_err() {
        warn!("update queue full, dropped an incoming peer frame");
    }
}
