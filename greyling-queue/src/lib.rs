//! The single-consumer update queue (C4): a bounded FIFO of update
//! messages feeding the active filter of a [`greyling_bloom::BloomRing`].
//!
//! Multiple producers enqueue (workers posting `Update`, the rotation
//! timer posting `Rotate`, the syncmgr posting `AbsoluteUpdate`/
//! `SyncAggregate`); exactly one consumer task drains the queue and
//! applies messages to the ring. Ordering from a single producer is
//! preserved by the channel; ordering between different producers is
//! FIFO by enqueue time.

use greyling_base::Digest;
use greyling_bloom::BloomRing;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// A tagged update message, per the data model's `Update message` union.
#[derive(Debug, Clone)]
pub enum UpdateMsg {
    /// A local decision-engine insert.
    Update(Digest),
    /// Advance the ring by one generation.
    Rotate,
    /// A peer's operational sync, applied locally but never re-forwarded.
    AbsoluteUpdate(Digest),
    /// Replay during catch-up after an aggregate sync.
    UpdateOper(Digest),
    /// A bulk filter overwrite from a peer's aggregate sync.
    SyncAggregate { filter_index: usize, payload: Vec<u8> },
}

/// The producer handle. Workers call [`UpdateSender::try_put`] (fails
/// under overflow rather than blocking — the decision the message
/// represents is already logged); the rotation timer calls
/// [`UpdateSender::put_blocking`] (blocks under overflow — losing a
/// rotation tick would widen the greylisting window).
#[derive(Clone)]
pub struct UpdateSender {
    tx: mpsc::Sender<UpdateMsg>,
}

impl UpdateSender {
    /// Non-blocking enqueue. Returns `Ok(())` on success, `Err(msg)` if
    /// the queue is full — the caller should record the miss through the
    /// accounting interface and must not retry.
    pub fn try_put(&self, msg: UpdateMsg) -> Result<(), UpdateMsg> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(m) => m,
            mpsc::error::TrySendError::Closed(m) => m,
        })
    }

    /// Blocking enqueue, used only by the rotation timer.
    pub async fn put_blocking(&self, msg: UpdateMsg) {
        if self.tx.send(msg).await.is_err() {
            warn!("update queue consumer gone, rotation tick dropped");
        }
    }
}

pub struct UpdateReceiver {
    rx: mpsc::Receiver<UpdateMsg>,
}

/// Creates the bounded queue. `capacity` is the number of in-flight
/// messages the channel buffers before a `try_put` fails.
pub fn channel(capacity: usize) -> (UpdateSender, UpdateReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (UpdateSender { tx }, UpdateReceiver { rx })
}

impl UpdateReceiver {
    /// Runs the consumer loop until the queue is closed. This is the only
    /// task that ever mutates `ring`.
    pub async fn run(mut self, ring: &BloomRing) {
        while let Some(msg) = self.rx.recv().await {
            self.apply(ring, msg).await;
        }
    }

    async fn apply(&self, ring: &BloomRing, msg: UpdateMsg) {
        match msg {
            UpdateMsg::Update(d) | UpdateMsg::UpdateOper(d) => {
                trace!(?d, "applying update");
                ring.insert(&d).await;
            }
            UpdateMsg::AbsoluteUpdate(d) => {
                trace!(?d, "applying absolute update");
                ring.insert(&d).await;
            }
            UpdateMsg::Rotate => {
                ring.rotate().await;
            }
            UpdateMsg::SyncAggregate { filter_index, payload } => {
                if let Err(e) = ring.install(filter_index, &payload).await {
                    warn!(error = ?e, filter_index, "failed to install aggregate sync frame");
                }
            }
        }
    }

    /// Drains whatever is already queued without waiting for more,
    /// used during shutdown to flush the update queue before exit.
    pub async fn drain(&mut self, ring: &BloomRing) {
        while let Ok(msg) = self.rx.try_recv() {
            self.apply(ring, msg).await;
        }
    }

    /// The graceful-shutdown variant of [`UpdateReceiver::run`]: applies
    /// messages until `shutdown` resolves, then drains whatever is left
    /// in the queue before returning. `main` uses this so the consumer
    /// task, once joined, is a guarantee the queue has been flushed.
    pub async fn run_until_shutdown(
        mut self,
        ring: &BloomRing,
        shutdown: impl std::future::Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                msg = self.rx.recv() => {
                    match msg {
                        Some(msg) => self.apply(ring, msg).await,
                        None => break,
                    }
                }
                _ = &mut shutdown => break,
            }
        }
        self.drain(ring).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use greyling_base::sha256;

    #[tokio::test]
    async fn update_is_visible_after_apply() {
        let ring = BloomRing::new(4, 1024);
        let (tx, mut rx) = channel(8);
        let d = sha256(b"a b c");
        tx.try_put(UpdateMsg::Update(d)).unwrap();
        rx.drain(&ring).await;
        assert!(ring.query(&d).await);
    }

    #[tokio::test]
    async fn try_put_fails_when_full() {
        let (tx, _rx) = channel(1);
        tx.try_put(UpdateMsg::Rotate).unwrap();
        assert!(tx.try_put(UpdateMsg::Rotate).is_err());
    }

    #[tokio::test]
    async fn run_until_shutdown_drains_before_returning() {
        let ring = BloomRing::new(4, 1024);
        let (tx, rx) = channel(8);
        let d = sha256(b"shutdown drain");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        tx.try_put(UpdateMsg::Update(d)).unwrap();
        shutdown_tx.send(()).unwrap();
        rx.run_until_shutdown(&ring, async {
            let _ = shutdown_rx.await;
        })
        .await;
        assert!(ring.query(&d).await);
    }

    #[tokio::test]
    async fn rotate_message_advances_ring() {
        let ring = BloomRing::new(2, 1024);
        let d = sha256(b"x y z");
        ring.insert(&d).await;
        let (tx, mut rx) = channel(4);
        tx.try_put(UpdateMsg::Rotate).unwrap();
        tx.try_put(UpdateMsg::Rotate).unwrap();
        rx.drain(&ring).await;
        assert!(!ring.query(&d).await);
    }
}
