//! The decision engine (C6): `classify(triple) -> verdict`, per §4.6.

use std::sync::Arc;
use std::time::Duration;

use greyling_admin::{AcctEvent, AccountingSink};
use greyling_base::{fingerprint, Triple};
use greyling_bloom::BloomRing;
use greyling_net::Frame;
use greyling_oracle::{OracleVerdict, ReputationOracle};
use greyling_queue::{UpdateMsg, UpdateSender};
use greyling_sync::{PeerLinkState, SyncManager};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Gray,
    Trust,
}

impl From<Verdict> for greyling_proto::Verdict {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Match => greyling_proto::Verdict::Match,
            Verdict::Gray => greyling_proto::Verdict::Gray,
            Verdict::Trust => greyling_proto::Verdict::Trust,
        }
    }
}

/// Everything `classify` needs, bundled so a worker only carries one
/// `Arc<Engine>` rather than four separate handles.
pub struct Engine {
    ring: Arc<BloomRing>,
    queue_tx: UpdateSender,
    oracle: Option<Arc<dyn ReputationOracle>>,
    oracle_timeout: Duration,
    peer: Option<Arc<SyncManager>>,
    update_always: bool,
    accounting: Arc<dyn AccountingSink>,
}

impl Engine {
    pub fn new(
        ring: Arc<BloomRing>,
        queue_tx: UpdateSender,
        oracle: Option<Arc<dyn ReputationOracle>>,
        oracle_timeout: Duration,
        peer: Option<Arc<SyncManager>>,
        update_always: bool,
        accounting: Arc<dyn AccountingSink>,
    ) -> Self {
        Engine {
            ring,
            queue_tx,
            oracle,
            oracle_timeout,
            peer,
            update_always,
            accounting,
        }
    }

    /// `classify(triple) -> verdict`, per §4.6 steps 1-6. Enqueues an
    /// update and (if the peer link is up) an operational sync as a side
    /// effect of a non-TRUST verdict or `update_always`; never lets those
    /// side effects change the returned verdict.
    pub async fn classify(&self, triple: &Triple) -> Verdict {
        let d = fingerprint(triple);

        let verdict = if self.ring.query(&d).await {
            self.accounting.acct(AcctEvent::Match, &triple.canonical());
            Verdict::Match
        } else {
            match &self.oracle {
                Some(oracle) => {
                    self.accounting.acct(AcctEvent::DnsQuery, &triple.client_address);
                    let check = oracle.check(&triple.client_address, self.oracle_timeout);
                    // The engine enforces the deadline itself rather than trusting the
                    // oracle to honor it: on expiry we proceed fail-closed regardless
                    // of whatever verdict the in-flight call eventually produces.
                    match tokio::time::timeout(self.oracle_timeout, check).await {
                        Ok(OracleVerdict::Clean) => {
                            self.accounting.acct(AcctEvent::DnsSkip, &triple.client_address);
                            Verdict::Trust
                        }
                        Ok(OracleVerdict::Suspicious) => {
                            self.accounting.acct(AcctEvent::DnsMatch, &triple.client_address);
                            Verdict::Gray
                        }
                        Ok(OracleVerdict::Timeout) => {
                            self.accounting.acct(AcctEvent::DnsTimeout, &triple.client_address);
                            Verdict::Gray
                        }
                        Ok(OracleVerdict::Error) => Verdict::Gray,
                        Err(_elapsed) => {
                            self.accounting.acct(AcctEvent::DnsTimeout, &triple.client_address);
                            Verdict::Gray
                        }
                    }
                }
                None => Verdict::Gray,
            }
        };

        if verdict != Verdict::Trust || self.update_always {
            self.schedule_update(d).await;
        }

        match verdict {
            Verdict::Gray => self.accounting.acct(AcctEvent::Gray, &triple.canonical()),
            Verdict::Trust => self.accounting.acct(AcctEvent::Trust, &triple.canonical()),
            Verdict::Match => {}
        }

        verdict
    }

    async fn schedule_update(&self, d: greyling_base::Digest) {
        if self.queue_tx.try_put(UpdateMsg::Update(d)).is_err() {
            trace!("update queue full, dropped an update");
        }
        if let Some(peer) = &self.peer {
            if peer.link_state().await != PeerLinkState::Disconnected {
                peer.send_operational(&Frame::Operational(d)).await;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use greyling_admin::TracingSink;
    use greyling_oracle::NullOracle;

    fn engine(
        oracle: Option<Arc<dyn ReputationOracle>>,
        update_always: bool,
    ) -> (Engine, Arc<BloomRing>, greyling_queue::UpdateReceiver) {
        let ring = Arc::new(BloomRing::new(4, 4096));
        let (tx, rx) = greyling_queue::channel(16);
        let engine = Engine::new(
            ring.clone(),
            tx,
            oracle,
            Duration::from_millis(100),
            None,
            update_always,
            Arc::new(TracingSink::new()),
        );
        (engine, ring, rx)
    }

    #[tokio::test]
    async fn first_sight_then_resend_is_match() {
        let (engine, ring, mut rx) = engine(None, false);
        let t = Triple::new("10.0.0.1", "a@x", "b@y");
        assert_eq!(engine.classify(&t).await, Verdict::Gray);
        rx.drain(&ring).await;
        assert_eq!(engine.classify(&t).await, Verdict::Match);
    }

    #[tokio::test]
    async fn no_oracle_configured_is_gray() {
        let (engine, _ring, _rx) = engine(None, false);
        let t = Triple::new("10.0.0.1", "a@x", "b@y");
        assert_eq!(engine.classify(&t).await, Verdict::Gray);
    }

    #[tokio::test]
    async fn oracle_clean_is_trust_and_does_not_update() {
        let oracle: Arc<dyn ReputationOracle> = Arc::new(NullOracle(OracleVerdict::Clean));
        let (engine, ring, mut rx) = engine(Some(oracle), false);
        let t = Triple::new("10.0.0.2", "a@x", "b@y");
        assert_eq!(engine.classify(&t).await, Verdict::Trust);
        rx.drain(&ring).await;
        let d = fingerprint(&t);
        assert!(!ring.query(&d).await);
    }

    #[tokio::test]
    async fn oracle_timeout_is_fail_closed_gray() {
        struct SlowOracle;
        #[async_trait::async_trait]
        impl ReputationOracle for SlowOracle {
            async fn check(&self, _c: &str, timeout: Duration) -> OracleVerdict {
                tokio::time::sleep(timeout * 2).await;
                OracleVerdict::Clean
            }
        }
        let oracle: Arc<dyn ReputationOracle> = Arc::new(SlowOracle);
        let (engine, _ring, _rx) = engine(Some(oracle), false);
        let t = Triple::new("10.0.0.3", "a@x", "b@y");
        assert_eq!(engine.classify(&t).await, Verdict::Gray);
    }

    #[tokio::test]
    async fn update_always_updates_even_on_trust() {
        let oracle: Arc<dyn ReputationOracle> = Arc::new(NullOracle(OracleVerdict::Clean));
        let (engine, ring, mut rx) = engine(Some(oracle), true);
        let t = Triple::new("10.0.0.4", "a@x", "b@y");
        assert_eq!(engine.classify(&t).await, Verdict::Trust);
        rx.drain(&ring).await;
        let d = fingerprint(&t);
        assert!(ring.query(&d).await);
    }
}
