//! Shared end-to-end scenario and property-test harness (§8). Exercises
//! whole subsystems wired together the way `greyling/src/main.rs` wires
//! them, rather than any one crate in isolation.

#[cfg(test)]
mod scenarios {
    use std::sync::Arc;
    use std::time::Duration;

    use greyling_admin::TracingSink;
    use greyling_base::{fingerprint, Triple};
    use greyling_bloom::BloomRing;
    use greyling_engine::Engine;
    use greyling_net::Frame;
    use greyling_oracle::{NullOracle, OracleVerdict, ReputationOracle};
    use greyling_queue::UpdateMsg;
    use greyling_sync::SyncManager;
    use tokio::net::TcpListener;

    fn triple(client: &str) -> Triple {
        Triple::new(client, "a@x", "b@y")
    }

    /// S2 — window expiry: after the ring fully cycles with no
    /// intervening insert, a previously-GRAYed triple is GRAY again.
    #[tokio::test]
    async fn s2_window_expiry() {
        let ring = Arc::new(BloomRing::new(2, 4096));
        let (tx, mut rx) = greyling_queue::channel(16);
        let engine = Engine::new(
            ring.clone(),
            tx,
            None,
            Duration::from_millis(100),
            None,
            false,
            Arc::new(TracingSink::new()),
        );

        let t = triple("10.0.0.1");
        assert_eq!(engine.classify(&t).await, greyling_engine::Verdict::Gray);
        rx.drain(&ring).await;
        assert_eq!(engine.classify(&t).await, greyling_engine::Verdict::Match);
        rx.drain(&ring).await;

        // Advance the ring past its full length with no reinsert of `t`.
        for _ in 0..ring.len() {
            ring.rotate().await;
        }

        assert_eq!(engine.classify(&t).await, greyling_engine::Verdict::Gray);
    }

    /// S5 — peer convergence: two ring+engine+syncmgr triples, peer-linked
    /// over real TCP sockets, converge on an operational update within a
    /// bounded delay.
    #[tokio::test]
    async fn s5_peer_convergence() {
        let ring_a = Arc::new(BloomRing::new(4, 4096));
        let ring_b = Arc::new(BloomRing::new(4, 4096));
        let (tx_a, mut rx_a) = greyling_queue::channel(16);
        let (tx_b, mut rx_b) = greyling_queue::channel(16);

        let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr_b = listener_b.local_addr().unwrap();
        tokio::spawn(greyling_sync::accept_peer_connections(
            listener_b,
            ring_b.clone(),
            tx_b.clone(),
            Duration::from_secs(60),
        ));

        let syncmgr_a = SyncManager::new(
            addr_b.to_string(),
            ring_a.clone(),
            tx_a.clone(),
            Duration::from_secs(60),
        );
        tokio::spawn(syncmgr_a.clone().run());

        // Let A's outbound dial connect and register a writer.
        for _ in 0..50 {
            if syncmgr_a.link_state().await != greyling_sync::PeerLinkState::Disconnected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let engine_a = Engine::new(
            ring_a.clone(),
            tx_a,
            None,
            Duration::from_millis(100),
            Some(syncmgr_a),
            false,
            Arc::new(TracingSink::new()),
        );

        let t = triple("10.0.0.9");
        assert_eq!(engine_a.classify(&t).await, greyling_engine::Verdict::Gray);
        rx_a.drain(&ring_a).await;

        let d = fingerprint(&t);
        let mut converged = false;
        for _ in 0..100 {
            rx_b.drain(&ring_b).await;
            if ring_b.query(&d).await {
                converged = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(converged, "peer B never observed A's operational update");

        let engine_b = Engine::new(
            ring_b.clone(),
            tx_b,
            None,
            Duration::from_millis(100),
            None,
            false,
            Arc::new(TracingSink::new()),
        );
        assert_eq!(engine_b.classify(&t).await, greyling_engine::Verdict::Match);
    }

    /// Exercises `Frame`/`UpdateMsg` directly at the boundary the peer
    /// session crosses, independent of the full dial loop above.
    #[tokio::test]
    async fn operational_frame_applies_as_update() {
        let ring = Arc::new(BloomRing::new(4, 4096));
        let (tx, mut rx) = greyling_queue::channel(4);
        let d = fingerprint(&triple("10.0.0.5"));
        tx.try_put(UpdateMsg::AbsoluteUpdate(d)).unwrap();
        rx.drain(&ring).await;
        assert!(ring.query(&d).await);

        // round-trip through the wire encoding too
        let bytes = Frame::Operational(d).encode();
        let (decoded, _) = Frame::decode(&bytes).unwrap().unwrap();
        assert_eq!(decoded, Frame::Operational(d));
    }

    #[tokio::test]
    async fn oracle_error_is_also_fail_closed() {
        struct ErroringOracle;
        #[async_trait::async_trait]
        impl ReputationOracle for ErroringOracle {
            async fn check(&self, _c: &str, _t: Duration) -> OracleVerdict {
                OracleVerdict::Error
            }
        }
        let ring = Arc::new(BloomRing::new(4, 4096));
        let (tx, _rx) = greyling_queue::channel(16);
        let oracle: Arc<dyn ReputationOracle> = Arc::new(ErroringOracle);
        let engine = Engine::new(
            ring,
            tx,
            Some(oracle),
            Duration::from_millis(50),
            None,
            false,
            Arc::new(TracingSink::new()),
        );
        let t = triple("10.0.0.6");
        assert_eq!(engine.classify(&t).await, greyling_engine::Verdict::Gray);
    }

    #[tokio::test]
    async fn null_oracle_suspicious_is_gray_and_updates() {
        let ring = Arc::new(BloomRing::new(4, 4096));
        let (tx, mut rx) = greyling_queue::channel(16);
        let oracle: Arc<dyn ReputationOracle> = Arc::new(NullOracle(OracleVerdict::Suspicious));
        let engine = Engine::new(
            ring.clone(),
            tx,
            Some(oracle),
            Duration::from_millis(50),
            None,
            false,
            Arc::new(TracingSink::new()),
        );
        let t = triple("10.0.0.7");
        assert_eq!(engine.classify(&t).await, greyling_engine::Verdict::Gray);
        rx.drain(&ring).await;
        assert!(ring.query(&fingerprint(&t)).await);
    }
}
