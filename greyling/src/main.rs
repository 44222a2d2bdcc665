//! The `greylingd` daemon: binds config, bloom ring, update queue,
//! syncmgr, reputation oracle, and server front-end together and runs
//! them to completion under the tokio runtime.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use greyling_admin::{init_tracing, wait_for_shutdown_signal, Config, Transport, TracingSink};
use greyling_bloom::BloomRing;
use greyling_engine::Engine;
use greyling_oracle::{DnsBlocklist, ReputationOracle};
use greyling_proto::{DatagramCodec, StreamCodec};
use greyling_server::{run_datagram_server, run_stream_server, Context};
use greyling_sync::{accept_peer_connections, SyncManager};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::Semaphore;
use tracing::info;

#[derive(Parser)]
#[command(name = "greylingd")]
#[command(about = "Greylisting SMTP decision service", long_about = None)]
struct Cli {
    /// Path to a TOML config file; defaults are used for any field it omits.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run attached to the terminal instead of as a supervised daemon.
    /// Rust has no native double-fork primitive; running in the
    /// foreground either way, this flag only controls log destination
    /// expectations for operators used to the C original's daemonization.
    #[arg(long)]
    foreground: bool,
}

fn load_config(path: Option<&PathBuf>) -> greyling_base::Result<Config> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .map_err(|e| greyling_base::err(format!("reading {}: {e}", p.display())))?;
            Config::from_toml_str(&text)
        }
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> greyling_base::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_ref())?;
    info!(foreground = cli.foreground, transport = ?config.transport, "starting greylingd");

    let ring = Arc::new(BloomRing::new(config.ring_size, config.filter_bits));
    let (update_tx, update_rx) = greyling_queue::channel(config.update_queue_capacity);
    let accounting = Arc::new(TracingSink::new());

    let oracle: Option<Arc<dyn ReputationOracle>> = if config.oracle_enabled {
        Some(Arc::new(DnsBlocklist::new(config.oracle_zone.clone())))
    } else {
        None
    };

    let peer = match (&config.peer_host, config.peer_port) {
        (Some(host), Some(port)) => Some(SyncManager::new(
            format!("{host}:{port}"),
            ring.clone(),
            update_tx.clone(),
            std::time::Duration::from_secs(config.aggregate_sync_interval_secs),
        )),
        _ => None,
    };
    if let Some(peer) = &peer {
        tokio::spawn(peer.clone().run());
    }

    let peer_listen_addr = format!("{}:{}", config.peer_listen_host, config.peer_listen_port);
    let peer_listener = TcpListener::bind(&peer_listen_addr)
        .await
        .map_err(|e| greyling_base::err(format!("binding {peer_listen_addr}: {e}")))?;
    info!(addr = %peer_listen_addr, "listening for inbound peer connections");
    tokio::spawn(accept_peer_connections(
        peer_listener,
        ring.clone(),
        update_tx.clone(),
        std::time::Duration::from_secs(config.aggregate_sync_interval_secs),
    ));

    let engine = Arc::new(Engine::new(
        ring.clone(),
        update_tx.clone(),
        oracle,
        config.oracle_timeout(),
        peer,
        config.update_always,
        accounting.clone(),
    ));

    let consumer_ring = ring.clone();
    let (shutdown_consumer_tx, shutdown_consumer_rx) = tokio::sync::oneshot::channel();
    let consumer = tokio::spawn(async move {
        update_rx
            .run_until_shutdown(&consumer_ring, async {
                let _ = shutdown_consumer_rx.await;
            })
            .await;
    });

    let rotation_tx = update_tx.clone();
    let rotation_interval = config.rotation_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(rotation_interval);
        ticker.tick().await; // first tick is immediate; skip it
        loop {
            ticker.tick().await;
            rotation_tx
                .put_blocking(greyling_queue::UpdateMsg::Rotate)
                .await;
        }
    });

    let semaphore = Arc::new(Semaphore::new(config.max_workers));
    let listen_addr = format!("{}:{}", config.listen_host, config.listen_port);

    match config.transport {
        Transport::Stream => {
            let ctx = Arc::new(Context {
                engine,
                codec: Arc::new(StreamCodec),
                semaphore: semaphore.clone(),
                accounting: accounting.clone(),
            });
            let listener = TcpListener::bind(&listen_addr)
                .await
                .map_err(|e| greyling_base::err(format!("binding {listen_addr}: {e}")))?;
            info!(addr = %listen_addr, "listening (stream)");
            tokio::select! {
                _ = run_stream_server(listener, ctx) => {}
                _ = wait_for_shutdown_signal() => {}
            }
        }
        Transport::Datagram => {
            let ctx = Arc::new(Context {
                engine,
                codec: Arc::new(DatagramCodec),
                semaphore: semaphore.clone(),
                accounting: accounting.clone(),
            });
            let socket = Arc::new(
                UdpSocket::bind(&listen_addr)
                    .await
                    .map_err(|e| greyling_base::err(format!("binding {listen_addr}: {e}")))?,
            );
            info!(addr = %listen_addr, "listening (datagram)");
            tokio::select! {
                _ = run_datagram_server(socket, ctx) => {}
                _ = wait_for_shutdown_signal() => {}
            }
        }
    }

    info!("accept loop stopped, waiting for in-flight workers to finish");
    let _ = semaphore.acquire_many(config.max_workers as u32).await;

    info!("workers drained, flushing update queue");
    let _ = shutdown_consumer_tx.send(());
    let _ = consumer.await;

    info!("shutdown complete");
    Ok(())
}
