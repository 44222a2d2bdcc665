//! Peer replication (C5): keeps the bloom ring converged across
//! instances sharing the same greylisting decision, via operational
//! (single-digest, fire-and-forget) and aggregate (full-filter snapshot)
//! sync, over the wire format in [`greyling_net::Frame`].

mod manager;
mod session;
mod state;

pub use manager::{accept_peer_connections, SyncManager};
pub use session::{run_session, PeerWriter};
pub use state::{Backoff, PeerLinkState};
