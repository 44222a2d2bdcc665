//! The reputation-oracle collaborator (§6): `check(client_address, timeout)
//! -> {Suspicious, Clean, Timeout, Error}`. The decision engine treats
//! `Timeout` and `Error` identically — fail-closed toward greylisting.

mod dnsbl;

use std::time::Duration;

pub use dnsbl::DnsBlocklist;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleVerdict {
    Suspicious,
    Clean,
    Timeout,
    Error,
}

/// A collaborator queried by the decision engine before it greylists an
/// unseen triple. Implementations should honor `timeout` and return
/// `OracleVerdict::Timeout` themselves where practical (so the oracle can
/// cancel its own in-flight work, e.g. a DNS query), but the engine does
/// not rely on that alone: it races the call against the same deadline
/// and proceeds fail-closed on expiry regardless of what the call
/// eventually returns.
#[async_trait::async_trait]
pub trait ReputationOracle: Send + Sync {
    async fn check(&self, client_address: &str, timeout: Duration) -> OracleVerdict;
}

/// An oracle that is never configured: always reports `Clean` is wrong
/// (§4.6 step 4 says "if no oracle is configured, verdict = GRAY", which
/// the engine implements by treating `None` specially rather than via
/// this type) — `NullOracle` exists only for tests that want a
/// fast, deterministic stand-in.
pub struct NullOracle(pub OracleVerdict);

#[async_trait::async_trait]
impl ReputationOracle for NullOracle {
    async fn check(&self, _client_address: &str, _timeout: Duration) -> OracleVerdict {
        self.0
    }
}
