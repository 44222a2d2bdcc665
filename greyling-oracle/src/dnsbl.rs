use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, warn};

use crate::{OracleVerdict, ReputationOracle};

/// A DNS-blocklist-backed reputation oracle: reverses the client's IPv4
/// octets, queries `a.b.c.d.zone` for an A record, and treats any answer
/// as "listed" (suspicious) and NXDOMAIN as "clean" — the conventional
/// DNSBL query shape.
pub struct DnsBlocklist {
    resolver: TokioAsyncResolver,
    zone: String,
}

impl DnsBlocklist {
    pub fn new(zone: impl Into<String>) -> Self {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        DnsBlocklist {
            resolver,
            zone: zone.into(),
        }
    }

    fn query_name(&self, client_address: &str) -> Option<String> {
        let addr = Ipv4Addr::from_str(client_address).ok()?;
        let [a, b, c, d] = addr.octets();
        Some(format!("{d}.{c}.{b}.{a}.{}", self.zone))
    }
}

#[async_trait::async_trait]
impl ReputationOracle for DnsBlocklist {
    async fn check(&self, client_address: &str, timeout: Duration) -> OracleVerdict {
        let Some(name) = self.query_name(client_address) else {
            warn!(client_address, "not an IPv4 address, cannot query DNSBL");
            return OracleVerdict::Error;
        };

        match tokio::time::timeout(timeout, self.resolver.lookup_ip(name.as_str())).await {
            Ok(Ok(answer)) if answer.iter().next().is_some() => {
                debug!(client_address, "DNSBL match");
                OracleVerdict::Suspicious
            }
            Ok(Ok(_)) => OracleVerdict::Clean,
            Ok(Err(e)) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                OracleVerdict::Clean
            }
            Ok(Err(e)) => {
                warn!(client_address, error = %e, "DNSBL query failed");
                OracleVerdict::Error
            }
            Err(_) => {
                warn!(client_address, "DNSBL query timed out");
                OracleVerdict::Timeout
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_name_reverses_octets() {
        let bl = DnsBlocklist::new("zen.spamhaus.org");
        assert_eq!(
            bl.query_name("192.0.2.1").as_deref(),
            Some("1.2.0.192.zen.spamhaus.org")
        );
    }

    #[test]
    fn non_ipv4_rejected() {
        let bl = DnsBlocklist::new("zen.spamhaus.org");
        assert_eq!(bl.query_name("not-an-ip"), None);
    }
}
