use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stream,
    Datagram,
}

/// The full configuration surface named in §6. Loaded from a TOML file by
/// [`crate::load_config`]; every field has a sane default so a minimal
/// file (or none at all) still produces a runnable daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bits per bloom filter; must be a power of two and a multiple of 64.
    pub filter_bits: u32,
    /// Number of filters in the ring, `N >= 2`.
    pub ring_size: usize,
    /// Seconds between rotations; `rotation_interval * ring_size` is the
    /// effective greylisting window.
    pub rotation_interval_secs: u64,
    pub max_workers: usize,
    pub update_always: bool,
    pub oracle_enabled: bool,
    pub oracle_timeout_ms: u64,
    /// DNS blocklist zone queried by the reputation oracle, e.g.
    /// `zen.spamhaus.org`.
    pub oracle_zone: String,
    pub peer_host: Option<String>,
    pub peer_port: Option<u16>,
    /// Local address this instance accepts inbound peer links on; without
    /// it, `peer_host`/`peer_port` let this instance dial out but never
    /// accept, so two real instances pointed at each other can't sync.
    pub peer_listen_host: String,
    pub peer_listen_port: u16,
    pub transport: Transport,
    pub listen_host: String,
    pub listen_port: u16,
    /// How often (seconds) the syncmgr resends a full aggregate to the peer.
    pub aggregate_sync_interval_secs: u64,
    /// Bound on the update queue (capacity before a worker's `try_put` fails).
    pub update_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            filter_bits: 1 << 16,
            ring_size: 4,
            rotation_interval_secs: 15 * 60,
            max_workers: 64,
            update_always: false,
            oracle_enabled: false,
            oracle_timeout_ms: 500,
            oracle_zone: "zen.spamhaus.org".to_string(),
            peer_host: None,
            peer_port: None,
            peer_listen_host: "0.0.0.0".to_string(),
            peer_listen_port: 2526,
            transport: Transport::Stream,
            listen_host: "0.0.0.0".to_string(),
            listen_port: 2525,
            aggregate_sync_interval_secs: 60,
            update_queue_capacity: 4096,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, greyling_base::Error> {
        let config: Config = toml::from_str(s).map_err(|e| greyling_base::err(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the fields that `BloomFilter::new`/`BloomRing::new` otherwise
    /// enforce with a bare `assert!`, so a malformed config file produces a
    /// proper error instead of panicking the process on startup.
    pub fn validate(&self) -> Result<(), greyling_base::Error> {
        if !self.filter_bits.is_power_of_two() {
            return Err(greyling_base::err(format!(
                "filter_bits must be a power of two, got {}",
                self.filter_bits
            )));
        }
        if !self.filter_bits.is_multiple_of(64) {
            return Err(greyling_base::err(format!(
                "filter_bits must be a multiple of 64, got {}",
                self.filter_bits
            )));
        }
        if self.ring_size < 2 {
            return Err(greyling_base::err(format!(
                "ring_size must be >= 2, got {}",
                self.ring_size
            )));
        }
        Ok(())
    }

    pub fn rotation_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.rotation_interval_secs)
    }

    pub fn oracle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.oracle_timeout_ms)
    }

    pub fn window(&self) -> std::time::Duration {
        self.rotation_interval() * self.ring_size as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let c = Config::default();
        assert!(c.filter_bits.is_power_of_two());
        assert!(c.ring_size >= 2);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let c = Config::from_toml_str("max_workers = 8\n").unwrap();
        assert_eq!(c.max_workers, 8);
        assert_eq!(c.ring_size, Config::default().ring_size);
    }

    #[test]
    fn rejects_non_power_of_two_filter_bits() {
        let c = Config {
            filter_bits: 100,
            ..Config::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_ring_size_below_two() {
        let c = Config {
            ring_size: 1,
            ..Config::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn from_toml_str_rejects_bad_filter_bits() {
        assert!(Config::from_toml_str("filter_bits = 100\n").is_err());
    }

    #[test]
    fn window_is_interval_times_ring_size() {
        let c = Config {
            ring_size: 4,
            rotation_interval_secs: 900,
            ..Config::default()
        };
        assert_eq!(c.window().as_secs(), 3600);
    }
}
