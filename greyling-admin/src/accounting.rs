use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{event, Level};

/// Mirrors the GLOSSARY's log levels. `Insane` has no native `tracing`
/// equivalent below `TRACE`, so it's carried as a field rather than a
/// distinct level — see [`AccountingSink::log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Emerg,
    Alert,
    Crit,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
    Insane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcctEvent {
    Gray,
    Match,
    Trust,
    DnsTimeout,
    DnsMatch,
    DnsSkip,
    DnsQuery,
}

/// Two best-effort, non-blocking operations: `log` and `acct`.
pub trait AccountingSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
    fn acct(&self, event: AcctEvent, message: &str);
}

/// Running counters behind every `acct` call, for inspection (§9's
/// "accounting counters are exposed for inspection" addition). No new
/// network surface — just an in-process snapshot.
#[derive(Debug, Default)]
pub struct Stats {
    gray: AtomicU64,
    r#match: AtomicU64,
    trust: AtomicU64,
    dns_timeout: AtomicU64,
    dns_match: AtomicU64,
    dns_skip: AtomicU64,
    dns_query: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub gray: u64,
    pub r#match: u64,
    pub trust: u64,
    pub dns_timeout: u64,
    pub dns_match: u64,
    pub dns_skip: u64,
    pub dns_query: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gray={} match={} trust={} dns_timeout={} dns_match={} dns_skip={} dns_query={}",
            self.gray, self.r#match, self.trust, self.dns_timeout, self.dns_match, self.dns_skip, self.dns_query
        )
    }
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gray: self.gray.load(Ordering::Relaxed),
            r#match: self.r#match.load(Ordering::Relaxed),
            trust: self.trust.load(Ordering::Relaxed),
            dns_timeout: self.dns_timeout.load(Ordering::Relaxed),
            dns_match: self.dns_match.load(Ordering::Relaxed),
            dns_skip: self.dns_skip.load(Ordering::Relaxed),
            dns_query: self.dns_query.load(Ordering::Relaxed),
        }
    }

    fn counter(&self, event: AcctEvent) -> &AtomicU64 {
        match event {
            AcctEvent::Gray => &self.gray,
            AcctEvent::Match => &self.r#match,
            AcctEvent::Trust => &self.trust,
            AcctEvent::DnsTimeout => &self.dns_timeout,
            AcctEvent::DnsMatch => &self.dns_match,
            AcctEvent::DnsSkip => &self.dns_skip,
            AcctEvent::DnsQuery => &self.dns_query,
        }
    }
}

/// The default sink: logs through `tracing`, counts through [`Stats`].
#[derive(Debug, Default)]
pub struct TracingSink {
    pub stats: Stats,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountingSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Emerg | LogLevel::Alert | LogLevel::Crit | LogLevel::Error => {
                event!(Level::ERROR, severity = ?level, "{}", message)
            }
            LogLevel::Warning => event!(Level::WARN, "{}", message),
            LogLevel::Notice | LogLevel::Info => event!(Level::INFO, "{}", message),
            LogLevel::Debug => event!(Level::DEBUG, "{}", message),
            LogLevel::Insane => event!(Level::TRACE, "{}", message),
        }
    }

    fn acct(&self, event: AcctEvent, message: &str) {
        self.stats.counter(event).fetch_add(1, Ordering::Relaxed);
        tracing::debug!(?event, "{}", message);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn acct_increments_matching_counter() {
        let sink = TracingSink::new();
        sink.acct(AcctEvent::Gray, "first sight");
        sink.acct(AcctEvent::Gray, "first sight again");
        sink.acct(AcctEvent::Trust, "trusted");
        let snap = sink.stats.snapshot();
        assert_eq!(snap.gray, 2);
        assert_eq!(snap.r#match, 0);
        assert_eq!(snap.trust, 1);
    }
}
