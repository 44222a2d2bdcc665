/// Per-peer link state, per §4.5's state machine table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerLinkState {
    Disconnected,
    Connected,
    InSync,
}

impl PeerLinkState {
    pub fn is_up(&self) -> bool {
        matches!(self, PeerLinkState::Connected | PeerLinkState::InSync)
    }
}

/// Exponential backoff for reconnect attempts, capped at 60s.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    next: std::time::Duration,
    cap: std::time::Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            next: std::time::Duration::from_millis(500),
            cap: std::time::Duration::from_secs(60),
        }
    }
}

impl Backoff {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns the delay to wait before the next attempt, and doubles it
    /// (capped) for next time.
    pub fn next_delay(&mut self) -> std::time::Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.cap);
        delay
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut b = Backoff::default();
        let mut last = b.next_delay();
        for _ in 0..20 {
            let d = b.next_delay();
            assert!(d >= last || d == b.cap);
            last = d;
        }
        assert_eq!(b.next_delay(), b.cap);
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut b = Backoff::default();
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), Backoff::default().next);
    }
}
