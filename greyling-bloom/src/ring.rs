use greyling_base::Digest;
use tokio::sync::RwLock;
use tracing::trace;

use crate::filter::BloomFilter;

struct RingState {
    filters: Vec<BloomFilter>,
    current: usize,
}

/// A rotating set of `N` bloom filters implementing a sliding time window
/// of approximate membership. Exactly one filter is "active"; all inserts
/// target it, but a query sees the union of every filter.
///
/// The ring is the sole shared state between the decision engine (many
/// concurrent readers) and the update-queue consumer (the single writer).
/// Rust has no portable lock-free way to publish a new "current filter"
/// index behind shared references without unsafe, so this follows the
/// reader-writer-lock fallback the design explicitly allows: `query` and
/// `insert` both take the *read* side (bit-sets tolerate torn reads, per
/// §5, so an atomic-backed `BloomFilter` only needs shared access to
/// mutate), and the write side is reserved for `rotate`/`install`, which
/// change which filter is active or replace one wholesale rather than
/// just set a bit. Because the queue consumer is the only writer by
/// construction (single-consumer queue, §4.4), write acquisitions are
/// never contended against each other, only briefly against readers.
pub struct BloomRing {
    state: RwLock<RingState>,
    n: usize,
    m_bits: u32,
}

impl BloomRing {
    /// `n` must be at least 2; `m_bits` is forwarded to each filter.
    pub fn new(n: usize, m_bits: u32) -> Self {
        assert!(n >= 2, "ring_size must be >= 2");
        let filters = (0..n).map(|_| BloomFilter::new(m_bits)).collect();
        BloomRing {
            state: RwLock::new(RingState { filters, current: 0 }),
            n,
            m_bits,
        }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn m_bits(&self) -> u32 {
        self.m_bits
    }

    /// True iff `d` is present in any filter: the ring behaves as the
    /// union of its `N` filters.
    pub async fn query(&self, d: &Digest) -> bool {
        let state = self.state.read().await;
        state.filters.iter().any(|f| f.query(d))
    }

    /// Inserts `d` into the active filter. Takes only the read lock: the
    /// bit-set itself is atomic (`BloomFilter::insert` takes `&self`), so
    /// this runs concurrently with `query` and with other inserts, per
    /// §5's "insert doesn't need the write side" discipline. Only `current`
    /// (which filter is active) needs the read lock's protection against a
    /// concurrent `rotate`.
    pub async fn insert(&self, d: &Digest) {
        let state = self.state.read().await;
        state.filters[state.current].insert(d);
    }

    /// Advances `current` by one modulo `N`. The new active filter is
    /// cleared *before* `current` is published, so no query observes
    /// `current` pointing at a not-yet-cleared filter: both the clear and
    /// the publish happen inside the same write-lock critical section, so
    /// there is no window where a reader could see the half-rotated state.
    pub async fn rotate(&self) {
        let mut state = self.state.write().await;
        let next = (state.current + 1) % state.filters.len();
        state.filters[next].clear();
        state.current = next;
        trace!(next, "bloom ring rotated");
    }

    /// Serializes filter `i` for an aggregate sync send.
    pub async fn snapshot(&self, i: usize) -> Vec<u8> {
        let state = self.state.read().await;
        state.filters[i].serialize()
    }

    /// Serializes every filter, taken under one lock acquisition so the
    /// whole set is mutually consistent (no rotation can intervene
    /// mid-snapshot) — this is the "sync mutex" discipline of §4.5,
    /// implemented as the same rwlock rather than a second lock, since the
    /// ring already serializes all mutation through it.
    pub async fn snapshot_all(&self) -> Vec<Vec<u8>> {
        let state = self.state.read().await;
        state.filters.iter().map(|f| f.serialize()).collect()
    }

    /// Replaces filter `i` wholesale (an aggregate-sync `install`).
    pub async fn install(&self, i: usize, bytes: &[u8]) -> Result<(), greyling_base::Error> {
        let mut state = self.state.write().await;
        state.filters[i].load(bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn digest_of(n: u64) -> Digest {
        greyling_base::sha256(&n.to_be_bytes())
    }

    #[tokio::test]
    async fn insert_then_query_true() {
        let ring = BloomRing::new(4, 1024);
        let d = digest_of(7);
        ring.insert(&d).await;
        assert!(ring.query(&d).await);
    }

    #[tokio::test]
    async fn rotation_n_times_with_no_reinsert_forgets() {
        let ring = BloomRing::new(4, 4096);
        let d = digest_of(99);
        ring.insert(&d).await;
        assert!(ring.query(&d).await);
        for _ in 0..ring.len() {
            ring.rotate().await;
        }
        assert!(!ring.query(&d).await);
    }

    #[tokio::test]
    async fn rotation_never_forgets_before_full_cycle() {
        let ring = BloomRing::new(4, 4096);
        let d = digest_of(5);
        ring.insert(&d).await;
        for _ in 0..ring.len() - 1 {
            ring.rotate().await;
            assert!(ring.query(&d).await);
        }
    }

    #[tokio::test]
    async fn snapshot_install_roundtrip() {
        let a = BloomRing::new(2, 1024);
        let d = digest_of(11);
        a.insert(&d).await;
        let snap = a.snapshot(0).await;

        let b = BloomRing::new(2, 1024);
        b.install(0, &snap).await.unwrap();
        assert!(b.query(&d).await);
    }

    #[tokio::test]
    async fn concurrent_insert_and_query() {
        use std::sync::Arc;
        let ring = Arc::new(BloomRing::new(4, 1 << 16));
        let mut handles = Vec::new();
        for n in 0..64u64 {
            let ring = ring.clone();
            handles.push(tokio::spawn(async move {
                let d = digest_of(n);
                ring.insert(&d).await;
                assert!(ring.query(&d).await);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }
}
