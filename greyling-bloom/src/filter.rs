use std::sync::atomic::{AtomicU64, Ordering};

use greyling_base::Digest;

/// Number of independent hash positions derived from one digest.
/// The 256-bit digest is partitioned into `K` 32-bit big-endian words;
/// each word modulo `m_bits` is one bit index.
pub const K: usize = 8;

/// A fixed-size bit array of `m_bits` bits (a power of two), the storage
/// for one generation of the bloom ring.
///
/// `insert`/`query` derive the same `K` bit positions from a digest; there
/// is no deletion primitive, matching the bloom-filter contract in the
/// data model: a filter never clears individual bits, only the ring resets
/// it wholesale on rotation.
///
/// Storage is `AtomicU64` rather than plain `u64` so `insert`/`query` take
/// `&self`: per §5, a bit-set tolerates torn reads (a query may miss a
/// just-set bit, at worst a transient false negative the next identical
/// request resolves), so the ring only needs shared access to insert into
/// the active filter — exclusive access is reserved for `clear`/`load`.
#[derive(Debug)]
pub struct BloomFilter {
    words: Vec<AtomicU64>,
    m_bits: u32,
}

impl BloomFilter {
    /// `bits` must be a power of two and a multiple of 64 (the indexing
    /// scheme assumes whole `u64` words).
    pub fn new(bits: u32) -> Self {
        assert!(bits.is_power_of_two(), "filter_bits must be a power of two");
        assert!(bits.is_multiple_of(64), "filter_bits must be a multiple of 64");
        BloomFilter {
            words: (0..bits / 64).map(|_| AtomicU64::new(0)).collect(),
            m_bits: bits,
        }
    }

    pub fn m_bits(&self) -> u32 {
        self.m_bits
    }

    fn positions(&self, d: &Digest) -> [u32; K] {
        let mut out = [0u32; K];
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = d.word(k) % self.m_bits;
        }
        out
    }

    fn set_bit(&self, i: u32) {
        let i = i as usize;
        self.words[i / 64].fetch_or(1u64 << (i % 64), Ordering::Relaxed);
    }

    fn get_bit(&self, i: u32) -> bool {
        let i = i as usize;
        (self.words[i / 64].load(Ordering::Relaxed) & (1u64 << (i % 64))) != 0
    }

    /// Sets the `K` bits indexed by `d`. Idempotent.
    pub fn insert(&self, d: &Digest) {
        for i in self.positions(d) {
            self.set_bit(i);
        }
    }

    /// True iff all `K` bits indexed by `d` are set.
    pub fn query(&self, d: &Digest) -> bool {
        self.positions(d).iter().all(|&i| self.get_bit(i))
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w.get_mut() = 0);
    }

    /// Fixed-size binary image: one bit per storage bit, little-endian
    /// within each word, length `m_bits / 8` bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.words.len() * 8);
        for w in &self.words {
            out.extend_from_slice(&w.load(Ordering::Relaxed).to_le_bytes());
        }
        out
    }

    /// Replaces this filter's contents with a previously-`serialize`d image.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), greyling_base::Error> {
        let expect = (self.m_bits / 8) as usize;
        if bytes.len() != expect {
            return Err(greyling_base::err(format!(
                "bloom filter image is {} bytes, expected {}",
                bytes.len(),
                expect
            )));
        }
        for (w, chunk) in self.words.iter_mut().zip(bytes.chunks_exact(8)) {
            *w.get_mut() = u64::from_le_bytes(chunk.try_into().unwrap());
        }
        Ok(())
    }
}
