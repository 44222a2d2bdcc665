mod filter;
mod ring;

pub use filter::{BloomFilter, K};
pub use ring::BloomRing;
