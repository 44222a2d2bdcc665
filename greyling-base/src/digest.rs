use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// A 256-bit SHA-256 digest, held as eight big-endian 32-bit words (`h0..h7`
/// in FIPS 180-4 terms). Pure value; immutable once computed.
///
/// Byte order is a hard cross-instance contract: two greyling processes on
/// different hosts must derive the same bit positions and the same wire
/// payload from the same triple.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The digest's `k`-th 32-bit big-endian word, `0 <= k < 8`.
    pub fn word(&self, k: usize) -> u32 {
        let start = k * 4;
        u32::from_be_bytes(self.0[start..start + 4].try_into().unwrap())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// Computes the SHA-256 digest of `bytes`, matching the FIPS 180-4
/// reference byte-for-byte.
pub fn sha256(bytes: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    Digest(out.into())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fips_180_4_empty_string() {
        let d = sha256(b"");
        assert_eq!(
            d.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn fips_180_4_abc() {
        let d = sha256(b"abc");
        assert_eq!(
            d.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn word_is_big_endian() {
        let d = sha256(b"abc");
        let bytes = d.as_bytes();
        let expect = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(d.word(0), expect);
    }

    #[test]
    fn deterministic() {
        assert_eq!(sha256(b"hello").to_hex(), sha256(b"hello").to_hex());
    }
}
