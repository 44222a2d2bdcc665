use crate::Digest;

/// The (client_address, sender, recipient) tuple identifying one SMTP-like
/// delivery attempt. Each field is opaque bytes with no embedded control
/// bytes; the canonical serialization is the three fields joined by a
/// single space, in that order, with no trailing newline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub client_address: String,
    pub sender: String,
    pub recipient: String,
}

impl Triple {
    pub fn new(
        client_address: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Triple {
            client_address: client_address.into(),
            sender: sender.into(),
            recipient: recipient.into(),
        }
    }

    pub fn canonical(&self) -> String {
        format!("{} {} {}", self.client_address, self.sender, self.recipient)
    }
}

/// `fingerprint(triple) -> D`: SHA-256 of the canonical serialization.
/// Cross-instance byte-exactness is a hard contract — this is used both
/// as the bloom key and as the payload of an operational sync.
pub fn fingerprint(triple: &Triple) -> Digest {
    crate::sha256(triple.canonical().as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonical_is_space_joined_no_trailing_newline() {
        let t = Triple::new("10.0.0.1", "a@x", "b@y");
        assert_eq!(t.canonical(), "10.0.0.1 a@x b@y");
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let t = Triple::new("10.0.0.1", "a@x", "b@y");
        assert_eq!(fingerprint(&t), fingerprint(&t));
    }

    #[test]
    fn fingerprint_distinguishes_triples() {
        let a = Triple::new("10.0.0.1", "a@x", "b@y");
        let b = Triple::new("10.0.0.2", "a@x", "b@y");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
