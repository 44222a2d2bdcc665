//! The request-protocol collaborator (§6): parses a triple off the wire
//! and encodes a verdict back onto it. Two transports coexist at
//! runtime, selected by configuration, sharing the same worker/engine —
//! both implement [`ProtocolCodec`].

use greyling_base::{Error, Triple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Gray,
    Trust,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Match => "MATCH",
            Verdict::Gray => "GRAY",
            Verdict::Trust => "TRUST",
        }
    }
}

pub trait ProtocolCodec: Send + Sync {
    fn decode_request(&self, buf: &[u8]) -> Result<Triple, Error>;
    fn encode_verdict(&self, v: Verdict) -> Vec<u8>;
}

/// Stream transport: one request per connection, newline-framed text.
/// Request is three space-separated tokens; response is `MATCH`/`GRAY`/
/// `TRUST` followed by a newline.
pub struct StreamCodec;

impl ProtocolCodec for StreamCodec {
    fn decode_request(&self, buf: &[u8]) -> Result<Triple, Error> {
        decode_three_tokens(buf)
    }

    fn encode_verdict(&self, v: Verdict) -> Vec<u8> {
        let mut out = v.as_str().as_bytes().to_vec();
        out.push(b'\n');
        out
    }
}

/// Datagram transport: the single datagram carries the request; the
/// reply datagram (no trailing newline needed, but kept for symmetry
/// with readers expecting line-framed text) is addressed back to the
/// sender by the caller.
pub struct DatagramCodec;

impl ProtocolCodec for DatagramCodec {
    fn decode_request(&self, buf: &[u8]) -> Result<Triple, Error> {
        decode_three_tokens(buf)
    }

    fn encode_verdict(&self, v: Verdict) -> Vec<u8> {
        v.as_str().as_bytes().to_vec()
    }
}

fn decode_three_tokens(buf: &[u8]) -> Result<Triple, Error> {
    let text = std::str::from_utf8(buf).map_err(|e| greyling_base::err(e.to_string()))?;
    let text = text.trim_end_matches(['\r', '\n']);
    let mut parts = text.splitn(3, ' ');
    let client_address = parts.next().filter(|s| !s.is_empty());
    let sender = parts.next().filter(|s| !s.is_empty());
    let recipient = parts.next().filter(|s| !s.is_empty());
    match (client_address, sender, recipient) {
        (Some(c), Some(s), Some(r)) => Ok(Triple::new(c, s, r)),
        _ => Err(greyling_base::err(format!(
            "expected 3 space-separated tokens, got {text:?}"
        ))),
    }
}
