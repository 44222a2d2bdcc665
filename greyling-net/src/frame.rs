use greyling_base::Digest;

const TAG_OPERATIONAL: u8 = 0x01;
const TAG_AGGREGATE: u8 = 0x02;

/// One frame of the peer wire format (§6): big-endian on the wire,
/// back-to-back, no heartbeat (TCP keepalive suffices).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `0x01 | 32 bytes digest` — an operational update.
    Operational(Digest),
    /// `0x02 | 1 byte filter_index | 4 bytes length (be) | length bytes`
    /// — an aggregate sync frame.
    Aggregate { filter_index: u8, payload: Vec<u8> },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),
}

impl Frame {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Operational(d) => {
                let mut out = Vec::with_capacity(1 + 32);
                out.push(TAG_OPERATIONAL);
                out.extend_from_slice(d.as_bytes());
                out
            }
            Frame::Aggregate { filter_index, payload } => {
                let mut out = Vec::with_capacity(1 + 1 + 4 + payload.len());
                out.push(TAG_AGGREGATE);
                out.push(*filter_index);
                out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                out.extend_from_slice(payload);
                out
            }
        }
    }

    /// Attempts to decode one frame from the front of `buf`. Returns the
    /// decoded frame and the number of bytes it consumed, or `None` if
    /// `buf` doesn't yet hold a complete frame (the caller should read
    /// more bytes and retry — this never consumes a partial frame).
    pub fn decode(buf: &[u8]) -> Result<Option<(Frame, usize)>, DecodeError> {
        let Some(&tag) = buf.first() else {
            return Ok(None);
        };
        match tag {
            TAG_OPERATIONAL => {
                if buf.len() < 1 + 32 {
                    return Ok(None);
                }
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&buf[1..33]);
                Ok(Some((Frame::Operational(Digest::from_bytes(bytes)), 33)))
            }
            TAG_AGGREGATE => {
                if buf.len() < 1 + 1 + 4 {
                    return Ok(None);
                }
                let filter_index = buf[1];
                let len = u32::from_be_bytes(buf[2..6].try_into().unwrap()) as usize;
                let total = 6 + len;
                if buf.len() < total {
                    return Ok(None);
                }
                let payload = buf[6..total].to_vec();
                Ok(Some((Frame::Aggregate { filter_index, payload }, total)))
            }
            other => Err(DecodeError::UnknownTag(other)),
        }
    }
}
