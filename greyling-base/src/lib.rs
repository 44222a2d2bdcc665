mod digest;
mod error;
mod triple;

pub use digest::{sha256, Digest};
pub use error::{err, Error, Result};
pub use triple::{fingerprint, Triple};
