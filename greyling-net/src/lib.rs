mod frame;

pub use frame::{DecodeError, Frame};
