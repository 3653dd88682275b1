//! Protocol module - downlink wire format definitions.

pub mod constants;
pub mod packet;

pub use constants::*;
pub use packet::{DecodeError, FilePacket};
