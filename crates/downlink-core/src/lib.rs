//! Downlink-Core: ground-side file downlink decoder.
//!
//! This crate reassembles files transmitted from a remote device as a
//! sequence of START / DATA / END / CANCEL packets, writing chunks at the
//! offsets the sender names and reclaiming transfers whose sender goes
//! quiet.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Wire constants and the packet parser
//! - **Decoder**: Transfer state machine orchestrating everything below
//! - **Storage**: Destination files under the downlink root
//! - **Timeout**: Stall watchdog for the active transfer
//! - **Events**: Observer pattern for downstream decoupling
//! - **Translog**: Per-transfer audit log
//!
//! # Example
//!
//! ```no_run
//! use downlink_core::{DecoderConfig, FileDecoder};
//!
//! let decoder = FileDecoder::new(DecoderConfig::default());
//!
//! // A CANCEL packet for sequence id 1, as it arrives off the wire.
//! let raw = [3u8, 0, 0, 0, 1];
//! decoder.process(&raw).expect("undecodable packet");
//! ```

pub mod config;
pub mod decoder;
pub mod events;
pub mod protocol;
pub mod storage;
pub mod timeout;
pub mod translog;

// Re-exports for convenience
pub use config::DecoderConfig;
pub use decoder::{DecoderError, FileDecoder, Transfer};
pub use events::{FileEvent, FileObserver, NullObserver, TracingObserver};
pub use protocol::{DecodeError, FilePacket};
pub use storage::{DestFile, DownlinkStorage};
pub use timeout::TimeoutMonitor;
pub use translog::TransferLog;
