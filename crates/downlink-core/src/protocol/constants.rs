//! Wire format constants for the file downlink protocol.

// ============================================================================
// Packet Type Codes (byte 0 of every packet)
// ============================================================================

/// Opens a transfer and names the destination file.
pub const PACKET_TYPE_START: u8 = 0;
/// Carries one chunk of file content at an explicit offset.
pub const PACKET_TYPE_DATA: u8 = 1;
/// Closes the transfer.
pub const PACKET_TYPE_END: u8 = 2;
/// Sender-side abort notification.
pub const PACKET_TYPE_CANCEL: u8 = 3;

// ============================================================================
// Packet Sizes
// ============================================================================

/// Type code + sequence id, common to all packets.
pub const COMMON_HEADER_SIZE: usize = 5;

/// START with two empty length-prefixed paths.
pub const START_MIN_SIZE: usize = 11;

/// DATA header up to and including the 2-byte length field.
pub const DATA_HEADER_SIZE: usize = 11;

/// END carries only the checksum after the common header.
pub const END_SIZE: usize = 9;

/// CANCEL carries nothing after the common header.
pub const CANCEL_SIZE: usize = COMMON_HEADER_SIZE;

// ============================================================================
// Decoder Defaults
// ============================================================================

/// Seconds without a packet before the active transfer is declared stalled.
pub const DEFAULT_TIMEOUT_SECS: f64 = 120.0;

/// Directory (under the working directory) receiving reconstructed files.
pub const DEFAULT_DOWNLINK_DIR: &str = "file_downlink";

/// Directory receiving per-transfer audit logs.
pub const DEFAULT_LOG_DIR: &str = "file_decoder_logs";
