//! Event system for downstream decoupling.
//!
//! Consumers of decoded file data (databases, UIs, forwarders) subscribe
//! through [`FileObserver`] without tight coupling to the decoder.

/// Events emitted by the decoder, one per accepted packet.
///
/// Field sets mirror the packet variants; `Start` additionally carries the
/// raw path lengths from the wire.
#[derive(Debug, Clone)]
pub enum FileEvent {
    /// A transfer was accepted and a destination file opened.
    Start {
        seq_id: u32,
        size: u32,
        source_path_len: u8,
        source_path: Vec<u8>,
        dest_path_len: u8,
        dest_path: Vec<u8>,
    },
    /// A chunk was written to the destination file.
    Data {
        seq_id: u32,
        offset: u32,
        length: u16,
        payload: Vec<u8>,
    },
    /// The transfer finished and the destination file was closed.
    End { seq_id: u32, hash: u32 },
    /// The sender aborted. No local state changes.
    Cancel { seq_id: u32 },
}

/// Observer trait for receiving decoded file events.
///
/// Implement this trait in your consumer layer to receive updates.
pub trait FileObserver: Send + Sync {
    /// Called once per accepted packet.
    fn on_event(&self, event: &FileEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl FileObserver for NullObserver {
    fn on_event(&self, _event: &FileEvent) {
        // Do nothing
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl FileObserver for TracingObserver {
    fn on_event(&self, event: &FileEvent) {
        match event {
            FileEvent::Start {
                seq_id,
                size,
                source_path,
                dest_path,
                ..
            } => {
                tracing::info!(
                    seq_id,
                    size,
                    source = %String::from_utf8_lossy(source_path),
                    dest = %String::from_utf8_lossy(dest_path),
                    "Transfer started"
                );
            }
            FileEvent::Data {
                seq_id,
                offset,
                payload,
                ..
            } => {
                tracing::debug!(seq_id, offset, len = payload.len(), "Data chunk");
            }
            FileEvent::End { seq_id, hash } => {
                tracing::info!(seq_id, hash = %format!("{:08X}", hash), "Transfer finished");
            }
            FileEvent::Cancel { seq_id } => {
                tracing::warn!(seq_id, "Transfer cancelled by sender");
            }
        }
    }
}
