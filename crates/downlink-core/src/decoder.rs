//! File downlink decoder: the transfer state machine.
//!
//! Raw packet buffers go in; decoded events come out. The machine cycles
//! between `Idle` and `Receiving` forever: START opens a destination file,
//! DATA writes chunks at explicit offsets, END closes the file, and a
//! watchdog reclaims transfers whose sender went quiet.
//!
//! All mutable state lives behind one mutex shared between the packet path
//! and the watchdog fire path, so a fire racing a late packet can never
//! observe a half-updated transfer.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DecoderConfig;
use crate::events::{FileEvent, FileObserver, TracingObserver};
use crate::protocol::packet::{DecodeError, FilePacket};
use crate::storage::{DestFile, DownlinkStorage};
use crate::timeout::TimeoutMonitor;
use crate::translog::TransferLog;

#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Live reconstruction context for the transfer in progress.
#[derive(Debug)]
pub struct Transfer {
    pub seq_id: u32,
    /// Declared total size from the START packet. Advisory only; never
    /// validated against the bytes written.
    pub size: u32,
    pub source_path: Vec<u8>,
    pub dest_path: Vec<u8>,
    dest: DestFile,
}

/// Decoder state. The destination handle lives inside `Receiving`, so an
/// open file without an active transfer is unrepresentable, and closing is
/// simply dropping the variant.
#[derive(Debug)]
enum TransferState {
    Idle,
    Receiving(Transfer),
}

/// State shared between the packet path and the watchdog fire path.
struct Shared {
    state: TransferState,
    /// Watchdog arming generation. Bumped under this mutex by every parsed
    /// packet; a fire carrying a stale generation is a no-op.
    timer_gen: u64,
}

/// Decoder for file downlink packets.
///
/// One instance handles one downlink stream; at most one transfer is active
/// at a time. A START received while a transfer is in progress supersedes
/// it silently (no End or Cancel event for the abandoned transfer).
pub struct FileDecoder<O: FileObserver> {
    shared: Arc<Mutex<Shared>>,
    monitor: TimeoutMonitor,
    storage: DownlinkStorage,
    translog: TransferLog,
    observer: Arc<O>,
}

impl FileDecoder<TracingObserver> {
    /// Create a decoder that logs events via tracing.
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: FileObserver + 'static> FileDecoder<O> {
    /// Create a decoder with a custom observer.
    pub fn with_observer(config: DecoderConfig, observer: Arc<O>) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            state: TransferState::Idle,
            timer_gen: 0,
        }));
        let fire_shared = Arc::clone(&shared);
        let monitor = TimeoutMonitor::spawn(config.timeout(), move |generation| {
            force_reset(&fire_shared, generation);
        });

        Self {
            shared,
            monitor,
            storage: DownlinkStorage::new(&config.downlink_dir),
            translog: TransferLog::new(&config.log_dir),
            observer,
        }
    }

    /// Decode one raw packet buffer and run it through the state machine.
    ///
    /// Returns the decoded event, also delivered to the observer, or
    /// `Ok(None)` when the packet parsed but arrived out of state and was
    /// dropped (DATA or END while idle).
    pub fn process(&self, data: &[u8]) -> Result<Option<FileEvent>, DecoderError> {
        let packet = FilePacket::from_bytes(data)?;
        let event = self.handle_packet(packet)?;
        if let Some(event) = &event {
            self.observer.on_event(event);
        }
        Ok(event)
    }

    fn handle_packet(&self, packet: FilePacket) -> Result<Option<FileEvent>, DecoderError> {
        let mut shared = self.shared.lock().unwrap();

        // Every parsed packet supersedes the pending arming; any fire
        // already in flight becomes stale.
        shared.timer_gen += 1;
        let generation = shared.timer_gen;
        self.monitor.cancel();

        match packet {
            FilePacket::Start {
                seq_id,
                size,
                source_path,
                dest_path,
            } => {
                // Arm before touching the filesystem so slow I/O is not
                // counted against the sender.
                self.monitor.arm(generation);

                let prior = std::mem::replace(&mut shared.state, TransferState::Idle);
                if let TransferState::Receiving(prior) = prior {
                    // The abandoned transfer gets no End or Cancel event.
                    warn!(
                        prior_seq = prior.seq_id,
                        seq_id, "START while receiving, closing current file and opening a new one"
                    );
                }

                self.translog.record(&source_path, dest_path.len() as u8);
                let dest = self.storage.create_dest_file(&dest_path)?;
                info!(seq_id, size, dest = %dest.path().display(), "Opened destination file");

                shared.state = TransferState::Receiving(Transfer {
                    seq_id,
                    size,
                    source_path: source_path.clone(),
                    dest_path: dest_path.clone(),
                    dest,
                });

                Ok(Some(FileEvent::Start {
                    seq_id,
                    size,
                    source_path_len: source_path.len() as u8,
                    source_path,
                    dest_path_len: dest_path.len() as u8,
                    dest_path,
                }))
            }

            FilePacket::Data {
                seq_id,
                offset,
                length,
                payload,
            } => match &mut shared.state {
                TransferState::Receiving(transfer) => {
                    self.monitor.arm(generation);
                    // A write failure propagates but leaves the machine
                    // receiving; the caller decides whether to abort.
                    transfer.dest.write_at(offset, &payload)?;
                    debug!(seq_id, offset, len = payload.len(), "Wrote chunk");
                    Ok(Some(FileEvent::Data {
                        seq_id,
                        offset,
                        length,
                        payload,
                    }))
                }
                TransferState::Idle => {
                    debug!(seq_id, "DATA while idle, dropped");
                    Ok(None)
                }
            },

            FilePacket::End { seq_id, hash } => {
                match std::mem::replace(&mut shared.state, TransferState::Idle) {
                    TransferState::Receiving(transfer) => {
                        // Dropping the transfer closes the destination file.
                        // The hash is reported, not verified.
                        info!(
                            seq_id,
                            dest = %String::from_utf8_lossy(&transfer.dest_path),
                            "Downlink finished"
                        );
                        Ok(Some(FileEvent::End { seq_id, hash }))
                    }
                    TransferState::Idle => {
                        debug!(seq_id, "END while idle, dropped");
                        Ok(None)
                    }
                }
            }

            FilePacket::Cancel { seq_id } => {
                // Inherited quirk, preserved deliberately: CANCEL neither
                // closes the destination file nor resets the state. The
                // watchdog stays armed while receiving so the open handle is
                // still reclaimed if the sender never resumes.
                if matches!(shared.state, TransferState::Receiving(_)) {
                    self.monitor.arm(generation);
                }
                Ok(Some(FileEvent::Cancel { seq_id }))
            }
        }
    }

    /// Whether a transfer is currently in progress.
    pub fn is_receiving(&self) -> bool {
        matches!(
            self.shared.lock().unwrap().state,
            TransferState::Receiving(_)
        )
    }

    /// Filesystem path of the destination file of the active transfer.
    pub fn active_dest(&self) -> Option<PathBuf> {
        match &self.shared.lock().unwrap().state {
            TransferState::Receiving(transfer) => Some(transfer.dest.path().to_path_buf()),
            TransferState::Idle => None,
        }
    }
}

/// Watchdog fire action: close any open destination file and return to
/// idle. Runs on the watchdog thread; the generation check makes a fire
/// that raced a packet (and lost) a no-op.
fn force_reset(shared: &Mutex<Shared>, generation: u64) {
    let mut shared = shared.lock().unwrap();
    if shared.timer_gen != generation {
        return;
    }
    if let TransferState::Receiving(transfer) =
        std::mem::replace(&mut shared.state, TransferState::Idle)
    {
        warn!(
            seq_id = transfer.seq_id,
            dest = %String::from_utf8_lossy(&transfer.dest_path),
            "Transfer timed out, resetting to idle"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<FileEvent>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<FileEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl FileObserver for RecordingObserver {
        fn on_event(&self, event: &FileEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn test_decoder(
        timeout_secs: f64,
    ) -> (FileDecoder<RecordingObserver>, Arc<RecordingObserver>, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = DecoderConfig {
            timeout_secs,
            downlink_dir: dir.path().join("downlink"),
            log_dir: dir.path().join("logs"),
        };
        let observer = Arc::new(RecordingObserver::default());
        let decoder = FileDecoder::with_observer(config, Arc::clone(&observer));
        (decoder, observer, dir)
    }

    fn start_packet(seq_id: u32, dest: &str) -> Vec<u8> {
        FilePacket::Start {
            seq_id,
            size: 64,
            source_path: b"/seq/src.bin".to_vec(),
            dest_path: dest.as_bytes().to_vec(),
        }
        .to_bytes()
    }

    fn data_packet(seq_id: u32, offset: u32, payload: &[u8]) -> Vec<u8> {
        FilePacket::Data {
            seq_id,
            offset,
            length: payload.len() as u16,
            payload: payload.to_vec(),
        }
        .to_bytes()
    }

    fn end_packet(seq_id: u32) -> Vec<u8> {
        FilePacket::End {
            seq_id,
            hash: 0xABCD_1234,
        }
        .to_bytes()
    }

    fn cancel_packet(seq_id: u32) -> Vec<u8> {
        FilePacket::Cancel { seq_id }.to_bytes()
    }

    #[test]
    fn test_start_then_data_writes_payload() {
        let (decoder, observer, _dir) = test_decoder(60.0);

        let event = decoder.process(&start_packet(1, "out/hi.bin")).unwrap();
        assert!(matches!(event, Some(FileEvent::Start { seq_id: 1, .. })));
        assert!(decoder.is_receiving());

        decoder.process(&data_packet(1, 0, b"hi")).unwrap();

        let dest = decoder.active_dest().unwrap();
        let content = fs::read(&dest).unwrap();
        assert_eq!(&content[..2], b"hi");

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], FileEvent::Start { .. }));
        assert!(matches!(events[1], FileEvent::Data { offset: 0, .. }));
    }

    #[test]
    fn test_end_closes_file_and_returns_to_idle() {
        let (decoder, observer, _dir) = test_decoder(60.0);

        decoder.process(&start_packet(1, "done.bin")).unwrap();
        decoder.process(&data_packet(1, 0, b"payload")).unwrap();
        let dest = decoder.active_dest().unwrap();

        let event = decoder.process(&end_packet(1)).unwrap();
        assert!(matches!(event, Some(FileEvent::End { seq_id: 1, .. })));
        assert!(!decoder.is_receiving());
        assert!(decoder.active_dest().is_none());

        // Content survives the close.
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert_eq!(observer.events().len(), 3);
    }

    #[test]
    fn test_superseding_start_drops_prior_without_end_event() {
        let (decoder, observer, _dir) = test_decoder(60.0);

        decoder.process(&start_packet(1, "first.bin")).unwrap();
        decoder.process(&data_packet(1, 0, b"old")).unwrap();
        let first = decoder.active_dest().unwrap();

        decoder.process(&start_packet(2, "second.bin")).unwrap();
        let second = decoder.active_dest().unwrap();
        assert_ne!(first, second);

        decoder.process(&data_packet(2, 0, b"new")).unwrap();
        assert_eq!(fs::read(&second).unwrap(), b"new");
        // The abandoned file keeps whatever had arrived.
        assert_eq!(fs::read(&first).unwrap(), b"old");

        // Start, Data, Start, Data: no End or Cancel for the first transfer.
        let events = observer.events();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[2], FileEvent::Start { seq_id: 2, .. }));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, FileEvent::End { .. } | FileEvent::Cancel { .. }))
        );
    }

    /// CANCEL is known not to release anything: the destination file stays
    /// open and the machine stays receiving. Inherited from the protocol's
    /// reference behavior; if this test starts failing, the leak was fixed
    /// and downstream expectations need a second look.
    #[test]
    fn test_cancel_while_receiving_leaves_file_open_and_state_receiving() {
        let (decoder, observer, _dir) = test_decoder(60.0);

        decoder.process(&start_packet(1, "leaky.bin")).unwrap();
        let event = decoder.process(&cancel_packet(1)).unwrap();
        assert!(matches!(event, Some(FileEvent::Cancel { seq_id: 1 })));

        assert!(decoder.is_receiving());
        // The handle is still live: a later DATA keeps landing in the file.
        decoder.process(&data_packet(1, 0, b"still here")).unwrap();
        let dest = decoder.active_dest().unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"still here");

        let events = observer.events();
        assert!(matches!(events[1], FileEvent::Cancel { .. }));
    }

    #[test]
    fn test_cancel_while_idle_emits_event_only() {
        let (decoder, observer, _dir) = test_decoder(60.0);

        let event = decoder.process(&cancel_packet(9)).unwrap();
        assert!(matches!(event, Some(FileEvent::Cancel { seq_id: 9 })));
        assert!(!decoder.is_receiving());
        assert_eq!(observer.events().len(), 1);
    }

    #[test]
    fn test_data_and_end_while_idle_are_dropped() {
        let (decoder, observer, _dir) = test_decoder(60.0);

        // DATA arriving before any START
        assert!(decoder.process(&data_packet(1, 0, b"stray")).unwrap().is_none());
        assert!(decoder.process(&end_packet(1)).unwrap().is_none());

        assert!(!decoder.is_receiving());
        assert!(observer.events().is_empty());
    }

    #[test]
    fn test_truncated_buffer_is_a_decode_error() {
        let (decoder, observer, _dir) = test_decoder(60.0);

        let result = decoder.process(&[crate::protocol::PACKET_TYPE_DATA]);
        assert!(matches!(
            result,
            Err(DecoderError::Decode(DecodeError::Truncated { .. }))
        ));
        assert!(observer.events().is_empty());
    }

    #[test]
    fn test_timeout_closes_file_and_resets_to_idle() {
        let (decoder, observer, _dir) = test_decoder(0.05);

        decoder.process(&start_packet(1, "stalled.bin")).unwrap();
        assert!(decoder.is_receiving());

        thread::sleep(Duration::from_millis(500));

        // No packet triggered this; the watchdog did.
        assert!(!decoder.is_receiving());
        assert!(decoder.active_dest().is_none());

        // Stragglers resent after the reset are silently dropped.
        assert!(decoder.process(&data_packet(1, 0, b"late")).unwrap().is_none());
        assert_eq!(observer.events().len(), 1);
    }

    #[test]
    fn test_steady_traffic_keeps_rearming_the_watchdog() {
        let (decoder, _observer, _dir) = test_decoder(0.25);

        decoder.process(&start_packet(1, "alive.bin")).unwrap();
        for i in 0..4u32 {
            thread::sleep(Duration::from_millis(100));
            decoder.process(&data_packet(1, i * 2, b"ok")).unwrap();
        }
        // 400ms of wall time has passed, but no 250ms gap ever opened.
        assert!(decoder.is_receiving());

        thread::sleep(Duration::from_millis(600));
        assert!(!decoder.is_receiving());
    }

    #[test]
    fn test_start_records_audit_log_entry() {
        let (decoder, _observer, dir) = test_decoder(60.0);

        decoder.process(&start_packet(1, "logged.bin")).unwrap();

        let log_root = dir.path().join("logs");
        let folders: Vec<_> = fs::read_dir(&log_root).unwrap().collect();
        assert_eq!(folders.len(), 1);
        let content =
            fs::read_to_string(folders[0].as_ref().unwrap().path().join("log_file")).unwrap();
        assert!(content.contains("Source Path: /seq/src.bin"));
    }
}
