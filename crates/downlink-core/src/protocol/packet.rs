//! Packet parsing for the file downlink wire format.
//!
//! Every packet starts with a one-byte type code and a big-endian u32
//! sequence id. The remaining layout depends on the type; variable-length
//! path fields carry a single-byte length prefix. Parsing performs no I/O.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use thiserror::Error;

use super::constants::*;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Truncated packet: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("Unknown packet type: 0x{0:02X}")]
    UnknownPacketType(u8),
}

/// One decoded unit of the downlink protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePacket {
    Start {
        seq_id: u32,
        /// Declared total file size. Advisory; never checked against the
        /// bytes actually written.
        size: u32,
        source_path: Vec<u8>,
        dest_path: Vec<u8>,
    },
    Data {
        seq_id: u32,
        offset: u32,
        length: u16,
        payload: Vec<u8>,
    },
    End {
        seq_id: u32,
        hash: u32,
    },
    Cancel {
        seq_id: u32,
    },
}

fn need(data: &[u8], expected: usize) -> Result<(), DecodeError> {
    if data.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

impl FilePacket {
    /// Parse a raw packet buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        need(data, COMMON_HEADER_SIZE)?;
        let seq_id = BigEndian::read_u32(&data[1..5]);

        match data[0] {
            PACKET_TYPE_START => {
                // size field plus the source path length prefix
                need(data, 10)?;
                let size = BigEndian::read_u32(&data[5..9]);
                let source_len = data[9] as usize;
                need(data, 10 + source_len + 1)?;
                let source_path = data[10..10 + source_len].to_vec();
                let dest_len = data[10 + source_len] as usize;
                need(data, 11 + source_len + dest_len)?;
                let dest_path = data[11 + source_len..11 + source_len + dest_len].to_vec();
                Ok(FilePacket::Start {
                    seq_id,
                    size,
                    source_path,
                    dest_path,
                })
            }
            PACKET_TYPE_DATA => {
                need(data, DATA_HEADER_SIZE)?;
                let offset = BigEndian::read_u32(&data[5..9]);
                let length = BigEndian::read_u16(&data[9..11]);
                let payload = data[11..].to_vec();
                Ok(FilePacket::Data {
                    seq_id,
                    offset,
                    length,
                    payload,
                })
            }
            PACKET_TYPE_END => {
                need(data, END_SIZE)?;
                let hash = BigEndian::read_u32(&data[5..9]);
                Ok(FilePacket::End { seq_id, hash })
            }
            PACKET_TYPE_CANCEL => Ok(FilePacket::Cancel { seq_id }),
            other => Err(DecodeError::UnknownPacketType(other)),
        }
    }

    /// Encode back to the wire layout. Path fields longer than 255 bytes
    /// cannot be represented and are truncated to the length prefix.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            FilePacket::Start {
                seq_id,
                size,
                source_path,
                dest_path,
            } => {
                buf.push(PACKET_TYPE_START);
                buf.write_u32::<BigEndian>(*seq_id).unwrap();
                buf.write_u32::<BigEndian>(*size).unwrap();
                buf.push(source_path.len().min(255) as u8);
                buf.extend_from_slice(&source_path[..source_path.len().min(255)]);
                buf.push(dest_path.len().min(255) as u8);
                buf.extend_from_slice(&dest_path[..dest_path.len().min(255)]);
            }
            FilePacket::Data {
                seq_id,
                offset,
                length,
                payload,
            } => {
                buf.push(PACKET_TYPE_DATA);
                buf.write_u32::<BigEndian>(*seq_id).unwrap();
                buf.write_u32::<BigEndian>(*offset).unwrap();
                buf.write_u16::<BigEndian>(*length).unwrap();
                buf.extend_from_slice(payload);
            }
            FilePacket::End { seq_id, hash } => {
                buf.push(PACKET_TYPE_END);
                buf.write_u32::<BigEndian>(*seq_id).unwrap();
                buf.write_u32::<BigEndian>(*hash).unwrap();
            }
            FilePacket::Cancel { seq_id } => {
                buf.push(PACKET_TYPE_CANCEL);
                buf.write_u32::<BigEndian>(*seq_id).unwrap();
            }
        }
        buf
    }

    /// Sequence id, present in every variant.
    pub fn seq_id(&self) -> u32 {
        match self {
            FilePacket::Start { seq_id, .. }
            | FilePacket::Data { seq_id, .. }
            | FilePacket::End { seq_id, .. }
            | FilePacket::Cancel { seq_id } => *seq_id,
        }
    }
}
