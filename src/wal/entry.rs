//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::index::{IndexError, IndexResult};

/// Entry header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single encoded entry payload (64 MB)
pub const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert or overwrite a key
    Put { key: String, value: String },

    /// Delete a key
    Delete { key: String },
}

impl Operation {
    /// The key this operation touches
    pub fn key(&self) -> &str {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

/// On-disk payload (everything except the LSN, which lives in the header)
#[derive(Serialize, Deserialize)]
struct Payload {
    timestamp: u64,
    operation: Operation,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode header + payload into a single frame
    pub fn encode(&self) -> IndexResult<Vec<u8>> {
        let payload = bincode::serialize(&Payload {
            timestamp: self.timestamp,
            operation: self.operation.clone(),
        })
        .map_err(|e| IndexError::Serialization(e.to_string()))?;

        if payload.len() > MAX_ENTRY_SIZE as usize {
            return Err(IndexError::Serialization(format!(
                "entry of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let crc = Self::compute_crc(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);

        Ok(frame)
    }

    /// Decode a payload whose header has already been read
    ///
    /// Verifies the checksum before deserializing.
    pub fn decode(lsn: u64, crc: u32, payload: &[u8]) -> IndexResult<Self> {
        let actual = Self::compute_crc(payload);
        if actual != crc {
            return Err(IndexError::WalCorruption(format!(
                "CRC mismatch at LSN {}: expected {:08x}, got {:08x}",
                lsn, crc, actual
            )));
        }

        let payload: Payload = bincode::deserialize(payload).map_err(|e| {
            IndexError::WalCorruption(format!("undecodable entry at LSN {}: {}", lsn, e))
        })?;

        Ok(Self {
            lsn,
            operation: payload.operation,
            timestamp: payload.timestamp,
        })
    }

    /// CRC32 of an encoded payload
    pub fn compute_crc(payload: &[u8]) -> u32 {
        crc32fast::hash(payload)
    }
}
