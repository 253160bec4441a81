//! Database manifest
//!
//! Persisted list of a database's collections.
//!
//! ## File Format
//! ```text
//! ┌──────────┬────────────┬──────────┬──────────┬──────────────────┐
//! │Magic (4) │Version (2) │ Len (4)  │ CRC (4)  │ bincode payload  │
//! └──────────┴────────────┴──────────┴──────────┴──────────────────┘
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelfError};

/// Magic bytes identifying a ShelfDB manifest
const MAGIC: &[u8; 4] = b"SHLF";

/// Current manifest format version
const VERSION: u16 = 1;

/// Magic (4) + Version (2) + Len (4) + CRC (4)
const HEADER_SIZE: usize = 14;

/// Persisted description of one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    pub order: usize,
}

/// Persisted description of a database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Database identifier
    pub id: String,

    /// Collections in creation order
    pub collections: Vec<CollectionMeta>,
}

impl Manifest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collections: Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.iter().any(|c| c.name == name)
    }

    /// Copy of this manifest with one more collection
    pub fn with_collection(&self, name: &str, order: usize) -> Self {
        let mut next = self.clone();
        next.collections.push(CollectionMeta {
            name: name.to_string(),
            order,
        });
        next
    }

    /// Copy of this manifest without the named collection
    pub fn without_collection(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.collections.retain(|c| c.name != name);
        next
    }

    /// Encode header + payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|e| ShelfError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&payload);

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode and verify a manifest
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ShelfError::Manifest(format!(
                "truncated header: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(ShelfError::Manifest(format!(
                "invalid magic: {:?}",
                &bytes[0..4]
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(ShelfError::Manifest(format!(
                "unsupported version: {}",
                version
            )));
        }

        let len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
        let crc = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);

        let payload = bytes
            .get(HEADER_SIZE..HEADER_SIZE + len)
            .ok_or_else(|| ShelfError::Manifest(format!("truncated payload: expected {} bytes", len)))?;

        if crc32fast::hash(payload) != crc {
            return Err(ShelfError::Manifest("checksum mismatch".to_string()));
        }

        bincode::deserialize(payload).map_err(|e| ShelfError::Manifest(e.to_string()))
    }

    /// Read a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::decode(&bytes)
    }

    /// Write a manifest file atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.encode()?;
        let tmp = path.with_extension("tmp");

        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        fs::rename(&tmp, path)?;
        Ok(())
    }
}
