//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::index::{IndexError, IndexResult};

use super::entry::{HEADER_SIZE, MAX_ENTRY_SIZE};
use super::WalEntry;

/// Reads entries from the WAL file
pub struct WalReader {
    /// Buffered file handle
    reader: BufReader<File>,

    /// Offset just past the last entry that decoded cleanly
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> IndexResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a complete, checksummed entry
    /// - `Ok(None)`: clean end of log
    /// - `Err(WalCorruption)`: torn frame or checksum mismatch
    pub fn next_entry(&mut self) -> IndexResult<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        let read = self.fill(&mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            return Err(IndexError::WalCorruption(format!(
                "torn entry header at offset {} ({} of {} bytes)",
                self.position, read, HEADER_SIZE
            )));
        }

        let lsn = u64::from_le_bytes(header[0..8].try_into().unwrap_or_default());
        let crc = u32::from_le_bytes(header[8..12].try_into().unwrap_or_default());
        let len = u32::from_le_bytes(header[12..16].try_into().unwrap_or_default());

        if len > MAX_ENTRY_SIZE {
            return Err(IndexError::WalCorruption(format!(
                "entry length {} at offset {} exceeds limit",
                len, self.position
            )));
        }

        let mut payload = vec![0u8; len as usize];
        let read = self.fill(&mut payload)?;
        if read < payload.len() {
            return Err(IndexError::WalCorruption(format!(
                "torn entry payload at offset {} ({} of {} bytes)",
                self.position, read, len
            )));
        }

        let entry = WalEntry::decode(lsn, crc, &payload)?;
        self.position += (HEADER_SIZE + payload.len()) as u64;

        Ok(Some(entry))
    }

    /// Offset just past the last valid entry read so far
    pub fn valid_offset(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    ///
    /// Yields the first error and then stops.
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Read until `buf` is full or EOF, returning the byte count
    fn fill(&mut self, buf: &mut [u8]) -> IndexResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = IndexResult<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
