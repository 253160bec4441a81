//! Index Log
//!
//! Durable representation of an ordered index: every mutation is appended
//! here before it is applied to the in-memory tree, and the tree is rebuilt
//! by replaying the log on load.
//!
//! ## Frame
//! ```text
//! ┌──────────┬──────────┬──────────┬───────────────────────┐
//! │ LSN u64  │ CRC u32  │ LEN u32  │ bincode(Operation)    │
//! └──────────┴──────────┴──────────┴───────────────────────┘
//! ```
//!
//! All integers are little endian and the CRC covers the payload only.
//! Frames follow each other with no padding; a torn or corrupt frame ends
//! the valid prefix of the log.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::{LogFile, WalWriter};
