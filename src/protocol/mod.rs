//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (Length-Prefixed Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: CREATE_DB    0x02: CREATE_COLL
//! - 0x03: INSERT       0x04: FIND
//! - 0x05: UPDATE       0x06: DELETE
//! - 0x07: FIND_ALL     0x08: LIST_COLL
//! - 0x09: DROP_COLL    0x0A: PING
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR
//! - 0x03: CONFLICT
//! - 0x04: BAD_REQUEST
//! - 0x05: DEGRADED (write durable, cache out of step)

mod codec;
mod command;
mod response;

pub use codec::{
    decode_collections, decode_command, decode_entries, decode_response, encode_collections,
    encode_command, encode_entries, encode_response, read_command, read_response, write_command,
    write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use command::{Command, CommandType};
pub use response::{Response, Status};
