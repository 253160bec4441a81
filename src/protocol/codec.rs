//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload
//! A sequence of fields, each `field_len (4 bytes) + bytes`, in the order
//! the command declares them. `order` is a bare 4-byte integer.
//! - CREATE_DB:   db
//! - CREATE_COLL: db, name, order
//! - INSERT:      db, collection, key, value
//! - FIND:        db, collection, key
//! - UPDATE:      db, collection, key, value
//! - DELETE:      db, collection, key
//! - FIND_ALL:    db, collection
//! - LIST_COLL:   db
//! - DROP_COLL:   db, name
//! - PING:        empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! All integers are big endian.

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};

use crate::collection::CollectionInfo;
use crate::error::{Result, ShelfError};
use crate::index::KeyValue;

use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Field Helpers
// =============================================================================

fn put_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
}

/// Cursor over a payload's fields
struct Fields<'a> {
    /// Command name used in error messages
    context: &'static str,
    bytes: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(context: &'static str, bytes: &'a [u8]) -> Self {
        Self { context, bytes }
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        if self.bytes.len() < 4 {
            return Err(ShelfError::Protocol(format!(
                "{}: missing {}",
                self.context, what
            )));
        }
        let (head, rest) = self.bytes.split_at(4);
        self.bytes = rest;
        Ok(u32::from_be_bytes([head[0], head[1], head[2], head[3]]))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let high = self.u32(what)? as u64;
        let low = self.u32(what)? as u64;
        Ok((high << 32) | low)
    }

    fn bytes(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.u32(what)? as usize;
        if self.bytes.len() < len {
            return Err(ShelfError::Protocol(format!(
                "{}: incomplete {} (expected {}, got {})",
                self.context,
                what,
                len,
                self.bytes.len()
            )));
        }
        let (field, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        Ok(field)
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let raw = self.bytes(what)?;
        String::from_utf8(raw.to_vec()).map_err(|_| {
            ShelfError::Protocol(format!("{}: {} is not valid UTF-8", self.context, what))
        })
    }

    fn finish(self) -> Result<()> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(ShelfError::Protocol(format!(
                "{}: {} unexpected trailing bytes",
                self.context,
                self.bytes.len()
            )))
        }
    }
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut payload = BytesMut::new();

    match command {
        Command::CreateDatabase { db } | Command::ListCollections { db } => {
            put_field(&mut payload, db.as_bytes());
        }
        Command::CreateCollection { db, name, order } => {
            put_field(&mut payload, db.as_bytes());
            put_field(&mut payload, name.as_bytes());
            payload.put_u32(*order);
        }
        Command::Insert {
            db,
            collection,
            key,
            value,
        }
        | Command::Update {
            db,
            collection,
            key,
            value,
        } => {
            put_field(&mut payload, db.as_bytes());
            put_field(&mut payload, collection.as_bytes());
            put_field(&mut payload, key.as_bytes());
            put_field(&mut payload, value);
        }
        Command::Find {
            db,
            collection,
            key,
        }
        | Command::Delete {
            db,
            collection,
            key,
        } => {
            put_field(&mut payload, db.as_bytes());
            put_field(&mut payload, collection.as_bytes());
            put_field(&mut payload, key.as_bytes());
        }
        Command::FindAll { db, collection } => {
            put_field(&mut payload, db.as_bytes());
            put_field(&mut payload, collection.as_bytes());
        }
        Command::DropCollection { db, name } => {
            put_field(&mut payload, db.as_bytes());
            put_field(&mut payload, name.as_bytes());
        }
        Command::Ping => {}
    }

    // Build full message: header + payload
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(command.command_type() as u8);
    message.put_u32(payload.len() as u32);
    message.put_slice(&payload);

    message.to_vec()
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    if bytes.len() < HEADER_SIZE {
        return Err(ShelfError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    // Parse header
    let cmd_byte = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(ShelfError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(ShelfError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let payload = &bytes[HEADER_SIZE..total_len];

    let cmd_type = CommandType::from_byte(cmd_byte).ok_or_else(|| {
        ShelfError::Protocol(format!("Unknown command type: 0x{:02x}", cmd_byte))
    })?;

    // Parse command based on type
    let command = match cmd_type {
        CommandType::CreateDatabase => {
            let mut f = Fields::new("CREATE_DB command", payload);
            let db = f.string("database")?;
            f.finish()?;
            Command::CreateDatabase { db }
        }
        CommandType::CreateCollection => {
            let mut f = Fields::new("CREATE_COLL command", payload);
            let db = f.string("database")?;
            let name = f.string("collection name")?;
            let order = f.u32("order")?;
            f.finish()?;
            Command::CreateCollection { db, name, order }
        }
        CommandType::Insert | CommandType::Update => {
            let context = if cmd_type == CommandType::Insert {
                "INSERT command"
            } else {
                "UPDATE command"
            };
            let mut f = Fields::new(context, payload);
            let db = f.string("database")?;
            let collection = f.string("collection")?;
            let key = f.string("key")?;
            let value = f.bytes("value")?.to_vec();
            f.finish()?;
            if cmd_type == CommandType::Insert {
                Command::Insert {
                    db,
                    collection,
                    key,
                    value,
                }
            } else {
                Command::Update {
                    db,
                    collection,
                    key,
                    value,
                }
            }
        }
        CommandType::Find | CommandType::Delete => {
            let context = if cmd_type == CommandType::Find {
                "FIND command"
            } else {
                "DELETE command"
            };
            let mut f = Fields::new(context, payload);
            let db = f.string("database")?;
            let collection = f.string("collection")?;
            let key = f.string("key")?;
            f.finish()?;
            if cmd_type == CommandType::Find {
                Command::Find {
                    db,
                    collection,
                    key,
                }
            } else {
                Command::Delete {
                    db,
                    collection,
                    key,
                }
            }
        }
        CommandType::FindAll => {
            let mut f = Fields::new("FIND_ALL command", payload);
            let db = f.string("database")?;
            let collection = f.string("collection")?;
            f.finish()?;
            Command::FindAll { db, collection }
        }
        CommandType::ListCollections => {
            let mut f = Fields::new("LIST_COLL command", payload);
            let db = f.string("database")?;
            f.finish()?;
            Command::ListCollections { db }
        }
        CommandType::DropCollection => {
            let mut f = Fields::new("DROP_COLL command", payload);
            let db = f.string("database")?;
            let name = f.string("collection name")?;
            f.finish()?;
            Command::DropCollection { db, name }
        }
        CommandType::Ping => {
            if !payload.is_empty() {
                return Err(ShelfError::Protocol(format!(
                    "PING command: unexpected payload of {} bytes",
                    payload.len()
                )));
            }
            Command::Ping
        }
    };

    Ok(command)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);

    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(response.status as u8);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);

    message.to_vec()
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    if bytes.len() < HEADER_SIZE {
        return Err(ShelfError::Protocol(format!(
            "Incomplete response header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    // Parse header
    let status_byte = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(ShelfError::Protocol(format!(
            "Response payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(ShelfError::Protocol(format!(
            "Incomplete response payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let status = Status::from_byte(status_byte).ok_or_else(|| {
        ShelfError::Protocol(format!("Unknown response status: 0x{:02x}", status_byte))
    })?;

    // Extract payload
    let payload = if payload_len > 0 {
        Some(bytes[HEADER_SIZE..total_len].to_vec())
    } else {
        None
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Listing Payloads
// =============================================================================

/// Encode key/value pairs: count (4) + (key field, value field)*
pub fn encode_entries(entries: &[KeyValue]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(entries.len() as u32);
    for entry in entries {
        put_field(&mut buf, entry.key.as_bytes());
        put_field(&mut buf, entry.value.as_bytes());
    }
    buf.to_vec()
}

/// Decode a payload produced by [`encode_entries`]
pub fn decode_entries(bytes: &[u8]) -> Result<Vec<KeyValue>> {
    let mut f = Fields::new("entry list", bytes);
    let count = f.u32("entry count")?;
    let mut entries = Vec::new();
    for _ in 0..count {
        let key = f.string("key")?;
        let value = f.string("value")?;
        entries.push(KeyValue { key, value });
    }
    f.finish()?;
    Ok(entries)
}

/// Encode collection summaries: count (4) + (name field, order (4), entries (8))*
pub fn encode_collections(collections: &[CollectionInfo]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(collections.len() as u32);
    for info in collections {
        put_field(&mut buf, info.name.as_bytes());
        buf.put_u32(info.order as u32);
        buf.put_u64(info.entries as u64);
    }
    buf.to_vec()
}

/// Decode a payload produced by [`encode_collections`]
pub fn decode_collections(bytes: &[u8]) -> Result<Vec<CollectionInfo>> {
    let mut f = Fields::new("collection list", bytes);
    let count = f.u32("collection count")?;
    let mut collections = Vec::new();
    for _ in 0..count {
        let name = f.string("name")?;
        let order = f.u32("order")? as usize;
        let entries = f.u64("entry count")? as usize;
        collections.push(CollectionInfo {
            name,
            order,
            entries,
        });
    }
    f.finish()?;
    Ok(collections)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a header and payload from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    // Read header first
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    // Parse payload length
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(ShelfError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    // Read payload directly after the header
    let mut frame = vec![0u8; HEADER_SIZE + payload_len];
    frame[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut frame[HEADER_SIZE..])?;
    }

    Ok(frame)
}

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let frame = read_frame(reader)?;
    decode_command(&frame)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let frame = read_frame(reader)?;
    decode_response(&frame)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
