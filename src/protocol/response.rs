//! Response definitions
//!
//! Represents responses to clients.

use crate::error::ShelfError;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    Conflict = 0x03,
    BadRequest = 0x04,
    /// The write is durable but the cache could not be updated
    Degraded = 0x05,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Status::Ok,
            0x01 => Status::NotFound,
            0x02 => Status::Error,
            0x03 => Status::Conflict,
            0x04 => Status::BadRequest,
            0x05 => Status::Degraded,
            _ => return None,
        })
    }

    /// Status a failed command is reported with
    pub fn for_error(error: &ShelfError) -> Self {
        match error {
            ShelfError::KeyNotFound
            | ShelfError::CollectionNotFound(_)
            | ShelfError::DatabaseNotFound(_) => Status::NotFound,
            ShelfError::DuplicateCollection(_)
            | ShelfError::DatabaseAlreadyExists(_)
            | ShelfError::DatabaseIdMismatch { .. } => Status::Conflict,
            ShelfError::InvalidOrder(_)
            | ShelfError::InvalidName(_)
            | ShelfError::ValueNotText
            | ShelfError::Protocol(_) => Status::BadRequest,
            _ => Status::Error,
        }
    }

    /// Whether the command took effect
    pub fn is_success(self) -> bool {
        matches!(self, Status::Ok | Status::Degraded)
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (value, listing, warning or error message)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response with optional payload
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// Create a NOT_FOUND response
    pub fn not_found(message: &str) -> Self {
        Self::with_message(Status::NotFound, message)
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self::with_message(Status::Error, message)
    }

    /// Create a DEGRADED response carrying the cache warning
    pub fn degraded(warning: &str) -> Self {
        Self::with_message(Status::Degraded, warning)
    }

    /// Map an error to its status, forwarding the message verbatim
    pub fn from_error(error: &ShelfError) -> Self {
        Self::with_message(Status::for_error(error), &error.to_string())
    }

    /// Payload interpreted as UTF-8 (lossy)
    pub fn text(&self) -> Option<String> {
        self.payload
            .as_ref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
    }

    fn with_message(status: Status, message: &str) -> Self {
        Self {
            status,
            payload: Some(message.as_bytes().to_vec()),
        }
    }
}
