//! Command definitions
//!
//! Represents commands from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    CreateDatabase = 0x01,
    CreateCollection = 0x02,
    Insert = 0x03,
    Find = 0x04,
    Update = 0x05,
    Delete = 0x06,
    FindAll = 0x07,
    ListCollections = 0x08,
    DropCollection = 0x09,
    Ping = 0x0A,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => CommandType::CreateDatabase,
            0x02 => CommandType::CreateCollection,
            0x03 => CommandType::Insert,
            0x04 => CommandType::Find,
            0x05 => CommandType::Update,
            0x06 => CommandType::Delete,
            0x07 => CommandType::FindAll,
            0x08 => CommandType::ListCollections,
            0x09 => CommandType::DropCollection,
            0x0A => CommandType::Ping,
            _ => return None,
        })
    }
}

/// A parsed command
///
/// Names and keys are text; values stay raw until the engine projects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a database, creating it if missing
    CreateDatabase { db: String },

    /// Create a collection with the given B-tree order
    CreateCollection { db: String, name: String, order: u32 },

    /// Insert a key-value pair
    Insert {
        db: String,
        collection: String,
        key: String,
        value: Vec<u8>,
    },

    /// Get a value by key
    Find {
        db: String,
        collection: String,
        key: String,
    },

    /// Update a key (inserts if missing)
    Update {
        db: String,
        collection: String,
        key: String,
        value: Vec<u8>,
    },

    /// Delete a key
    Delete {
        db: String,
        collection: String,
        key: String,
    },

    /// Every entry of a collection in key order
    FindAll { db: String, collection: String },

    /// Collections of a database
    ListCollections { db: String },

    /// Remove a collection and its data
    DropCollection { db: String, name: String },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::CreateDatabase { .. } => CommandType::CreateDatabase,
            Command::CreateCollection { .. } => CommandType::CreateCollection,
            Command::Insert { .. } => CommandType::Insert,
            Command::Find { .. } => CommandType::Find,
            Command::Update { .. } => CommandType::Update,
            Command::Delete { .. } => CommandType::Delete,
            Command::FindAll { .. } => CommandType::FindAll,
            Command::ListCollections { .. } => CommandType::ListCollections,
            Command::DropCollection { .. } => CommandType::DropCollection,
            Command::Ping => CommandType::Ping,
        }
    }
}
