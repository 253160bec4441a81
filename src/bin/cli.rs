//! ShelfDB CLI Client
//!
//! Command-line interface for interacting with a ShelfDB server.

use clap::{Parser, Subcommand};
use shelfdb::network::Client;
use shelfdb::protocol::{decode_collections, decode_entries, Command, Response, Status};

/// ShelfDB CLI
#[derive(Parser, Debug)]
#[command(name = "shelfdb-cli")]
#[command(about = "CLI for the ShelfDB key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a database, creating it if missing
    CreateDb { db: String },

    /// Create a collection
    CreateCollection {
        db: String,
        name: String,

        /// B-tree order (branching factor)
        #[arg(short, long, default_value = "16")]
        order: u32,
    },

    /// Insert a key-value pair
    Insert {
        db: String,
        collection: String,
        key: String,
        value: String,
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
        value: String,
    },

    /// Delete a key
    Delete {
        db: String,
        collection: String,
        key: String,
    },

    /// Print every entry of a collection in key order
    FindAll { db: String, collection: String },

    /// List the collections of a database
    List { db: String },

    /// Drop a collection and its data
    Drop { db: String, name: String },

    /// Ping the server
    Ping,
}

impl Commands {
    fn into_command(self) -> Command {
        match self {
            Commands::CreateDb { db } => Command::CreateDatabase { db },
            Commands::CreateCollection { db, name, order } => {
                Command::CreateCollection { db, name, order }
            }
            Commands::Insert {
                db,
                collection,
                key,
                value,
            } => Command::Insert {
                db,
                collection,
                key,
                value: value.into_bytes(),
            },
            Commands::Find {
                db,
                collection,
                key,
            } => Command::Find {
                db,
                collection,
                key,
            },
            Commands::Update {
                db,
                collection,
                key,
                value,
            } => Command::Update {
                db,
                collection,
                key,
                value: value.into_bytes(),
            },
            Commands::Delete {
                db,
                collection,
                key,
            } => Command::Delete {
                db,
                collection,
                key,
            },
            Commands::FindAll { db, collection } => Command::FindAll { db, collection },
            Commands::List { db } => Command::ListCollections { db },
            Commands::Drop { db, name } => Command::DropCollection { db, name },
            Commands::Ping => Command::Ping,
        }
    }
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("(error) {}", e);
            std::process::exit(1);
        }
    };

    let command = args.command.into_command();
    let response = match client.request(&command) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("(error) {}", e);
            std::process::exit(1);
        }
    };

    if !print_response(&command, &response) {
        std::process::exit(1);
    }
}

/// Print a response; false if the command failed
fn print_response(command: &Command, response: &Response) -> bool {
    match response.status {
        Status::Ok => {
            let payload = response.payload.as_deref().unwrap_or(&[]);
            match command {
                Command::FindAll { .. } => match decode_entries(payload) {
                    Ok(entries) if entries.is_empty() => println!("(empty)"),
                    Ok(entries) => {
                        for entry in entries {
                            println!("{} => {}", entry.key, entry.value);
                        }
                    }
                    Err(e) => {
                        eprintln!("(error) {}", e);
                        return false;
                    }
                },
                Command::ListCollections { .. } => match decode_collections(payload) {
                    Ok(collections) if collections.is_empty() => println!("(empty)"),
                    Ok(collections) => {
                        for info in collections {
                            println!("{} (order {}, {} entries)", info.name, info.order, info.entries);
                        }
                    }
                    Err(e) => {
                        eprintln!("(error) {}", e);
                        return false;
                    }
                },
                _ => match response.text() {
                    Some(text) => println!("{}", text),
                    None => println!("OK"),
                },
            }
            true
        }
        Status::Degraded => {
            println!("OK (cache warning: {})", response.text().unwrap_or_default());
            true
        }
        Status::NotFound => {
            println!("(nil) {}", response.text().unwrap_or_default());
            false
        }
        Status::Error | Status::Conflict | Status::BadRequest => {
            eprintln!(
                "(error {:?}) {}",
                response.status,
                response.text().unwrap_or_default()
            );
            false
        }
    }
}
