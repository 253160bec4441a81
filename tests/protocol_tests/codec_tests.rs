//! Codec Tests
//!
//! Tests for command and response framing.

use std::io::Cursor;

use shelfdb::collection::CollectionInfo;
use shelfdb::index::KeyValue;
use shelfdb::protocol::{
    decode_collections, decode_command, decode_entries, decode_response, encode_collections,
    encode_command, encode_entries, encode_response, read_command, read_response, write_command,
    write_response, Command, CommandType, Response, Status, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use shelfdb::ShelfError;

// =============================================================================
// Helper Functions
// =============================================================================

fn every_command() -> Vec<Command> {
    vec![
        Command::CreateDatabase { db: "app".into() },
        Command::CreateCollection {
            db: "app".into(),
            name: "users".into(),
            order: 16,
        },
        Command::Insert {
            db: "app".into(),
            collection: "users".into(),
            key: "alice".into(),
            value: b"admin".to_vec(),
        },
        Command::Find {
            db: "app".into(),
            collection: "users".into(),
            key: "alice".into(),
        },
        Command::Update {
            db: "app".into(),
            collection: "users".into(),
            key: "alice".into(),
            value: vec![0xFF, 0x00],
        },
        Command::Delete {
            db: "app".into(),
            collection: "users".into(),
            key: "".into(),
        },
        Command::FindAll {
            db: "app".into(),
            collection: "users".into(),
        },
        Command::ListCollections { db: "app".into() },
        Command::DropCollection {
            db: "app".into(),
            name: "users".into(),
        },
        Command::Ping,
    ]
}

// =============================================================================
// Command Framing Tests
// =============================================================================

#[test]
fn test_every_command_decodes_to_itself() {
    for cmd in every_command() {
        let encoded = encode_command(&cmd);
        assert_eq!(encoded[0], cmd.command_type() as u8);
        assert_eq!(decode_command(&encoded).unwrap(), cmd);
    }
}

#[test]
fn test_insert_wire_layout() {
    let cmd = Command::Insert {
        db: "d".into(),
        collection: "c".into(),
        key: "k".into(),
        value: b"vv".to_vec(),
    };
    let encoded = encode_command(&cmd);

    let expected_payload: Vec<u8> = [
        &[0, 0, 0, 1, b'd'][..],
        &[0, 0, 0, 1, b'c'][..],
        &[0, 0, 0, 1, b'k'][..],
        &[0, 0, 0, 2, b'v', b'v'][..],
    ]
    .concat();

    assert_eq!(encoded[0], 0x03);
    assert_eq!(&encoded[1..5], &(expected_payload.len() as u32).to_be_bytes());
    assert_eq!(&encoded[HEADER_SIZE..], expected_payload.as_slice());
}

#[test]
fn test_ping_has_empty_payload() {
    let encoded = encode_command(&Command::Ping);
    assert_eq!(encoded, vec![CommandType::Ping as u8, 0, 0, 0, 0]);
}

#[test]
fn test_unknown_command_rejected() {
    let err = decode_command(&[0x7F, 0, 0, 0, 0]).unwrap_err();
    assert!(matches!(err, ShelfError::Protocol(_)));
}

#[test]
fn test_incomplete_header_rejected() {
    assert!(matches!(
        decode_command(&[0x01, 0, 0]),
        Err(ShelfError::Protocol(_))
    ));
}

#[test]
fn test_incomplete_payload_rejected() {
    let mut encoded = encode_command(&Command::CreateDatabase { db: "app".into() });
    encoded.pop();
    assert!(matches!(
        decode_command(&encoded),
        Err(ShelfError::Protocol(_))
    ));
}

#[test]
fn test_truncated_field_rejected() {
    // CREATE_DB whose field claims 10 bytes but carries 3
    let frame = [0x01, 0, 0, 0, 7, 0, 0, 0, 10, b'a', b'p', b'p'];
    assert!(matches!(decode_command(&frame), Err(ShelfError::Protocol(_))));
}

#[test]
fn test_trailing_bytes_rejected() {
    // CREATE_DB with one byte left after the db field
    let frame = [0x01, 0, 0, 0, 6, 0, 0, 0, 1, b'a', 0xEE];
    assert!(matches!(decode_command(&frame), Err(ShelfError::Protocol(_))));
}

#[test]
fn test_non_utf8_name_rejected() {
    let frame = [0x01, 0, 0, 0, 6, 0, 0, 0, 2, 0xC3, 0x28];
    assert!(matches!(decode_command(&frame), Err(ShelfError::Protocol(_))));
}

#[test]
fn test_oversized_payload_rejected() {
    let mut frame = vec![0x01];
    frame.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());
    assert!(matches!(decode_command(&frame), Err(ShelfError::Protocol(_))));
}

#[test]
fn test_ping_with_payload_rejected() {
    let frame = [CommandType::Ping as u8, 0, 0, 0, 1, 0];
    assert!(matches!(decode_command(&frame), Err(ShelfError::Protocol(_))));
}

// =============================================================================
// Response Framing Tests
// =============================================================================

#[test]
fn test_response_with_payload() {
    let response = Response::ok(Some(b"value".to_vec()));
    let encoded = encode_response(&response);

    assert_eq!(encoded[0], Status::Ok as u8);
    assert_eq!(decode_response(&encoded).unwrap(), response);
}

#[test]
fn test_empty_payload_decodes_as_none() {
    let encoded = encode_response(&Response::ok(Some(Vec::new())));
    assert_eq!(decode_response(&encoded).unwrap().payload, None);
}

#[test]
fn test_unknown_status_rejected() {
    assert!(matches!(
        decode_response(&[0x99, 0, 0, 0, 0]),
        Err(ShelfError::Protocol(_))
    ));
}

// =============================================================================
// Listing Payload Tests
// =============================================================================

#[test]
fn test_entries_payload() {
    let entries = vec![KeyValue::new("a", "1"), KeyValue::new("b", "")];
    assert_eq!(decode_entries(&encode_entries(&entries)).unwrap(), entries);
    assert_eq!(decode_entries(&encode_entries(&[])).unwrap(), vec![]);
}

#[test]
fn test_collections_payload() {
    let infos = vec![
        CollectionInfo {
            name: "users".into(),
            order: 4,
            entries: 10,
        },
        CollectionInfo {
            name: "orders".into(),
            order: 64,
            entries: 0,
        },
    ];
    assert_eq!(decode_collections(&encode_collections(&infos)).unwrap(), infos);
}

#[test]
fn test_truncated_listing_rejected() {
    let mut bytes = encode_entries(&[KeyValue::new("a", "1")]);
    bytes.pop();
    assert!(matches!(decode_entries(&bytes), Err(ShelfError::Protocol(_))));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_carries_several_commands() {
    let mut buf = Vec::new();
    for cmd in every_command() {
        write_command(&mut buf, &cmd).unwrap();
    }

    let mut cursor = Cursor::new(buf);
    for cmd in every_command() {
        assert_eq!(read_command(&mut cursor).unwrap(), cmd);
    }
    assert!(matches!(
        read_command(&mut cursor),
        Err(ShelfError::Io(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof
    ));
}

#[test]
fn test_stream_response() {
    let mut buf = Vec::new();
    write_response(&mut buf, &Response::not_found("Key not found")).unwrap();
    write_response(&mut buf, &Response::ok(None)).unwrap();

    let mut cursor = Cursor::new(buf);
    let first = read_response(&mut cursor).unwrap();
    assert_eq!(first.status, Status::NotFound);
    assert_eq!(first.text().as_deref(), Some("Key not found"));
    assert_eq!(read_response(&mut cursor).unwrap(), Response::ok(None));
}
