// SPDX-License-Identifier: MIT
//! File-based end-to-end tests: encode to real files, reopen, decode.

use std::fs::{self, File};
use std::io::BufWriter;

use jsan::analyzer::JsonAnalyzer;
use jsan::document::read_document;
use jsan::events::emit_value;
use jsan::format::{
    encode_index, encode_string_table, Header, Trailer, FORMAT_MAGIC, HEADER_LENGTH,
    MAX_TOKEN_PAYLOAD_BYTES, TRAILER_LENGTH, TRAILER_MAGIC,
};
use jsan::reader::{BinaryToken, BinaryTokenReader, ReadError};
use jsan::writer::{BinaryTokenWriter, WriterOptions};
use jsan::{OffsetKind, TokenType};
use tempfile::TempDir;

fn encode_to_files(
    dir: &TempDir,
    json: &str,
    analyze: bool,
) -> (std::path::PathBuf, std::path::PathBuf, serde_json::Value) {
    let value: serde_json::Value = serde_json::from_str(json).unwrap();

    let report = if analyze {
        let mut analyzer = JsonAnalyzer::new();
        emit_value(&mut analyzer, &value).unwrap();
        Some(analyzer.into_report())
    } else {
        None
    };

    let bin_path = dir.path().join("doc.bin");
    let meta_path = dir.path().join("doc.meta");
    let token_sink = BufWriter::new(File::create(&bin_path).unwrap());
    let metadata_sink = BufWriter::new(File::create(&meta_path).unwrap());
    let mut writer = BinaryTokenWriter::with_options(
        token_sink,
        metadata_sink,
        report,
        WriterOptions::default(),
    )
    .unwrap();
    emit_value(&mut writer, &value).unwrap();
    writer.finalize().unwrap();

    (meta_path, bin_path, value)
}

#[test]
fn test_split_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let (meta_path, bin_path, value) = encode_to_files(
        &dir,
        r#"{"device":"probe-4","samples":[12,99,240],"labels":["up","up","down"],"rate":0.25}"#,
        false,
    );

    let metadata = fs::read(&meta_path).unwrap();
    assert_eq!(&metadata[..4], FORMAT_MAGIC);
    assert_eq!(
        &metadata[metadata.len() - TRAILER_LENGTH..metadata.len() - TRAILER_LENGTH + 4],
        TRAILER_MAGIC
    );

    let reader = BinaryTokenReader::from_files(&meta_path, &bin_path).unwrap();
    assert!(!reader.trailer().is_combined_layout());
    reader.verify_checksum().unwrap();
    assert_eq!(read_document(&reader).unwrap(), value);
}

#[test]
fn test_analyzed_split_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let (meta_path, bin_path, value) = encode_to_files(
        &dir,
        r#"{"wave":[0,64,128,192,255],"offsets":[-100,100],"notes":["a","b"]}"#,
        true,
    );

    let reader = BinaryTokenReader::from_files(&meta_path, &bin_path).unwrap();
    reader.verify_checksum().unwrap();
    assert_eq!(read_document(&reader).unwrap(), value);

    // The clean numeric arrays were substituted, leaving the root object
    // and the string array in the index.
    let index = reader.index();
    assert_eq!(index.len(), 2);
    assert_eq!(index[0].kind, OffsetKind::Object);
    assert_eq!(index[1].kind, OffsetKind::Array);
}

#[test]
fn test_random_access_into_file() {
    let dir = TempDir::new().unwrap();
    let (meta_path, bin_path, _) = encode_to_files(
        &dir,
        r#"{"a":{"x":1},"b":[true,false],"c":{"y":[null]}}"#,
        false,
    );

    let reader = BinaryTokenReader::from_files(&meta_path, &bin_path).unwrap();
    for entry in reader.index() {
        let (token, _) = reader.read_token_at(entry.token_offset).unwrap();
        match entry.kind {
            OffsetKind::Object => assert_eq!(token, BinaryToken::StartObject),
            OffsetKind::Array => assert_eq!(token, BinaryToken::StartArray),
        }
    }
}

#[test]
fn test_large_stream_through_file_cache() {
    // Enough scalar tokens to span several read-ahead refills.
    let numbers: Vec<String> = (0..50_000).map(|i| (i % 100).to_string()).collect();
    let json = format!("[{}]", numbers.join(","));

    let dir = TempDir::new().unwrap();
    let (meta_path, bin_path, value) = encode_to_files(&dir, &json, false);

    let reader = BinaryTokenReader::from_files(&meta_path, &bin_path).unwrap();
    let count = reader.tokens().map(|t| t.unwrap()).count();
    assert_eq!(count, 50_002);
    assert_eq!(read_document(&reader).unwrap(), value);
}

#[test]
fn test_oversized_numeric_array_round_trips() {
    // A clean Float64 array whose packed payload would exceed the decode
    // allocation ceiling; the writer must fall back so its own artifact
    // stays decodable.
    let count = MAX_TOKEN_PAYLOAD_BYTES as usize / 8 + 1;
    let elements: Vec<String> = (0..count).map(|i| format!("{i}.5")).collect();
    let json = format!(r#"{{"blob":[{}]}}"#, elements.join(","));

    let dir = TempDir::new().unwrap();
    let (meta_path, bin_path, value) = encode_to_files(&dir, &json, true);

    let reader = BinaryTokenReader::from_files(&meta_path, &bin_path).unwrap();
    reader.verify_checksum().unwrap();
    assert_eq!(read_document(&reader).unwrap(), value);
}

#[test]
fn test_combined_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let (meta_path, bin_path, value) =
        encode_to_files(&dir, r#"{"k":[3,1,4,1,5],"tag":"pi"}"#, false);

    let metadata = fs::read(&meta_path).unwrap();
    let tokens = fs::read(&bin_path).unwrap();
    let split = Trailer::from_bytes(&metadata[metadata.len() - TRAILER_LENGTH..]).unwrap();

    let table = &metadata[split.string_table_offset as usize..split.index_offset as usize];
    let index = &metadata
        [split.index_offset as usize..(split.index_offset + split.index_length) as usize];
    let mut combined = Vec::new();
    combined.extend_from_slice(&metadata[..HEADER_LENGTH]);
    combined.extend_from_slice(table);
    combined.extend_from_slice(&tokens);
    combined.extend_from_slice(index);
    let trailer = Trailer {
        string_table_offset: HEADER_LENGTH as u64,
        token_stream_offset: (HEADER_LENGTH + table.len()) as u64,
        token_stream_length: tokens.len() as u64,
        index_offset: (HEADER_LENGTH + table.len() + tokens.len()) as u64,
        index_length: index.len() as u64,
        checksum: split.checksum,
    };
    combined.extend_from_slice(&trailer.to_bytes());

    let combined_path = dir.path().join("doc.jsan");
    fs::write(&combined_path, &combined).unwrap();

    let reader = BinaryTokenReader::from_file(&combined_path).unwrap();
    assert!(reader.trailer().is_combined_layout());
    reader.verify_checksum().unwrap();
    assert_eq!(read_document(&reader).unwrap(), value);
}

#[test]
fn test_hostile_declared_length_on_disk() {
    // A tiny file claiming a 100 MiB Number payload must be rejected before
    // any allocation proportional to the claim.
    let declared: u32 = 100 * 1024 * 1024;
    let mut tokens = vec![TokenType::Number as u8];
    tokens.extend_from_slice(&declared.to_le_bytes());
    tokens.extend_from_slice(b"123");

    let mut metadata = Vec::new();
    metadata.extend_from_slice(&Header::new().to_bytes());
    metadata.extend_from_slice(&encode_string_table(&[]));
    metadata.extend_from_slice(&encode_index(&[]));
    let trailer = Trailer {
        string_table_offset: HEADER_LENGTH as u64,
        token_stream_offset: 0,
        token_stream_length: tokens.len() as u64,
        index_offset: (HEADER_LENGTH + 4) as u64,
        index_length: 4,
        checksum: 0,
    };
    metadata.extend_from_slice(&trailer.to_bytes());

    let dir = TempDir::new().unwrap();
    let meta_path = dir.path().join("hostile.meta");
    let bin_path = dir.path().join("hostile.bin");
    fs::write(&meta_path, &metadata).unwrap();
    fs::write(&bin_path, &tokens).unwrap();

    let reader = BinaryTokenReader::from_files(&meta_path, &bin_path).unwrap();
    assert!(matches!(
        reader.read_token_at(0),
        Err(ReadError::AllocationLimit { declared: d, .. }) if d == declared
    ));
}

#[test]
fn test_text_metadata_file() {
    let dir = TempDir::new().unwrap();
    let (meta_path, bin_path, value) =
        encode_to_files(&dir, r#"{"xs":[9,8,7],"label":"seq"}"#, false);

    let binary_reader = BinaryTokenReader::from_files(&meta_path, &bin_path).unwrap();
    let tokens_len = fs::read(&bin_path).unwrap().len();
    let text = serde_json::json!({
        "magic": "JSAN",
        "version": 1,
        "stringTable": binary_reader.string_table(),
        "tokenStreamLength": tokens_len,
        "tokenStreamChecksum": 0,
        "index": binary_reader
            .index()
            .iter()
            .map(|e| serde_json::json!({"kind": e.kind as u8, "offset": e.token_offset}))
            .collect::<Vec<_>>(),
    });

    let text_meta_path = dir.path().join("doc.meta.json");
    fs::write(&text_meta_path, serde_json::to_vec_pretty(&text).unwrap()).unwrap();

    let reader = BinaryTokenReader::from_files(&text_meta_path, &bin_path).unwrap();
    assert_eq!(read_document(&reader).unwrap(), value);
}
