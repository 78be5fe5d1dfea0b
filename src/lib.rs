// SPDX-License-Identifier: MIT
//! # JSAN — JSON Structured Analysis Notation
//!
//! A compact, randomly addressable binary encoding for JSON token streams.
//! A document is encoded once into two sections and can then be decoded at
//! arbitrary token offsets without parsing anything that precedes them.
//!
//! ## Format Overview
//!
//! ```text
//! JSAN Binary Format v1
//! =====================
//!
//! Metadata section:
//! - Header (8 bytes): "JSAN" magic, version (u16), flags (u16)
//! - String Table: count (u32), then per entry length (u32) + UTF-8 bytes
//! - Offset Index: count (u32), then per entry kind (u8) + token offset (u64)
//! - Trailer (48 bytes): "TRLR" magic, five u64 section fields, CRC-32
//!
//! Token stream section:
//! - Flat sequence of type-tagged tokens, one byte tag each
//! - Keys and repeated strings are u32 references into the string table
//! - Numbers use the narrowest of seven fixed-width scalar encodings
//! - Homogeneous numeric arrays collapse into single packed tokens
//! ```
//!
//! In the split layout the sections live in separate files (`.meta` +
//! `.bin`); the legacy combined layout interleaves the token stream between
//! string table and index in one file. Both are readable; the writer emits
//! the split layout.
//!
//! ## Key Features
//!
//! - **Random access**: the offset index addresses every container start;
//!   `read_token_at` decodes any token from its byte offset alone
//! - **Two-pass packing**: an optional analysis pass lets the writer replace
//!   clean numeric arrays with typed-array tokens
//! - **Streaming writes**: the token stream never buffers more than one
//!   scratch block; the checksum is folded incrementally and merged
//!   algebraically at finalize
//! - **Hostile-input hardening**: every declared length is validated against
//!   an allocation ceiling and the actual bytes available before any
//!   proportional allocation
//!
//! ## Usage
//!
//! ```rust
//! use jsan::events::emit_value;
//! use jsan::reader::BinaryTokenReader;
//! use jsan::writer::BinaryTokenWriter;
//!
//! let value: serde_json::Value =
//!     serde_json::from_str(r#"{"id":7,"tags":["a","b"]}"#).unwrap();
//!
//! let mut tokens = Vec::new();
//! let mut metadata = Vec::new();
//! let mut writer = BinaryTokenWriter::new(&mut tokens, &mut metadata);
//! emit_value(&mut writer, &value).unwrap();
//! writer.finalize().unwrap();
//! drop(writer);
//!
//! let reader = BinaryTokenReader::from_buffers(metadata, tokens).unwrap();
//! let document = jsan::document::read_document(&reader).unwrap();
//! assert_eq!(document, value);
//! ```

pub mod analyzer;
pub mod crc32;
pub mod document;
pub mod events;
pub mod format;
pub mod reader;
pub mod writer;

// Re-export main types
pub use analyzer::{AnalysisReport, JsonAnalyzer};
pub use document::read_document;
pub use events::{emit_value, NumberValue, TokenSink};
pub use format::{Header, IndexEntry, OffsetKind, TokenType, Trailer};
pub use format::{FORMAT_MAGIC, FORMAT_VERSION, MAX_TOKEN_PAYLOAD_BYTES};
pub use reader::{BinaryToken, BinaryTokenReader, ReadError};
pub use writer::{BinaryTokenWriter, WriteError, WriterOptions};
