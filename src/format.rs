// SPDX-License-Identifier: MIT
//! JSAN binary format specification
//!
//! Defines the on-wire layout shared by the writer and the reader.
//! All integers are little-endian.
//!
//! A finalized artifact consists of two sections:
//!
//! - Metadata: `Header | StringTable | OffsetIndex | Trailer`
//! - Token stream: a flat sequence of type-tagged tokens
//!
//! In the authoritative split layout the two sections live in separate byte
//! sources and `token_stream_offset` is 0. The legacy combined layout stores
//! everything in one source as `Header | StringTable | TokenStream |
//! OffsetIndex | Trailer`; it is detected by `token_stream_offset >=
//! string_table_offset`.

/// Format magic bytes at offset 0 of the metadata section
pub const FORMAT_MAGIC: &[u8; 4] = b"JSAN";

/// Trailer magic bytes at the start of the trailer
pub const TRAILER_MAGIC: &[u8; 4] = b"TRLR";

/// Format version
pub const FORMAT_VERSION: u16 = 1;

/// Header size in bytes: magic + version (u16) + flags (u16)
pub const HEADER_LENGTH: usize = 8;

/// Trailer size in bytes: magic + five u64 fields + checksum (u32)
pub const TRAILER_LENGTH: usize = 4 + 8 * 5 + 4;

/// Ceiling for any declared payload length (Number text, typed arrays).
///
/// Length fields are attacker-controlled in a hostile artifact; nothing
/// proportional to a declared length may be allocated before it passes this
/// check and a bounds check against the underlying source.
pub const MAX_TOKEN_PAYLOAD_BYTES: u32 = 16 * 1024 * 1024;

/// Speculative read-ahead for token decoding. Covers the largest fixed-width
/// token (Float64 scalar: tag + 8 bytes) in a single read.
pub const SPECULATIVE_READ_BYTES: usize = 16;

/// One token-type tag per encoded token, as the token's first byte.
///
/// `Number` carries length-prefixed UTF-8 numeral text. `NumberRef` and the
/// fixed-width scalars are write-side optimizations that decode back to
/// `Number`; the typed-array tags replace a whole `StartArray .. EndArray`
/// run of numbers with one densely packed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenType {
    StartObject = 0x01,
    EndObject = 0x02,
    StartArray = 0x03,
    EndArray = 0x04,
    Key = 0x05,
    String = 0x06,
    Number = 0x07,
    True = 0x08,
    False = 0x09,
    Null = 0x0A,
    NumberRef = 0x0B,
    Int8 = 0x0C,
    Uint8 = 0x0D,
    Int16 = 0x0E,
    Uint16 = 0x0F,
    Int32 = 0x10,
    Uint32 = 0x11,
    Float64 = 0x12,
    Uint8Array = 0x13,
    Int8Array = 0x14,
    Uint16Array = 0x15,
    Int16Array = 0x16,
    Uint32Array = 0x17,
    Int32Array = 0x18,
    Float32Array = 0x19,
    Float64Array = 0x1A,
}

impl TokenType {
    /// Parse a tag byte. Returns `None` for unassigned tags.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::StartObject),
            0x02 => Some(Self::EndObject),
            0x03 => Some(Self::StartArray),
            0x04 => Some(Self::EndArray),
            0x05 => Some(Self::Key),
            0x06 => Some(Self::String),
            0x07 => Some(Self::Number),
            0x08 => Some(Self::True),
            0x09 => Some(Self::False),
            0x0A => Some(Self::Null),
            0x0B => Some(Self::NumberRef),
            0x0C => Some(Self::Int8),
            0x0D => Some(Self::Uint8),
            0x0E => Some(Self::Int16),
            0x0F => Some(Self::Uint16),
            0x10 => Some(Self::Int32),
            0x11 => Some(Self::Uint32),
            0x12 => Some(Self::Float64),
            0x13 => Some(Self::Uint8Array),
            0x14 => Some(Self::Int8Array),
            0x15 => Some(Self::Uint16Array),
            0x16 => Some(Self::Int16Array),
            0x17 => Some(Self::Uint32Array),
            0x18 => Some(Self::Int32Array),
            0x19 => Some(Self::Float32Array),
            0x1A => Some(Self::Float64Array),
            _ => None,
        }
    }

    /// Whether this tag is a packed numeric-array tag.
    pub fn is_typed_array(self) -> bool {
        matches!(
            self,
            Self::Uint8Array
                | Self::Int8Array
                | Self::Uint16Array
                | Self::Int16Array
                | Self::Uint32Array
                | Self::Int32Array
                | Self::Float32Array
                | Self::Float64Array
        )
    }

    /// Element width in bytes for typed-array tags, `None` otherwise.
    pub fn element_width(self) -> Option<usize> {
        match self {
            Self::Uint8Array | Self::Int8Array => Some(1),
            Self::Uint16Array | Self::Int16Array => Some(2),
            Self::Uint32Array | Self::Int32Array | Self::Float32Array => Some(4),
            Self::Float64Array => Some(8),
            _ => None,
        }
    }
}

/// Container kind recorded in the offset index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OffsetKind {
    Object = 1,
    Array = 2,
}

impl OffsetKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Object),
            2 => Some(Self::Array),
            _ => None,
        }
    }
}

/// One offset-index entry: a container-start token and its byte offset
/// within the token stream. Entries are recorded in emission (pre-order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub kind: OffsetKind,
    pub token_offset: u64,
}

/// Parsed metadata header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    /// Reserved, written as 0
    pub flags: u16,
}

impl Header {
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            flags: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != HEADER_LENGTH {
            return Err(format!(
                "Header must be {} bytes, got {}",
                HEADER_LENGTH,
                bytes.len()
            ));
        }
        if &bytes[0..4] != FORMAT_MAGIC {
            return Err("Invalid format magic".to_string());
        }
        let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(format!(
                "Unsupported format version: expected {}, got {}",
                FORMAT_VERSION, version
            ));
        }
        let flags = u16::from_le_bytes(bytes[6..8].try_into().unwrap());
        Ok(Self { version, flags })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut bytes = [0u8; HEADER_LENGTH];
        bytes[0..4].copy_from_slice(FORMAT_MAGIC);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.flags.to_le_bytes());
        bytes
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-size footer written after every section is known. Holds absolute
/// offsets and lengths so sections can be streamed forward without knowing
/// their total size in advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub string_table_offset: u64,
    /// 0 in the split layout; within the combined layout, the offset of the
    /// first token byte
    pub token_stream_offset: u64,
    pub token_stream_length: u64,
    pub index_offset: u64,
    pub index_length: u64,
    /// CRC-32 over header, string table, token stream and offset index
    pub checksum: u32,
}

impl Trailer {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != TRAILER_LENGTH {
            return Err(format!(
                "Trailer must be {} bytes, got {}",
                TRAILER_LENGTH,
                bytes.len()
            ));
        }
        if &bytes[0..4] != TRAILER_MAGIC {
            return Err("Invalid trailer magic".to_string());
        }
        Ok(Self {
            string_table_offset: u64::from_le_bytes(bytes[4..12].try_into().unwrap()),
            token_stream_offset: u64::from_le_bytes(bytes[12..20].try_into().unwrap()),
            token_stream_length: u64::from_le_bytes(bytes[20..28].try_into().unwrap()),
            index_offset: u64::from_le_bytes(bytes[28..36].try_into().unwrap()),
            index_length: u64::from_le_bytes(bytes[36..44].try_into().unwrap()),
            checksum: u32::from_le_bytes(bytes[44..48].try_into().unwrap()),
        })
    }

    pub fn to_bytes(&self) -> [u8; TRAILER_LENGTH] {
        let mut bytes = [0u8; TRAILER_LENGTH];
        bytes[0..4].copy_from_slice(TRAILER_MAGIC);
        bytes[4..12].copy_from_slice(&self.string_table_offset.to_le_bytes());
        bytes[12..20].copy_from_slice(&self.token_stream_offset.to_le_bytes());
        bytes[20..28].copy_from_slice(&self.token_stream_length.to_le_bytes());
        bytes[28..36].copy_from_slice(&self.index_offset.to_le_bytes());
        bytes[36..44].copy_from_slice(&self.index_length.to_le_bytes());
        bytes[44..48].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Whether the artifact uses the legacy combined layout, where the token
    /// stream sits between the string table and the index in the same source.
    pub fn is_combined_layout(&self) -> bool {
        self.token_stream_offset >= self.string_table_offset
    }
}

/// Encode the string table section: count, then `len + utf8` per entry
pub fn encode_string_table(strings: &[String]) -> Vec<u8> {
    let payload: usize = strings.iter().map(|s| 4 + s.len()).sum();
    let mut bytes = Vec::with_capacity(4 + payload);
    bytes.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    for value in strings {
        bytes.extend_from_slice(&(value.len() as u32).to_le_bytes());
        bytes.extend_from_slice(value.as_bytes());
    }
    bytes
}

/// Encode the offset index section: count, then `kind + offset` per entry
pub fn encode_index(entries: &[IndexEntry]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + entries.len() * 9);
    bytes.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        bytes.push(entry.kind as u8);
        bytes.extend_from_slice(&entry.token_offset.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = Header::new();
        let parsed = Header::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_invalid_magic() {
        let mut bytes = Header::new().to_bytes();
        bytes[0] = b'X';
        assert!(Header::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_header_unsupported_version() {
        let mut bytes = Header::new().to_bytes();
        bytes[4..6].copy_from_slice(&999u16.to_le_bytes());
        let err = Header::from_bytes(&bytes).unwrap_err();
        assert!(err.contains("Unsupported format version"));
    }

    #[test]
    fn test_trailer_round_trip() {
        let trailer = Trailer {
            string_table_offset: 8,
            token_stream_offset: 0,
            token_stream_length: 1234,
            index_offset: 99,
            index_length: 13,
            checksum: 0xDEADBEEF,
        };
        let bytes = trailer.to_bytes();
        assert_eq!(bytes.len(), TRAILER_LENGTH);
        assert_eq!(Trailer::from_bytes(&bytes).unwrap(), trailer);
    }

    #[test]
    fn test_layout_detection() {
        let mut trailer = Trailer {
            string_table_offset: 8,
            token_stream_offset: 0,
            token_stream_length: 0,
            index_offset: 0,
            index_length: 0,
            checksum: 0,
        };
        assert!(!trailer.is_combined_layout());
        trailer.token_stream_offset = 20;
        assert!(trailer.is_combined_layout());
    }

    #[test]
    fn test_token_type_tags() {
        assert_eq!(TokenType::from_u8(0x01), Some(TokenType::StartObject));
        assert_eq!(TokenType::from_u8(0x1A), Some(TokenType::Float64Array));
        assert_eq!(TokenType::from_u8(0x00), None);
        assert_eq!(TokenType::from_u8(0x1B), None);
        assert_eq!(TokenType::Float64Array as u8, 0x1A);
    }

    #[test]
    fn test_typed_array_widths() {
        assert_eq!(TokenType::Uint8Array.element_width(), Some(1));
        assert_eq!(TokenType::Int16Array.element_width(), Some(2));
        assert_eq!(TokenType::Float32Array.element_width(), Some(4));
        assert_eq!(TokenType::Float64Array.element_width(), Some(8));
        assert_eq!(TokenType::Number.element_width(), None);
        assert!(TokenType::Uint32Array.is_typed_array());
        assert!(!TokenType::Uint32.is_typed_array());
    }

    #[test]
    fn test_encode_string_table() {
        let bytes = encode_string_table(&["ab".to_string(), "c".to_string()]);
        assert_eq!(
            bytes,
            vec![2, 0, 0, 0, 2, 0, 0, 0, b'a', b'b', 1, 0, 0, 0, b'c']
        );
    }

    #[test]
    fn test_encode_index() {
        let bytes = encode_index(&[
            IndexEntry {
                kind: OffsetKind::Array,
                token_offset: 0,
            },
            IndexEntry {
                kind: OffsetKind::Object,
                token_offset: 1,
            },
        ]);
        assert_eq!(bytes.len(), 4 + 18);
        assert_eq!(bytes[4], 2);
        assert_eq!(bytes[13], 1);
        assert_eq!(u64::from_le_bytes(bytes[14..22].try_into().unwrap()), 1);
    }
}
