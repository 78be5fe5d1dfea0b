// SPDX-License-Identifier: MIT
//! Random-access binary token reader
//!
//! Opens a finalized artifact, eagerly parses header, trailer, string table
//! and offset index, and then serves [`read_token_at`] lookups against the
//! token stream. Decoding is stateless per call, so one reader can serve
//! many lookups without coordination.
//!
//! Every length field in the artifact is treated as attacker-controlled:
//! declared payload sizes are validated against [`MAX_TOKEN_PAYLOAD_BYTES`]
//! and against the bytes actually remaining before anything proportional to
//! them is allocated.

use std::fs::File;
use std::io;
use std::path::Path;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::crc32::{self, Crc32};
use crate::events::format_f64;
use crate::format::{
    encode_index, encode_string_table, Header, IndexEntry, OffsetKind, TokenType, Trailer,
    FORMAT_MAGIC, FORMAT_VERSION, HEADER_LENGTH, MAX_TOKEN_PAYLOAD_BYTES, SPECULATIVE_READ_BYTES,
    TRAILER_LENGTH,
};

/// Single-slot read-ahead cache size for file-backed sources
const FILE_CACHE_BYTES: usize = 64 * 1024;

/// Errors that can occur while opening or decoding an artifact
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid format magic")]
    InvalidMagic,

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error("Unexpected end of data")]
    Truncated,

    #[error("Invalid section: {0}")]
    InvalidSection(String),

    #[error("Token offset {offset} out of bounds (stream length {length})")]
    OffsetOutOfBounds { offset: u64, length: u64 },

    #[error("Declared payload of {declared} bytes at offset {offset} runs past the token stream")]
    PayloadOutOfBounds { offset: u64, declared: u32 },

    #[error("Declared payload of {declared} bytes exceeds the {limit}-byte allocation limit")]
    AllocationLimit { declared: u32, limit: u32 },

    #[error("String table index out of bounds: {0}")]
    StringIndexOutOfBounds(u32),

    #[error("Unknown token type: 0x{0:02X}")]
    UnknownTokenType(u8),

    #[error("Checksum mismatch: trailer says {expected:#010x}, stream is {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// Positioned reads over an immutable byte source.
///
/// A read past the end returns the available prefix (possibly empty); only
/// genuine I/O failures are errors.
pub trait RandomAccessSource: Send + Sync {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_at(&self, offset: u64, length: usize) -> io::Result<Vec<u8>>;
}

/// In-memory source
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl RandomAccessSource for MemorySource {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_at(&self, offset: u64, length: usize) -> io::Result<Vec<u8>> {
        if offset >= self.bytes.len() as u64 {
            return Ok(Vec::new());
        }
        let start = offset as usize;
        let end = start.saturating_add(length).min(self.bytes.len());
        Ok(self.bytes[start..end].to_vec())
    }
}

struct FileCache {
    offset: u64,
    /// Empty means cold
    bytes: Vec<u8>,
}

/// File-backed source using positioned reads, with a single-slot read-ahead
/// cache so the token-at-a-time access pattern does not hit the kernel for
/// every tag byte. The cache sits behind a mutex to keep `read_at(&self)`
/// usable from concurrent callers.
pub struct FileSource {
    file: File,
    size: u64,
    cache: Mutex<FileCache>,
}

impl FileSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            cache: Mutex::new(FileCache {
                offset: 0,
                bytes: Vec::new(),
            }),
        })
    }

    fn read_uncached(&self, mut offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match positioned_read(&self.file, offset, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

#[cfg(unix)]
fn positioned_read(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn positioned_read(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

impl RandomAccessSource for FileSource {
    fn len(&self) -> u64 {
        self.size
    }

    fn read_at(&self, offset: u64, length: usize) -> io::Result<Vec<u8>> {
        if offset >= self.size {
            return Ok(Vec::new());
        }
        let available = (self.size - offset).min(length as u64) as usize;

        // Large reads go straight through; caching them would only thrash
        // the slot.
        if available > FILE_CACHE_BYTES {
            let mut buf = vec![0u8; available];
            let filled = self.read_uncached(offset, &mut buf)?;
            buf.truncate(filled);
            return Ok(buf);
        }

        let mut cache = self.cache.lock();
        let hit = !cache.bytes.is_empty()
            && offset >= cache.offset
            && offset + available as u64 <= cache.offset + cache.bytes.len() as u64;
        if !hit {
            let fill = (self.size - offset).min(FILE_CACHE_BYTES as u64) as usize;
            let mut buf = vec![0u8; fill];
            let filled = self.read_uncached(offset, &mut buf)?;
            buf.truncate(filled);
            cache.offset = offset;
            cache.bytes = buf;
        }
        let start = (offset - cache.offset) as usize;
        let end = (start + available).min(cache.bytes.len());
        Ok(cache.bytes[start..end].to_vec())
    }
}

/// One decoded token.
///
/// Write-side optimizations are invisible here: fixed-width scalars and
/// string-table number references both decode to [`Number`](Self::Number)
/// carrying numeral text, and packed numeric arrays decode to
/// [`NumberArray`](Self::NumberArray).
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryToken {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    Key(String),
    String(String),
    Number(String),
    Boolean(bool),
    Null,
    NumberArray(Vec<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetadataKind {
    Binary,
    Text,
}

/// JSON text metadata variant, produced by older tooling. Read-only support;
/// the binary trailer layout is what the writer emits.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextMetadata {
    magic: String,
    version: u16,
    #[serde(default)]
    string_table: Vec<String>,
    #[serde(default)]
    token_stream_length: u64,
    #[serde(default)]
    token_stream_checksum: u32,
    #[serde(default)]
    index: Vec<TextIndexEntry>,
}

#[derive(Debug, Deserialize)]
struct TextIndexEntry {
    kind: u8,
    offset: u64,
}

/// Decoder for the JSAN binary format.
pub struct BinaryTokenReader {
    token_source: Box<dyn RandomAccessSource>,
    /// Offset of the first token byte within `token_source`; 0 except for
    /// the legacy combined layout.
    token_base: u64,
    header: Header,
    trailer: Trailer,
    strings: Vec<String>,
    index: Vec<IndexEntry>,
    metadata_kind: MetadataKind,
}

impl BinaryTokenReader {
    /// Open a legacy combined artifact held in memory.
    pub fn from_buffer(buffer: Vec<u8>) -> Result<Self, ReadError> {
        Self::from_sources(Box::new(MemorySource::new(buffer)), None)
    }

    /// Open a legacy combined artifact on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        Self::from_sources(Box::new(FileSource::open(path.as_ref())?), None)
    }

    /// Open a split artifact held in memory. The metadata buffer may carry
    /// either the binary layout or the JSON text variant.
    pub fn from_buffers(metadata: Vec<u8>, tokens: Vec<u8>) -> Result<Self, ReadError> {
        let token_source: Box<dyn RandomAccessSource> = Box::new(MemorySource::new(tokens));
        if looks_like_text_metadata(&metadata) {
            Self::from_text_metadata(&metadata, token_source)
        } else {
            Self::from_sources(Box::new(MemorySource::new(metadata)), Some(token_source))
        }
    }

    /// Open a split artifact on disk. The metadata file may carry either the
    /// binary layout or the JSON text variant.
    pub fn from_files(
        meta_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Result<Self, ReadError> {
        let metadata = std::fs::read(meta_path.as_ref())?;
        let token_source: Box<dyn RandomAccessSource> =
            Box::new(FileSource::open(token_path.as_ref())?);
        if looks_like_text_metadata(&metadata) {
            Self::from_text_metadata(&metadata, token_source)
        } else {
            Self::from_sources(Box::new(MemorySource::new(metadata)), Some(token_source))
        }
    }

    fn from_sources(
        metadata: Box<dyn RandomAccessSource>,
        tokens: Option<Box<dyn RandomAccessSource>>,
    ) -> Result<Self, ReadError> {
        let meta_len = metadata.len();
        if meta_len < (HEADER_LENGTH + TRAILER_LENGTH) as u64 {
            return Err(ReadError::Truncated);
        }

        let header = parse_header(&read_exact(&*metadata, 0, HEADER_LENGTH)?)?;
        let trailer = parse_trailer(&read_exact(
            &*metadata,
            meta_len - TRAILER_LENGTH as u64,
            TRAILER_LENGTH,
        )?)?;

        let combined = tokens.is_none();
        let table_end = if combined {
            if trailer.token_stream_offset < trailer.string_table_offset {
                return Err(ReadError::InvalidSection(
                    "token stream precedes string table".to_string(),
                ));
            }
            trailer.token_stream_offset
        } else {
            trailer.index_offset
        };
        if trailer.string_table_offset > table_end || table_end > meta_len {
            return Err(ReadError::Truncated);
        }
        let table_length = (table_end - trailer.string_table_offset) as usize;
        let table_bytes = read_exact(&*metadata, trailer.string_table_offset, table_length)?;
        let strings = parse_string_table(&table_bytes)?;

        if trailer.index_offset > meta_len
            || trailer.index_length > meta_len - trailer.index_offset
        {
            return Err(ReadError::Truncated);
        }
        let index_bytes = read_exact(
            &*metadata,
            trailer.index_offset,
            trailer.index_length as usize,
        )?;
        let index = parse_index(&index_bytes)?;

        let (token_source, token_base) = match tokens {
            Some(source) => (source, 0),
            None => (metadata, trailer.token_stream_offset),
        };

        tracing::debug!(
            version = header.version,
            combined,
            strings = strings.len(),
            index_entries = index.len(),
            token_bytes = trailer.token_stream_length,
            "artifact opened"
        );

        Ok(Self {
            token_source,
            token_base,
            header,
            trailer,
            strings,
            index,
            metadata_kind: MetadataKind::Binary,
        })
    }

    fn from_text_metadata(
        metadata: &[u8],
        token_source: Box<dyn RandomAccessSource>,
    ) -> Result<Self, ReadError> {
        let parsed: TextMetadata = serde_json::from_slice(metadata)
            .map_err(|e| ReadError::InvalidSection(format!("invalid JSON metadata: {e}")))?;
        if parsed.magic.as_bytes() != FORMAT_MAGIC {
            return Err(ReadError::InvalidMagic);
        }
        if parsed.version != FORMAT_VERSION {
            return Err(ReadError::UnsupportedVersion(parsed.version));
        }

        let mut index = Vec::new();
        for entry in &parsed.index {
            let kind = OffsetKind::from_u8(entry.kind).ok_or_else(|| {
                ReadError::InvalidSection(format!("unknown index entry kind: {}", entry.kind))
            })?;
            index.push(IndexEntry {
                kind,
                token_offset: entry.offset,
            });
        }

        tracing::debug!(
            version = parsed.version,
            strings = parsed.string_table.len(),
            index_entries = index.len(),
            token_bytes = parsed.token_stream_length,
            "artifact opened (text metadata)"
        );

        Ok(Self {
            token_source,
            token_base: 0,
            header: Header {
                version: parsed.version,
                flags: 0,
            },
            trailer: Trailer {
                string_table_offset: 0,
                token_stream_offset: 0,
                token_stream_length: parsed.token_stream_length,
                index_offset: 0,
                index_length: index.len() as u64,
                checksum: parsed.token_stream_checksum,
            },
            strings: parsed.string_table,
            index,
            metadata_kind: MetadataKind::Text,
        })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn trailer(&self) -> Trailer {
        self.trailer
    }

    pub fn string_table(&self) -> Vec<String> {
        self.strings.clone()
    }

    pub fn index(&self) -> Vec<IndexEntry> {
        self.index.clone()
    }

    /// Decode the token at `offset` within the token stream. Returns the
    /// token and its encoded byte length, so `offset + length` addresses the
    /// next token. Stateless; safe to call at any offset in any order.
    pub fn read_token_at(&self, offset: u64) -> Result<(BinaryToken, usize), ReadError> {
        let stream_length = self.trailer.token_stream_length;
        if offset >= stream_length {
            return Err(ReadError::OffsetOutOfBounds {
                offset,
                length: stream_length,
            });
        }

        let probe = self.read_token_bytes(offset, SPECULATIVE_READ_BYTES)?;
        if probe.is_empty() {
            return Err(ReadError::Truncated);
        }
        let tag_byte = probe[0];
        let tag = TokenType::from_u8(tag_byte).ok_or(ReadError::UnknownTokenType(tag_byte))?;

        match tag {
            TokenType::StartObject => Ok((BinaryToken::StartObject, 1)),
            TokenType::EndObject => Ok((BinaryToken::EndObject, 1)),
            TokenType::StartArray => Ok((BinaryToken::StartArray, 1)),
            TokenType::EndArray => Ok((BinaryToken::EndArray, 1)),
            TokenType::True => Ok((BinaryToken::Boolean(true), 1)),
            TokenType::False => Ok((BinaryToken::Boolean(false), 1)),
            TokenType::Null => Ok((BinaryToken::Null, 1)),
            TokenType::Key | TokenType::String | TokenType::NumberRef => {
                if probe.len() < 5 {
                    return Err(ReadError::Truncated);
                }
                let index = le_u32(&probe[1..5]);
                let value = self
                    .strings
                    .get(index as usize)
                    .ok_or(ReadError::StringIndexOutOfBounds(index))?
                    .clone();
                let token = match tag {
                    TokenType::Key => BinaryToken::Key(value),
                    TokenType::String => BinaryToken::String(value),
                    _ => BinaryToken::Number(value),
                };
                Ok((token, 5))
            }
            TokenType::Number => {
                let payload = self.read_length_prefixed(offset, &probe)?;
                let text = String::from_utf8(payload).map_err(|_| {
                    ReadError::InvalidSection("number payload is not valid UTF-8".to_string())
                })?;
                let total = 5 + text.len();
                Ok((BinaryToken::Number(text), total))
            }
            TokenType::Int8 => {
                if probe.len() < 2 {
                    return Err(ReadError::Truncated);
                }
                Ok((BinaryToken::Number((probe[1] as i8).to_string()), 2))
            }
            TokenType::Uint8 => {
                if probe.len() < 2 {
                    return Err(ReadError::Truncated);
                }
                Ok((BinaryToken::Number(probe[1].to_string()), 2))
            }
            TokenType::Int16 => {
                if probe.len() < 3 {
                    return Err(ReadError::Truncated);
                }
                let value = i16::from_le_bytes([probe[1], probe[2]]);
                Ok((BinaryToken::Number(value.to_string()), 3))
            }
            TokenType::Uint16 => {
                if probe.len() < 3 {
                    return Err(ReadError::Truncated);
                }
                let value = u16::from_le_bytes([probe[1], probe[2]]);
                Ok((BinaryToken::Number(value.to_string()), 3))
            }
            TokenType::Int32 => {
                if probe.len() < 5 {
                    return Err(ReadError::Truncated);
                }
                let value = le_u32(&probe[1..5]) as i32;
                Ok((BinaryToken::Number(value.to_string()), 5))
            }
            TokenType::Uint32 => {
                if probe.len() < 5 {
                    return Err(ReadError::Truncated);
                }
                Ok((BinaryToken::Number(le_u32(&probe[1..5]).to_string()), 5))
            }
            TokenType::Float64 => {
                if probe.len() < 9 {
                    return Err(ReadError::Truncated);
                }
                let value = le_f64(&probe[1..9]);
                Ok((BinaryToken::Number(format_f64(value)), 9))
            }
            _ => {
                // Typed arrays.
                let payload = self.read_length_prefixed(offset, &probe)?;
                let width = tag
                    .element_width()
                    .ok_or(ReadError::UnknownTokenType(tag_byte))?;
                if payload.len() % width != 0 {
                    return Err(ReadError::InvalidSection(format!(
                        "typed-array payload of {} bytes is not a whole number of {}-byte elements",
                        payload.len(),
                        width
                    )));
                }
                let mut values = Vec::with_capacity(payload.len() / width);
                for chunk in payload.chunks_exact(width) {
                    values.push(decode_element(tag, chunk));
                }
                let total = 5 + payload.len();
                Ok((BinaryToken::NumberArray(values), total))
            }
        }
    }

    /// Forward iterator over the whole token stream, driven by the byte
    /// lengths `read_token_at` returns.
    pub fn tokens(&self) -> TokenIter<'_> {
        TokenIter {
            reader: self,
            offset: 0,
            failed: false,
        }
    }

    /// Recompute the artifact checksum and compare it against the trailer.
    ///
    /// Binary metadata covers header, string table, token stream and index;
    /// the JSON text variant covers the token stream only.
    pub fn verify_checksum(&self) -> Result<(), ReadError> {
        let total = self.trailer.token_stream_length;
        let mut token_crc = Crc32::new();
        let mut position = 0u64;
        while position < total {
            let chunk = self.read_token_bytes(position, FILE_CACHE_BYTES)?;
            if chunk.is_empty() {
                return Err(ReadError::Truncated);
            }
            token_crc.update(&chunk);
            position += chunk.len() as u64;
        }

        let actual = match self.metadata_kind {
            MetadataKind::Binary => {
                let mut prefix = Crc32::new();
                prefix.update(&self.header.to_bytes());
                prefix.update(&encode_string_table(&self.strings));
                let index_bytes = encode_index(&self.index);
                let combined = Crc32::combine(prefix.state(), token_crc.state(), total);
                crc32::finish(Crc32::combine(
                    combined,
                    Crc32::checksum_state(&index_bytes),
                    index_bytes.len() as u64,
                ))
            }
            MetadataKind::Text => crc32::finish(token_crc.state()),
        };

        if actual != self.trailer.checksum {
            return Err(ReadError::ChecksumMismatch {
                expected: self.trailer.checksum,
                actual,
            });
        }
        Ok(())
    }

    /// Release the underlying handles.
    pub fn close(self) {}

    /// Read up to `length` bytes at `offset` within the token stream,
    /// clamped to the stream end.
    fn read_token_bytes(&self, offset: u64, length: usize) -> Result<Vec<u8>, ReadError> {
        let remaining = self.trailer.token_stream_length.saturating_sub(offset);
        let length = remaining.min(length as u64) as usize;
        Ok(self.token_source.read_at(self.token_base + offset, length)?)
    }

    /// Read the length-prefixed payload of the token at `offset`, validating
    /// the declared length against the allocation ceiling and against the
    /// stream bounds before allocating anything proportional to it.
    fn read_length_prefixed(&self, offset: u64, probe: &[u8]) -> Result<Vec<u8>, ReadError> {
        if probe.len() < 5 {
            return Err(ReadError::Truncated);
        }
        let declared = le_u32(&probe[1..5]);
        if declared > MAX_TOKEN_PAYLOAD_BYTES {
            return Err(ReadError::AllocationLimit {
                declared,
                limit: MAX_TOKEN_PAYLOAD_BYTES,
            });
        }
        if declared as u64 > self.trailer.token_stream_length.saturating_sub(offset + 5) {
            return Err(ReadError::PayloadOutOfBounds { offset, declared });
        }
        let payload = self.read_token_bytes(offset + 5, declared as usize)?;
        if payload.len() < declared as usize {
            return Err(ReadError::Truncated);
        }
        Ok(payload)
    }
}

/// Iterator over every token in stream order
pub struct TokenIter<'a> {
    reader: &'a BinaryTokenReader,
    offset: u64,
    failed: bool,
}

impl Iterator for TokenIter<'_> {
    type Item = Result<BinaryToken, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.reader.trailer.token_stream_length {
            return None;
        }
        match self.reader.read_token_at(self.offset) {
            Ok((token, length)) => {
                self.offset += length as u64;
                Some(Ok(token))
            }
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

fn looks_like_text_metadata(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .copied()
        == Some(b'{')
}

fn read_exact(
    source: &dyn RandomAccessSource,
    offset: u64,
    length: usize,
) -> Result<Vec<u8>, ReadError> {
    let bytes = source.read_at(offset, length)?;
    if bytes.len() < length {
        return Err(ReadError::Truncated);
    }
    Ok(bytes)
}

fn parse_header(bytes: &[u8]) -> Result<Header, ReadError> {
    if bytes.len() < HEADER_LENGTH {
        return Err(ReadError::Truncated);
    }
    if &bytes[0..4] != FORMAT_MAGIC {
        return Err(ReadError::InvalidMagic);
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(ReadError::UnsupportedVersion(version));
    }
    Ok(Header {
        version,
        flags: u16::from_le_bytes([bytes[6], bytes[7]]),
    })
}

fn parse_trailer(bytes: &[u8]) -> Result<Trailer, ReadError> {
    Trailer::from_bytes(bytes).map_err(ReadError::InvalidSection)
}

fn parse_string_table(bytes: &[u8]) -> Result<Vec<String>, ReadError> {
    if bytes.len() < 4 {
        return Err(ReadError::Truncated);
    }
    let count = le_u32(&bytes[0..4]);
    let mut strings = Vec::new();
    let mut offset = 4usize;
    for _ in 0..count {
        if offset + 4 > bytes.len() {
            return Err(ReadError::Truncated);
        }
        let length = le_u32(&bytes[offset..offset + 4]) as usize;
        offset += 4;
        if length > bytes.len() - offset {
            return Err(ReadError::Truncated);
        }
        let value = std::str::from_utf8(&bytes[offset..offset + length]).map_err(|_| {
            ReadError::InvalidSection("string table entry is not valid UTF-8".to_string())
        })?;
        strings.push(value.to_string());
        offset += length;
    }
    Ok(strings)
}

fn parse_index(bytes: &[u8]) -> Result<Vec<IndexEntry>, ReadError> {
    if bytes.len() < 4 {
        return Err(ReadError::Truncated);
    }
    let count = le_u32(&bytes[0..4]);
    let mut entries = Vec::new();
    let mut offset = 4usize;
    for _ in 0..count {
        if offset + 9 > bytes.len() {
            return Err(ReadError::Truncated);
        }
        let kind = OffsetKind::from_u8(bytes[offset]).ok_or_else(|| {
            ReadError::InvalidSection(format!("unknown index entry kind: {}", bytes[offset]))
        })?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[offset + 1..offset + 9]);
        entries.push(IndexEntry {
            kind,
            token_offset: u64::from_le_bytes(raw),
        });
        offset += 9;
    }
    Ok(entries)
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn le_f64(bytes: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    f64::from_le_bytes(raw)
}

fn decode_element(tag: TokenType, chunk: &[u8]) -> f64 {
    match tag {
        TokenType::Uint8Array => chunk[0] as f64,
        TokenType::Int8Array => chunk[0] as i8 as f64,
        TokenType::Uint16Array => u16::from_le_bytes([chunk[0], chunk[1]]) as f64,
        TokenType::Int16Array => i16::from_le_bytes([chunk[0], chunk[1]]) as f64,
        TokenType::Uint32Array => le_u32(chunk) as f64,
        TokenType::Int32Array => le_u32(chunk) as i32 as f64,
        TokenType::Float32Array => f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
        TokenType::Float64Array => le_f64(chunk),
        _ => f64::NAN,
    }
}
