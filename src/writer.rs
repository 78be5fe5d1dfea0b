// SPDX-License-Identifier: MIT
//! Binary token writer
//!
//! Consumes JSON structural events and produces two byte streams: the token
//! stream (flushed incrementally through a scratch buffer, checksummed as it
//! goes) and the metadata stream (header, string table, offset index and
//! trailer, written once at finalize).
//!
//! When constructed with an [`AnalysisReport`], arrays whose path carries a
//! typed-array decision are encoded optimistically: the `StartArray` token is
//! deferred and numeric children are buffered, so the whole array collapses
//! into a single packed token. Any disqualifying event rolls the buffer back
//! into ordinary tokens before being handled itself.

use std::collections::HashMap;
use std::io::Write;

use crate::analyzer::AnalysisReport;
use crate::crc32::{self, Crc32};
use crate::events::{format_f64, NumberValue, TokenSink};
use crate::format::{
    encode_index, encode_string_table, Header, IndexEntry, OffsetKind, TokenType, Trailer,
    HEADER_LENGTH, MAX_TOKEN_PAYLOAD_BYTES,
};

/// Scratch buffer size; a flush to the token sink happens at this granularity
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Errors that can occur during encoding
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("String table limit reached: {max} unique strings")]
    UniqueStringLimit { max: usize },

    #[error("String table byte limit reached: {max} bytes (table holds {used}, entry needs {entry})")]
    StringTableByteLimit {
        max: usize,
        used: usize,
        entry: usize,
    },

    #[error("Unbalanced {0}: end event with no matching start")]
    Unbalanced(&'static str),

    #[error("Writer already finalized")]
    Finalized,
}

/// Safety ceilings for the string table, checked before every insertion.
/// Re-registering an already-interned string never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriterOptions {
    pub max_unique_strings: Option<usize>,
    pub max_string_table_bytes: Option<usize>,
}

/// Container state mirrored from the event stream
#[derive(Debug, Clone, Copy)]
enum Container {
    Root,
    Object,
    Array { index: i64 },
}

/// One segment of the current JSON path
#[derive(Debug, Clone)]
enum PathSegment {
    Key(String),
    Index(i64),
}

/// Typed-array optimism state machine
#[derive(Debug)]
enum ArrayMode {
    Idle,
    /// The `StartArray` token is deferred; numeric children accumulate here
    /// until `EndArray` packs them, or a disqualifying event replays them.
    /// The packed payload is capped at [`MAX_TOKEN_PAYLOAD_BYTES`] so the
    /// resulting token stays decodable.
    Buffering {
        element_type: TokenType,
        values: Vec<f64>,
    },
}

/// Encoder for the JSAN binary format.
///
/// Write methods must be called by a single producer, strictly sequentially;
/// [`finalize`](Self::finalize) must be the terminal call. An abandoned,
/// unfinalized writer leaves a partial artifact with no well-formedness
/// guarantee.
pub struct BinaryTokenWriter<W: Write, M: Write> {
    token_sink: W,
    metadata_sink: M,
    scratch: Vec<u8>,
    token_crc: Crc32,
    token_length: u64,
    strings: Vec<String>,
    string_index: HashMap<String, u32>,
    string_bytes: usize,
    offsets: Vec<IndexEntry>,
    options: WriterOptions,
    array_decisions: HashMap<String, TokenType>,
    containers: Vec<Container>,
    path: Vec<PathSegment>,
    mode: ArrayMode,
    finalized: bool,
}

impl<W: Write, M: Write> BinaryTokenWriter<W, M> {
    /// Create a writer with no analysis report and no table limits.
    pub fn new(token_sink: W, metadata_sink: M) -> Self {
        Self {
            token_sink,
            metadata_sink,
            scratch: Vec::with_capacity(DEFAULT_BUFFER_SIZE),
            token_crc: Crc32::new(),
            token_length: 0,
            strings: Vec::new(),
            string_index: HashMap::new(),
            string_bytes: 0,
            offsets: Vec::new(),
            options: WriterOptions::default(),
            array_decisions: HashMap::new(),
            containers: vec![Container::Root],
            path: Vec::new(),
            mode: ArrayMode::Idle,
            finalized: false,
        }
    }

    /// Create a writer with table limits and an optional analysis report.
    ///
    /// The report's strings pre-seed the interning table (subject to the
    /// limits) and its per-path decisions enable typed-array encoding.
    pub fn with_options(
        token_sink: W,
        metadata_sink: M,
        analysis: Option<AnalysisReport>,
        options: WriterOptions,
    ) -> Result<Self, WriteError> {
        let mut writer = Self::new(token_sink, metadata_sink);
        writer.options = options;
        if let Some(report) = analysis {
            for value in &report.strings {
                writer.register_string(value)?;
            }
            writer.array_decisions = report.arrays;
        }
        Ok(writer)
    }

    /// Finish the artifact: flush remaining token bytes, then write header,
    /// string table, offset index and trailer to the metadata sink.
    ///
    /// Idempotent; calls after the first successful one are no-ops. The
    /// artifact checksum is assembled from the incrementally accumulated
    /// token-stream state via [`Crc32::combine`], never by re-reading tokens.
    pub fn finalize(&mut self) -> Result<(), WriteError> {
        if self.finalized {
            return Ok(());
        }
        // An unterminated optimistic array still gets written out.
        self.rollback_buffered()?;
        self.flush_scratch()?;
        self.finalized = true;

        let header = Header::new().to_bytes();
        let string_table = encode_string_table(&self.strings);
        let index = encode_index(&self.offsets);

        let mut prefix_crc = Crc32::new();
        prefix_crc.update(&header);
        prefix_crc.update(&string_table);
        let mut combined =
            Crc32::combine(prefix_crc.state(), self.token_crc.state(), self.token_length);
        combined = Crc32::combine(
            combined,
            Crc32::checksum_state(&index),
            index.len() as u64,
        );

        let trailer = Trailer {
            string_table_offset: HEADER_LENGTH as u64,
            token_stream_offset: 0,
            token_stream_length: self.token_length,
            index_offset: (HEADER_LENGTH + string_table.len()) as u64,
            index_length: index.len() as u64,
            checksum: crc32::finish(combined),
        };

        self.metadata_sink.write_all(&header)?;
        self.metadata_sink.write_all(&string_table)?;
        self.metadata_sink.write_all(&index)?;
        self.metadata_sink.write_all(&trailer.to_bytes())?;
        self.metadata_sink.flush()?;
        self.token_sink.flush()?;

        tracing::debug!(
            token_bytes = self.token_length,
            strings = self.strings.len(),
            index_entries = self.offsets.len(),
            checksum = trailer.checksum,
            "artifact finalized"
        );
        Ok(())
    }

    /// Bytes emitted into the token stream so far.
    pub fn token_length(&self) -> u64 {
        self.token_length
    }

    fn ensure_active(&self) -> Result<(), WriteError> {
        if self.finalized {
            return Err(WriteError::Finalized);
        }
        Ok(())
    }

    fn push_token(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        if self.scratch.len() + bytes.len() > DEFAULT_BUFFER_SIZE {
            self.flush_scratch()?;
        }
        if bytes.len() >= DEFAULT_BUFFER_SIZE {
            // Oversized token: bypass the scratch buffer entirely.
            self.token_crc.update(bytes);
            self.token_sink.write_all(bytes)?;
        } else {
            self.scratch.extend_from_slice(bytes);
        }
        self.token_length += bytes.len() as u64;
        Ok(())
    }

    fn flush_scratch(&mut self) -> Result<(), WriteError> {
        if self.scratch.is_empty() {
            return Ok(());
        }
        tracing::trace!(bytes = self.scratch.len(), "flushing token buffer");
        self.token_crc.update(&self.scratch);
        self.token_sink.write_all(&self.scratch)?;
        self.scratch.clear();
        Ok(())
    }

    fn register_string(&mut self, value: &str) -> Result<u32, WriteError> {
        if let Some(&index) = self.string_index.get(value) {
            return Ok(index);
        }
        if let Some(max) = self.options.max_unique_strings {
            if self.strings.len() >= max {
                return Err(WriteError::UniqueStringLimit { max });
            }
        }
        if let Some(max) = self.options.max_string_table_bytes {
            if self.string_bytes + value.len() > max {
                return Err(WriteError::StringTableByteLimit {
                    max,
                    used: self.string_bytes,
                    entry: value.len(),
                });
            }
        }
        let index = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.string_index.insert(value.to_string(), index);
        self.string_bytes += value.len();
        Ok(index)
    }

    fn record_offset(&mut self, kind: OffsetKind) {
        self.offsets.push(IndexEntry {
            kind,
            token_offset: self.token_length,
        });
    }

    fn before_value(&mut self) {
        if let Some(Container::Array { index }) = self.containers.last_mut() {
            *index += 1;
            let index = *index;
            self.path.push(PathSegment::Index(index));
        }
    }

    fn after_value(&mut self) {
        match self.containers.last() {
            Some(Container::Array { .. }) | Some(Container::Object) => {
                self.path.pop();
            }
            _ => {}
        }
    }

    fn path_key(&self) -> String {
        let segments: Vec<String> = self
            .path
            .iter()
            .map(|segment| match segment {
                PathSegment::Key(key) => key.clone(),
                PathSegment::Index(index) => index.to_string(),
            })
            .collect();
        segments.join("/")
    }

    fn is_buffering(&self) -> bool {
        matches!(self.mode, ArrayMode::Buffering { .. })
    }

    /// Abort an optimistic array: emit the deferred `StartArray` (recording
    /// its index entry at the real offset) and replay every buffered number
    /// through the ordinary scalar path. The caller then handles the
    /// disqualifying event as usual.
    fn rollback_buffered(&mut self) -> Result<(), WriteError> {
        let mode = std::mem::replace(&mut self.mode, ArrayMode::Idle);
        if let ArrayMode::Buffering { values, .. } = mode {
            tracing::trace!(buffered = values.len(), "typed-array rollback");
            self.record_offset(OffsetKind::Array);
            self.push_token(&[TokenType::StartArray as u8])?;
            for value in values {
                self.encode_scalar(value)?;
            }
        }
        Ok(())
    }

    /// Emit one number as the narrowest lossless fixed-width token.
    fn encode_scalar(&mut self, value: f64) -> Result<(), WriteError> {
        if value.fract() == 0.0 {
            if (0.0..=u8::MAX as f64).contains(&value) {
                return self.push_token(&[TokenType::Uint8 as u8, value as u8]);
            }
            if (i8::MIN as f64..=i8::MAX as f64).contains(&value) {
                return self.push_token(&[TokenType::Int8 as u8, (value as i8) as u8]);
            }
            if (0.0..=u16::MAX as f64).contains(&value) {
                let mut token = [TokenType::Uint16 as u8, 0, 0];
                token[1..].copy_from_slice(&(value as u16).to_le_bytes());
                return self.push_token(&token);
            }
            if (i16::MIN as f64..=i16::MAX as f64).contains(&value) {
                let mut token = [TokenType::Int16 as u8, 0, 0];
                token[1..].copy_from_slice(&(value as i16).to_le_bytes());
                return self.push_token(&token);
            }
            if (0.0..=u32::MAX as f64).contains(&value) {
                let mut token = [TokenType::Uint32 as u8, 0, 0, 0, 0];
                token[1..].copy_from_slice(&(value as u32).to_le_bytes());
                return self.push_token(&token);
            }
            if (i32::MIN as f64..=i32::MAX as f64).contains(&value) {
                let mut token = [TokenType::Int32 as u8, 0, 0, 0, 0];
                token[1..].copy_from_slice(&(value as i32).to_le_bytes());
                return self.push_token(&token);
            }
        }
        let mut token = [0u8; 9];
        token[0] = TokenType::Float64 as u8;
        token[1..].copy_from_slice(&value.to_le_bytes());
        self.push_token(&token)
    }

    /// Emit a number with no finite fixed-width representation as a
    /// string-table reference carrying the exact numeral text.
    fn encode_number_ref(&mut self, text: &str) -> Result<(), WriteError> {
        let index = self.register_string(text)?;
        let mut token = [0u8; 5];
        token[0] = TokenType::NumberRef as u8;
        token[1..].copy_from_slice(&index.to_le_bytes());
        self.push_token(&token)
    }

    fn encode_number(&mut self, value: NumberValue<'_>) -> Result<(), WriteError> {
        match scalar_representation(&value) {
            Some(v) => self.encode_scalar(v),
            None => self.encode_number_ref(&value.to_text()),
        }
    }
}

/// The f64 to encode, or `None` when only the numeral text is lossless.
fn scalar_representation(value: &NumberValue<'_>) -> Option<f64> {
    const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0; // 2^53
    match value {
        NumberValue::Float(v) => v.is_finite().then_some(*v),
        NumberValue::Text(text) => {
            if let Ok(int) = text.parse::<i64>() {
                // Magnitude alone is not enough at the boundary: 2^53 + 1
                // parses within range but rounds to 2^53.
                let v = int as f64;
                return (v.abs() <= MAX_EXACT_INT && v as i64 == int).then_some(v);
            }
            let v = text.parse::<f64>().ok()?;
            if !v.is_finite() {
                return None;
            }
            // Lossless exactly when the decoded rendering denotes the same
            // number as the input numeral.
            match (normalized_decimal(&format_f64(v)), normalized_decimal(text)) {
                (Some(rendered), Some(original)) if rendered == original => Some(v),
                _ => None,
            }
        }
    }
}

/// Decompose a numeral into `(negative, digits, exponent)` with the value
/// `digits * 10^exponent` and no trailing zeros in `digits`, so two numerals
/// denote the same number exactly when their decompositions are equal. Zero
/// normalizes to empty digits.
fn normalized_decimal(text: &str) -> Option<(bool, String, i64)> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (mantissa, exp_part) = match rest.split_once(['e', 'E']) {
        Some((mantissa, exp)) => (mantissa, Some(exp)),
        None => (rest, None),
    };
    let mut exponent: i64 = match exp_part {
        Some(exp) => exp.trim_start_matches('+').parse().ok()?,
        None => 0,
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    exponent -= frac_part.len() as i64;
    let mut digits = format!("{int_part}{frac_part}");
    while digits.ends_with('0') {
        digits.pop();
        exponent += 1;
    }
    let digits = digits.trim_start_matches('0').to_string();
    if digits.is_empty() {
        return Some((negative, digits, 0));
    }
    Some((negative, digits, exponent))
}

/// Whether `value` is exactly representable by a typed array's element type.
fn fits_element(element_type: TokenType, value: f64) -> bool {
    let integral = value.fract() == 0.0;
    match element_type {
        TokenType::Uint8Array => integral && (0.0..=u8::MAX as f64).contains(&value),
        TokenType::Int8Array => integral && (i8::MIN as f64..=i8::MAX as f64).contains(&value),
        TokenType::Uint16Array => integral && (0.0..=u16::MAX as f64).contains(&value),
        TokenType::Int16Array => integral && (i16::MIN as f64..=i16::MAX as f64).contains(&value),
        TokenType::Uint32Array => integral && (0.0..=u32::MAX as f64).contains(&value),
        TokenType::Int32Array => integral && (i32::MIN as f64..=i32::MAX as f64).contains(&value),
        TokenType::Float32Array => (value as f32) as f64 == value,
        TokenType::Float64Array => true,
        _ => false,
    }
}

fn pack_element(bytes: &mut Vec<u8>, element_type: TokenType, value: f64) {
    match element_type {
        TokenType::Uint8Array => bytes.push(value as u8),
        TokenType::Int8Array => bytes.push((value as i8) as u8),
        TokenType::Uint16Array => bytes.extend_from_slice(&(value as u16).to_le_bytes()),
        TokenType::Int16Array => bytes.extend_from_slice(&(value as i16).to_le_bytes()),
        TokenType::Uint32Array => bytes.extend_from_slice(&(value as u32).to_le_bytes()),
        TokenType::Int32Array => bytes.extend_from_slice(&(value as i32).to_le_bytes()),
        TokenType::Float32Array => bytes.extend_from_slice(&(value as f32).to_le_bytes()),
        TokenType::Float64Array => bytes.extend_from_slice(&value.to_le_bytes()),
        _ => unreachable!("not a typed-array tag"),
    }
}

impl<W: Write, M: Write> TokenSink for BinaryTokenWriter<W, M> {
    fn start_object(&mut self) -> Result<(), WriteError> {
        self.ensure_active()?;
        if self.is_buffering() {
            self.rollback_buffered()?;
        }
        self.before_value();
        self.record_offset(OffsetKind::Object);
        self.push_token(&[TokenType::StartObject as u8])?;
        self.containers.push(Container::Object);
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), WriteError> {
        self.ensure_active()?;
        if self.is_buffering() {
            self.rollback_buffered()?;
        }
        match self.containers.pop() {
            Some(Container::Object) => {}
            other => {
                if let Some(container) = other {
                    self.containers.push(container);
                }
                return Err(WriteError::Unbalanced("object"));
            }
        }
        self.push_token(&[TokenType::EndObject as u8])?;
        self.after_value();
        Ok(())
    }

    fn start_array(&mut self) -> Result<(), WriteError> {
        self.ensure_active()?;
        if self.is_buffering() {
            // A nested container disqualifies the outer optimistic array;
            // the inner array is then considered on its own merits.
            self.rollback_buffered()?;
        }
        self.before_value();
        match self.array_decisions.get(&self.path_key()).copied() {
            Some(element_type) => {
                self.mode = ArrayMode::Buffering {
                    element_type,
                    values: Vec::new(),
                };
            }
            None => {
                self.record_offset(OffsetKind::Array);
                self.push_token(&[TokenType::StartArray as u8])?;
            }
        }
        self.containers.push(Container::Array { index: -1 });
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), WriteError> {
        self.ensure_active()?;
        match self.containers.pop() {
            Some(Container::Array { .. }) => {}
            other => {
                if let Some(container) = other {
                    self.containers.push(container);
                }
                return Err(WriteError::Unbalanced("array"));
            }
        }
        // Buffering can only belong to the innermost open array, which is
        // exactly the one being closed here.
        match std::mem::replace(&mut self.mode, ArrayMode::Idle) {
            ArrayMode::Buffering {
                element_type,
                values,
            } => {
                let width = element_type.element_width().unwrap_or(1);
                // Buffering caps the payload, so the u32 length cannot
                // truncate.
                let byte_length = values.len() * width;
                let mut token = Vec::with_capacity(5 + byte_length);
                token.push(element_type as u8);
                token.extend_from_slice(&(byte_length as u32).to_le_bytes());
                for value in &values {
                    pack_element(&mut token, element_type, *value);
                }
                self.push_token(&token)?;
            }
            ArrayMode::Idle => {
                self.push_token(&[TokenType::EndArray as u8])?;
            }
        }
        self.after_value();
        Ok(())
    }

    fn key(&mut self, key: &str) -> Result<(), WriteError> {
        self.ensure_active()?;
        if self.is_buffering() {
            self.rollback_buffered()?;
        }
        let index = self.register_string(key)?;
        let mut token = [0u8; 5];
        token[0] = TokenType::Key as u8;
        token[1..].copy_from_slice(&index.to_le_bytes());
        self.push_token(&token)?;
        self.path.push(PathSegment::Key(key.to_string()));
        Ok(())
    }

    fn string_value(&mut self, value: &str) -> Result<(), WriteError> {
        self.ensure_active()?;
        if self.is_buffering() {
            self.rollback_buffered()?;
        }
        self.before_value();
        let index = self.register_string(value)?;
        let mut token = [0u8; 5];
        token[0] = TokenType::String as u8;
        token[1..].copy_from_slice(&index.to_le_bytes());
        self.push_token(&token)?;
        self.after_value();
        Ok(())
    }

    fn number_value(&mut self, value: NumberValue<'_>) -> Result<(), WriteError> {
        self.ensure_active()?;
        if let ArrayMode::Buffering {
            element_type,
            ref values,
        } = self.mode
        {
            let width = element_type.element_width().unwrap_or(1);
            let within_ceiling =
                (values.len() + 1) * width <= MAX_TOKEN_PAYLOAD_BYTES as usize;
            match value.as_finite_f64() {
                Some(v) if within_ceiling && fits_element(element_type, v) => {
                    self.before_value();
                    if let ArrayMode::Buffering { values, .. } = &mut self.mode {
                        values.push(v);
                    }
                    self.after_value();
                    return Ok(());
                }
                // Non-numeric, non-finite, out-of-range for the decided
                // element type, or past the packed-payload ceiling: fall
                // back to ordinary encoding.
                _ => self.rollback_buffered()?,
            }
        }
        self.before_value();
        self.encode_number(value)?;
        self.after_value();
        Ok(())
    }

    fn boolean_value(&mut self, value: bool) -> Result<(), WriteError> {
        self.ensure_active()?;
        if self.is_buffering() {
            self.rollback_buffered()?;
        }
        self.before_value();
        let tag = if value {
            TokenType::True
        } else {
            TokenType::False
        };
        self.push_token(&[tag as u8])?;
        self.after_value();
        Ok(())
    }

    fn null_value(&mut self) -> Result<(), WriteError> {
        self.ensure_active()?;
        if self.is_buffering() {
            self.rollback_buffered()?;
        }
        self.before_value();
        self.push_token(&[TokenType::Null as u8])?;
        self.after_value();
        Ok(())
    }
}
