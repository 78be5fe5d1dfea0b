// SPDX-License-Identifier: MIT
//! Single-pass event-stream analyzer
//!
//! Feeds on the same event vocabulary as the writer and produces an
//! [`AnalysisReport`]: one typed-array encoding decision per JSON path whose
//! array holds only finite numbers, plus string interning statistics. The
//! analyzer never emits bytes; a second pass hands the report to the writer.

use std::collections::HashMap;

use crate::events::{NumberValue, TokenSink};
use crate::format::TokenType;
use crate::writer::WriteError;

/// Aggregate string statistics across every Key/String event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringStats {
    pub unique_count: usize,
    pub total_count: usize,
    pub unique_bytes: usize,
    pub total_bytes: usize,
}

/// Immutable result of one analysis pass
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    /// Typed-array decision per `/`-joined JSON path
    pub arrays: HashMap<String, TokenType>,
    /// Unique strings in first-seen order, used to pre-seed the writer's table
    pub strings: Vec<String>,
    pub string_stats: StringStats,
}

/// Running statistics for one open array
#[derive(Debug, Clone, Copy)]
struct ArrayStats {
    count: usize,
    min: f64,
    max: f64,
    all_integer: bool,
    still_valid: bool,
}

impl ArrayStats {
    fn new() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            all_integer: true,
            still_valid: true,
        }
    }

    /// Narrowest element type for the observed range, ascending widths.
    fn element_type(&self) -> TokenType {
        if self.all_integer {
            if self.min >= 0.0 && self.max <= u8::MAX as f64 {
                TokenType::Uint8Array
            } else if self.min >= i8::MIN as f64 && self.max <= i8::MAX as f64 {
                TokenType::Int8Array
            } else if self.min >= 0.0 && self.max <= u16::MAX as f64 {
                TokenType::Uint16Array
            } else if self.min >= i16::MIN as f64 && self.max <= i16::MAX as f64 {
                TokenType::Int16Array
            } else if self.min >= 0.0 && self.max <= u32::MAX as f64 {
                TokenType::Uint32Array
            } else if self.min >= i32::MIN as f64 && self.max <= i32::MAX as f64 {
                TokenType::Int32Array
            } else {
                TokenType::Float64Array
            }
        } else {
            TokenType::Float64Array
        }
    }
}

/// Container state while walking the document
#[derive(Debug, Clone, Copy)]
enum Container {
    Root,
    Object,
    Array { index: i64, stats: ArrayStats },
}

/// One segment of the current JSON path
#[derive(Debug, Clone)]
enum PathSegment {
    Key(String),
    Index(i64),
}

/// Walks an event stream once and collects typed-array and string statistics.
pub struct JsonAnalyzer {
    containers: Vec<Container>,
    path: Vec<PathSegment>,
    string_index: HashMap<String, u32>,
    strings: Vec<String>,
    arrays: HashMap<String, TokenType>,
    stats: StringStats,
}

impl JsonAnalyzer {
    pub fn new() -> Self {
        Self {
            containers: vec![Container::Root],
            path: Vec::new(),
            string_index: HashMap::new(),
            strings: Vec::new(),
            arrays: HashMap::new(),
            stats: StringStats::default(),
        }
    }

    /// Consume the analyzer and produce its report.
    pub fn into_report(self) -> AnalysisReport {
        tracing::debug!(
            arrays = self.arrays.len(),
            unique_strings = self.stats.unique_count,
            total_strings = self.stats.total_count,
            "analysis pass complete"
        );
        AnalysisReport {
            arrays: self.arrays,
            strings: self.strings,
            string_stats: self.stats,
        }
    }

    fn register_string(&mut self, value: &str) {
        self.stats.total_count += 1;
        self.stats.total_bytes += value.len();
        if !self.string_index.contains_key(value) {
            self.stats.unique_count += 1;
            self.stats.unique_bytes += value.len();
            self.string_index
                .insert(value.to_string(), self.strings.len() as u32);
            self.strings.push(value.to_string());
        }
    }

    /// Entering a value: an array parent gains a child, which joins the path.
    fn before_value(&mut self) {
        if let Some(Container::Array { index, .. }) = self.containers.last_mut() {
            *index += 1;
            let index = *index;
            self.path.push(PathSegment::Index(index));
        }
    }

    /// Leaving a value: pop the index (array parent) or the key (object parent).
    fn after_value(&mut self) {
        match self.containers.last() {
            Some(Container::Array { .. }) | Some(Container::Object) => {
                self.path.pop();
            }
            _ => {}
        }
    }

    /// A non-numeric or container child disqualifies the enclosing array.
    fn invalidate_enclosing_array(&mut self) {
        if let Some(Container::Array { stats, .. }) = self.containers.last_mut() {
            stats.still_valid = false;
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
}

impl Default for JsonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSink for JsonAnalyzer {
    fn start_object(&mut self) -> Result<(), WriteError> {
        self.before_value();
        self.invalidate_enclosing_array();
        self.containers.push(Container::Object);
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), WriteError> {
        match self.containers.pop() {
            Some(Container::Object) => {}
            _ => return Err(WriteError::Unbalanced("object")),
        }
        self.after_value();
        Ok(())
    }

    fn start_array(&mut self) -> Result<(), WriteError> {
        self.before_value();
        self.invalidate_enclosing_array();
        self.containers.push(Container::Array {
            index: -1,
            stats: ArrayStats::new(),
        });
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), WriteError> {
        let stats = match self.containers.pop() {
            Some(Container::Array { stats, .. }) => stats,
            _ => return Err(WriteError::Unbalanced("array")),
        };

        // The child index was already popped, so the path now names the
        // array itself.
        if stats.still_valid && stats.count > 0 {
            self.arrays.insert(self.path_key(), stats.element_type());
        }

        self.after_value();
        Ok(())
    }

    fn key(&mut self, key: &str) -> Result<(), WriteError> {
        self.path.push(PathSegment::Key(key.to_string()));
        self.register_string(key);
        Ok(())
    }

    fn string_value(&mut self, value: &str) -> Result<(), WriteError> {
        self.before_value();
        self.invalidate_enclosing_array();
        self.register_string(value);
        self.after_value();
        Ok(())
    }

    fn number_value(&mut self, value: NumberValue<'_>) -> Result<(), WriteError> {
        self.before_value();
        if let Some(Container::Array { stats, .. }) = self.containers.last_mut() {
            if stats.still_valid {
                match value.as_finite_f64() {
                    Some(number) => {
                        stats.count += 1;
                        stats.min = stats.min.min(number);
                        stats.max = stats.max.max(number);
                        if number.fract() != 0.0 {
                            stats.all_integer = false;
                        }
                    }
                    None => stats.still_valid = false,
                }
            }
        }
        self.after_value();
        Ok(())
    }

    fn boolean_value(&mut self, _value: bool) -> Result<(), WriteError> {
        self.before_value();
        self.invalidate_enclosing_array();
        self.after_value();
        Ok(())
    }

    fn null_value(&mut self) -> Result<(), WriteError> {
        self.before_value();
        self.invalidate_enclosing_array();
        self.after_value();
        Ok(())
    }
}
