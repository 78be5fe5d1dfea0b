// SPDX-License-Identifier: MIT
//! Whole-document reconstruction
//!
//! Walks a reader's token stream in order and rebuilds the JSON value it
//! encodes. Packed numeric arrays expand back to plain arrays of numbers.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::reader::{BinaryToken, BinaryTokenReader, ReadError};

enum Frame {
    Array(Vec<Value>),
    Object(Map<String, Value>, Option<String>),
}

/// Rebuild the full document from a reader.
pub fn read_document(reader: &BinaryTokenReader) -> Result<Value, ReadError> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    for token in reader.tokens() {
        match token? {
            BinaryToken::StartObject => stack.push(Frame::Object(Map::new(), None)),
            BinaryToken::StartArray => stack.push(Frame::Array(Vec::new())),
            BinaryToken::EndObject => {
                let value = match stack.pop() {
                    Some(Frame::Object(map, None)) => Value::Object(map),
                    Some(Frame::Object(_, Some(_))) => {
                        return Err(structural("object ends after a dangling key"))
                    }
                    _ => return Err(structural("unbalanced object end")),
                };
                attach(&mut stack, &mut root, value)?;
            }
            BinaryToken::EndArray => {
                let value = match stack.pop() {
                    Some(Frame::Array(items)) => Value::Array(items),
                    _ => return Err(structural("unbalanced array end")),
                };
                attach(&mut stack, &mut root, value)?;
            }
            BinaryToken::Key(key) => match stack.last_mut() {
                Some(Frame::Object(_, pending)) => *pending = Some(key),
                _ => return Err(structural("key outside an object")),
            },
            BinaryToken::String(text) => attach(&mut stack, &mut root, Value::String(text))?,
            BinaryToken::Number(text) => attach(&mut stack, &mut root, number_value(&text))?,
            BinaryToken::Boolean(flag) => attach(&mut stack, &mut root, Value::Bool(flag))?,
            BinaryToken::Null => attach(&mut stack, &mut root, Value::Null)?,
            BinaryToken::NumberArray(values) => {
                let items = values.iter().map(|v| element_value(*v)).collect();
                attach(&mut stack, &mut root, Value::Array(items))?;
            }
        }
    }

    if !stack.is_empty() {
        return Err(structural("token stream ends inside a container"));
    }
    root.ok_or_else(|| structural("token stream carries no value"))
}

fn attach(stack: &mut [Frame], root: &mut Option<Value>, value: Value) -> Result<(), ReadError> {
    match stack.last_mut() {
        Some(Frame::Array(items)) => items.push(value),
        Some(Frame::Object(map, pending)) => {
            let key = pending
                .take()
                .ok_or_else(|| structural("value without a preceding key"))?;
            map.insert(key, value);
        }
        None => {
            if root.is_some() {
                return Err(structural("multiple root values"));
            }
            *root = Some(value);
        }
    }
    Ok(())
}

/// Numeral text back to a JSON number. Texts JSON cannot carry (NaN,
/// Infinity from a non-finite source value) collapse to null.
fn number_value(text: &str) -> Value {
    match serde_json::Number::from_str(text) {
        Ok(number) => Value::Number(number),
        Err(_) => Value::Null,
    }
}

fn element_value(value: f64) -> Value {
    const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INT {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

fn structural(message: &str) -> ReadError {
    ReadError::InvalidSection(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::JsonAnalyzer;
    use crate::events::emit_value;
    use crate::writer::{BinaryTokenWriter, WriterOptions};

    fn round_trip(json: &str, analyzed: bool) -> Value {
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        let report = if analyzed {
            let mut analyzer = JsonAnalyzer::new();
            emit_value(&mut analyzer, &value).unwrap();
            Some(analyzer.into_report())
        } else {
            None
        };

        let mut tokens = Vec::new();
        let mut metadata = Vec::new();
        let mut writer = BinaryTokenWriter::with_options(
            &mut tokens,
            &mut metadata,
            report,
            WriterOptions::default(),
        )
        .unwrap();
        emit_value(&mut writer, &value).unwrap();
        writer.finalize().unwrap();
        drop(writer);

        let reader = BinaryTokenReader::from_buffers(metadata, tokens).unwrap();
        read_document(&reader).unwrap()
    }

    #[test]
    fn test_round_trip_document() {
        let json = r#"{"name":"sensor-1","readings":[1.5,2.25,-3],"meta":{"ok":true,"ts":null},"tags":["a","a","b"]}"#;
        let expected: Value = serde_json::from_str(json).unwrap();
        assert_eq!(round_trip(json, false), expected);
    }

    #[test]
    fn test_round_trip_with_typed_arrays() {
        let json = r#"{"samples":[0,127,255],"deltas":[-5,5],"mixed":[1,"x"]}"#;
        let expected: Value = serde_json::from_str(json).unwrap();
        assert_eq!(round_trip(json, true), expected);
    }

    #[test]
    fn test_scalar_root() {
        assert_eq!(round_trip("42", false), Value::from(42));
        assert_eq!(round_trip("\"hi\"", false), Value::from("hi"));
        assert_eq!(round_trip("null", false), Value::Null);
    }

    #[test]
    fn test_analyzed_and_plain_agree() {
        let json = r#"{"a":[1,2,3],"b":[[4,5],[6]],"c":[0.25,0.75]}"#;
        assert_eq!(round_trip(json, false), round_trip(json, true));
    }

    #[test]
    fn test_number_value_fallback() {
        assert_eq!(number_value("42"), Value::from(42));
        assert_eq!(number_value("-0.5"), Value::from(-0.5));
        assert_eq!(number_value("NaN"), Value::Null);
        assert_eq!(number_value("Infinity"), Value::Null);
    }
}
