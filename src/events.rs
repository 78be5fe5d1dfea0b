// SPDX-License-Identifier: MIT
//! The token-source contract consumed by the analyzer and the writer
//!
//! An external tokenizer drives a [`TokenSink`] with one call per JSON
//! structural event, strictly sequentially, awaiting each call's completion
//! before the next. [`emit_value`] adapts an already-parsed
//! [`serde_json::Value`] to the same contract for tests and the CLI.

use crate::writer::WriteError;

/// A JSON number as delivered by a tokenizer: either an already-parsed
/// float or the raw numeral text (which may exceed f64 precision).
#[derive(Debug, Clone, Copy)]
pub enum NumberValue<'a> {
    Float(f64),
    Text(&'a str),
}

impl NumberValue<'_> {
    /// The value as a finite f64, or `None` when it is non-finite or the
    /// text is not parseable as a number.
    pub fn as_finite_f64(&self) -> Option<f64> {
        let value = match self {
            NumberValue::Float(v) => *v,
            NumberValue::Text(text) => text.parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    /// The numeral text for string-table fallback storage.
    pub fn to_text(&self) -> String {
        match self {
            NumberValue::Float(v) => format_f64(*v),
            NumberValue::Text(text) => (*text).to_string(),
        }
    }
}

impl From<f64> for NumberValue<'static> {
    fn from(value: f64) -> Self {
        NumberValue::Float(value)
    }
}

/// Render an f64 the way JSON renders it: integral values without a
/// fractional part, everything else via the shortest round-trip form.
pub(crate) fn format_f64(value: f64) -> String {
    const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT_INT {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Consumer of a stream of JSON structural events.
///
/// Exactly the nine operations of the wire vocabulary. Implementations hold
/// mutable per-stream state, so a single producer must issue calls
/// sequentially; a call that returns `Err` poisons the stream.
pub trait TokenSink {
    fn start_object(&mut self) -> Result<(), WriteError>;
    fn end_object(&mut self) -> Result<(), WriteError>;
    fn start_array(&mut self) -> Result<(), WriteError>;
    fn end_array(&mut self) -> Result<(), WriteError>;
    fn key(&mut self, key: &str) -> Result<(), WriteError>;
    fn string_value(&mut self, value: &str) -> Result<(), WriteError>;
    fn number_value(&mut self, value: NumberValue<'_>) -> Result<(), WriteError>;
    fn boolean_value(&mut self, value: bool) -> Result<(), WriteError>;
    fn null_value(&mut self) -> Result<(), WriteError>;
}

/// Drive a sink with the events of a parsed JSON document.
pub fn emit_value<S: TokenSink>(sink: &mut S, value: &serde_json::Value) -> Result<(), WriteError> {
    match value {
        serde_json::Value::Null => sink.null_value(),
        serde_json::Value::Bool(b) => sink.boolean_value(*b),
        serde_json::Value::Number(n) => sink.number_value(NumberValue::Text(&n.to_string())),
        serde_json::Value::String(s) => sink.string_value(s),
        serde_json::Value::Array(items) => {
            sink.start_array()?;
            for item in items {
                emit_value(sink, item)?;
            }
            sink.end_array()
        }
        serde_json::Value::Object(map) => {
            sink.start_object()?;
            for (key, item) in map {
                sink.key(key)?;
                emit_value(sink, item)?;
            }
            sink.end_object()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<String>,
    }

    impl TokenSink for RecordingSink {
        fn start_object(&mut self) -> Result<(), WriteError> {
            self.events.push("{".into());
            Ok(())
        }
        fn end_object(&mut self) -> Result<(), WriteError> {
            self.events.push("}".into());
            Ok(())
        }
        fn start_array(&mut self) -> Result<(), WriteError> {
            self.events.push("[".into());
            Ok(())
        }
        fn end_array(&mut self) -> Result<(), WriteError> {
            self.events.push("]".into());
            Ok(())
        }
        fn key(&mut self, key: &str) -> Result<(), WriteError> {
            self.events.push(format!("key:{key}"));
            Ok(())
        }
        fn string_value(&mut self, value: &str) -> Result<(), WriteError> {
            self.events.push(format!("str:{value}"));
            Ok(())
        }
        fn number_value(&mut self, value: NumberValue<'_>) -> Result<(), WriteError> {
            self.events.push(format!("num:{}", value.to_text()));
            Ok(())
        }
        fn boolean_value(&mut self, value: bool) -> Result<(), WriteError> {
            self.events.push(format!("bool:{value}"));
            Ok(())
        }
        fn null_value(&mut self) -> Result<(), WriteError> {
            self.events.push("null".into());
            Ok(())
        }
    }

    #[test]
    fn test_emit_value_walks_document() {
        let value: serde_json::Value =
            serde_json::from_str(r#"{"a":[1,true,null],"b":"x"}"#).unwrap();
        let mut sink = RecordingSink::default();
        emit_value(&mut sink, &value).unwrap();
        assert_eq!(
            sink.events,
            vec![
                "{", "key:a", "[", "num:1", "bool:true", "null", "]", "key:b", "str:x", "}"
            ]
        );
    }

    #[test]
    fn test_number_value_parsing() {
        assert_eq!(NumberValue::Text("42").as_finite_f64(), Some(42.0));
        assert_eq!(NumberValue::Text("4.5e2").as_finite_f64(), Some(450.0));
        assert_eq!(NumberValue::Text("not a number").as_finite_f64(), None);
        assert_eq!(NumberValue::Float(f64::NAN).as_finite_f64(), None);
        assert_eq!(NumberValue::Float(f64::INFINITY).as_finite_f64(), None);
    }

    #[test]
    fn test_format_f64() {
        assert_eq!(format_f64(42.0), "42");
        assert_eq!(format_f64(-7.0), "-7");
        assert_eq!(format_f64(0.5), "0.5");
        assert_eq!(format_f64(1.5e3), "1500");
    }
}
