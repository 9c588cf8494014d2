//! Serializable value model and wire-text serializer
//!
//! Values cross the bridge as UTF-8 JSON text. Plain shapes (null, bool,
//! number, text, sequence, mapping) map directly onto JSON; shapes JSON
//! cannot represent natively travel as tagged records keyed by the
//! reserved `__type` discriminant:
//!
//! ```text
//! {"__type":"Error","name":"Error","message":"boom","stack":"..."}
//! {"__type":"undefined"}
//! {"__type":"Date","value":"2024-01-01T00:00:00Z"}
//! {"__type":"RegExp","source":"a+","flags":"gi"}
//! {"__type":"function","name":"callback"}
//! ```
//!
//! Decoding is an explicit tagged-union step: an object carrying `__type`
//! must match one of the tags above, and an unknown tag is a decode
//! failure, never passed through silently.
//!
//! # Limitation
//!
//! A plain user mapping that itself contains the literal `__type` key in
//! one of the recognized record shapes is indistinguishable from a tagged
//! record and will decode as one; a `__type` whose value is not a known
//! tag is rejected. The value tree is acyclic by construction, so no
//! backreference scheme is needed.

use crate::error::{DecodeError, EncodeError, OpError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Reserved discriminant key identifying tagged records
pub const TYPE_KEY: &str = "__type";

/// A value that can cross the bridge.
///
/// Closed tagged union: plain JSON shapes plus the special shapes the
/// serializer knows how to tag. Arguments and results are trees of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),

    /// Absent/undefined marker; round-trips to itself
    Undefined,

    /// Point in time; travels as an RFC3339 string
    Timestamp(OffsetDateTime),

    /// Regular-expression-like pattern
    Pattern { source: String, flags: String },

    /// An error value (operation failures travel as this)
    Error(OpError),

    /// Placeholder for a callable. Carries only the name; invoking the
    /// decoded stand-in always fails.
    FunctionRef { name: String },
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Invoke this value as a callable.
    ///
    /// A decoded `FunctionRef` is an uncallable placeholder: the original
    /// code never crosses the wire, so invocation always fails. Every
    /// other shape is simply not callable.
    pub fn invoke(&self, _args: Vec<Value>) -> Result<Value, OpError> {
        match self {
            Value::FunctionRef { name } => Err(OpError::named(
                "TypeError",
                format!("cannot call serialized function: {name}"),
            )),
            other => Err(OpError::named(
                "TypeError",
                format!("value is not callable: {}", other.to_debug_string()),
            )),
        }
    }

    /// Human-readable representation (wire text where encodable)
    pub fn to_debug_string(&self) -> String {
        encode(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Wire shape of the tagged records. The discriminant values match the
/// original tag strings exactly, so payloads stay interoperable.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "__type")]
enum Tagged {
    Error {
        name: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
    #[serde(rename = "undefined")]
    Undefined,
    Date {
        value: String,
    },
    RegExp {
        source: String,
        flags: String,
    },
    #[serde(rename = "function")]
    Function {
        name: String,
    },
}

impl Tagged {
    fn into_value(self) -> Result<Value, DecodeError> {
        Ok(match self {
            Tagged::Error {
                name,
                message,
                stack,
            } => Value::Error(OpError {
                name,
                message,
                trace: stack,
            }),
            Tagged::Undefined => Value::Undefined,
            Tagged::Date { value } => Value::Timestamp(OffsetDateTime::parse(&value, &Rfc3339)?),
            Tagged::RegExp { source, flags } => Value::Pattern { source, flags },
            Tagged::Function { name } => Value::FunctionRef { name },
        })
    }
}

/// Encode a value tree to wire payload text
pub fn encode(value: &Value) -> Result<String, EncodeError> {
    let json = to_json(value)?;
    Ok(serde_json::to_string(&json)?)
}

/// Decode wire payload text back into a value tree
pub fn decode(text: &str) -> Result<Value, DecodeError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    from_json(&json)
}

fn to_json(value: &Value) -> Result<serde_json::Value, EncodeError> {
    use serde_json::Value as Json;

    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .ok_or(EncodeError::NonFiniteNumber)?,
        Value::Text(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Map(entries) => {
            let mut obj = serde_json::Map::with_capacity(entries.len());
            for (key, val) in entries {
                obj.insert(key.clone(), to_json(val)?);
            }
            Json::Object(obj)
        }
        Value::Undefined => tagged(&Tagged::Undefined)?,
        Value::Timestamp(ts) => tagged(&Tagged::Date {
            value: ts.format(&Rfc3339)?,
        })?,
        Value::Pattern { source, flags } => tagged(&Tagged::RegExp {
            source: source.clone(),
            flags: flags.clone(),
        })?,
        Value::Error(err) => tagged(&Tagged::Error {
            name: err.name.clone(),
            message: err.message.clone(),
            stack: err.trace.clone(),
        })?,
        Value::FunctionRef { name } => tagged(&Tagged::Function { name: name.clone() })?,
    })
}

fn tagged(record: &Tagged) -> Result<serde_json::Value, EncodeError> {
    Ok(serde_json::to_value(record)?)
}

fn from_json(json: &serde_json::Value) -> Result<Value, DecodeError> {
    use serde_json::Value as Json;

    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                // u64 beyond i64 range degrades to float
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(items) => Value::List(
            items
                .iter()
                .map(from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Json::Object(obj) => {
            if obj.contains_key(TYPE_KEY) {
                let record: Tagged =
                    serde_json::from_value(json.clone()).map_err(DecodeError::Tag)?;
                record.into_value()?
            } else {
                let mut entries = BTreeMap::new();
                for (key, val) in obj {
                    entries.insert(key.clone(), from_json(val)?);
                }
                Value::Map(entries)
            }
        }
    })
}
