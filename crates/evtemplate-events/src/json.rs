/*
 * json.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Conversion from JSON.
//!
//! Two entry points are provided:
//!
//! - `From<serde_json::Value> for Value`, for building property values from
//!   arbitrary JSON documents
//! - [`LogEvent::from_clef`], for reading events in the compact JSON event
//!   layout (`@t`, `@mt`, `@l`, `@x`, with remaining members as properties)

use crate::error::{EventError, EventResult};
use crate::event::LogEvent;
use crate::level::Level;
use crate::value::{Property, Scalar, Structure, Value};
use chrono::DateTime;
use indexmap::IndexMap;

/// Member name that carries a structure's type tag.
const TYPE_TAG_MEMBER: &str = "$type";

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::null(),
            serde_json::Value::Bool(b) => Value::from(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Scalar(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Value::Scalar(Scalar::UInt(u))
                } else {
                    Value::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(members) => {
                let mut structure = Structure::default();
                for (name, member) in members {
                    match member {
                        serde_json::Value::String(tag) if name == TYPE_TAG_MEMBER => {
                            structure.type_tag = Some(tag);
                        }
                        other => structure.properties.push(Property::new(name, other.into())),
                    }
                }
                Value::Structure(structure)
            }
        }
    }
}

impl LogEvent {
    /// Read one event in the compact JSON event layout.
    ///
    /// `@t` is required. `@mt` falls back to `@m` when absent. Members whose
    /// names start with `@@` are unescaped to a single `@`; other `@`-members
    /// are reserved and skipped.
    pub fn from_clef(line: &str) -> EventResult<LogEvent> {
        let json: serde_json::Value = serde_json::from_str(line)?;
        let serde_json::Value::Object(members) = json else {
            return Err(EventError::InvalidMember {
                member: "<root>",
                message: "expected a JSON object".to_string(),
            });
        };

        let timestamp = match members.get("@t") {
            Some(serde_json::Value::String(t)) => {
                DateTime::parse_from_rfc3339(t).map_err(|e| EventError::InvalidMember {
                    member: "@t",
                    message: e.to_string(),
                })?
            }
            Some(_) => {
                return Err(EventError::InvalidMember {
                    member: "@t",
                    message: "expected a string".to_string(),
                });
            }
            None => return Err(EventError::MissingMember { member: "@t" }),
        };

        let level = match members.get("@l") {
            Some(serde_json::Value::String(l)) => l.parse::<Level>()?,
            Some(_) => {
                return Err(EventError::InvalidMember {
                    member: "@l",
                    message: "expected a string".to_string(),
                });
            }
            None => Level::Information,
        };

        let message_template = members
            .get("@mt")
            .or_else(|| members.get("@m"))
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();

        let exception = members
            .get("@x")
            .and_then(|x| x.as_str())
            .map(str::to_string);

        let mut properties = IndexMap::new();
        for (name, member) in members {
            if let Some(unescaped) = name.strip_prefix("@@") {
                properties.insert(format!("@{}", unescaped), Value::from(member));
            } else if !name.starts_with('@') {
                properties.insert(name, Value::from(member));
            }
        }

        Ok(LogEvent {
            timestamp,
            level,
            message_template,
            properties,
            exception,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_json_scalars() {
        assert_eq!(Value::from(json!(null)), Value::null());
        assert_eq!(Value::from(json!(3)), Value::from(3_i64));
        assert_eq!(Value::from(json!(u64::MAX)), Value::from(u64::MAX));
        assert_eq!(Value::from(json!(1.5)), Value::from(1.5));
        assert_eq!(Value::from(json!("s")), Value::from("s"));
    }

    #[test]
    fn test_json_object_with_type_tag() {
        let value = Value::from(json!({"$type": "Point", "X": 1, "Y": 2}));
        let Value::Structure(s) = value else {
            panic!("expected a structure");
        };
        assert_eq!(s.type_tag.as_deref(), Some("Point"));
        assert_eq!(s.properties.len(), 2);
        assert_eq!(s.get("X"), Some(&Value::from(1_i64)));
    }

    #[test]
    fn test_from_clef() {
        let event = LogEvent::from_clef(
            r#"{"@t":"2024-01-02T03:04:05.678Z","@mt":"Hello, {Name}!","@l":"Warning","Name":"World","@@Odd":1,"@i":"abc"}"#,
        )
        .unwrap();

        assert_eq!(event.level, Level::Warning);
        assert_eq!(event.message_template, "Hello, {Name}!");
        assert_eq!(event.property("Name"), Some(&Value::from("World")));
        assert_eq!(event.property("@Odd"), Some(&Value::from(1_i64)));
        assert_eq!(event.properties.len(), 2);
        assert!(event.exception.is_none());
    }

    #[test]
    fn test_from_clef_defaults_to_information() {
        let event = LogEvent::from_clef(r#"{"@t":"2024-01-02T03:04:05Z","@m":"hi"}"#).unwrap();
        assert_eq!(event.level, Level::Information);
        assert_eq!(event.message_template, "hi");
    }

    #[test]
    fn test_from_clef_requires_timestamp() {
        let err = LogEvent::from_clef(r#"{"@mt":"x"}"#).unwrap_err();
        assert!(matches!(err, EventError::MissingMember { member: "@t" }));
    }
}
