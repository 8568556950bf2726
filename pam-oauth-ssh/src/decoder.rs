//! Field-descriptor driven decoding of Globus Auth resource bodies.
//!
//! Every resource model declares an ordered table of [`Field`]s and pulls
//! typed values out of a parsed `serde_json::Value` through a [`Decoder`].
//! A lookup has exactly three outcomes: a required key is missing (error),
//! an optional key is missing or `null` ([`Slot::Absent`]), or the key is
//! present with the expected kind ([`Slot::Present`]).
//!
//! Each failure is logged once, where it is produced, with the same text the
//! error displays.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Failed to parse {resource} record: {reason}")]
    Syntax {
        resource: &'static str,
        reason: String,
    },

    #[error("{resource} record is not a JSON object")]
    NotAnObject { resource: &'static str },

    #[error("{resource} record is missing required key '{key}'")]
    MissingKey {
        resource: &'static str,
        key: &'static str,
    },

    #[error("{resource} record has wrong type for required key '{key}'")]
    WrongType {
        resource: &'static str,
        key: &'static str,
    },

    #[error("{resource} field '{key}' is malformed")]
    Malformed {
        resource: &'static str,
        key: &'static str,
    },

    #[error("{resource} record has invalid value '{value}' for key '{key}'")]
    InvalidValue {
        resource: &'static str,
        key: &'static str,
        value: String,
    },
}

impl DecodeError {
    /// Key the failure is attributed to, if any.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Self::MissingKey { key, .. }
            | Self::WrongType { key, .. }
            | Self::Malformed { key, .. }
            | Self::InvalidValue { key, .. } => Some(key),
            Self::Syntax { .. } | Self::NotAnObject { .. } => None,
        }
    }

    fn logged(self) -> Self {
        tracing::error!("{}", self);
        self
    }
}

/// JSON kinds a field can be declared with. Floats and `null` never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Bool,
    Int,
    String,
    Array,
    Object,
}

impl JsonKind {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// One entry of a resource model's descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub required: bool,
    pub kind: JsonKind,
}

impl Field {
    pub const fn required(key: &'static str, kind: JsonKind) -> Self {
        Self {
            key,
            required: true,
            kind,
        }
    }

    pub const fn optional(key: &'static str, kind: JsonKind) -> Self {
        Self {
            key,
            required: false,
            kind,
        }
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot<'a> {
    Present(&'a Value),
    Absent,
}

/// Parse a response body into a JSON tree, attributing failures to `resource`.
pub fn parse(resource: &'static str, body: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(body).map_err(|e| {
        DecodeError::Syntax {
            resource,
            reason: e.to_string(),
        }
        .logged()
    })
}

/// Scalar and string-array conversion out of an already kind-checked value.
pub trait Extract: Sized {
    const KIND: JsonKind;

    fn extract(resource: &'static str, key: &'static str, value: &Value)
        -> Result<Self, DecodeError>;
}

impl Extract for bool {
    const KIND: JsonKind = JsonKind::Bool;

    fn extract(resource: &'static str, key: &'static str, value: &Value) -> Result<Self, DecodeError> {
        value
            .as_bool()
            .ok_or_else(|| DecodeError::WrongType { resource, key }.logged())
    }
}

impl Extract for i64 {
    const KIND: JsonKind = JsonKind::Int;

    fn extract(resource: &'static str, key: &'static str, value: &Value) -> Result<Self, DecodeError> {
        value
            .as_i64()
            .ok_or_else(|| DecodeError::WrongType { resource, key }.logged())
    }
}

impl Extract for String {
    const KIND: JsonKind = JsonKind::String;

    fn extract(resource: &'static str, key: &'static str, value: &Value) -> Result<Self, DecodeError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| DecodeError::WrongType { resource, key }.logged())
    }
}

impl Extract for Vec<String> {
    const KIND: JsonKind = JsonKind::Array;

    fn extract(resource: &'static str, key: &'static str, value: &Value) -> Result<Self, DecodeError> {
        let items = value
            .as_array()
            .ok_or_else(|| DecodeError::WrongType { resource, key }.logged())?;

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item.as_str() {
                Some(s) => out.push(s.to_owned()),
                None => return Err(DecodeError::Malformed { resource, key }.logged()),
            }
        }
        Ok(out)
    }
}

/// A view over one JSON object belonging to `resource`.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    resource: &'static str,
    object: &'a Map<String, Value>,
}

impl<'a> Decoder<'a> {
    pub fn new(resource: &'static str, value: &'a Value) -> Result<Self, DecodeError> {
        match value.as_object() {
            Some(object) => Ok(Self { resource, object }),
            None => Err(DecodeError::NotAnObject { resource }.logged()),
        }
    }

    /// Resolve `field` against this object.
    ///
    /// A `null` value on an optional field is the same as the key being
    /// absent. On a required field it is a wrong type.
    pub fn lookup(&self, field: &Field) -> Result<Slot<'a>, DecodeError> {
        let resource = self.resource;
        let key = field.key;

        match self.object.get(key) {
            None if field.required => Err(DecodeError::MissingKey { resource, key }.logged()),
            None => Ok(Slot::Absent),
            Some(Value::Null) if !field.required => Ok(Slot::Absent),
            Some(value) if field.kind.matches(value) => Ok(Slot::Present(value)),
            Some(_) => Err(DecodeError::WrongType { resource, key }.logged()),
        }
    }

    /// Typed lookup. `None` means the field is optional and absent.
    pub fn get<T: Extract>(&self, field: &Field) -> Result<Option<T>, DecodeError> {
        debug_assert_eq!(field.kind, T::KIND, "descriptor kind for '{}'", field.key);
        match self.lookup(field)? {
            Slot::Present(value) => T::extract(self.resource, field.key, value).map(Some),
            Slot::Absent => Ok(None),
        }
    }

    /// Typed lookup of a field that must be present.
    pub fn require<T: Extract>(&self, field: &Field) -> Result<T, DecodeError> {
        self.get(field)?.ok_or_else(|| {
            DecodeError::MissingKey {
                resource: self.resource,
                key: field.key,
            }
            .logged()
        })
    }

    /// Descend into a nested object field.
    pub fn nested(&self, field: &Field) -> Result<Option<Decoder<'a>>, DecodeError> {
        match self.lookup(field)? {
            Slot::Present(value) => Decoder::new(self.resource, value).map(Some),
            Slot::Absent => Ok(None),
        }
    }

    pub fn require_nested(&self, field: &Field) -> Result<Decoder<'a>, DecodeError> {
        self.nested(field)?.ok_or_else(|| {
            DecodeError::MissingKey {
                resource: self.resource,
                key: field.key,
            }
            .logged()
        })
    }

    /// Decode every element of an array-of-objects field with `decode`.
    ///
    /// A non-object element is reported as a malformed `field`.
    pub fn each<T, F>(&self, field: &Field, mut decode: F) -> Result<Option<Vec<T>>, DecodeError>
    where
        F: FnMut(Decoder<'a>) -> Result<T, DecodeError>,
    {
        let items = match self.lookup(field)? {
            Slot::Present(Value::Array(items)) => items,
            Slot::Present(_) | Slot::Absent => return Ok(None),
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let object = item.as_object().ok_or_else(|| self.malformed(field))?;
            out.push(decode(Decoder {
                resource: self.resource,
                object,
            })?);
        }
        Ok(Some(out))
    }

    /// Decode an object field whose keys are identifiers and whose values
    /// are records, in key order.
    pub fn entries<T, F>(&self, field: &Field, mut decode: F) -> Result<Option<Vec<T>>, DecodeError>
    where
        F: FnMut(&'a str, Decoder<'a>) -> Result<T, DecodeError>,
    {
        let object = match self.lookup(field)? {
            Slot::Present(Value::Object(object)) => object,
            Slot::Present(_) | Slot::Absent => return Ok(None),
        };

        let mut out = Vec::with_capacity(object.len());
        for (id, value) in object {
            let record = value.as_object().ok_or_else(|| self.malformed(field))?;
            out.push(decode(
                id.as_str(),
                Decoder {
                    resource: self.resource,
                    object: record,
                },
            )?);
        }
        Ok(Some(out))
    }

    /// Error for a value that is present but unacceptable.
    pub fn invalid_value(&self, field: &Field, value: &str) -> DecodeError {
        DecodeError::InvalidValue {
            resource: self.resource,
            key: field.key,
            value: value.to_owned(),
        }
        .logged()
    }

    fn malformed(&self, field: &Field) -> DecodeError {
        DecodeError::Malformed {
            resource: self.resource,
            key: field.key,
        }
        .logged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NAME: Field = Field::required("name", JsonKind::String);
    const COUNT: Field = Field::optional("count", JsonKind::Int);
    const TAGS: Field = Field::required("tags", JsonKind::Array);

    #[test]
    fn test_missing_required_key() {
        let value = json!({});
        let d = Decoder::new("Widget", &value).unwrap();
        let err = d.lookup(&NAME).unwrap_err();
        assert_eq!(err.to_string(), "Widget record is missing required key 'name'");
        assert_eq!(err.key(), Some("name"));
    }

    #[test]
    fn test_optional_absent_and_null_are_equivalent() {
        let missing = json!({});
        let null = json!({ "count": null });

        let a = Decoder::new("Widget", &missing).unwrap();
        let b = Decoder::new("Widget", &null).unwrap();

        assert_eq!(a.lookup(&COUNT).unwrap(), Slot::Absent);
        assert_eq!(b.lookup(&COUNT).unwrap(), Slot::Absent);
        assert_eq!(a.get::<i64>(&COUNT).unwrap(), None);
        assert_eq!(b.get::<i64>(&COUNT).unwrap(), None);
    }

    #[test]
    fn test_null_on_required_field_is_wrong_type() {
        let value = json!({ "name": null });
        let d = Decoder::new("Widget", &value).unwrap();
        let err = d.require::<String>(&NAME).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Widget record has wrong type for required key 'name'"
        );
    }

    #[test]
    fn test_float_is_not_an_int() {
        let value = json!({ "count": 1.5 });
        let d = Decoder::new("Widget", &value).unwrap();
        assert!(matches!(
            d.get::<i64>(&COUNT),
            Err(DecodeError::WrongType { key: "count", .. })
        ));
    }

    #[test]
    fn test_string_array_element_must_be_string() {
        let value = json!({ "tags": ["a", 2] });
        let d = Decoder::new("Widget", &value).unwrap();
        let err = d.require::<Vec<String>>(&TAGS).unwrap_err();
        assert_eq!(err.to_string(), "Widget field 'tags' is malformed");
    }

    #[test]
    fn test_strings_are_copied_out() {
        let tags = {
            let value = json!({ "tags": ["a", "b"] });
            let d = Decoder::new("Widget", &value).unwrap();
            d.require::<Vec<String>>(&TAGS).unwrap()
        };
        assert_eq!(tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_each_rejects_non_object_elements() {
        const ITEMS: Field = Field::required("items", JsonKind::Array);
        let value = json!({ "items": [{ "name": "x" }, "oops"] });
        let d = Decoder::new("Widget", &value).unwrap();
        let err = d
            .each(&ITEMS, |item| item.require::<String>(&NAME))
            .unwrap_err();
        assert_eq!(err.to_string(), "Widget field 'items' is malformed");
    }

    #[test]
    fn test_entries_keyed_by_identifier() {
        const BY_ID: Field = Field::optional("by_id", JsonKind::Object);
        let value = json!({ "by_id": { "b": { "name": "two" }, "a": { "name": "one" } } });
        let d = Decoder::new("Widget", &value).unwrap();
        let out = d
            .entries(&BY_ID, |id, item| {
                Ok((id.to_string(), item.require::<String>(&NAME)?))
            })
            .unwrap()
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.contains(&("a".to_string(), "one".to_string())));
        assert!(out.contains(&("b".to_string(), "two".to_string())));
    }

    #[test]
    fn test_nested_failure_propagates() {
        const INNER: Field = Field::required("inner", JsonKind::Object);
        let value = json!({ "inner": {} });
        let d = Decoder::new("Widget", &value).unwrap();
        let inner = d.require_nested(&INNER).unwrap();
        assert!(matches!(
            inner.require::<String>(&NAME),
            Err(DecodeError::MissingKey { key: "name", .. })
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse("Widget", "{not json").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse Widget record"));
    }

    #[test]
    fn test_root_must_be_object() {
        let value = json!([1, 2]);
        assert_eq!(
            Decoder::new("Widget", &value).unwrap_err(),
            DecodeError::NotAnObject { resource: "Widget" }
        );
    }
}
