use std::borrow::Cow;
use std::io;

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter, Serializer};
use serde_json::{Map, Value};

use crate::core_api::{CoreError, CoreErrorCode};

/// Upper bound on how many times a document that is itself a JSON-encoded
/// string gets re-parsed while detecting its real shape.
pub const MAX_PEEL_DEPTH: usize = 10;

/// True when the trimmed text is bracketed like a JSON object or array.
pub fn is_json_like(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

pub fn unwrap_text(text: &str) -> Result<Value, CoreError> {
    let parsed: Value = serde_json::from_str(text).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Parse,
            format!("failed to parse JSON document: {e}"),
        )
    })?;
    Ok(unwrap(parsed))
}

/// Replaces every object value and array element holding an embedded JSON
/// document with the parsed document, recursively. Strings that only look
/// like JSON stay as they are.
pub fn unwrap(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, unwrap_slot(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(unwrap_slot).collect()),
        other => other,
    }
}

fn unwrap_slot(value: Value) -> Value {
    match value {
        Value::String(text) if is_json_like(&text) => match parse_nested(&text) {
            Some(parsed) => unwrap(parsed),
            None => Value::String(text),
        },
        other => unwrap(other),
    }
}

fn parse_nested(text: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::debug!("keeping JSON-like string as text: {err}");
            None
        }
    }
}

/// Re-parses a value that is a JSON-encoded string, at most
/// [`MAX_PEEL_DEPTH`] times. Anything else is returned borrowed.
pub fn peel(value: &Value) -> Cow<'_, Value> {
    let mut current = Cow::Borrowed(value);
    for _ in 0..MAX_PEEL_DEPTH {
        let next = match current.as_ref() {
            Value::String(text) if opens_document(text) => {
                match serde_json::from_str::<Value>(text) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        tracing::debug!("stopped peeling encoded document: {err}");
                        break;
                    }
                }
            }
            _ => break,
        };
        current = Cow::Owned(next);
    }
    current
}

fn opens_document(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Walks `edited` and `template` in lock-step and turns every field that was
/// an encoded JSON string in the template back into one.
///
/// Arrays use the first template element as the shape of every element, so
/// arrays mixing encoded and native elements come back uniformly shaped.
pub fn rewrap(edited: &Value, template: &Value) -> Result<Value, CoreError> {
    match (edited, template) {
        (Value::Object(map), Value::Object(shape)) => {
            let missing = Value::Object(Map::new());
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let slot = TemplateSlot::new(shape.get(key).unwrap_or(&missing));
                out.insert(key.clone(), slot.rewrap(value)?);
            }
            Ok(Value::Object(out))
        }
        (Value::Array(items), Value::Array(shape)) => {
            let missing = Value::Object(Map::new());
            let slot = TemplateSlot::new(shape.first().unwrap_or(&missing));
            items
                .iter()
                .map(|item| slot.rewrap(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        _ => Ok(edited.clone()),
    }
}

pub fn rewrap_text(edited_text: &str, template: &Value) -> Result<String, CoreError> {
    let edited: Value = serde_json::from_str(edited_text).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Parse,
            format!("failed to parse edited JSON: {e}"),
        )
    })?;
    to_save_string(&rewrap(&edited, template)?)
}

enum TemplateSlot<'a> {
    Encoded(Value),
    Native(&'a Value),
}

impl<'a> TemplateSlot<'a> {
    fn new(template: &'a Value) -> Self {
        match template {
            Value::String(text) if is_json_like(text) => match parse_nested(text) {
                Some(parsed) => Self::Encoded(parsed),
                None => Self::Native(template),
            },
            _ => Self::Native(template),
        }
    }

    fn rewrap(&self, edited: &Value) -> Result<Value, CoreError> {
        match self {
            Self::Encoded(shape) => {
                let inner = rewrap(edited, shape)?;
                Ok(Value::String(to_save_string(&inner)?))
            }
            Self::Native(shape) => rewrap(edited, shape),
        }
    }
}

/// Compact serialization in the form the game reads back: no whitespace and
/// an upper-case exponent marker on every number.
pub fn to_save_string(value: &Value) -> Result<String, CoreError> {
    serialize_with(value, UpperExponent(CompactFormatter))
}

/// Indented text for hand editing, numbers written as in [`to_save_string`].
pub fn to_editable_string(value: &Value) -> Result<String, CoreError> {
    serialize_with(value, UpperExponent(PrettyFormatter::new()))
}

fn serialize_with<F: Formatter>(value: &Value, formatter: F) -> Result<String, CoreError> {
    let mut serializer = Serializer::with_formatter(Vec::new(), formatter);
    value.serialize(&mut serializer).map_err(|e| {
        CoreError::new(CoreErrorCode::Io, format!("failed to serialize document: {e}"))
    })?;
    String::from_utf8(serializer.into_inner()).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Io,
            format!("serialized document is not UTF-8: {e}"),
        )
    })
}

struct UpperExponent<F>(F);

impl<F: Formatter> Formatter for UpperExponent<F> {
    fn write_f32<W>(&mut self, writer: &mut W, value: f32) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut token = Vec::new();
        self.0.write_f32(&mut token, value)?;
        write_number_token(writer, &token)
    }

    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut token = Vec::new();
        self.0.write_f64(&mut token, value)?;
        write_number_token(writer, &token)
    }

    fn write_number_str<W>(&mut self, writer: &mut W, value: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        write_number_token(writer, value.as_bytes())
    }

    // Layout is left to the wrapped formatter.

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array(writer)
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array_value(writer)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object(writer)
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_key(writer, first)
    }

    fn end_object_key<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object_key(writer)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object_value(writer)
    }
}

fn write_number_token<W>(writer: &mut W, token: &[u8]) -> io::Result<()>
where
    W: ?Sized + io::Write,
{
    if !token.contains(&b'e') {
        return writer.write_all(token);
    }
    let upper: Vec<u8> = token
        .iter()
        .map(|&b| if b == b'e' { b'E' } else { b })
        .collect();
    writer.write_all(&upper)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{
        MAX_PEEL_DEPTH, is_json_like, peel, rewrap, to_editable_string, to_save_string, unwrap,
        unwrap_text,
    };

    const NESTED_SAVE: &str = r#"{"Version":"0.0.1","Data":{"Constructions":"{\"Version\":\"0.0.1\",\"Structures\":[[{\"TypeID\":0,\"Health\":1.0E-5,\"Extra\":\"{\\\"Power\\\":2}\"}]]}"}}"#;

    #[test]
    fn json_like_requires_matching_brackets() {
        assert!(is_json_like("{}"));
        assert!(is_json_like("  [1, 2]\n"));
        assert!(!is_json_like("{]"));
        assert!(!is_json_like("[}"));
        assert!(!is_json_like("plain"));
        assert!(!is_json_like(""));
    }

    #[test]
    fn unwrap_parses_nested_documents_at_every_depth() {
        let doc = unwrap_text(NESTED_SAVE).expect("fixture should parse");
        assert_eq!(
            doc.pointer("/Data/Constructions/Structures/0/0/TypeID"),
            Some(&json!(0))
        );
        assert_eq!(
            doc.pointer("/Data/Constructions/Structures/0/0/Extra/Power"),
            Some(&json!(2))
        );
    }

    #[test]
    fn unwrap_keeps_malformed_nested_strings() {
        let doc = unwrap(json!({"broken": "{not json}", "list": ["[1,2", "[3]"]}));
        assert_eq!(doc["broken"], json!("{not json}"));
        assert_eq!(doc["list"], json!(["[1,2", [3]]));
    }

    #[test]
    fn unwrap_is_deterministic() {
        let first = unwrap_text(NESTED_SAVE).expect("fixture should parse");
        let second = unwrap_text(NESTED_SAVE).expect("fixture should parse");
        assert_eq!(first, second);
        assert_eq!(unwrap(first.clone()), first);
    }

    #[test]
    fn top_level_parse_failure_is_reported() {
        let err = unwrap_text("{\"a\":").expect_err("truncated text must fail");
        assert_eq!(err.code, super::CoreErrorCode::Parse);
    }

    #[test]
    fn rewrap_restores_the_original_text() {
        let template: Value = serde_json::from_str(NESTED_SAVE).expect("fixture should parse");
        let edited = unwrap(template.clone());
        let rewrapped = rewrap(&edited, &template).expect("rewrap should succeed");
        assert_eq!(rewrapped, template);
        assert_eq!(
            to_save_string(&rewrapped).expect("serialize should succeed"),
            NESTED_SAVE
        );
    }

    #[test]
    fn rewrap_leaves_fields_missing_from_template_native() {
        let template = json!({"Data": "{\"a\":1}"});
        let edited = json!({"Data": {"a": 2}, "Added": {"b": [1]}});
        let out = rewrap(&edited, &template).expect("rewrap should succeed");
        assert_eq!(out, json!({"Data": "{\"a\":2}", "Added": {"b": [1]}}));
    }

    #[test]
    fn rewrap_encodes_scalars_and_null_over_encoded_templates() {
        let template = json!({"Data": {"Constructions": "{\"Structures\":[]}"}});
        let edited = json!({"Data": {"Constructions": null}});
        let out = rewrap(&edited, &template).expect("rewrap should succeed");
        assert_eq!(out, json!({"Data": {"Constructions": "null"}}));
        assert!(out["Data"]["Constructions"].is_string());

        let edited = json!({"Data": {"Constructions": 5}});
        let out = rewrap(&edited, &template).expect("rewrap should succeed");
        assert_eq!(out, json!({"Data": {"Constructions": "5"}}));
    }

    #[test]
    fn rewrap_uses_first_array_element_as_exemplar() {
        let template = json!(["{\"a\":1}", {"b": 2}]);
        let edited = unwrap(template.clone());
        let out = rewrap(&edited, &template).expect("rewrap should succeed");
        assert_eq!(out, json!(["{\"a\":1}", "{\"b\":2}"]));
    }

    #[test]
    fn rewrap_drops_encoding_of_later_elements_when_exemplar_is_native() {
        let template = json!([
            {"TypeID": 0},
            {"TypeID": 2, "Extra": "{\"Power\":2}"}
        ]);
        let edited = unwrap(template.clone());
        let out = rewrap(&edited, &template).expect("rewrap should succeed");
        assert_eq!(out[1]["Extra"], json!({"Power": 2}));
        assert_ne!(out, template);
    }

    #[test]
    fn save_string_upper_cases_exponents_only_in_numbers() {
        let doc: Value =
            serde_json::from_str(r#"{"small":1.5e-7,"name":"1.0e-5","list":[2.0e+3]}"#)
                .expect("literal should parse");
        assert_eq!(
            to_save_string(&doc).expect("serialize should succeed"),
            r#"{"small":1.5E-7,"name":"1.0e-5","list":[2.0E+3]}"#
        );
    }

    #[test]
    fn editable_text_is_indented_with_upper_case_exponents() {
        let doc: Value = serde_json::from_str(r#"{"Health":1.0e-5}"#).expect("literal should parse");
        assert_eq!(
            to_editable_string(&doc).expect("serialize should succeed"),
            "{\n  \"Health\": 1.0E-5\n}"
        );
    }

    #[test]
    fn peel_only_parses_strings_that_open_a_document() {
        let plain = json!({"a": 1});
        assert!(matches!(peel(&plain), std::borrow::Cow::Borrowed(_)));

        let encoded = Value::String(json!({"TypeID": 3}).to_string());
        assert_eq!(peel(&encoded).into_owned(), json!({"TypeID": 3}));

        let quoted = Value::String(encoded.to_string());
        assert_eq!(peel(&quoted).into_owned(), quoted);

        let broken = json!("{\"TypeID\":");
        assert_eq!(peel(&broken).into_owned(), broken);
    }

    #[test]
    fn peel_leaves_deeply_layered_strings_alone() {
        let mut layered = json!([{"TypeID": 1}]);
        for _ in 0..=MAX_PEEL_DEPTH {
            layered = Value::String(layered.to_string());
        }
        let peeled = peel(&layered);
        assert!(peeled.is_string());
        assert_eq!(peeled.into_owned(), layered);
    }
}
