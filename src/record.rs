//! Records and payload shapes.
//!
//! Records are host-owned JSON objects. The engine decorates them in place and
//! never replaces them, so callers keep the identity and shape they passed in.

use serde_json::{Map, Value};

/// A single entity record: an ordered JSON object.
pub type Record = Map<String, Value>;

/// Prefix used by metadata binding paths to refer to the record itself.
const SELF_PREFIX: &str = "_it.";

/// Strips the `_it.` self prefix so equivalent paths compare equal.
pub(crate) fn strip_self_prefix(path: &str) -> &str {
    path.strip_prefix(SELF_PREFIX).unwrap_or(path)
}

/// Reads the value at a dotted binding path (`a.b.c`, optionally `_it.`-prefixed).
#[must_use]
pub fn get_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = strip_self_prefix(path).split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at a dotted binding path, creating intermediate objects.
///
/// A non-object value sitting on an intermediate segment is replaced.
pub fn set_path(record: &mut Record, path: &str, value: Value) {
    set_segments(record, strip_self_prefix(path), value);
}

fn set_segments(record: &mut Record, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            record.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = record
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                set_segments(inner, rest, value);
            }
        }
    }
}

/// Shallow merge: `changes` override `base`, absent keys keep the base value.
#[must_use]
pub fn merged(base: &Record, changes: &Record) -> Record {
    let mut out = base.clone();
    for (key, value) in changes {
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Normalizes a payload into the records it carries.
///
/// `null` and scalars carry nothing, an object is one record, an array yields
/// its object elements in order. The payload itself keeps its shape.
pub(crate) fn records_mut(payload: &mut Value) -> Vec<&mut Record> {
    match payload {
        Value::Object(record) => vec![record],
        Value::Array(items) => items.iter_mut().filter_map(Value::as_object_mut).collect(),
        _ => Vec::new(),
    }
}

/// Renders key values as `k=v` pairs joined by commas.
///
/// Strings are written raw, other values in their JSON form.
#[must_use]
pub fn key_string(key: &Record) -> String {
    key.iter()
        .map(|(name, value)| match value {
            Value::String(s) => format!("{name}={s}"),
            other => format!("{name}={other}"),
        })
        .collect::<Vec<_>>()
        .join(",")
}
