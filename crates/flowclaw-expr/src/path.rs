//! Dotted-path reader over JSON values.

use serde_json::Value;

use crate::parser::FORBIDDEN_NAMES;

/// Resolve `"a.b.0.c"` against a JSON tree. Segments index objects by key
/// and arrays by position. Forbidden property names and missing segments
/// resolve to `None`.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() || FORBIDDEN_NAMES.contains(&segment) {
            return None;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
