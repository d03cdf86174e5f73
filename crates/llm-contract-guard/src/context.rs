//! Pipeline context access
//!
//! The pipeline context is owned by the caller. The engine only reads values
//! from it by dot-path and never writes domain values back.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Read-only, dot-path addressable view of pipeline state
pub trait PipelineContext {
    /// Resolve a dot-path such as `rag.index_snapshot` or `docs.0.text`.
    ///
    /// Returns `None` when the path does not exist or resolves to JSON null.
    fn resolve(&self, path: &str) -> Option<&Value>;

    /// Check if a field is present
    fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }
}

/// Walk the remaining segments of a path below `value`
pub fn resolve_in<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let parts: Vec<&str> = path.split('.').collect();
    resolve_parts(value, &parts)
}

fn resolve_parts<'a>(value: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let Some((head, rest)) = parts.split_first() else {
        return non_null(value);
    };

    match value {
        Value::Object(map) => map.get(*head).and_then(|v| resolve_parts(v, rest)),
        Value::Array(arr) => head
            .parse::<usize>()
            .ok()
            .and_then(|i| arr.get(i))
            .and_then(|v| resolve_parts(v, rest)),
        _ => None,
    }
}

fn non_null(value: &Value) -> Option<&Value> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

fn resolve_keyed<'a>(first: Option<&'a Value>, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        Some((_, rest)) => first.and_then(|v| resolve_in(v, rest)),
        None => first.and_then(non_null),
    }
}

fn head(path: &str) -> &str {
    path.split_once('.').map_or(path, |(h, _)| h)
}

impl PipelineContext for Value {
    fn resolve(&self, path: &str) -> Option<&Value> {
        resolve_in(self, path)
    }
}

impl PipelineContext for Map<String, Value> {
    fn resolve(&self, path: &str) -> Option<&Value> {
        resolve_keyed(self.get(head(path)), path)
    }
}

impl PipelineContext for HashMap<String, Value> {
    fn resolve(&self, path: &str) -> Option<&Value> {
        resolve_keyed(self.get(head(path)), path)
    }
}

impl PipelineContext for BTreeMap<String, Value> {
    fn resolve(&self, path: &str) -> Option<&Value> {
        resolve_keyed(self.get(head(path)), path)
    }
}

impl<T: PipelineContext + ?Sized> PipelineContext for &T {
    fn resolve(&self, path: &str) -> Option<&Value> {
        (**self).resolve(path)
    }
}

/// Extract a number from a JSON value, accepting numeric strings
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}
