use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::value::Value;

/// One layer of bindings: the root properties, a loop iteration or a
/// lambda call.
pub type Frame = HashMap<String, Value>;

/// The variable environment of a render: a stack of frames, searched
/// innermost-first.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new() -> Self {
        Scope { frames: Vec::new() }
    }

    pub fn with_root(root: Frame) -> Self {
        Scope { frames: vec![root] }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Remove the innermost frame. Popping an empty scope is a no-op that
    /// returns `None`.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The innermost binding of a single name.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Resolve a dotted path such as `project.modules.size`.
    ///
    /// The first segment is looked up innermost-first; each further segment
    /// is read from the previous value through [`member`]. A name that is not
    /// bound anywhere resolves to `Null`.
    pub fn get(&self, key: &str) -> Value {
        let mut segments = key.split('.');
        let head = segments.next().unwrap_or(key);
        let Some(value) = self.lookup(head) else {
            trace!(key, "unresolved variable");
            return Value::Null;
        };
        segments.fold(value.clone(), |current, segment| member(&current, segment))
    }
}

/// Read one property of a value.
///
/// Maps yield their entries, falling back to the pseudo-properties
/// `entries`, `keys`, `values` and `size`. Lists expose `size`, strings
/// `length` and `size`. Everything else yields `Null`.
pub fn member(value: &Value, segment: &str) -> Value {
    match value {
        Value::Map(map) => {
            if let Some(found) = map.get(segment) {
                return found.clone();
            }
            match segment {
                "entries" => Value::List(map_entries(map)),
                "keys" => Value::List(map.keys().map(|k| Value::String(k.clone())).collect()),
                "values" => Value::List(map.values().cloned().collect()),
                "size" => Value::Int(len_as_int(map.len())),
                _ => Value::Null,
            }
        }
        Value::List(items) if segment == "size" => Value::Int(len_as_int(items.len())),
        Value::String(s) if segment == "length" || segment == "size" => {
            Value::Int(len_as_int(s.chars().count()))
        }
        _ => Value::Null,
    }
}

/// Map entries as `{key, value}` maps, the shape loops iterate over.
pub fn map_entries(map: &IndexMap<String, Value>) -> Vec<Value> {
    map.iter()
        .map(|(key, value)| {
            Value::map([
                ("key".to_string(), Value::String(key.clone())),
                ("value".to_string(), value.clone()),
            ])
        })
        .collect()
}

pub(crate) fn len_as_int(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Builds the root frame of a render from flat, fully-qualified properties.
#[derive(Debug, Clone, Default)]
pub struct ScopeBuilder {
    root: IndexMap<String, Value>,
}

impl ScopeBuilder {
    pub fn new() -> Self {
        ScopeBuilder::default()
    }

    /// Bind a property such as `db.url`, nesting it under `db`.
    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Self {
        insert_path(&mut self.root, name, value.into());
        self
    }

    pub fn properties<K, V>(mut self, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in properties {
            insert_path(&mut self.root, name.as_ref(), value.into());
        }
        self
    }

    /// Bind a reserved namespace such as `_project` as-is.
    pub fn synthetic(mut self, namespace: &str, value: Value) -> Self {
        self.root.insert(namespace.to_string(), value);
        self
    }

    pub fn build(self) -> Scope {
        Scope::with_root(self.root.into_iter().collect())
    }
}

fn insert_path(root: &mut IndexMap<String, Value>, name: &str, value: Value) {
    let mut segments: Vec<&str> = name.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = root;
    for (depth, segment) in segments.iter().enumerate() {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Map(IndexMap::new()));
        match entry {
            Value::Map(map) => current = map,
            other => {
                warn!(
                    property = name,
                    prefix = %segments[..=depth].join("."),
                    bound = %other.kind(),
                    "property prefix is already bound to a non-map value; dropping property"
                );
                return;
            }
        }
    }

    if matches!(current.get(last), Some(Value::Map(_))) && !matches!(value, Value::Map(_)) {
        warn!(
            property = name,
            "property is already a namespace of nested properties; dropping property"
        );
        return;
    }
    current.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(entries: &[(&str, Value)]) -> Frame {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn innermost_frame_wins() {
        let mut scope = Scope::with_root(frame(&[("x", Value::Int(1)), ("y", Value::Int(2))]));
        scope.push(frame(&[("x", Value::Int(10))]));
        assert_eq!(scope.get("x"), Value::Int(10));
        assert_eq!(scope.get("y"), Value::Int(2));
        scope.pop();
        assert_eq!(scope.get("x"), Value::Int(1));
    }

    #[test]
    fn pop_on_empty_scope_is_a_no_op() {
        let mut scope = Scope::new();
        assert_eq!(scope.pop(), None);
        assert_eq!(scope.depth(), 0);
    }

    #[test]
    fn missing_names_are_null() {
        let scope = Scope::new();
        assert_eq!(scope.get("nope"), Value::Null);
        assert_eq!(scope.get("nope.deeper"), Value::Null);
    }

    #[test]
    fn dotted_paths_and_pseudo_properties() {
        let scope = ScopeBuilder::new()
            .property("db.url", "jdbc:h2")
            .property("db.pool", 4)
            .property("modules", vec!["api", "core"])
            .property("name", "demo")
            .build();
        assert_eq!(scope.get("db.url"), Value::from("jdbc:h2"));
        assert_eq!(scope.get("db.size"), Value::Int(2));
        assert_eq!(
            scope.get("db.keys"),
            Value::from(vec!["url", "pool"])
        );
        assert_eq!(scope.get("modules.size"), Value::Int(2));
        assert_eq!(scope.get("name.length"), Value::Int(4));
        assert_eq!(scope.get("name.other"), Value::Null);
        match scope.get("db.entries") {
            Value::List(entries) => {
                assert_eq!(member(&entries[0], "key"), Value::from("url"));
                assert_eq!(member(&entries[1], "value"), Value::Int(4));
            }
            other => panic!("expected entries, got {:?}", other),
        }
    }

    #[test]
    fn conflicting_properties_are_dropped() {
        let scope = ScopeBuilder::new()
            .property("db", "plain")
            .property("db.url", "lost")
            .property("cache.ttl", 5)
            .property("cache", "lost too")
            .build();
        assert_eq!(scope.get("db"), Value::from("plain"));
        assert_eq!(scope.get("cache.ttl"), Value::Int(5));
    }

    #[test]
    fn synthetic_namespaces_are_inserted_verbatim() {
        let project = Value::map([("name".to_string(), Value::from("demo"))]);
        let scope = ScopeBuilder::new().synthetic("_project", project).build();
        assert_eq!(scope.get("_project.name"), Value::from("demo"));
    }
}
