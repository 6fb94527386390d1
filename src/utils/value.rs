use serde_json::{Map, Value};

/// Type discriminator the client cache adds to every object.
pub const TYPENAME_KEY: &str = "__typename";
/// Store identifier echoed back by queries.
pub const ID_KEY: &str = "_id";
/// Prefix of client-internal keys.
pub const RESERVED_SIGIL: char = '$';

/// True for keys the wire schema does not accept in variables.
pub fn is_reserved_key(key: &str) -> bool {
    key == TYPENAME_KEY || key == ID_KEY || key.starts_with(RESERVED_SIGIL)
}

/// Recursively removes reserved keys from every object in `value`.
/// Idempotent: stripping a stripped value changes nothing.
pub fn strip_reserved_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !is_reserved_key(key))
                .map(|(key, v)| (key, strip_reserved_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_reserved_keys).collect()),
        other => other,
    }
}

/// True when `value` contains a reserved key at any depth.
pub fn has_reserved_keys(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, v)| is_reserved_key(key) || has_reserved_keys(v)),
        Value::Array(items) => items.iter().any(has_reserved_keys),
        _ => false,
    }
}
