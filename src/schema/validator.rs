//! JSON-Schema subset validator used for request bodies, responses and parameter bags.
//!
//! Supported keywords: `type`, `enum`, `properties`, `required`, `additionalProperties`,
//! `items`, `minItems`, `maxItems`, `pattern`, `minLength`, `maxLength`, `minimum`,
//! `maximum`, `allOf`, `anyOf`, `oneOf`, `not` and local `$ref`. Anything else
//! (`format`, `description`, `x-meta`, ...) is ignored.

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// First violation found, with the JSON pointer of the offending instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (at {})", self.message, self.path)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate `value` against `schema`. Returns the first violation.
pub fn validate(value: &Value, schema: &Value) -> Result<(), ValidationError> {
    Validator { root: schema }.check(value, schema, "")
}

fn err(path: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        path: path.to_string(),
        message: message.into(),
    }
}

fn pattern_cache() -> &'static Mutex<HashMap<String, Regex>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = pattern_cache().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// Short rendering of an instance for error messages.
fn show(value: &Value) -> String {
    let s = value.to_string();
    if s.chars().count() > 60 {
        format!("{}...", s.chars().take(57).collect::<String>())
    } else {
        s
    }
}

fn child_path(path: &str, segment: &str) -> String {
    format!("{}/{}", path, segment.replace('~', "~0").replace('/', "~1"))
}

fn type_matches(value: &Value, ty: &str) -> bool {
    match ty {
        "string" => value.is_string(),
        "integer" => match value {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false),
            _ => false,
        },
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

struct Validator<'s> {
    root: &'s Value,
}

impl<'s> Validator<'s> {
    fn check(&self, value: &Value, schema: &'s Value, path: &str) -> Result<(), ValidationError> {
        let obj = match schema {
            Value::Object(obj) => obj,
            Value::Bool(false) => return Err(err(path, format!("{} is not allowed", show(value)))),
            _ => return Ok(()),
        };

        if let Some(Value::String(reference)) = obj.get("$ref") {
            let target = self
                .resolve(reference)
                .ok_or_else(|| err(path, format!("unresolvable reference '{}'", reference)))?;
            return self.check(value, target, path);
        }

        if let Some(ty) = obj.get("type") {
            self.check_type(value, ty, path)?;
        }

        if let Some(Value::Array(allowed)) = obj.get("enum") {
            if !allowed.iter().any(|a| json_eq(a, value)) {
                return Err(err(
                    path,
                    format!("{} is not one of {}", show(value), show(&Value::Array(allowed.clone()))),
                ));
            }
        }

        self.check_combinators(value, obj, path)?;

        match value {
            Value::String(s) => self.check_string(s, obj, path),
            Value::Number(n) => self.check_number(n, obj, path),
            Value::Object(map) => self.check_object(map, obj, path),
            Value::Array(items) => self.check_array(items, obj, path),
            _ => Ok(()),
        }
    }

    fn resolve(&self, reference: &str) -> Option<&'s Value> {
        let pointer = reference.strip_prefix('#')?;
        if pointer.is_empty() {
            return Some(self.root);
        }
        self.root.pointer(pointer)
    }

    fn check_combinators(
        &self,
        value: &Value,
        schema: &'s Map<String, Value>,
        path: &str,
    ) -> Result<(), ValidationError> {
        if let Some(Value::Array(all)) = schema.get("allOf") {
            for sub in all {
                self.check(value, sub, path)?;
            }
        }
        if let Some(Value::Array(any)) = schema.get("anyOf") {
            if !any.iter().any(|sub| self.check(value, sub, path).is_ok()) {
                return Err(err(path, format!("{} is not valid under any of the given schemas", show(value))));
            }
        }
        if let Some(Value::Array(one)) = schema.get("oneOf") {
            let matched = one.iter().filter(|sub| self.check(value, sub, path).is_ok()).count();
            if matched != 1 {
                return Err(err(
                    path,
                    format!("{} is valid under {} of the given schemas, expected exactly one", show(value), matched),
                ));
            }
        }
        if let Some(not) = schema.get("not") {
            if self.check(value, not, path).is_ok() {
                return Err(err(path, format!("{} is not allowed", show(value))));
            }
        }
        Ok(())
    }

    fn check_type(&self, value: &Value, ty: &Value, path: &str) -> Result<(), ValidationError> {
        let ok = match ty {
            Value::String(t) => type_matches(value, t),
            Value::Array(types) => types
                .iter()
                .filter_map(Value::as_str)
                .any(|t| type_matches(value, t)),
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(err(path, format!("{} is not of type {}", show(value), show(ty))))
        }
    }

    fn check_string(&self, s: &str, schema: &Map<String, Value>, path: &str) -> Result<(), ValidationError> {
        let len = s.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
            if len < min {
                return Err(err(path, format!("'{}' is too short (minimum length {})", s, min)));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                return Err(err(path, format!("string is too long (maximum length {})", max)));
            }
        }
        if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
            let re = compiled(pattern).map_err(|_| err(path, format!("invalid pattern '{}' in schema", pattern)))?;
            if !re.is_match(s) {
                return Err(err(path, format!("'{}' does not match '{}'", s, pattern)));
            }
        }
        Ok(())
    }

    fn check_number(&self, n: &Number, schema: &Map<String, Value>, path: &str) -> Result<(), ValidationError> {
        let Some(x) = n.as_f64() else { return Ok(()) };
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if x < min {
                return Err(err(path, format!("{} is less than the minimum of {}", n, min)));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if x > max {
                return Err(err(path, format!("{} is greater than the maximum of {}", n, max)));
            }
        }
        Ok(())
    }

    fn check_object(
        &self,
        map: &Map<String, Value>,
        schema: &'s Map<String, Value>,
        path: &str,
    ) -> Result<(), ValidationError> {
        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(name) {
                    return Err(err(path, format!("'{}' is a required property", name)));
                }
            }
        }
        let properties = schema.get("properties").and_then(Value::as_object);
        for (key, v) in map {
            match properties.and_then(|p| p.get(key)) {
                Some(sub) => self.check(v, sub, &child_path(path, key))?,
                None => match schema.get("additionalProperties") {
                    Some(Value::Bool(false)) => {
                        return Err(err(
                            path,
                            format!("additional properties are not allowed ('{}' was unexpected)", key),
                        ))
                    }
                    Some(extra @ Value::Object(_)) => self.check(v, extra, &child_path(path, key))?,
                    _ => {}
                },
            }
        }
        Ok(())
    }

    fn check_array(&self, items: &[Value], schema: &'s Map<String, Value>, path: &str) -> Result<(), ValidationError> {
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
            if (items.len() as u64) < min {
                return Err(err(path, format!("expected at least {} items", min)));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
            if items.len() as u64 > max {
                return Err(err(path, format!("expected at most {} items", max)));
            }
        }
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                self.check(item, item_schema, &child_path(path, &i.to_string()))?;
            }
        }
        Ok(())
    }
}
