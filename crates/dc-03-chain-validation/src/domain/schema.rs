//! # Data Schema Subset
//!
//! Supported keywords: `type`, `properties`, `required`, `enum`, `minimum`,
//! `maximum`, `minLength`, `maxLength`, `items`. Other keywords are ignored.
//! Violations report the JSON pointer of the offending value (`""` is the
//! document root).

use super::errors::ValidationError;
use serde_json::{Map, Value};

/// Check `data` against `schema`, returning the first violation.
pub fn validate_schema(schema: &Value, data: &Value) -> Result<(), ValidationError> {
    check(schema, data, "")
}

fn violation(path: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::SchemaViolation {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn check(schema: &Value, data: &Value, path: &str) -> Result<(), ValidationError> {
    let rules = match schema {
        Value::Object(rules) => rules,
        Value::Bool(false) => return Err(violation(path, "no value allowed")),
        _ => return Ok(()),
    };

    if let Some(expected) = rules.get("type") {
        check_type(expected, data, path)?;
    }

    if let Some(Value::Array(allowed)) = rules.get("enum") {
        if !allowed.contains(data) {
            return Err(violation(path, "value not in enum"));
        }
    }

    match data {
        Value::Number(n) => {
            if let Some(value) = n.as_f64() {
                check_bounds(rules, value, path)?;
            }
        }
        Value::String(s) => check_length(rules, s.chars().count(), path)?,
        Value::Array(items) => {
            if let Some(item_schema) = rules.get("items") {
                for (index, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{path}/{index}"))?;
                }
            }
        }
        Value::Object(fields) => check_object(rules, fields, path)?,
        _ => {}
    }
    Ok(())
}

fn check_type(expected: &Value, data: &Value, path: &str) -> Result<(), ValidationError> {
    let matches = match expected {
        Value::String(name) => type_matches(name, data),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| type_matches(name, data)),
        _ => true,
    };
    if matches {
        Ok(())
    } else {
        Err(violation(path, format!("expected type {expected}")))
    }
}

fn type_matches(name: &str, data: &Value) -> bool {
    match name {
        "object" => data.is_object(),
        "array" => data.is_array(),
        "string" => data.is_string(),
        "number" => data.is_number(),
        "integer" => data.is_i64() || data.is_u64(),
        "boolean" => data.is_boolean(),
        "null" => data.is_null(),
        _ => false,
    }
}

fn check_bounds(rules: &Map<String, Value>, value: f64, path: &str) -> Result<(), ValidationError> {
    if let Some(min) = rules.get("minimum").and_then(Value::as_f64) {
        if value < min {
            return Err(violation(path, format!("{value} is below minimum {min}")));
        }
    }
    if let Some(max) = rules.get("maximum").and_then(Value::as_f64) {
        if value > max {
            return Err(violation(path, format!("{value} is above maximum {max}")));
        }
    }
    Ok(())
}

fn check_length(rules: &Map<String, Value>, len: usize, path: &str) -> Result<(), ValidationError> {
    if let Some(min) = rules.get("minLength").and_then(Value::as_u64) {
        if (len as u64) < min {
            return Err(violation(path, format!("length {len} is below minLength {min}")));
        }
    }
    if let Some(max) = rules.get("maxLength").and_then(Value::as_u64) {
        if (len as u64) > max {
            return Err(violation(path, format!("length {len} is above maxLength {max}")));
        }
    }
    Ok(())
}

fn check_object(
    rules: &Map<String, Value>,
    fields: &Map<String, Value>,
    path: &str,
) -> Result<(), ValidationError> {
    if let Some(Value::Array(required)) = rules.get("required") {
        for name in required.iter().filter_map(Value::as_str) {
            if !fields.contains_key(name) {
                return Err(violation(
                    &format!("{path}/{name}"),
                    "required property missing",
                ));
            }
        }
    }
    if let Some(Value::Object(properties)) = rules.get("properties") {
        for (name, property_schema) in properties {
            if let Some(value) = fields.get(name) {
                check(property_schema, value, &format!("{path}/{name}"))?;
            }
        }
    }
    Ok(())
}
