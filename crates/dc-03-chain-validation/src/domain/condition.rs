//! # Action Conditions
//!
//! Boolean expressions over an action's data. Paths are JSON pointers
//! (`/amount`, `/items/0/sku`). A path that does not resolve makes every
//! comparison on it false.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Condition expression attached to an action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Condition {
    Equals { path: String, value: Value },
    GreaterThan { path: String, value: f64 },
    LessThan { path: String, value: f64 },
    Exists { path: String },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

impl Condition {
    /// Evaluate against action data.
    pub fn evaluate(&self, data: &Value) -> bool {
        match self {
            Self::Equals { path, value } => data.pointer(path) == Some(value),
            Self::GreaterThan { path, value } => {
                number_at(data, path).is_some_and(|n| n > *value)
            }
            Self::LessThan { path, value } => number_at(data, path).is_some_and(|n| n < *value),
            Self::Exists { path } => data.pointer(path).is_some_and(|v| !v.is_null()),
            Self::All { conditions } => conditions.iter().all(|c| c.evaluate(data)),
            Self::Any { conditions } => conditions.iter().any(|c| c.evaluate(data)),
            Self::Not { condition } => !condition.evaluate(data),
        }
    }
}

fn number_at(data: &Value, path: &str) -> Option<f64> {
    data.pointer(path).and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_comparisons() {
        let data = json!({ "amount": 250, "currency": "EUR" });

        assert!(Condition::GreaterThan { path: "/amount".into(), value: 100.0 }.evaluate(&data));
        assert!(!Condition::LessThan { path: "/amount".into(), value: 100.0 }.evaluate(&data));
        assert!(Condition::Equals { path: "/currency".into(), value: json!("EUR") }.evaluate(&data));
        assert!(!Condition::GreaterThan { path: "/currency".into(), value: 0.0 }.evaluate(&data));
    }

    #[test]
    fn test_missing_path_is_false() {
        let data = json!({});
        assert!(!Condition::Exists { path: "/x".into() }.evaluate(&data));
        assert!(!Condition::GreaterThan { path: "/x".into(), value: -1.0 }.evaluate(&data));
        assert!(!Condition::Exists { path: "/x".into() }.evaluate(&json!({ "x": null })));
    }

    #[test]
    fn test_combinators_from_json() {
        let condition: Condition = serde_json::from_value(json!({
            "op": "all",
            "conditions": [
                { "op": "exists", "path": "/approved" },
                { "op": "not", "condition": { "op": "equals", "path": "/approved", "value": false } },
                { "op": "any", "conditions": [
                    { "op": "lessThan", "path": "/score", "value": 10 },
                    { "op": "greaterThan", "path": "/score", "value": 90 }
                ]}
            ]
        }))
        .unwrap();

        assert!(condition.evaluate(&json!({ "approved": true, "score": 95 })));
        assert!(!condition.evaluate(&json!({ "approved": false, "score": 95 })));
        assert!(!condition.evaluate(&json!({ "approved": true, "score": 50 })));
    }
}
