/*
 * feature.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Feature-structure values.
//!
//! Feature structures drive conditional-text decisions: a declare scope
//! assigns values to named features, and conditions compare those values.
//! A feature is addressed by a [`FeatureKey`]: the feature-structure name
//! plus the feature name within it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a feature: structure name plus feature name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureKey {
    /// Feature-structure name, e.g. `opensiddur:calendar`.
    pub structure: String,
    /// Feature name within the structure, e.g. `gregorian-date`.
    pub name: String,
}

impl FeatureKey {
    pub fn new(structure: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            structure: structure.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.structure, self.name)
    }
}

/// A feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),

    /// A number, optionally an inclusive range `value..=max`.
    Numeric { value: i64, max: Option<i64> },

    Str(String),

    /// Any one of the listed values.
    Alternation(Vec<Value>),

    /// Anything but the given value.
    Negation(Box<Value>),

    /// Explicitly not determined.
    Undefined,

    /// Left to the enclosing scope (or undetermined at top level).
    Default,
}

impl Value {
    /// Convenience constructor for a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Convenience constructor for a scalar number.
    pub fn num(value: i64) -> Self {
        Value::Numeric { value, max: None }
    }

    /// Convenience constructor for an inclusive numeric range.
    pub fn range(value: i64, max: i64) -> Self {
        Value::Numeric {
            value,
            max: Some(max),
        }
    }

    /// False for `Undefined` and `Default`, which poison comparisons and
    /// derivations; true for every concrete value.
    pub fn is_defined(&self) -> bool {
        match self {
            Value::Undefined | Value::Default => false,
            Value::Alternation(values) => values.iter().all(Value::is_defined),
            Value::Negation(value) => value.is_defined(),
            _ => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Numeric { value, max: None } => write!(f, "{value}"),
            Value::Numeric {
                value,
                max: Some(max),
            } => write!(f, "{value}..{max}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Alternation(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "({})", parts.join("|"))
            }
            Value::Negation(value) => write!(f, "!{value}"),
            Value::Undefined => write!(f, "undefined"),
            Value::Default => write!(f, "default"),
        }
    }
}

/// One feature assignment inside a declare scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub key: FeatureKey,
    pub value: Value,
}

impl Assignment {
    pub fn new(key: FeatureKey, value: Value) -> Self {
        Self { key, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definedness() {
        assert!(Value::Bool(true).is_defined());
        assert!(Value::num(3).is_defined());
        assert!(!Value::Undefined.is_defined());
        assert!(!Value::Default.is_defined());
        assert!(!Value::Alternation(vec![Value::num(1), Value::Default]).is_defined());
        assert!(!Value::Negation(Box::new(Value::Undefined)).is_defined());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::range(1, 10).to_string(), "1..10");
        assert_eq!(
            Value::Alternation(vec![Value::str("a"), Value::str("b")]).to_string(),
            "(a|b)"
        );
        assert_eq!(
            FeatureKey::new("opensiddur:calendar", "holiday").to_string(),
            "opensiddur:calendar:holiday"
        );
    }
}
