/*
 * condition.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Condition expressions for conditional text.
//!
//! A condition is either a leaf comparison against a feature's current
//! value or a combinator over sub-conditions. Evaluation is three-valued
//! ({true, false, undefined}) and lives in the compiler; this module only
//! defines the expression tree.

use serde::{Deserialize, Serialize};

use crate::feature::{FeatureKey, Value};

/// A condition expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Leaf: compare the current value of a feature to an expected value.
    Compare { key: FeatureKey, value: Value },

    /// True when every sub-condition is true.
    All(Vec<Condition>),

    /// True when at least one sub-condition is true.
    Any(Vec<Condition>),

    /// True when no sub-condition is true.
    None(Vec<Condition>),

    /// True when exactly one sub-condition is true.
    One(Vec<Condition>),
}

impl Condition {
    /// Convenience constructor for a leaf comparison.
    pub fn compare(key: FeatureKey, value: Value) -> Self {
        Condition::Compare { key, value }
    }
}
