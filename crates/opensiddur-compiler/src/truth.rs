/*
 * truth.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Three-valued conditional logic.
//!
//! Conditions evaluate over {True, False, Undefined}. Combinators are
//! implemented as literal lookup tables, never boolean short-circuits, so
//! an Undefined input is never silently collapsed. Undefined means "the
//! reader must decide": content guarded by an Undefined condition is
//! retained together with its instruction note.

use opensiddur_jlptei::condition::Condition;
use opensiddur_jlptei::feature::{FeatureKey, Value};

/// A three-valued truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truth {
    True,
    False,
    Undefined,
}

use Truth::{False, True, Undefined};

impl Truth {
    fn idx(self) -> usize {
        match self {
            True => 0,
            False => 1,
            Undefined => 2,
        }
    }
}

/// Kleene conjunction: False dominates, then Undefined.
const AND: [[Truth; 3]; 3] = [
    //          T          F      U
    /* T */ [True, False, Undefined],
    /* F */ [False, False, False],
    /* U */ [Undefined, False, Undefined],
];

/// Kleene disjunction: True dominates, then Undefined.
const OR: [[Truth; 3]; 3] = [
    //          T     F          U
    /* T */ [True, True, True],
    /* F */ [True, False, Undefined],
    /* U */ [True, Undefined, Undefined],
];

const NOT: [Truth; 3] = [False, True, Undefined];

pub fn and(a: Truth, b: Truth) -> Truth {
    AND[a.idx()][b.idx()]
}

pub fn or(a: Truth, b: Truth) -> Truth {
    OR[a.idx()][b.idx()]
}

pub fn not(a: Truth) -> Truth {
    NOT[a.idx()]
}

/// `all`: True only when every input is True; any False forces False;
/// otherwise any Undefined leaves Undefined. Empty input is True.
pub fn all(inputs: impl IntoIterator<Item = Truth>) -> Truth {
    inputs.into_iter().fold(True, and)
}

/// `any`: True when at least one input is True; all-False gives False;
/// otherwise Undefined. Empty input is False.
pub fn any(inputs: impl IntoIterator<Item = Truth>) -> Truth {
    inputs.into_iter().fold(False, or)
}

/// `none`: the negation of `any`.
pub fn none(inputs: impl IntoIterator<Item = Truth>) -> Truth {
    not(any(inputs))
}

/// `one`: exactly one input is True. Two resolved Trues force False no
/// matter what else is present; otherwise any Undefined input leaves the
/// outcome Undefined.
pub fn one(inputs: impl IntoIterator<Item = Truth>) -> Truth {
    let mut trues = 0usize;
    let mut undefined = 0usize;
    for input in inputs {
        match input {
            True => trues += 1,
            Undefined => undefined += 1,
            False => {}
        }
    }
    if trues >= 2 {
        False
    } else if undefined > 0 {
        Undefined
    } else if trues == 1 {
        True
    } else {
        False
    }
}

/// Leaf comparison of a feature's current value against an expected
/// value: equal defined values are True, unequal defined values are
/// False, and Undefined/Default on either side is Undefined.
pub fn compare(current: &Value, expected: &Value) -> Truth {
    match (current, expected) {
        (Value::Undefined | Value::Default, _) | (_, Value::Undefined | Value::Default) => {
            Undefined
        }

        // Negation on either side inverts the inner comparison.
        (Value::Negation(inner), _) => not(compare(inner, expected)),
        (_, Value::Negation(inner)) => not(compare(current, inner)),

        // Alternation matches when any member matches.
        (Value::Alternation(members), _) => any(members.iter().map(|m| compare(m, expected))),
        (_, Value::Alternation(members)) => any(members.iter().map(|m| compare(current, m))),

        (Value::Bool(a), Value::Bool(b)) => from_bool(a == b),
        (Value::Str(a), Value::Str(b)) => from_bool(a == b),

        // Numerics are inclusive intervals; they are equal when the
        // intervals intersect (a scalar is a one-point interval).
        (
            Value::Numeric { value: av, max: am },
            Value::Numeric { value: bv, max: bm },
        ) => {
            let a_hi = am.unwrap_or(*av);
            let b_hi = bm.unwrap_or(*bv);
            from_bool(*av <= b_hi && *bv <= a_hi)
        }

        // Values of different types are defined and unequal.
        _ => False,
    }
}

fn from_bool(b: bool) -> Truth {
    if b { True } else { False }
}

/// Evaluate a condition expression against the current feature values.
pub fn evaluate<F>(condition: &Condition, lookup: &F) -> Truth
where
    F: Fn(&FeatureKey) -> Value,
{
    match condition {
        Condition::Compare { key, value } => compare(&lookup(key), value),
        Condition::All(subs) => all(subs.iter().map(|c| evaluate(c, lookup))),
        Condition::Any(subs) => any(subs.iter().map(|c| evaluate(c, lookup))),
        Condition::None(subs) => none(subs.iter().map(|c| evaluate(c, lookup))),
        Condition::One(subs) => one(subs.iter().map(|c| evaluate(c, lookup))),
    }
}
