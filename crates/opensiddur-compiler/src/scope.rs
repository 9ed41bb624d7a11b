/*
 * scope.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Scoped feature-structure state.
//!
//! Each feature has its own stack of (value, declaring-id) frames, so
//! declare regions may overlap non-tree-like without interfering with
//! each other. Derived calendar features recompute immediately on every
//! push or pop: popping reverts to the enclosing value and retriggers
//! the same cascade. If any input of a derivation is Undefined or
//! Default, its dependents become Undefined.
//!
//! Derivation graph (fixed rules from `opensiddur-calendar`):
//!
//! ```text
//! gregorian-date ──► hebrew-date ──► holiday ──► holiday-aggregate
//!              └───► day-of-week   israel ┘  └──► torah-reading
//! ```
//!
//! `israel` and `service-time` are declared roots: they have no rule, but
//! changes to them cascade like any other input change. A direct
//! declaration of a derived feature shadows its rule and feeds the
//! shadowed value to downstream derivations.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use opensiddur_calendar::hebrew::HebrewDate;
use opensiddur_calendar::holiday::{Holiday, holiday_on};
use opensiddur_jlptei::feature::{Assignment, FeatureKey, Value};

/// Feature structure holding the calendar feature family.
pub const CALENDAR_FS: &str = "opensiddur:calendar";

/// Features with a derivation rule, in dependency order.
const DERIVED: [&str; 5] = [
    "hebrew-date",
    "day-of-week",
    "holiday",
    "holiday-aggregate",
    "torah-reading",
];

#[derive(Debug, Clone)]
struct Frame {
    value: Value,
    declare_id: String,
}

/// Tracks the current value of every feature during one traversal.
#[derive(Debug, Default)]
pub struct ScopeTracker {
    stacks: HashMap<FeatureKey, Vec<Frame>>,
    /// Open declare id -> features it pushed, for exact popping.
    open_declares: HashMap<String, Vec<FeatureKey>>,
    /// Recomputed derivation results, by feature name.
    derived: HashMap<&'static str, Value>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        let mut tracker = Self::default();
        tracker.recompute();
        tracker
    }

    /// True if a declare with this id is currently open.
    pub fn is_open(&self, declare_id: &str) -> bool {
        self.open_declares.contains_key(declare_id)
    }

    /// Push one frame per assignment. The id must be unique among open
    /// declares (ids are qualified per document instance by the caller).
    pub fn push_declare(&mut self, declare_id: &str, assignments: &[Assignment]) {
        let mut keys = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            tracing::debug!(
                feature = %assignment.key,
                value = %assignment.value,
                declare = declare_id,
                "pushing feature scope"
            );
            self.stacks
                .entry(assignment.key.clone())
                .or_default()
                .push(Frame {
                    value: assignment.value.clone(),
                    declare_id: declare_id.to_string(),
                });
            keys.push(assignment.key.clone());
        }
        self.open_declares.insert(declare_id.to_string(), keys);
        self.recompute();
    }

    /// Pop exactly the frames the declare introduced. Returns false when
    /// no declare with this id is open.
    pub fn pop_declare(&mut self, declare_id: &str) -> bool {
        let Some(keys) = self.open_declares.remove(declare_id) else {
            return false;
        };
        for key in keys {
            if let Some(stack) = self.stacks.get_mut(&key) {
                // Scopes may cross, so the frame need not be on top.
                if let Some(pos) = stack.iter().rposition(|f| f.declare_id == declare_id) {
                    stack.remove(pos);
                }
            }
        }
        self.recompute();
        true
    }

    /// Current value of a feature: the innermost declared value, else the
    /// derived value for ruled calendar features, else Undefined.
    pub fn current(&self, key: &FeatureKey) -> Value {
        if let Some(frame) = self.stacks.get(key).and_then(|s| s.last()) {
            return frame.value.clone();
        }
        if key.structure == CALENDAR_FS {
            if let Some(value) = self.derived.get(key.name.as_str()) {
                return value.clone();
            }
        }
        Value::Undefined
    }

    /// Recompute every derivation in dependency order.
    fn recompute(&mut self) {
        let mut fresh: HashMap<&'static str, Value> = HashMap::new();
        for name in DERIVED {
            let value = self.derive(name, &fresh);
            fresh.insert(name, value);
        }
        self.derived = fresh;
    }

    /// Input value for a derivation: a direct declaration shadows the
    /// freshly computed value.
    fn input<'v>(&self, name: &str, fresh: &'v HashMap<&'static str, Value>) -> Value {
        let key = FeatureKey::new(CALENDAR_FS, name);
        if let Some(frame) = self.stacks.get(&key).and_then(|s| s.last()) {
            return frame.value.clone();
        }
        fresh.get(name).cloned().unwrap_or(Value::Undefined)
    }

    fn derive(&self, name: &str, fresh: &HashMap<&'static str, Value>) -> Value {
        match name {
            "hebrew-date" => match self.gregorian_input(fresh) {
                Some(date) => Value::str(HebrewDate::from_gregorian(date).to_string()),
                None => Value::Undefined,
            },
            "day-of-week" => match self.gregorian_input(fresh) {
                Some(date) => {
                    let day = match date.weekday() {
                        chrono::Weekday::Mon => "monday",
                        chrono::Weekday::Tue => "tuesday",
                        chrono::Weekday::Wed => "wednesday",
                        chrono::Weekday::Thu => "thursday",
                        chrono::Weekday::Fri => "friday",
                        chrono::Weekday::Sat => "saturday",
                        chrono::Weekday::Sun => "sunday",
                    };
                    Value::str(day)
                }
                None => Value::Undefined,
            },
            "holiday" => {
                let hebrew = match self.input("hebrew-date", fresh) {
                    Value::Str(s) => match s.parse::<HebrewDate>() {
                        Ok(date) => date,
                        Err(_) => return Value::Undefined,
                    },
                    _ => return Value::Undefined,
                };
                let in_israel = match self.input("israel", fresh) {
                    Value::Bool(b) => b,
                    _ => return Value::Undefined,
                };
                match holiday_on(hebrew, in_israel) {
                    Some(holiday) => Value::str(holiday.id()),
                    None => Value::str("none"),
                }
            }
            "holiday-aggregate" => match self.holiday_input(fresh) {
                HolidayInput::Holiday(h) => Value::str(h.aggregate()),
                HolidayInput::None => Value::str("none"),
                HolidayInput::Undefined => Value::Undefined,
            },
            "torah-reading" => match self.holiday_input(fresh) {
                HolidayInput::Holiday(h) => match h.torah_reading() {
                    Some(reading) => Value::str(reading),
                    None => Value::str("none"),
                },
                HolidayInput::None => Value::str("none"),
                HolidayInput::Undefined => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }

    /// Declared `gregorian-date` as an ISO `YYYY-MM-DD` date.
    fn gregorian_input(&self, fresh: &HashMap<&'static str, Value>) -> Option<NaiveDate> {
        match self.input("gregorian-date", fresh) {
            Value::Str(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    fn holiday_input(&self, fresh: &HashMap<&'static str, Value>) -> HolidayInput {
        match self.input("holiday", fresh) {
            Value::Str(s) if s == "none" => HolidayInput::None,
            Value::Str(s) => match Holiday::from_id(&s) {
                Some(holiday) => HolidayInput::Holiday(holiday),
                None => HolidayInput::Undefined,
            },
            _ => HolidayInput::Undefined,
        }
    }
}

enum HolidayInput {
    Holiday(Holiday),
    None,
    Undefined,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cal(name: &str) -> FeatureKey {
        FeatureKey::new(CALENDAR_FS, name)
    }

    fn assign(name: &str, value: Value) -> Assignment {
        Assignment::new(cal(name), value)
    }

    #[test]
    fn test_everything_undefined_at_top_level() {
        let tracker = ScopeTracker::new();
        assert_eq!(tracker.current(&cal("hebrew-date")), Value::Undefined);
        assert_eq!(tracker.current(&cal("holiday")), Value::Undefined);
        assert_eq!(
            tracker.current(&FeatureKey::new("fs", "anything")),
            Value::Undefined
        );
    }

    #[test]
    fn test_gregorian_date_derives_hebrew_date_and_weekday() {
        let mut tracker = ScopeTracker::new();
        tracker.push_declare("d1", &[assign("gregorian-date", Value::str("2025-09-23"))]);

        assert_eq!(
            tracker.current(&cal("hebrew-date")),
            Value::str("1 tishrei 5786")
        );
        assert_eq!(tracker.current(&cal("day-of-week")), Value::str("tuesday"));
        // israel is undeclared, so holiday stays Undefined
        assert_eq!(tracker.current(&cal("holiday")), Value::Undefined);
    }

    #[test]
    fn test_full_cascade_with_israel() {
        let mut tracker = ScopeTracker::new();
        tracker.push_declare(
            "d1",
            &[
                assign("gregorian-date", Value::str("2025-09-23")),
                assign("israel", Value::Bool(false)),
            ],
        );

        assert_eq!(
            tracker.current(&cal("holiday")),
            Value::str("rosh-hashanah-1")
        );
        assert_eq!(
            tracker.current(&cal("holiday-aggregate")),
            Value::str("rosh-hashanah")
        );
        assert_eq!(
            tracker.current(&cal("torah-reading")),
            Value::str("genesis 21")
        );
    }

    #[test]
    fn test_pop_reverts_and_recomputes() {
        let mut tracker = ScopeTracker::new();
        tracker.push_declare(
            "outer",
            &[
                assign("gregorian-date", Value::str("2025-09-23")),
                assign("israel", Value::Bool(false)),
            ],
        );
        tracker.push_declare("inner", &[assign("gregorian-date", Value::str("2025-10-02"))]);

        assert_eq!(tracker.current(&cal("holiday")), Value::str("yom-kippur"));

        assert!(tracker.pop_declare("inner"));
        // Popping is a value change: the cascade reruns with the outer date
        assert_eq!(
            tracker.current(&cal("holiday")),
            Value::str("rosh-hashanah-1")
        );

        assert!(tracker.pop_declare("outer"));
        assert_eq!(tracker.current(&cal("holiday")), Value::Undefined);
    }

    #[test]
    fn test_declared_hebrew_date_shadows_derivation() {
        let mut tracker = ScopeTracker::new();
        tracker.push_declare(
            "d1",
            &[
                assign("hebrew-date", Value::str("15 nisan 5785")),
                assign("israel", Value::Bool(true)),
            ],
        );
        assert_eq!(tracker.current(&cal("holiday")), Value::str("pesach-1"));
    }

    #[test]
    fn test_ordinary_day_is_defined_none() {
        let mut tracker = ScopeTracker::new();
        tracker.push_declare(
            "d1",
            &[
                assign("gregorian-date", Value::str("2025-11-04")),
                assign("israel", Value::Bool(false)),
            ],
        );
        assert_eq!(tracker.current(&cal("holiday")), Value::str("none"));
        assert_eq!(tracker.current(&cal("torah-reading")), Value::str("none"));
    }

    #[test]
    fn test_pop_unknown_id_reports_failure() {
        let mut tracker = ScopeTracker::new();
        assert!(!tracker.pop_declare("nope"));
    }

    #[test]
    fn test_crossing_scopes_pop_their_own_frames() {
        let mut tracker = ScopeTracker::new();
        let key = FeatureKey::new("fs", "x");
        tracker.push_declare("a", &[Assignment::new(key.clone(), Value::str("outer"))]);
        tracker.push_declare("b", &[Assignment::new(key.clone(), Value::str("inner"))]);

        // Popping the outer declare first (crossing boundaries) leaves
        // the inner frame in effect
        assert!(tracker.pop_declare("a"));
        assert_eq!(tracker.current(&key), Value::str("inner"));
        assert!(tracker.pop_declare("b"));
        assert_eq!(tracker.current(&key), Value::Undefined);
    }
}
