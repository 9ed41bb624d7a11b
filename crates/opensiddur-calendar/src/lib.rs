/*
 * lib.rs
 * Copyright (c) 2025 the Open Siddur Project
 *
 * Fixed calendar and holiday derivation rules.
 *
 * The compiler's scope tracker derives calendar features (hebrew-date,
 * day-of-week, holiday, ...) from declared inputs using the rules in this
 * crate. The rules are fixed: the arithmetic Hebrew calendar and static
 * holiday tables. Anything beyond them (astronomical data, fast-day
 * postponements) is out of scope.
 */

pub mod hebrew;
pub mod holiday;

pub use hebrew::HebrewDate;
pub use holiday::{Holiday, holiday_on};
