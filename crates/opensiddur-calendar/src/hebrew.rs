/*
 * hebrew.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Arithmetic Hebrew calendar conversion.
//!
//! Months are numbered with Nisan = 1 through Adar II = 13, so Tishrei
//! (the civil new year) is month 7. Conversion goes through absolute day
//! numbers (day 1 = January 1, 1 CE in the proleptic Gregorian calendar,
//! matching `chrono::Datelike::num_days_from_ce`).

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Offset between absolute day numbers and days elapsed since the Hebrew
/// epoch (1 Tishrei, AM 1).
const EPOCH_OFFSET: i64 = 1_373_429;

/// A date in the Hebrew calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HebrewDate {
    pub year: i32,
    /// Month number, Nisan = 1 .. Adar II = 13 (Tishrei = 7).
    pub month: u32,
    pub day: u32,
}

/// True in the 3rd, 6th, 8th, 11th, 14th, 17th, and 19th year of the
/// Metonic cycle.
pub fn is_leap_year(year: i32) -> bool {
    (7 * i64::from(year) + 1).rem_euclid(19) < 7
}

/// Number of months in the year: 13 in a leap year, else 12.
pub fn last_month_of_year(year: i32) -> u32 {
    if is_leap_year(year) { 13 } else { 12 }
}

/// Days from the Hebrew epoch to 1 Tishrei of `year`, including the molad
/// postponement rules (dehiyyot).
fn elapsed_days(year: i32) -> i64 {
    let cycles_months = 235 * i64::from((year - 1) / 19);
    let regular_months = 12 * i64::from((year - 1) % 19);
    let leap_months = (7 * i64::from((year - 1) % 19) + 1) / 19;
    let months_elapsed = cycles_months + regular_months + leap_months;

    let parts_elapsed = 204 + 793 * (months_elapsed % 1080);
    let hours_elapsed =
        5 + 12 * months_elapsed + 793 * (months_elapsed / 1080) + parts_elapsed / 1080;
    let conjunction_day = 1 + 29 * months_elapsed + hours_elapsed / 24;
    let conjunction_parts = 1080 * (hours_elapsed % 24) + parts_elapsed % 1080;

    let mut day = conjunction_day;
    if conjunction_parts >= 19440
        || (conjunction_day % 7 == 2 && conjunction_parts >= 9924 && !is_leap_year(year))
        || (conjunction_day % 7 == 1 && conjunction_parts >= 16789 && is_leap_year(year - 1))
    {
        day += 1;
    }
    // Rosh Hashanah may not fall on Sunday, Wednesday, or Friday.
    if day % 7 == 0 || day % 7 == 3 || day % 7 == 5 {
        day += 1;
    }
    day
}

/// Length of the year in days (353, 354, 355, 383, 384, or 385).
pub fn year_length(year: i32) -> i64 {
    elapsed_days(year + 1) - elapsed_days(year)
}

/// Last day of the given month.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    match month {
        // Iyar, Tammuz, Elul, Tevet, Adar II are always 29 days
        2 | 4 | 6 | 10 | 13 => 29,
        // Adar is 29 days except Adar I in a leap year
        12 if !is_leap_year(year) => 29,
        // Cheshvan is 30 days only in a complete year
        8 if year_length(year) % 10 != 5 => 29,
        // Kislev is 29 days only in a deficient year
        9 if year_length(year) % 10 == 3 => 29,
        _ => 30,
    }
}

/// Months of the year in calendar order, starting from 1 Tishrei.
fn months_in_calendar_order(year: i32) -> impl Iterator<Item = u32> {
    (7..=last_month_of_year(year)).chain(1..=6)
}

impl HebrewDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Absolute day number of this date.
    pub fn to_absolute(self) -> i64 {
        let mut day_in_year = i64::from(self.day);
        for month in months_in_calendar_order(self.year) {
            if month == self.month {
                break;
            }
            day_in_year += i64::from(last_day_of_month(self.year, month));
        }
        day_in_year + elapsed_days(self.year) - EPOCH_OFFSET
    }

    /// Date for the given absolute day number.
    pub fn from_absolute(abs: i64) -> Self {
        // Underestimate the year, then step forward.
        let mut year = ((abs + EPOCH_OFFSET) / 366) as i32;
        while abs >= (HebrewDate::new(year + 1, 7, 1)).to_absolute() {
            year += 1;
        }

        let mut remaining = abs - HebrewDate::new(year, 7, 1).to_absolute();
        for month in months_in_calendar_order(year) {
            let len = i64::from(last_day_of_month(year, month));
            if remaining < len {
                return HebrewDate::new(year, month, (remaining + 1) as u32);
            }
            remaining -= len;
        }
        // months_in_calendar_order covers the whole year, so the loop
        // always returns for valid input
        unreachable!("day {abs} beyond the end of Hebrew year {year}")
    }

    /// Hebrew date for the given Gregorian date.
    pub fn from_gregorian(date: NaiveDate) -> Self {
        Self::from_absolute(i64::from(date.num_days_from_ce()))
    }

    /// Gregorian date for this Hebrew date.
    pub fn to_gregorian(self) -> Option<NaiveDate> {
        NaiveDate::from_num_days_from_ce_opt(self.to_absolute() as i32)
    }

    /// Lowercase month name, distinguishing `adar-i`/`adar-ii` in leap
    /// years.
    pub fn month_name(self) -> &'static str {
        match self.month {
            1 => "nisan",
            2 => "iyar",
            3 => "sivan",
            4 => "tammuz",
            5 => "av",
            6 => "elul",
            7 => "tishrei",
            8 => "cheshvan",
            9 => "kislev",
            10 => "tevet",
            11 => "shevat",
            12 if is_leap_year(self.year) => "adar-i",
            12 => "adar",
            13 => "adar-ii",
            _ => "invalid",
        }
    }
}

impl fmt::Display for HebrewDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.day, self.month_name(), self.year)
    }
}

/// Error parsing a `"<day> <month> <year>"` Hebrew date string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHebrewDateError(pub String);

impl fmt::Display for ParseHebrewDateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid Hebrew date: {}", self.0)
    }
}

impl std::error::Error for ParseHebrewDateError {}

impl std::str::FromStr for HebrewDate {
    type Err = ParseHebrewDateError;

    /// Parse the canonical `"1 tishrei 5786"` form produced by `Display`.
    /// `adar` is accepted as Adar II in leap years.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseHebrewDateError(s.to_string());
        let mut parts = s.split_whitespace();
        let day: u32 = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let month_name = parts.next().ok_or_else(err)?;
        let year: i32 = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        if parts.next().is_some() {
            return Err(err());
        }

        let month = match month_name {
            "nisan" => 1,
            "iyar" => 2,
            "sivan" => 3,
            "tammuz" => 4,
            "av" => 5,
            "elul" => 6,
            "tishrei" => 7,
            "cheshvan" => 8,
            "kislev" => 9,
            "tevet" => 10,
            "shevat" => 11,
            "adar-i" => 12,
            "adar" if is_leap_year(year) => 13,
            "adar" => 12,
            "adar-ii" => 13,
            _ => return Err(err()),
        };
        if month > last_month_of_year(year) || day == 0 || day > last_day_of_month(year, month) {
            return Err(err());
        }
        Ok(HebrewDate::new(year, month, day))
    }
}
