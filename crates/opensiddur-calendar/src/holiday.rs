/*
 * holiday.rs
 * Copyright (c) 2025 the Open Siddur Project
 */

//! Static holiday tables.
//!
//! Maps a Hebrew date (plus the israel/diaspora distinction) to the
//! holiday observed on it, and each holiday to its aggregate family and
//! festival Torah reading. Fasts are listed at their nominal dates;
//! Shabbat postponement of fasts is outside the fixed ruleset.

use serde::{Deserialize, Serialize};

use crate::hebrew::{HebrewDate, last_day_of_month, last_month_of_year};

/// A holiday or fast day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Holiday {
    RoshHashanah1,
    RoshHashanah2,
    TzomGedaliah,
    YomKippur,
    Sukkot1,
    Sukkot2,
    CholHamoedSukkot,
    HoshanaRabbah,
    SheminiAtzeret,
    SimchatTorah,
    Chanukah,
    AsarahBTevet,
    TuBishvat,
    TaanitEsther,
    Purim,
    ShushanPurim,
    Pesach1,
    Pesach2,
    CholHamoedPesach,
    Pesach7,
    Pesach8,
    LagBaOmer,
    Shavuot1,
    Shavuot2,
    TzomTammuz,
    TishaBAv,
}

impl Holiday {
    /// Stable kebab-case id, used as the `holiday` feature value.
    pub fn id(self) -> &'static str {
        match self {
            Holiday::RoshHashanah1 => "rosh-hashanah-1",
            Holiday::RoshHashanah2 => "rosh-hashanah-2",
            Holiday::TzomGedaliah => "tzom-gedaliah",
            Holiday::YomKippur => "yom-kippur",
            Holiday::Sukkot1 => "sukkot-1",
            Holiday::Sukkot2 => "sukkot-2",
            Holiday::CholHamoedSukkot => "chol-hamoed-sukkot",
            Holiday::HoshanaRabbah => "hoshana-rabbah",
            Holiday::SheminiAtzeret => "shemini-atzeret",
            Holiday::SimchatTorah => "simchat-torah",
            Holiday::Chanukah => "chanukah",
            Holiday::AsarahBTevet => "asarah-btevet",
            Holiday::TuBishvat => "tu-bishvat",
            Holiday::TaanitEsther => "taanit-esther",
            Holiday::Purim => "purim",
            Holiday::ShushanPurim => "shushan-purim",
            Holiday::Pesach1 => "pesach-1",
            Holiday::Pesach2 => "pesach-2",
            Holiday::CholHamoedPesach => "chol-hamoed-pesach",
            Holiday::Pesach7 => "pesach-7",
            Holiday::Pesach8 => "pesach-8",
            Holiday::LagBaOmer => "lag-baomer",
            Holiday::Shavuot1 => "shavuot-1",
            Holiday::Shavuot2 => "shavuot-2",
            Holiday::TzomTammuz => "tzom-tammuz",
            Holiday::TishaBAv => "tisha-bav",
        }
    }

    /// Inverse of [`Holiday::id`].
    pub fn from_id(id: &str) -> Option<Holiday> {
        const ALL: [Holiday; 26] = [
            Holiday::RoshHashanah1,
            Holiday::RoshHashanah2,
            Holiday::TzomGedaliah,
            Holiday::YomKippur,
            Holiday::Sukkot1,
            Holiday::Sukkot2,
            Holiday::CholHamoedSukkot,
            Holiday::HoshanaRabbah,
            Holiday::SheminiAtzeret,
            Holiday::SimchatTorah,
            Holiday::Chanukah,
            Holiday::AsarahBTevet,
            Holiday::TuBishvat,
            Holiday::TaanitEsther,
            Holiday::Purim,
            Holiday::ShushanPurim,
            Holiday::Pesach1,
            Holiday::Pesach2,
            Holiday::CholHamoedPesach,
            Holiday::Pesach7,
            Holiday::Pesach8,
            Holiday::LagBaOmer,
            Holiday::Shavuot1,
            Holiday::Shavuot2,
            Holiday::TzomTammuz,
            Holiday::TishaBAv,
        ];
        ALL.into_iter().find(|h| h.id() == id)
    }

    /// Aggregate family id (the `holiday-aggregate` feature value).
    pub fn aggregate(self) -> &'static str {
        match self {
            Holiday::RoshHashanah1 | Holiday::RoshHashanah2 => "rosh-hashanah",
            Holiday::YomKippur => "yom-kippur",
            Holiday::Sukkot1
            | Holiday::Sukkot2
            | Holiday::CholHamoedSukkot
            | Holiday::HoshanaRabbah => "sukkot",
            Holiday::SheminiAtzeret | Holiday::SimchatTorah => "shemini-atzeret",
            Holiday::Chanukah => "chanukah",
            Holiday::TuBishvat => "tu-bishvat",
            Holiday::Purim | Holiday::ShushanPurim => "purim",
            Holiday::Pesach1
            | Holiday::Pesach2
            | Holiday::CholHamoedPesach
            | Holiday::Pesach7
            | Holiday::Pesach8 => "pesach",
            Holiday::LagBaOmer => "lag-baomer",
            Holiday::Shavuot1 | Holiday::Shavuot2 => "shavuot",
            Holiday::TzomGedaliah
            | Holiday::AsarahBTevet
            | Holiday::TaanitEsther
            | Holiday::TzomTammuz
            | Holiday::TishaBAv => "fast-day",
        }
    }

    /// Festival Torah reading, if the day has a fixed one.
    pub fn torah_reading(self) -> Option<&'static str> {
        match self {
            Holiday::RoshHashanah1 => Some("genesis 21"),
            Holiday::RoshHashanah2 => Some("genesis 22"),
            Holiday::YomKippur => Some("leviticus 16"),
            Holiday::Sukkot1 | Holiday::Sukkot2 => Some("leviticus 22:26-23:44"),
            Holiday::SheminiAtzeret => Some("deuteronomy 14:22-16:17"),
            Holiday::SimchatTorah => Some("deuteronomy 33-34"),
            Holiday::Chanukah => Some("numbers 7"),
            Holiday::Pesach1 => Some("exodus 12:21-51"),
            Holiday::Pesach2 => Some("leviticus 22:26-23:44"),
            Holiday::Pesach7 => Some("exodus 13:17-15:26"),
            Holiday::Pesach8 => Some("deuteronomy 14:22-16:17"),
            Holiday::Shavuot1 => Some("exodus 19-20"),
            Holiday::Shavuot2 => Some("deuteronomy 14:22-16:17"),
            _ => None,
        }
    }
}

/// Holiday observed on the given date, if any. The israel flag selects
/// the one-day festival scheme and drops the diaspora second days.
pub fn holiday_on(date: HebrewDate, in_israel: bool) -> Option<Holiday> {
    let HebrewDate { year, month, day } = date;
    let purim_month = last_month_of_year(year);

    match (month, day) {
        // Tishrei
        (7, 1) => Some(Holiday::RoshHashanah1),
        (7, 2) => Some(Holiday::RoshHashanah2),
        (7, 3) => Some(Holiday::TzomGedaliah),
        (7, 10) => Some(Holiday::YomKippur),
        (7, 15) => Some(Holiday::Sukkot1),
        (7, 16) if !in_israel => Some(Holiday::Sukkot2),
        (7, 16..=20) => Some(Holiday::CholHamoedSukkot),
        (7, 21) => Some(Holiday::HoshanaRabbah),
        (7, 22) => Some(Holiday::SheminiAtzeret),
        (7, 23) if !in_israel => Some(Holiday::SimchatTorah),

        // Chanukah: eight days from 25 Kislev, spilling into Tevet
        (9, 25..=30) => Some(Holiday::Chanukah),
        (10, d) if i64::from(d) <= 32 - i64::from(last_day_of_month(year, 9)) => {
            Some(Holiday::Chanukah)
        }
        (10, 10) => Some(Holiday::AsarahBTevet),

        (11, 15) => Some(Holiday::TuBishvat),

        // Purim falls in Adar II in leap years
        (m, 13) if m == purim_month => Some(Holiday::TaanitEsther),
        (m, 14) if m == purim_month => Some(Holiday::Purim),
        (m, 15) if m == purim_month => Some(Holiday::ShushanPurim),

        // Nisan
        (1, 15) => Some(Holiday::Pesach1),
        (1, 16) if !in_israel => Some(Holiday::Pesach2),
        (1, 16..=20) => Some(Holiday::CholHamoedPesach),
        (1, 21) => Some(Holiday::Pesach7),
        (1, 22) if !in_israel => Some(Holiday::Pesach8),

        (2, 18) => Some(Holiday::LagBaOmer),

        // Sivan
        (3, 6) => Some(Holiday::Shavuot1),
        (3, 7) if !in_israel => Some(Holiday::Shavuot2),

        (4, 17) => Some(Holiday::TzomTammuz),
        (5, 9) => Some(Holiday::TishaBAv),

        _ => None,
    }
}
