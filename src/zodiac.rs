//! Tropical zodiac signs and derivation from a birth date.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;

/// Serialized lowercase; deserialized through [`FromStr`], so any casing is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Fire,
    Earth,
    Air,
    Water,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown zodiac sign: {0}")]
pub struct ZodiacParseError(pub String);

/// `(month, last day, sign)`; a sign runs until its last day inclusive.
const BOUNDARIES: [(u8, u8, ZodiacSign); 12] = [
    (1, 19, ZodiacSign::Capricorn),
    (2, 18, ZodiacSign::Aquarius),
    (3, 20, ZodiacSign::Pisces),
    (4, 19, ZodiacSign::Aries),
    (5, 20, ZodiacSign::Taurus),
    (6, 20, ZodiacSign::Gemini),
    (7, 22, ZodiacSign::Cancer),
    (8, 22, ZodiacSign::Leo),
    (9, 22, ZodiacSign::Virgo),
    (10, 22, ZodiacSign::Libra),
    (11, 21, ZodiacSign::Scorpio),
    (12, 21, ZodiacSign::Sagittarius),
];

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        Self::Aries,
        Self::Taurus,
        Self::Gemini,
        Self::Cancer,
        Self::Leo,
        Self::Virgo,
        Self::Libra,
        Self::Scorpio,
        Self::Sagittarius,
        Self::Capricorn,
        Self::Aquarius,
        Self::Pisces,
    ];

    /// Sign for a calendar day. Returns `None` for an invalid month or day.
    #[must_use]
    pub fn from_month_day(month: u8, day: u8) -> Option<Self> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        let (_, last_day, sign) = BOUNDARIES[usize::from(month - 1)];
        if day <= last_day {
            return Some(sign);
        }
        // Past the boundary the next sign has started.
        Some(BOUNDARIES[usize::from(month % 12)].2)
    }

    #[must_use]
    pub fn from_date(date: Date) -> Self {
        let month = u8::from(date.month());
        // Every day of a valid `Date` is in range.
        Self::from_month_day(month, date.day()).unwrap_or(Self::Capricorn)
    }

    /// Derive the sign from a `YYYY-MM-DD` birth date.
    #[must_use]
    pub fn from_birth_date(raw: &str) -> Option<Self> {
        Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
            .ok()
            .map(Self::from_date)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Aries => "aries",
            Self::Taurus => "taurus",
            Self::Gemini => "gemini",
            Self::Cancer => "cancer",
            Self::Leo => "leo",
            Self::Virgo => "virgo",
            Self::Libra => "libra",
            Self::Scorpio => "scorpio",
            Self::Sagittarius => "sagittarius",
            Self::Capricorn => "capricorn",
            Self::Aquarius => "aquarius",
            Self::Pisces => "pisces",
        }
    }

    #[must_use]
    pub fn element(self) -> Element {
        match self {
            Self::Aries | Self::Leo | Self::Sagittarius => Element::Fire,
            Self::Taurus | Self::Virgo | Self::Capricorn => Element::Earth,
            Self::Gemini | Self::Libra | Self::Aquarius => Element::Air,
            Self::Cancer | Self::Scorpio | Self::Pisces => Element::Water,
        }
    }

    /// Same-element and fire/air, earth/water pairings count as compatible.
    #[must_use]
    pub fn compatible_with(self, other: Self) -> bool {
        matches!(
            (self.element(), other.element()),
            (Element::Fire | Element::Air, Element::Fire | Element::Air)
                | (Element::Earth | Element::Water, Element::Earth | Element::Water)
        )
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ZodiacSign {
    type Err = ZodiacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|sign| sign.name() == wanted)
            .ok_or_else(|| ZodiacParseError(s.to_string()))
    }
}

impl TryFrom<String> for ZodiacSign {
    type Error = ZodiacParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
#[path = "zodiac_test.rs"]
mod tests;
