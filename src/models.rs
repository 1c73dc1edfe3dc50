//! Data models for the staff statistics tool.
//!
//! This module contains the records that flow from ingestion into the
//! aggregation index: units, persons and the fixed age buckets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An organizational unit (department), identified solely by its name.
///
/// Ordering and equality are the exact byte-wise comparison of the name, so
/// `"A"` and `"a"` are distinct units and every uppercase ASCII name sorts
/// before every lowercase one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unit(String);

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Unit {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Genre of a person. Anything not recognised maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Female,
    Male,
    Unknown,
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Genre::Female => write!(f, "F"),
            Genre::Male => write!(f, "M"),
            Genre::Unknown => write!(f, "N/A"),
        }
    }
}

impl From<&str> for Genre {
    fn from(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "F" => Genre::Female,
            "M" => Genre::Male,
            _ => Genre::Unknown,
        }
    }
}

/// Age of a person, or `Unknown` when the name is absent from the age lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Age {
    Known(u32),
    Unknown,
}

impl Age {
    pub fn years(&self) -> Option<u32> {
        match self {
            Age::Known(years) => Some(*years),
            Age::Unknown => None,
        }
    }
}

impl From<Option<u32>> for Age {
    fn from(years: Option<u32>) -> Self {
        years.map_or(Age::Unknown, Age::Known)
    }
}

/// A person record as produced by ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    /// 1-based position into the sorted unit list as it stood when the unit
    /// load phase completed. Not a stable identifier.
    pub unit_position: i64,
    pub name: String,
    pub genre: Genre,
    pub income: f64,
    pub age: Age,
}

impl Person {
    pub fn new(
        unit_position: i64,
        name: impl Into<String>,
        genre: Genre,
        income: f64,
        age: Age,
    ) -> Self {
        Self {
            unit_position,
            name: name.into(),
            genre,
            income,
            age,
        }
    }
}

/// Identity assigned to a person by the index at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PersonId(pub u64);

/// Fixed width-10 partition of the age axis.
///
/// Lower limit inclusive, upper exclusive. Ages past the last declared bucket
/// fall back to `Years120To130`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AgeBucket {
    Years0To10,
    Years10To20,
    Years20To30,
    Years30To40,
    Years40To50,
    Years50To60,
    Years60To70,
    Years70To80,
    Years80To90,
    Years90To100,
    Years100To110,
    Years110To120,
    Years120To130,
}

impl AgeBucket {
    pub const WIDTH: u32 = 10;

    /// Every bucket, in declared (ascending) order.
    pub const ALL: [AgeBucket; 13] = [
        AgeBucket::Years0To10,
        AgeBucket::Years10To20,
        AgeBucket::Years20To30,
        AgeBucket::Years30To40,
        AgeBucket::Years40To50,
        AgeBucket::Years50To60,
        AgeBucket::Years60To70,
        AgeBucket::Years70To80,
        AgeBucket::Years80To90,
        AgeBucket::Years90To100,
        AgeBucket::Years100To110,
        AgeBucket::Years110To120,
        AgeBucket::Years120To130,
    ];

    /// The bucket used for ages beyond the declared maximum.
    pub const FALLBACK: AgeBucket = AgeBucket::Years120To130;

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Inclusive lower bound.
    pub fn min(&self) -> u32 {
        self.index() as u32 * Self::WIDTH
    }

    /// Inclusive upper bound.
    pub fn max(&self) -> u32 {
        self.min() + Self::WIDTH - 1
    }

    /// The bucket whose upper bound is the smallest one not below `age`.
    pub fn for_age(age: u32) -> AgeBucket {
        Self::ALL
            .iter()
            .copied()
            .find(|bucket| age <= bucket.max())
            .unwrap_or(Self::FALLBACK)
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min(), self.max())
    }
}
