//! Region codes and the country / subdivision tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ISO 3166 code of a region: `FR` for a country, `FR-IDF` for a subdivision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RegionCode {
    Country(String),
    Subdivision { country: String, subdivision: String },
}

impl RegionCode {
    /// Country part of the code
    pub fn country(&self) -> &str {
        match self {
            RegionCode::Country(code) => code,
            RegionCode::Subdivision { country, .. } => country,
        }
    }

    /// Whether `other` is this region or lies inside it.
    pub fn contains(&self, other: &RegionCode) -> bool {
        match self {
            RegionCode::Country(code) => code == other.country(),
            RegionCode::Subdivision { .. } => self == other,
        }
    }

    /// Antarctica's boundary never closes over the pole and needs the antimeridian bridge.
    pub fn is_antarctica(&self) -> bool {
        matches!(self, RegionCode::Country(code) if code == "AQ")
    }
}

impl FromStr for RegionCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid region code: {}", s);
        let len = s.chars().count();
        if len != 2 && len <= 3 {
            return Err(invalid());
        }

        let country: String = s.chars().take(2).collect();
        if !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }
        let country = country.to_uppercase();

        if len == 2 {
            return Ok(RegionCode::Country(country));
        }

        let subdivision = s[2..].strip_prefix('-').ok_or_else(invalid)?;
        Ok(RegionCode::Subdivision {
            country,
            subdivision: subdivision.to_uppercase(),
        })
    }
}

impl TryFrom<String> for RegionCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RegionCode> for String {
    fn from(code: RegionCode) -> Self {
        code.to_string()
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionCode::Country(code) => write!(f, "{}", code),
            RegionCode::Subdivision {
                country,
                subdivision,
            } => write!(f, "{}-{}", country, subdivision),
        }
    }
}

/// A country or subdivision with its boundary relation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    /// OSM relation ID
    pub id: u64,

    pub code: RegionCode,

    /// Subdivisions, when the country defines any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivisions: Option<Vec<Region>>,
}

impl Region {
    pub fn new(id: u64, code: RegionCode) -> Self {
        Self {
            id,
            code,
            subdivisions: None,
        }
    }
}

/// Flatten countries into the regions that own a boundary: subdivisions when a
/// country has them, the country itself otherwise.
pub fn flat_regions(countries: &[Region]) -> Vec<Region> {
    countries
        .iter()
        .flat_map(|country| match &country.subdivisions {
            Some(subdivisions) => subdivisions.clone(),
            None => vec![country.clone()],
        })
        .collect()
}

/// Restrict a country tree to the requested codes.
///
/// A country is kept when any requested code lies inside it; its subdivisions are
/// kept when the country itself was requested or the subdivision was named.
pub fn filter_regions(countries: Vec<Region>, include: &[RegionCode]) -> Vec<Region> {
    if include.is_empty() {
        return countries;
    }

    countries
        .into_iter()
        .filter(|country| include.iter().any(|code| country.code.contains(code)))
        .map(|mut country| {
            if !include.contains(&country.code) {
                if let Some(subdivisions) = country.subdivisions.take() {
                    country.subdivisions = Some(
                        subdivisions
                            .into_iter()
                            .filter(|s| include.contains(&s.code))
                            .collect(),
                    );
                }
            }
            country
        })
        .collect()
}
