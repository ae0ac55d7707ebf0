//! Deterministic ordering of a materialized album list.

use std::{cmp::Ordering, fmt, str::FromStr};

use gallery_model::Album;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Album field used as the sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    Location,
    Date,
}

/// `Normal` is ascending, `Reverse` descending.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Normal,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortParseError {
    #[error("unknown sort key `{0}`")]
    UnknownKey(String),
    #[error("unknown sort order `{0}`")]
    UnknownOrder(String),
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Location => "location",
            SortKey::Date => "date",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = SortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "location" => Ok(SortKey::Location),
            "date" => Ok(SortKey::Date),
            _ => Err(SortParseError::UnknownKey(s.to_string())),
        }
    }
}

impl FromStr for SortOrder {
    type Err = SortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "asc" => Ok(SortOrder::Normal),
            "reverse" | "desc" => Ok(SortOrder::Reverse),
            _ => Err(SortParseError::UnknownOrder(s.to_string())),
        }
    }
}

/// Compare two albums on `key` in ascending order.
///
/// Strings compare by byte order. A missing location sorts before any
/// present one.
pub fn compare_albums(a: &Album, b: &Album, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Location => a.location.as_deref().cmp(&b.location.as_deref()),
        SortKey::Date => a.created_at.cmp(&b.created_at),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlbumSorter {
    pub key: SortKey,
    pub order: SortOrder,
}

impl AlbumSorter {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Parse from request parameters, e.g. `("date", "desc")`.
    pub fn parse(key: &str, order: &str) -> Result<Self, SortParseError> {
        Ok(Self::new(key.parse()?, order.parse()?))
    }

    /// Stable in-place sort; equal keys keep their incoming order.
    pub fn sort(&self, albums: &mut [Album]) {
        let key = self.key;
        match self.order {
            SortOrder::Normal => {
                albums.sort_by(|a, b| compare_albums(a, b, key))
            }
            SortOrder::Reverse => {
                albums.sort_by(|a, b| compare_albums(b, a, key))
            }
        }
    }
}
