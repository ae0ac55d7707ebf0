use std::{fmt, str::FromStr};

use crate::error::{ModelError, Result};

/// Catalog primary key of an album.
///
/// Never handed to clients as-is; the core exposes it through an opaque,
/// encrypted representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct AlbumId(pub i32);

impl AlbumId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for AlbumId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl FromStr for AlbumId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<i32>().map(AlbumId)
    }
}

/// Object-storage container name holding one album's media.
///
/// S3-style naming with a relaxed lower bound: 1..=63 characters drawn
/// from lowercase ascii letters, digits, `-` and `.`, starting and ending
/// with a letter or digit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct BucketName(String);

impl BucketName {
    pub const MAX_LEN: usize = 63;

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::InvalidBucketName {
                name,
                reason: "bucket name is empty",
            });
        }
        if name.len() > Self::MAX_LEN {
            return Err(ModelError::InvalidBucketName {
                name,
                reason: "bucket name longer than 63 characters",
            });
        }
        if !name.bytes().all(|b| {
            b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.'
        }) {
            return Err(ModelError::InvalidBucketName {
                name,
                reason: "only lowercase letters, digits, '-' and '.' are allowed",
            });
        }
        let edge_ok = |b: Option<u8>| {
            b.is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        };
        if !edge_ok(name.bytes().next()) || !edge_ok(name.bytes().last()) {
            return Err(ModelError::InvalidBucketName {
                name,
                reason: "must start and end with a letter or digit",
            });
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BucketName {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BucketName> for String {
    fn from(value: BucketName) -> Self {
        value.0
    }
}

impl FromStr for BucketName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
