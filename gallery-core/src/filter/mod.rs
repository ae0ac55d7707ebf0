//! Filter predicate engine.
//!
//! A filter arrives as a [`FilterKind`] plus a loosely shaped
//! [`FilterValue`] (usually decoded from request parameters). [`compile`]
//! checks the value's shape against the kind and produces a typed
//! predicate: an [`AlbumFilter`] for catalog queries or a [`UserFilter`] for
//! identity-provider listings. In-process callers can skip the loose path
//! and build the typed predicates directly.
//!
//! Predicates are pure. Collections of them ([`AlbumFilters`],
//! [`UserFilters`]) combine with logical AND; an empty collection accepts
//! everything.

pub mod album;
pub mod user;

use std::fmt;

use chrono::{DateTime, Utc};
use gallery_model::Role;
use thiserror::Error;

pub use album::{AlbumFilter, AlbumFilters, midnight_utc};
pub use user::{UserFilter, UserFilters, UsernamePatterns};

/// Closed set of filters understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    ByOwnerId,
    NotByOwnerId,
    BeforeDate,
    AfterDate,
    ByUsername,
    NotByUsername,
    ByRole,
    ByCanShare,
}

impl FilterKind {
    pub const ALL: [FilterKind; 8] = [
        FilterKind::ByOwnerId,
        FilterKind::NotByOwnerId,
        FilterKind::BeforeDate,
        FilterKind::AfterDate,
        FilterKind::ByUsername,
        FilterKind::NotByUsername,
        FilterKind::ByRole,
        FilterKind::ByCanShare,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::ByOwnerId => "by-owner-id",
            FilterKind::NotByOwnerId => "not-by-owner-id",
            FilterKind::BeforeDate => "before-date",
            FilterKind::AfterDate => "after-date",
            FilterKind::ByUsername => "by-username",
            FilterKind::NotByUsername => "not-by-username",
            FilterKind::ByRole => "by-role",
            FilterKind::ByCanShare => "by-can-share",
        }
    }

    /// Value shape this kind accepts.
    pub fn expected_shape(&self) -> ValueShape {
        match self {
            FilterKind::ByOwnerId
            | FilterKind::NotByOwnerId
            | FilterKind::ByUsername
            | FilterKind::NotByUsername => ValueShape::Strings,
            FilterKind::BeforeDate | FilterKind::AfterDate => ValueShape::Date,
            FilterKind::ByRole => ValueShape::Roles,
            FilterKind::ByCanShare => ValueShape::Flag,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    Strings,
    Date,
    Roles,
    Flag,
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueShape::Strings => "list of strings",
            ValueShape::Date => "timestamp",
            ValueShape::Roles => "list of roles",
            ValueShape::Flag => "boolean",
        })
    }
}

/// Filter value as received at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Strings(Vec<String>),
    Date(DateTime<Utc>),
    Roles(Vec<Role>),
    Flag(bool),
}

impl FilterValue {
    pub fn shape(&self) -> ValueShape {
        match self {
            FilterValue::Strings(_) => ValueShape::Strings,
            FilterValue::Date(_) => ValueShape::Date,
            FilterValue::Roles(_) => ValueShape::Roles,
            FilterValue::Flag(_) => ValueShape::Flag,
        }
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(value: Vec<String>) -> Self {
        FilterValue::Strings(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Date(value)
    }
}

impl From<Vec<Role>> for FilterValue {
    fn from(value: Vec<Role>) -> Self {
        FilterValue::Roles(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Flag(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("{kind} invalid value: {reason}")]
    InvalidFilterValue { kind: FilterKind, reason: String },
}

impl FilterError {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterError::InvalidFilterValue { kind, .. } => *kind,
        }
    }
}

/// Output of [`compile`]: the predicate targets either albums or users.
#[derive(Debug, Clone)]
pub enum CompiledFilter {
    Album(AlbumFilter),
    User(UserFilter),
}

impl CompiledFilter {
    pub fn into_album(self) -> Option<AlbumFilter> {
        match self {
            CompiledFilter::Album(filter) => Some(filter),
            CompiledFilter::User(_) => None,
        }
    }

    pub fn into_user(self) -> Option<UserFilter> {
        match self {
            CompiledFilter::User(filter) => Some(filter),
            CompiledFilter::Album(_) => None,
        }
    }
}

/// Compile a filter kind and its value into an executable predicate.
///
/// Fails with [`FilterError::InvalidFilterValue`] when the value's shape does
/// not match what the kind expects, or when a username pattern is not a
/// valid regular expression.
pub fn compile(
    kind: FilterKind,
    value: FilterValue,
) -> Result<CompiledFilter, FilterError> {
    let expected = kind.expected_shape();
    if value.shape() != expected {
        return Err(FilterError::InvalidFilterValue {
            kind,
            reason: format!("expecting {expected}, got {}", value.shape()),
        });
    }

    let compiled = match (kind, value) {
        (FilterKind::ByOwnerId, FilterValue::Strings(owners)) => {
            CompiledFilter::Album(AlbumFilter::OwnerIn(owners))
        }
        (FilterKind::NotByOwnerId, FilterValue::Strings(owners)) => {
            CompiledFilter::Album(AlbumFilter::OwnerNotIn(owners))
        }
        (FilterKind::BeforeDate, FilterValue::Date(date)) => {
            CompiledFilter::Album(AlbumFilter::before(date))
        }
        (FilterKind::AfterDate, FilterValue::Date(date)) => {
            CompiledFilter::Album(AlbumFilter::after(date))
        }
        (FilterKind::ByUsername, FilterValue::Strings(patterns)) => {
            CompiledFilter::User(UserFilter::UsernameMatches(
                username_patterns(kind, patterns)?,
            ))
        }
        (FilterKind::NotByUsername, FilterValue::Strings(patterns)) => {
            CompiledFilter::User(UserFilter::UsernameNotMatches(
                username_patterns(kind, patterns)?,
            ))
        }
        (FilterKind::ByRole, FilterValue::Roles(roles)) => {
            CompiledFilter::User(UserFilter::RoleIn(roles))
        }
        (FilterKind::ByCanShare, FilterValue::Flag(flag)) => {
            CompiledFilter::User(UserFilter::CanShare(flag))
        }
        (kind, value) => {
            return Err(FilterError::InvalidFilterValue {
                kind,
                reason: format!("expecting {expected}, got {}", value.shape()),
            });
        }
    };

    Ok(compiled)
}

fn username_patterns(
    kind: FilterKind,
    patterns: Vec<String>,
) -> Result<UsernamePatterns, FilterError> {
    UsernamePatterns::new(patterns).map_err(|err| {
        FilterError::InvalidFilterValue {
            kind,
            reason: format!("invalid username pattern: {err}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn value_of(shape: ValueShape) -> FilterValue {
        match shape {
            ValueShape::Strings => FilterValue::Strings(vec!["u1".into()]),
            ValueShape::Date => {
                FilterValue::Date(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap())
            }
            ValueShape::Roles => FilterValue::Roles(vec![Role::Admin]),
            ValueShape::Flag => FilterValue::Flag(true),
        }
    }

    const SHAPES: [ValueShape; 4] = [
        ValueShape::Strings,
        ValueShape::Date,
        ValueShape::Roles,
        ValueShape::Flag,
    ];

    #[test]
    fn every_kind_rejects_every_wrong_shape() {
        for kind in FilterKind::ALL {
            for shape in SHAPES {
                if shape == kind.expected_shape() {
                    continue;
                }
                let err = compile(kind, value_of(shape))
                    .expect_err("wrong shape must not compile");
                assert_eq!(err.kind(), kind);
                assert!(err.to_string().contains(kind.as_str()));
            }
        }
    }

    #[test]
    fn every_kind_accepts_its_shape() {
        for kind in FilterKind::ALL {
            let compiled = compile(kind, value_of(kind.expected_shape()))
                .expect("matching shape compiles");
            let targets_album = matches!(compiled, CompiledFilter::Album(_));
            let album_kind = matches!(
                kind,
                FilterKind::ByOwnerId
                    | FilterKind::NotByOwnerId
                    | FilterKind::BeforeDate
                    | FilterKind::AfterDate
            );
            assert_eq!(targets_album, album_kind, "{kind}");
        }
    }

    #[test]
    fn invalid_username_regex_is_an_invalid_value() {
        let err = compile(
            FilterKind::ByUsername,
            FilterValue::Strings(vec!["(unclosed".into()]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), FilterKind::ByUsername);
    }
}
