use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use gallery_model::Album;

use super::FilterKind;

/// Truncate a timestamp to 00:00:00 UTC of its calendar day.
pub fn midnight_utc(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Typed predicate over an album record.
///
/// Date bounds are stored already truncated to midnight UTC:
/// `CreatedBefore(d)` keeps albums created strictly before `d`,
/// `CreatedAfter(d)` keeps albums created at or after `d`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumFilter {
    OwnerIn(Vec<String>),
    OwnerNotIn(Vec<String>),
    CreatedBefore(DateTime<Utc>),
    CreatedAfter(DateTime<Utc>),
}

impl AlbumFilter {
    pub fn owned_by<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AlbumFilter::OwnerIn(owners.into_iter().map(Into::into).collect())
    }

    pub fn not_owned_by<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AlbumFilter::OwnerNotIn(owners.into_iter().map(Into::into).collect())
    }

    pub fn before(date: DateTime<Utc>) -> Self {
        AlbumFilter::CreatedBefore(midnight_utc(date))
    }

    pub fn after(date: DateTime<Utc>) -> Self {
        AlbumFilter::CreatedAfter(midnight_utc(date))
    }

    pub fn before_day(day: NaiveDate) -> Self {
        AlbumFilter::CreatedBefore(day.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn after_day(day: NaiveDate) -> Self {
        AlbumFilter::CreatedAfter(day.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            AlbumFilter::OwnerIn(_) => FilterKind::ByOwnerId,
            AlbumFilter::OwnerNotIn(_) => FilterKind::NotByOwnerId,
            AlbumFilter::CreatedBefore(_) => FilterKind::BeforeDate,
            AlbumFilter::CreatedAfter(_) => FilterKind::AfterDate,
        }
    }

    pub fn matches(&self, album: &Album) -> bool {
        match self {
            AlbumFilter::OwnerIn(owners) => owners.contains(&album.owner_id),
            AlbumFilter::OwnerNotIn(owners) => !owners.contains(&album.owner_id),
            AlbumFilter::CreatedBefore(bound) => album.created_at < *bound,
            AlbumFilter::CreatedAfter(bound) => album.created_at >= *bound,
        }
    }

    /// Append this predicate as a parenthesised SQL restriction on the
    /// `a` (album) alias.
    #[cfg(feature = "database")]
    pub fn push_restriction(
        &self,
        qb: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>,
    ) {
        match self {
            AlbumFilter::OwnerIn(owners) => {
                qb.push("(a.owner_id = ANY(");
                qb.push_bind(owners.clone());
                qb.push("))");
            }
            AlbumFilter::OwnerNotIn(owners) => {
                qb.push("(NOT (a.owner_id = ANY(");
                qb.push_bind(owners.clone());
                qb.push(")))");
            }
            AlbumFilter::CreatedBefore(bound) => {
                qb.push("(a.created_at < ");
                qb.push_bind(*bound);
                qb.push(")");
            }
            AlbumFilter::CreatedAfter(bound) => {
                qb.push("(a.created_at >= ");
                qb.push_bind(*bound);
                qb.push(")");
            }
        }
    }
}

/// Conjunction of album predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumFilters(Vec<AlbumFilter>);

impl AlbumFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: AlbumFilter) -> Self {
        self.0.push(filter);
        self
    }

    pub fn push(&mut self, filter: AlbumFilter) {
        self.0.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlbumFilter> {
        self.0.iter()
    }

    pub fn matches(&self, album: &Album) -> bool {
        self.0.iter().all(|filter| filter.matches(album))
    }

    /// Append ` AND <restriction>` for every predicate. The caller is
    /// expected to have opened a `WHERE` clause already.
    #[cfg(feature = "database")]
    pub fn push_where(&self, qb: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>) {
        for filter in &self.0 {
            qb.push(" AND ");
            filter.push_restriction(qb);
        }
    }
}

impl FromIterator<AlbumFilter> for AlbumFilters {
    fn from_iter<T: IntoIterator<Item = AlbumFilter>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<AlbumFilter> for AlbumFilters {
    fn extend<T: IntoIterator<Item = AlbumFilter>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}
