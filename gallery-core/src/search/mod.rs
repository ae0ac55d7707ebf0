//! Album search expressions.
//!
//! A search is a small boolean language over album fields:
//!
//! ```text
//! name = 'Trip' & (date >= '01/06/2023' | tag = 'sea')
//! location ~ /^Ly/ & description != ''
//! ```
//!
//! [`AlbumSearch::parse`] tokenizes and parses the text into a
//! [`SearchExpr`] tree and rejects unknown fields, operators a field does
//! not support and malformed dates or regexes up front, so evaluating a
//! parsed search against an [`Album`] cannot fail. `&` binds tighter than
//! `|`; parentheses group.
//!
//! | Field | Operators | Value |
//! | --- | --- | --- |
//! | `name`, `description`, `location` | `= != > >= < <=`, `~` | string, or `/regex/` with `~` |
//! | `date` | `= != > >= < <=` | `dd/mm/yyyy` or `dd/Mon/yyyy`, quoted or bare |
//! | `tag` | `= !=`, `~` | tag name, or `/regex/` with `~` |
//!
//! A missing description or location compares as the empty string. Date
//! comparisons are by UTC calendar day of the album's creation time.

mod lexer;
mod parser;

use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::NaiveDate;
use gallery_model::Album;
use regex::Regex;
use thiserror::Error;

const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%d/%b/%Y"];

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("empty search expression")]
    Empty,

    #[error("unexpected character `{ch}` at {position}")]
    UnexpectedChar { position: usize, ch: char },

    #[error("unterminated {what} starting at {position}")]
    Unterminated { position: usize, what: &'static str },

    #[error("expected {expected} at {position}, found {found}")]
    Unexpected {
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("unknown field `{field}` at {position}")]
    FieldNotFound { position: usize, field: String },

    #[error("operator `{op}` cannot be used with field `{field}`")]
    WrongOperator { field: Field, op: &'static str },

    #[error("regex at {position} needs the `~` operator")]
    RegexWithoutMatch { position: usize },

    #[error("invalid date `{value}`, expected dd/mm/yyyy or dd/Mon/yyyy")]
    InvalidDate { value: String },

    #[error("invalid regex /{pattern}/: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Album field a comparison reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Description,
    Location,
    Date,
    Tag,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Description => "description",
            Field::Location => "location",
            Field::Date => "date",
            Field::Tag => "tag",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Field::Name),
            "description" => Ok(Field::Description),
            "location" => Ok(Field::Location),
            "date" => Ok(Field::Date),
            "tag" => Ok(Field::Tag),
            _ => Err(()),
        }
    }
}

/// Free-text album field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Name,
    Description,
    Location,
}

impl TextField {
    fn read<'a>(&self, album: &'a Album) -> &'a str {
        match self {
            TextField::Name => &album.name,
            TextField::Description => album.description.as_deref().unwrap_or_default(),
            TextField::Location => album.location.as_deref().unwrap_or_default(),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TextField::Name => "name",
            TextField::Description => "description",
            TextField::Location => "location",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    /// Whether `left.cmp(right) == ordering` satisfies `left <op> right`.
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single field test, the leaf of a [`SearchExpr`].
#[derive(Debug, Clone)]
pub enum Comparison {
    Text {
        field: TextField,
        op: CompareOp,
        value: String,
    },
    TextMatches {
        field: TextField,
        pattern: Regex,
    },
    Date {
        op: CompareOp,
        day: NaiveDate,
    },
    /// Some tag is named `name` (or none is, when `negated`).
    Tag {
        name: String,
        negated: bool,
    },
    TagMatches {
        pattern: Regex,
    },
}

impl Comparison {
    pub fn matches(&self, album: &Album) -> bool {
        match self {
            Comparison::Text { field, op, value } => {
                op.holds(field.read(album).cmp(value.as_str()))
            }
            Comparison::TextMatches { field, pattern } => pattern.is_match(field.read(album)),
            Comparison::Date { op, day } => op.holds(album.created_at.date_naive().cmp(day)),
            Comparison::Tag { name, negated } => album.has_tag(name) != *negated,
            Comparison::TagMatches { pattern } => {
                album.tags.iter().any(|tag| pattern.is_match(&tag.name))
            }
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Text { field, op, value } => {
                write!(f, "{} {op} {value:?}", field.as_str())
            }
            Comparison::TextMatches { field, pattern } => {
                write!(f, "{} ~ /{pattern}/", field.as_str())
            }
            Comparison::Date { op, day } => write!(f, "date {op} {}", day.format("%d/%m/%Y")),
            Comparison::Tag { name, negated } => {
                let op = if *negated { "!=" } else { "=" };
                write!(f, "tag {op} {name:?}")
            }
            Comparison::TagMatches { pattern } => write!(f, "tag ~ /{pattern}/"),
        }
    }
}

/// Parsed search tree.
#[derive(Debug, Clone)]
pub enum SearchExpr {
    Compare(Comparison),
    And(Box<SearchExpr>, Box<SearchExpr>),
    Or(Box<SearchExpr>, Box<SearchExpr>),
}

impl SearchExpr {
    pub fn matches(&self, album: &Album) -> bool {
        match self {
            SearchExpr::Compare(comparison) => comparison.matches(album),
            SearchExpr::And(left, right) => left.matches(album) && right.matches(album),
            SearchExpr::Or(left, right) => left.matches(album) || right.matches(album),
        }
    }
}

/// Fully parenthesized rendering of the tree.
impl fmt::Display for SearchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchExpr::Compare(comparison) => write!(f, "({comparison})"),
            SearchExpr::And(left, right) => write!(f, "({left} & {right})"),
            SearchExpr::Or(left, right) => write!(f, "({left} | {right})"),
        }
    }
}

/// Parsed search together with its source text.
#[derive(Debug, Clone)]
pub struct AlbumSearch {
    source: String,
    expr: SearchExpr,
}

impl AlbumSearch {
    pub fn parse(source: &str) -> Result<Self, SearchError> {
        let tokens = lexer::tokenize(source)?;
        let expr = parser::Parser::new(tokens).parse()?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &SearchExpr {
        &self.expr
    }

    pub fn matches(&self, album: &Album) -> bool {
        self.expr.matches(album)
    }
}

impl FromStr for AlbumSearch {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AlbumSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, SearchError> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| SearchError::InvalidDate {
            value: value.to_string(),
        })
}

pub(crate) fn compile_regex(pattern: String) -> Result<Regex, SearchError> {
    Regex::new(&pattern).map_err(|source| SearchError::InvalidRegex { pattern, source })
}
