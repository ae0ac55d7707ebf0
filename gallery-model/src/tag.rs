use std::fmt;

/// Owner-scoped label attached to albums. Names are unique per owner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub color: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.color {
            Some(color) => write!(f, "{} ({color})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Insert or replace `tag` by name, keeping the list ordered by name.
pub fn upsert_tag(tags: &mut Vec<Tag>, tag: Tag) {
    match tags.binary_search_by(|t| t.name.cmp(&tag.name)) {
        Ok(idx) => tags[idx] = tag,
        Err(idx) => tags.insert(idx, tag),
    }
}
