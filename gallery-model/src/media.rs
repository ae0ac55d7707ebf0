use chrono::{DateTime, Utc};

use crate::ids::BucketName;

/// Kind of media object, derived from the object's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MediaType {
    Photo,
    Video,
    Unknown,
}

const PHOTO_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "webp", "heic", "tif", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

impl MediaType {
    /// Classify an object key by its extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Self {
        let Some((_, ext)) = filename.rsplit_once('.') else {
            return MediaType::Unknown;
        };
        let ext = ext.to_ascii_lowercase();
        if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
            MediaType::Photo
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaType::Video
        } else {
            MediaType::Unknown
        }
    }
}

/// One object in an album bucket, as produced by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Media {
    pub media_type: MediaType,
    pub filename: String,
    pub bucket: BucketName,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Media {
    /// Final path segment of the object key.
    pub fn basename(&self) -> &str {
        self.filename
            .rsplit_once('/')
            .map_or(self.filename.as_str(), |(_, name)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(MediaType::from_filename("photos/a.JPG"), MediaType::Photo);
        assert_eq!(MediaType::from_filename("b.mov"), MediaType::Video);
        assert_eq!(MediaType::from_filename("notes.txt"), MediaType::Unknown);
        assert_eq!(MediaType::from_filename("README"), MediaType::Unknown);
    }

    #[test]
    fn basename_strips_prefix() {
        let media = Media {
            media_type: MediaType::Photo,
            filename: "photos/2024/a.jpg".into(),
            bucket: BucketName::new("trip-1").unwrap(),
            thumbnail: None,
            created_at: Utc::now(),
        };
        assert_eq!(media.basename(), "a.jpg");
    }
}
