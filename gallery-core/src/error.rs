use gallery_model::AlbumId;
use thiserror::Error;

/// Failures raised by an album catalog adapter.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("album {0} not found")]
    NotFound(AlbumId),

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt catalog row: {0}")]
    Corrupt(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<gallery_model::ModelError> for CatalogError {
    fn from(err: gallery_model::ModelError) -> Self {
        CatalogError::Corrupt(err.to_string())
    }
}

/// Failures raised by an object store or the storage cache.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("bucket {0} already exists")]
    BucketAlreadyExists(String),

    #[error("bucket {0} not found")]
    BucketNotFound(String),

    #[error("object {filename} not found in bucket {bucket}")]
    ObjectNotFound { bucket: String, filename: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{op} failed for {bucket}{}: {source}", display_filename(.filename))]
    Operation {
        op: &'static str,
        bucket: String,
        filename: Option<String>,
        #[source]
        source: Box<StorageError>,
    },
}

fn display_filename(filename: &Option<String>) -> String {
    filename
        .as_deref()
        .map(|name| format!("/{name}"))
        .unwrap_or_default()
}

impl StorageError {
    /// Attach operation, bucket and optional object context.
    pub fn context(
        self,
        op: &'static str,
        bucket: impl Into<String>,
        filename: Option<&str>,
    ) -> Self {
        StorageError::Operation {
            op,
            bucket: bucket.into(),
            filename: filename.map(str::to_string),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping context layers.
    pub fn root(&self) -> &StorageError {
        match self {
            StorageError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            StorageError::BucketNotFound(_) | StorageError::ObjectNotFound { .. }
        )
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self.root(), StorageError::BucketAlreadyExists(_))
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
pub type StorageResult<T> = std::result::Result<T, StorageError>;
