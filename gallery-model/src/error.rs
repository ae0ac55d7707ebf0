use std::fmt::{self, Display};

/// Errors produced by model constructors and parsing routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidBucketName { name: String, reason: &'static str },
    InvalidPermission(String),
    InvalidRole(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidBucketName { name, reason } => {
                write!(f, "invalid bucket name '{name}': {reason}")
            }
            ModelError::InvalidPermission(value) => {
                write!(f, "invalid permission: {value}")
            }
            ModelError::InvalidRole(value) => write!(f, "invalid role: {value}"),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
