use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ValidationError / ValidationErrors
// ---------------------------------------------------------------------------

/// A single request-payload validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"Validation failed at "{}": {}"#, self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A collection of one or more `ValidationError`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any issue was reported at `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.0.iter().any(|e| e.path == path)
    }

    /// `Ok(())` when no issues were collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed:")?;
        for e in &self.0 {
            write!(f, "\n  - {}: {}", e.path, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ---------------------------------------------------------------------------
// ReferenceError
// ---------------------------------------------------------------------------

/// Failures raised by the canonical-mapping gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("Invalid {entity} name: {name}")]
    InvalidReference { entity: String, name: String },

    #[error(r#"{field} must be "{expected}" for "{name}"."#)]
    MappingMismatch {
        field: String,
        expected: String,
        name: String,
    },

    #[error("This {entity} already exists!")]
    DuplicateEntity { entity: String, name: String },

    #[error("This {entity} does not exist!")]
    NotFound { entity: String },
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error(
        "Unique constraint violation on field \"{field}\" in collection \"{collection}\": \
         value already exists in record \"{existing_id}\""
    )]
    UniqueConstraint {
        collection: String,
        field: String,
        existing_id: String,
        value: serde_json::Value,
    },

    #[error("Document in \"{collection}\" must be a JSON object")]
    NotAnObject { collection: String },

    #[error("Storage not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("Collection \"{0}\" was not registered during initialization.")]
    CollectionNotRegistered(String),
}

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid regex: {0}")]
    InvalidRegex(String),
}

// ---------------------------------------------------------------------------
// CampusError: top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CampusError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl CampusError {
    /// HTTP-equivalent status for the request layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Reference(e) => match e {
                ReferenceError::InvalidReference { .. } | ReferenceError::MappingMismatch { .. } => {
                    400
                }
                ReferenceError::DuplicateEntity { .. } => 409,
                ReferenceError::NotFound { .. } => 404,
            },
            Self::Storage(e) => match e {
                StorageError::NotFound { .. } => 404,
                StorageError::UniqueConstraint { .. } => 409,
                StorageError::NotAnObject { .. } => 400,
                StorageError::NotInitialized | StorageError::CollectionNotRegistered(_) => 500,
            },
            Self::Query(_) => 400,
        }
    }

    /// The reference failure, if this error is one.
    pub fn as_reference(&self) -> Option<&ReferenceError> {
        match self {
            Self::Reference(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience alias: the default error type is `CampusError`.
pub type Result<T, E = CampusError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
