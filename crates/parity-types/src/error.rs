use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParityError {
    #[error("Resource not found: {path}")]
    ResourceNotFound { path: String },

    #[error("Malformed container '{path}': {reason}")]
    MalformedContainer { path: String, reason: String },

    #[error("Field not found: {name}")]
    FieldNotFound { name: String },

    #[error("Incomplete reference data: required field '{field}' is missing")]
    IncompleteReferenceData { field: String },

    #[error("Unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedSnapshotVersion { found: u64, supported: u32 },

    #[error("Variable '{name}' has shape {found:?}, expected {expected}")]
    ShapeMismatch {
        name: String,
        expected: &'static str,
        found: Vec<usize>,
    },

    #[error("Container handle already closed")]
    ContainerClosed,

    #[error("Snapshot schema violated: {0}")]
    SchemaViolation(String),

    #[error("Invalid subject input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParityError {
    /// Missing-name errors are the only ones an optional read may swallow.
    pub fn is_field_not_found(&self) -> bool {
        matches!(self, ParityError::FieldNotFound { .. })
    }
}

pub type ParityResult<T> = Result<T, ParityError>;
