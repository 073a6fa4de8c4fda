//! Error types for TGDB ingestion

use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failures raised while parsing, validating or applying an import
#[derive(Error, Debug)]
pub enum IngestError {
    /// Duplicate or otherwise ambiguous metadata keys, bad metadata values
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("Missing metadata key: {0}")]
    MissingMetadataKey(String),

    /// Unsupported column count or a non-numeric value where a number is required
    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Bad network format: {0}")]
    BadNetworkFormat(String),

    /// A gene that must exist in the annotation snapshot does not
    #[error("Unknown gene: {0}")]
    UnknownGene(String),

    /// An edge endpoint missing from the snapshot; skipped and counted, never fatal
    #[error("Unresolved gene: {0}")]
    UnresolvedGene(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Sample sets of paired files disagree
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Store error: {0}")]
    Store(String),

    /// Any failure inside the transactional apply phase, after rollback
    #[error("Import rolled back: {source}")]
    ApplyFailed {
        #[source]
        source: Box<IngestError>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IngestError {
    /// Wrap an error raised while the store transaction was open
    pub fn apply_failed(source: IngestError) -> Self {
        match source {
            already @ IngestError::ApplyFailed { .. } => already,
            other => IngestError::ApplyFailed {
                source: Box::new(other),
            },
        }
    }

    /// True for errors that abort an import before any write
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IngestError::MalformedMetadata(_)
                | IngestError::MissingMetadataKey(_)
                | IngestError::MalformedData(_)
                | IngestError::BadNetworkFormat(_)
                | IngestError::UnknownGene(_)
                | IngestError::DuplicateKey(_)
                | IngestError::SchemaMismatch(_)
        )
    }
}
