use thiserror::Error;

/// Failure modes of the comparison pipeline.
///
/// Errors are scoped to one category (one logical sheet of the extract);
/// the run loop collects them and keeps processing the remaining
/// categories, so none of these aborts the whole run.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("category '{category}' is missing required column(s): {}", fields.join(", "))]
    Schema {
        category: String,
        fields: Vec<String>,
    },

    #[error("category '{category}' ({period}) has a duplicate natural key: {record_source}")]
    DuplicateKey {
        category: String,
        period: String,
        record_source: String,
    },

    #[error("category '{category}' has fewer than two snapshots; nothing to compare")]
    TooFewSnapshots { category: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
