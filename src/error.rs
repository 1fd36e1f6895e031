use thiserror::Error;

/// Failure reported by a store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An update matched no row, e.g. the row was deleted after it was looked up.
    #[error("row {0} no longer exists")]
    RowMissing(uuid::Uuid),
}

/// Errors surfaced by the scoring and self-assessment pipeline.
#[derive(Error, Debug)]
pub enum GrowthError {
    /// A read step failed; the enclosing resolve or aggregate call is aborted.
    #[error("failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: StoreError,
    },

    /// An internal-consistency or caller-contract check failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An upsert failed mid-batch. Answers before `applied` are committed.
    #[error("failed to save self-assessment ({applied} of {total} answers applied): {source}")]
    Persistence {
        applied: usize,
        total: usize,
        #[source]
        source: StoreError,
    },
}

impl GrowthError {
    pub fn fetch(what: &'static str) -> impl FnOnce(StoreError) -> GrowthError {
        move |source| GrowthError::Fetch { what, source }
    }
}

pub type Result<T> = std::result::Result<T, GrowthError>;
