use thiserror::Error;

/// Structural problems in the source data. These abort an import;
/// malformed-but-present values never end up here, they clean to NULL.
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("{source_name}:{line}: row has no id")]
    MissingIdentity { source_name: String, line: u64 },

    #[error("{source_name}:{line}: invalid {field} value {value:?}")]
    InvalidField {
        source_name: String,
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("duplicate key in {table} for row {id}")]
    DuplicateKey { table: &'static str, id: i64 },

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
