use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// A required column (or every alias of a logical column) is absent.
///
/// Fatal to the operation that raised it: no partial output is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Could not find {field} column (tried: {})", .tried.join(", "))]
    MissingField { field: String, tried: Vec<String> },

    #[error("The following required columns are missing from {table}: {}", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },
}

/// A cell could not be read as a number. Always recovered as a null.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{raw}' is not a number")]
pub struct ConversionError {
    pub raw: String,
}

/// A single asset failed to download. Logged, never aborts the batch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("URL does not contain asset root marker '{marker}': {url}")]
    MissingMarker { url: String, marker: String },

    #[error("refusing to write outside the download directory: {0}")]
    UnsafePath(String),

    #[error("{0}")]
    Http(Box<ureq::Error>),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ureq::Error> for FetchError {
    fn from(e: ureq::Error) -> Self {
        FetchError::Http(Box::new(e))
    }
}

/// The archive-search collaborator answered with something that is not a
/// manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UpstreamFormatError(pub String);
