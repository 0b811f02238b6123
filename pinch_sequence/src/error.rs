use std::path::PathBuf;

use thiserror::Error;

/// Anything that can go wrong talking to the catalog.  All of these are
/// recoverable: the caller reports them and keeps its previous state.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("no catalog item with id {0}")]
    NotFound(String),
}
