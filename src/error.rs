use thiserror::Error;

use crate::parse::PathError;
use crate::types::error::{CatalogError, SessionError};

/// Unified error type covering path parsing, catalog compilation, and
/// session construction.
///
/// Convenient for hosts that bubble everything through one `Result`; the
/// individual error types remain available for finer handling.
#[derive(Debug, Error)]
pub enum ReformError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
