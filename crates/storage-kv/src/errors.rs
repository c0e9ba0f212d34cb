//! Conversions from backend-specific errors into the backend-agnostic error
//! types defined in `pocketfolio_core`.

use pocketfolio_core::errors::{Error, StorageError};

use crate::backend::BackendError;

impl From<BackendError> for StorageError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::CapacityExceeded(msg) => StorageError::CapacityExceeded(msg),
            BackendError::Unavailable(msg) => StorageError::Internal(msg),
        }
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::Storage(StorageError::from(err))
    }
}

/// Extension trait for easily converting backend Results to core Results.
pub trait IntoCore<T> {
    fn into_core(self) -> pocketfolio_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, BackendError> {
    fn into_core(self) -> pocketfolio_core::Result<T> {
        self.map_err(Error::from)
    }
}
