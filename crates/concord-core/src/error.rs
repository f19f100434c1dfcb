//! Room error types.

use thiserror::Error;

use crate::keys::KeyError;

/// Errors from room operations.
///
/// A failed reconciliation never leaves a partial mutation behind: all
/// changes are computed before the first write.
#[derive(Debug, Error)]
pub enum RoomError {
    /// The session adapter broke its key-format contract.
    #[error("adapter contract violated: {0}")]
    AdapterContract(#[from] KeyError),
}

impl RoomError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Contract violations point at a broken integration layer; retrying the
    /// same pass would fail the same way.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AdapterContract(_) => true,
        }
    }
}
