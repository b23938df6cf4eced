pub mod catalog;
pub mod identity;
pub mod inventory;
pub mod order;

use thiserror::Error;

/// A request that failed field validation before reaching a repository.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
