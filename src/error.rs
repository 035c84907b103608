use thiserror::Error;

/// Errors surfaced by the access engine and its usage accounting
#[derive(Debug, Error)]
pub enum AccessError {
    /// Referenced kid profile (or parent account) does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Malformed caller input, rejected before any mutation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration rejected at the load/save boundary
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persistence backend failure
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl AccessError {
    pub fn kid_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "kid profile",
            id: id.to_string(),
        }
    }

    pub fn parent_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "parent account",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
