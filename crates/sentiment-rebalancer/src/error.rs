//! Error Types for the Rebalancer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RebalanceError>;

#[derive(Error, Debug)]
pub enum RebalanceError {
    /// Portfolio value is zero, current fractions cannot be computed
    #[error("Portfolio value is zero; allocation fractions are undefined")]
    DivisionUndefined,

    #[error("Asset not supported: {0}")]
    UnsupportedAsset(String),

    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Data source, persistence or trade sink failure
    #[error("External call failed: {0}")]
    External(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RebalanceError {
    /// Whether retrying the same call next cycle may succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::External(_) | Self::Network(_) | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(RebalanceError::External("store down".into()).is_retryable());
        assert!(!RebalanceError::DivisionUndefined.is_retryable());
        assert!(!RebalanceError::Config("bad".into()).is_retryable());
    }
}
