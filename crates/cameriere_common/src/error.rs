//! Error types for the virtual waiter.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WaiterError {
    #[error("Malformed menu: {0}")]
    MalformedMenu(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Ledger invariant violated: {0}")]
    LedgerInvariant(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WaiterError {
    /// Per-turn errors are downgraded to a user-visible message at the
    /// orchestrator boundary; everything else aborts startup.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WaiterError::Generation(_))
    }
}
