use thiserror::Error;

/// Errors surfaced by the MicroAdapt engine.
///
/// Numeric instability inside the local fitter is deliberately absent: it is
/// recovered in place and only shows up as `degraded_fits` in the statistics.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration rejected at construction, or a vector whose dimension
    /// disagrees with the stream seen so far.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A forecast was requested before the engine left the COLD state.
    #[error("insufficient history: {received} updates received, {required} required")]
    InsufficientHistory { received: u64, required: u64 },

    /// Malformed call arguments (non-finite values, zero horizon, wrong window length).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported snapshot schema version {found} (supported up to {supported})")]
    UnsupportedSnapshotVersion { found: u32, supported: u32 },

    /// Snapshot contents are inconsistent or could not be decoded.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Persistence(e.to_string())
    }
}

/// Convenience type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
