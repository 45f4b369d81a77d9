//! Error types for the cache layer
//!
//! Only configuration problems are errors. Cache misses are `None`, and
//! runtime faults inside a cache operation are recovered where they happen.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache construction and configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A cache was configured with a capacity of zero
    #[error("cache '{cache}' capacity must be positive, got {capacity}")]
    InvalidCapacity { cache: String, capacity: usize },

    /// The background sweep was configured with a zero interval
    #[error("sweep interval must be greater than zero")]
    InvalidSweepInterval,

    /// A TTL or sweep interval exceeds the supported maximum
    #[error("{setting} of {secs}s exceeds the maximum of {max_secs}s")]
    DurationTooLong {
        setting: String,
        secs: u64,
        max_secs: u64,
    },

    /// An environment override was set but could not be parsed
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    /// The background sweep was started outside a tokio runtime
    #[error("background sweep requires a running tokio runtime")]
    NoRuntime,
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
