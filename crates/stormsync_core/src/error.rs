//! # Core Error Types
//!
//! Every failure in the threading core is returned to the caller. Nothing in
//! this crate aborts the process.

use thiserror::Error;

use crate::domain::DomainId;

/// Errors from sizing or indexing the domain registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// More domains were requested than the registry can hold.
    #[error("domain capacity exceeded: requested {requested}, maximum {max}")]
    CapacityExceeded {
        /// Domain count that was asked for.
        requested: usize,
        /// Fixed capacity.
        max: usize,
    },

    /// A registry must hold at least one domain.
    #[error("at least one domain is required")]
    NoDomains,

    /// A domain ID outside `1..=max_domains`.
    #[error("domain {domain} is outside the registry (1..={max_domains})")]
    InvalidDomain {
        /// The offending domain.
        domain: DomainId,
        /// Current registry size.
        max_domains: usize,
    },

    /// The registry cannot be reset while workers are still running.
    #[error("{active} domain workers are still active")]
    WorkersStillActive {
        /// Number of unjoined workers.
        active: usize,
    },
}

/// Errors from initializing the threading core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// Registry sizing failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The worker stack size is unusable.
    #[error("invalid worker stack size: {requested} bytes (minimum {minimum})")]
    InvalidStackSize {
        /// Requested stack size in bytes.
        requested: usize,
        /// Smallest accepted stack size in bytes.
        minimum: usize,
    },

    /// The worker thread name prefix is unusable.
    #[error("invalid worker thread name prefix {0:?}")]
    InvalidThreadName(String),
}

/// Errors from launching a domain worker.
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The domain does not exist in the registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The slot already has an unjoined worker.
    #[error("domain {0} already has an active worker")]
    AlreadyActive(DomainId),

    /// The operating system refused to create the thread.
    #[error("failed to spawn worker for domain {domain}: {source}")]
    SpawnFailed {
        /// Domain whose worker could not be created.
        domain: DomainId,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the privilege gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The domain is not covered by the gate.
    #[error("domain {domain} is not covered by the privilege gate (1..={num_domains})")]
    UnknownDomain {
        /// The offending domain.
        domain: DomainId,
        /// Number of domains the gate was built for.
        num_domains: usize,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for initialization.
pub type InitResult<T> = Result<T, InitError>;

/// Result type for launching workers.
pub type SpawnResult<T> = Result<T, SpawnError>;

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;
