//! # Config Error Types
//!
//! All errors that can occur while deciding how a run is threaded.

use stormsync_core::InitError;
use thiserror::Error;

/// Errors from reading run configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The namelist file could not be read.
    #[error("cannot read namelist {path}: {reason}")]
    NamelistNotFound {
        /// Path that was tried.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// `max_dom` is not an integer.
    #[error("max_dom is not numeric: {0:?}")]
    MaxDomNotNumeric(String),

    /// `max_dom` is missing or not positive, or `parent_id` is missing.
    #[error("namelist lacks a positive max_dom or a parent_id list")]
    MissingDomainLayout,

    /// A `parent_id` entry is not an integer.
    #[error("parent_id has a non-numeric entry: {0:?}")]
    ParentIdNotNumeric(String),

    /// `parent_id` lists fewer domains than `max_dom`.
    #[error("parent_id lists {found} domains, max_dom is {expected}")]
    ParentIdTooShort {
        /// Entries found.
        found: usize,
        /// Entries required.
        expected: usize,
    },

    /// A config file could not be read.
    #[error("cannot read config {path}: {reason}")]
    Io {
        /// Path that was tried.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// A config file is not valid TOML for a run config.
    #[error("invalid run config: {0}")]
    Toml(String),

    /// A domain ID of zero.
    #[error("{field} must be a domain ID of at least 1")]
    ZeroDomain {
        /// Config field holding the zero.
        field: &'static str,
    },

    /// A storm's first domain is outside the simulation.
    #[error("storm {storm} first domain {domain} is outside 2..={max_domains}")]
    FirstDomainOutOfRange {
        /// 1-based storm index.
        storm: usize,
        /// Offending domain ID.
        domain: u32,
        /// Domains in the run.
        max_domains: usize,
    },

    /// Two storms claim the same first domain.
    #[error("domain {0} is the first domain of more than one storm")]
    DuplicateFirstDomain(u32),

    /// The settings were rejected by the threading core.
    #[error(transparent)]
    Core(#[from] InitError),
}

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;
