//! # STORMSYNC Config
//!
//! Everything decided before the first worker thread exists:
//!
//! - which threading level to request ([`ThreadingDecision`])
//! - how many storms the namelist describes ([`NamelistSummary`])
//! - the run layout and worker attributes ([`RunConfig`])
//!
//! ## Inputs
//!
//! | Source | Used for |
//! |---|---|
//! | `WRF_NMM_MPI_MODE` | threading mode override |
//! | `namelist.input` | `max_dom`, `parent_id` |
//! | `HRD_THREADED_INTEGRATION_AFFINITY` | affinity, when the run config has none |
//! | run config TOML | everything else |

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod mode;
pub mod namelist;
pub mod run_config;

pub use error::{ConfigError, ConfigResult};
pub use mode::{DecisionSource, ThreadingDecision, ThreadingMode};
pub use namelist::NamelistSummary;
pub use run_config::RunConfig;

/// Environment variable holding the core affinity string.
pub const AFFINITY_ENV: &str = "HRD_THREADED_INTEGRATION_AFFINITY";

/// Environment variable overriding the threading mode.
pub const MPI_MODE_ENV: &str = "WRF_NMM_MPI_MODE";

/// Namelist read when no path is given.
pub const DEFAULT_NAMELIST: &str = "namelist.input";
