//! # Threading Mode
//!
//! Decides which threading level the host runtime must request:
//!
//! ```text
//!   WRF_NMM_MPI_MODE set and recognised? ──yes──► that mode
//!             │ no
//!             ▼
//!   read namelist ─► count storms ─► ≤ 1 storm: Single
//!                                    > 1 storm: Multiple
//! ```
//!
//! Several storms integrate on concurrent threads that all talk to the
//! message-passing layer, so anything above one storm needs `Multiple`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::namelist::NamelistSummary;
use crate::MPI_MODE_ENV;

/// Threading level requested from the message-passing runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingMode {
    /// Only one thread exists.
    Single,
    /// Only the main thread makes runtime calls.
    Funneled,
    /// Any thread may call, one at a time.
    Serialized,
    /// Any thread may call at any time.
    #[default]
    Multiple,
}

impl ThreadingMode {
    /// Every mode, in increasing thread support.
    pub const ALL: [Self; 4] = [
        Self::Single,
        Self::Funneled,
        Self::Serialized,
        Self::Multiple,
    ];

    /// Runtime name of the mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Single => "MPI_THREAD_SINGLE",
            Self::Funneled => "MPI_THREAD_FUNNELED",
            Self::Serialized => "MPI_THREAD_SERIALIZED",
            Self::Multiple => "MPI_THREAD_MULTIPLE",
        }
    }

    /// Parses an environment value.
    ///
    /// Whitespace is removed and case ignored; the value must start with a
    /// full mode name and anything after it is tolerated.
    #[must_use]
    pub fn from_env_value(raw: &str) -> Option<Self> {
        let value: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| value.starts_with(&mode.name().to_ascii_lowercase()))
    }

    /// Mode for a run tracking `storms` storms.
    #[must_use]
    pub const fn for_storm_count(storms: usize) -> Self {
        if storms <= 1 {
            Self::Single
        } else {
            Self::Multiple
        }
    }
}

impl fmt::Display for ThreadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a [`ThreadingDecision`] came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecisionSource {
    /// The environment override.
    Environment,
    /// Storm count from the namelist.
    Namelist(NamelistSummary),
}

/// Resolved threading mode and its provenance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadingDecision {
    /// Mode to request.
    pub mode: ThreadingMode,
    /// What decided it.
    pub source: DecisionSource,
}

impl ThreadingDecision {
    /// Resolves the mode from an optional environment value, reading the
    /// namelist only when the environment does not decide.
    ///
    /// # Errors
    ///
    /// Whatever `read_namelist` or [`NamelistSummary::parse`] return.
    pub fn resolve<F>(env_value: Option<&str>, read_namelist: F) -> ConfigResult<Self>
    where
        F: FnOnce() -> ConfigResult<String>,
    {
        if let Some(raw) = env_value {
            if let Some(mode) = ThreadingMode::from_env_value(raw) {
                info!(%mode, "threading mode from environment");
                return Ok(Self {
                    mode,
                    source: DecisionSource::Environment,
                });
            }
            if !raw.trim().is_empty() {
                warn!(value = raw, "unrecognised threading mode in environment, ignored");
            }
        }

        let summary = NamelistSummary::parse(&read_namelist()?)?;
        let mode = ThreadingMode::for_storm_count(summary.storm_count());
        info!(
            %mode,
            max_dom = summary.max_dom,
            storms = summary.storm_count(),
            "threading mode from namelist"
        );
        Ok(Self {
            mode,
            source: DecisionSource::Namelist(summary),
        })
    }

    /// Resolves from `WRF_NMM_MPI_MODE` and the namelist at `namelist_path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NamelistNotFound`] if the namelist is needed and cannot
    /// be read, or any namelist parse error.
    pub fn from_environment(namelist_path: impl AsRef<Path>) -> ConfigResult<Self> {
        let env_value = std::env::var(MPI_MODE_ENV).ok();
        let path = namelist_path.as_ref();
        Self::resolve(env_value.as_deref(), || {
            std::fs::read_to_string(path).map_err(|e| ConfigError::NamelistNotFound {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })
    }

    /// Storm count, when the namelist was read.
    #[must_use]
    pub fn storm_count(&self) -> Option<usize> {
        match &self.source {
            DecisionSource::Environment => None,
            DecisionSource::Namelist(summary) => Some(summary.storm_count()),
        }
    }
}
