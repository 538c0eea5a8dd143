//! # Run Configuration
//!
//! TOML description of one threaded run, loaded once at startup:
//!
//! ```toml
//! max_domains   = 5
//! local_rank    = 0
//! first_domains = [2, 4]
//! affinity      = "0,1,2:3,4,5"
//! ```
//!
//! Everything except `max_domains` has a default.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stormsync_core::{
    DomainId, DomainRegistry, InitError, IntegrationSettings, ThreadAttributes,
    DEFAULT_STACK_SIZE,
};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::namelist::NamelistSummary;
use crate::AFFINITY_ENV;

fn default_stack_size() -> usize {
    DEFAULT_STACK_SIZE
}

fn default_thread_name_prefix() -> String {
    "domain".to_owned()
}

const fn default_initial_holder() -> u32 {
    1
}

/// One run's threading configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Domains in the simulation (`1..=40`).
    pub max_domains: usize,
    /// Rank of this process on its node.
    #[serde(default)]
    pub local_rank: usize,
    /// First moving domain of each storm.
    #[serde(default)]
    pub first_domains: Vec<u32>,
    /// Affinity string; falls back to the environment when absent.
    #[serde(default)]
    pub affinity: Option<String>,
    /// Worker stack size in bytes.
    #[serde(default = "default_stack_size")]
    pub stack_size_bytes: usize,
    /// Worker thread name prefix.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// Domain holding privilege at start.
    #[serde(default = "default_initial_holder")]
    pub initial_holder: u32,
}

impl RunConfig {
    /// Config for `max_domains` domains with every default.
    #[must_use]
    pub fn new(max_domains: usize) -> Self {
        Self {
            max_domains,
            local_rank: 0,
            first_domains: Vec::new(),
            affinity: None,
            stack_size_bytes: default_stack_size(),
            thread_name_prefix: default_thread_name_prefix(),
            initial_holder: default_initial_holder(),
        }
    }

    /// Config whose domain layout comes from a namelist.
    #[must_use]
    pub fn from_namelist(summary: &NamelistSummary) -> Self {
        Self {
            first_domains: summary.first_domains().iter().map(|d| d.get()).collect(),
            ..Self::new(summary.max_dom)
        }
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Toml`] for malformed input, or any [`Self::validate`]
    /// error.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "loading run config");
        Self::from_toml_str(&text)
    }

    /// Checks domain bounds and first-domain uniqueness.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Core`] for a domain count outside `1..=40`, a stack
    ///   below the minimum or a bad thread name
    /// - [`ConfigError::ZeroDomain`] for a zero initial holder or first domain
    /// - [`ConfigError::FirstDomainOutOfRange`] for a first domain of 1 or
    ///   beyond `max_domains`
    /// - [`ConfigError::DuplicateFirstDomain`] when two storms share one
    pub fn validate(&self) -> ConfigResult<()> {
        self.attributes()?;
        DomainRegistry::new(self.max_domains).map_err(InitError::from)?;

        if self.initial_holder == 0 {
            return Err(ConfigError::ZeroDomain {
                field: "initial_holder",
            });
        }

        let mut seen = HashSet::with_capacity(self.first_domains.len());
        for (index, &domain) in self.first_domains.iter().enumerate() {
            if domain == 0 {
                return Err(ConfigError::ZeroDomain {
                    field: "first_domains",
                });
            }
            let in_range = usize::try_from(domain).is_ok_and(|d| d <= self.max_domains);
            if domain == 1 || !in_range {
                return Err(ConfigError::FirstDomainOutOfRange {
                    storm: index + 1,
                    domain,
                    max_domains: self.max_domains,
                });
            }
            if !seen.insert(domain) {
                return Err(ConfigError::DuplicateFirstDomain(domain));
            }
        }
        Ok(())
    }

    /// Affinity string from the file, else from
    /// `HRD_THREADED_INTEGRATION_AFFINITY`.
    #[must_use]
    pub fn affinity_or_env(&self) -> Option<String> {
        self.affinity
            .clone()
            .or_else(|| std::env::var(AFFINITY_ENV).ok())
    }

    /// Number of storms.
    #[inline]
    #[must_use]
    pub fn storm_count(&self) -> usize {
        self.first_domains.len()
    }

    /// Validated settings for [`stormsync_core::IntegrationContext::initialize`].
    ///
    /// # Errors
    ///
    /// Any [`Self::validate`] error.
    pub fn to_settings(&self) -> ConfigResult<IntegrationSettings> {
        self.validate()?;

        let first_domains = self
            .first_domains
            .iter()
            .map(|&raw| {
                DomainId::new(raw).ok_or(ConfigError::ZeroDomain {
                    field: "first_domains",
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        let initial_holder = DomainId::new(self.initial_holder).ok_or(ConfigError::ZeroDomain {
            field: "initial_holder",
        })?;

        let mut settings = IntegrationSettings::new(self.max_domains)
            .with_storms(first_domains)
            .with_local_rank(self.local_rank)
            .with_attributes(self.attributes()?)
            .with_initial_holder(initial_holder);
        if let Some(affinity) = self.affinity_or_env() {
            settings = settings.with_affinity(affinity);
        }
        Ok(settings)
    }

    fn attributes(&self) -> ConfigResult<ThreadAttributes> {
        Ok(ThreadAttributes::with_stack_size(self.stack_size_bytes)?
            .named(self.thread_name_prefix.as_str())?)
    }
}
