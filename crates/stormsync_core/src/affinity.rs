//! # Core Affinity
//!
//! Resolves a per-rank core list into a table of cores for the controlling
//! process and for the first domain of every storm, and binds threads to them.
//!
//! ## Format
//!
//! ```text
//!   "0,0,1,2,3:4,4,5,6,7:8,8,9,10,11"
//!    └───┬───┘ └───┬───┘ └────┬────┘
//!     rank 0    rank 1     rank 2
//!
//!   rank entry:  <process core>,<storm 1 core>,<storm 2 core>,...
//! ```
//!
//! The process and one of its storm workers may share a core: the process is
//! idle while its workers integrate.
//!
//! Empty fields and empty rank entries are dropped before positions are
//! counted, so `"0,,2"` reads as `"0,2"` and `"a::b"` as `"a:b"`. A negative
//! field leaves that thread unpinned. Broken fields are skipped and recorded
//! as [`ConfigParseWarning`]s; resolution never fails.

use std::fmt;

use tracing::{debug, info, warn};

use crate::domain::{DomainId, MAX_DOMAINS};

/// Which thread a core field belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorePosition {
    /// The controlling (main) process thread.
    Process,
    /// The worker of the given 1-based storm.
    Storm(usize),
}

impl fmt::Display for CorePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process => write!(f, "main process"),
            Self::Storm(storm) => write!(f, "storm {storm}"),
        }
    }
}

/// A malformed affinity field that was skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigParseWarning {
    /// The entry has no field for this position.
    MissingCore {
        /// Position of the field.
        position: CorePosition,
    },
    /// The field was not an integer.
    InvalidCore {
        /// Position of the field.
        position: CorePosition,
        /// The raw field text.
        entry: String,
    },
    /// The storm's first domain does not fit in the domain table.
    DomainOutOfRange {
        /// 1-based storm index.
        storm: usize,
        /// First domain of that storm.
        domain: DomainId,
    },
}

impl fmt::Display for ConfigParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCore { position } => {
                write!(f, "no core ID entry for {position}")
            }
            Self::InvalidCore { position, entry } => {
                write!(f, "skipping invalid core ID entry '{entry}' for {position}")
            }
            Self::DomainOutOfRange { storm, domain } => {
                write!(f, "storm {storm} first domain {domain} exceeds {MAX_DOMAINS} domains")
            }
        }
    }
}

/// Resolved cores for the controlling process and every domain slot.
///
/// Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AffinityTable {
    process_core: Option<usize>,
    domain_cores: [Option<usize>; MAX_DOMAINS],
    warnings: Vec<ConfigParseWarning>,
}

impl Default for AffinityTable {
    fn default() -> Self {
        Self::unset()
    }
}

/// One parsed field.
#[derive(Clone, Copy)]
enum CoreField {
    Core(usize),
    Negative,
    Missing,
    Invalid,
}

impl CoreField {
    fn parse(field: Option<&str>) -> Self {
        let Some(field) = field.filter(|f| !f.is_empty()) else {
            return Self::Missing;
        };
        if let Some(magnitude) = field.strip_prefix('-') {
            return if is_numeric(magnitude) { Self::Negative } else { Self::Invalid };
        }
        if !is_numeric(field) {
            return Self::Invalid;
        }
        field.parse().map_or(Self::Invalid, Self::Core)
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl AffinityTable {
    /// A table with nothing pinned.
    #[must_use]
    pub fn unset() -> Self {
        Self {
            process_core: None,
            domain_cores: [None; MAX_DOMAINS],
            warnings: Vec::new(),
        }
    }

    /// Resolves the rank entry for `local_rank` from `config`.
    ///
    /// `first_domains[i]` is the first moving domain of storm `i + 1`; the
    /// storm count is its length. Empty fields and entries do not take a
    /// position. Fields past the storm count are ignored, and storms past the
    /// last field are unset with a warning. A rank with no entry gives an
    /// all-unset table.
    #[must_use]
    pub fn resolve(config: &str, local_rank: usize, first_domains: &[DomainId]) -> Self {
        let mut table = Self::unset();

        let config: String = config.chars().filter(|c| !c.is_whitespace()).collect();
        if config.is_empty() {
            return table;
        }

        let Some(entry) = config.split(':').filter(|e| !e.is_empty()).nth(local_rank) else {
            debug!(local_rank, "no affinity entry for local rank");
            return table;
        };
        info!("found affinity mask '{entry}' for local rank {local_rank}");

        let mut fields = entry.split(',').filter(|f| !f.is_empty());

        let field = fields.next();
        match CoreField::parse(field) {
            CoreField::Core(core) => {
                info!(core, "assigning core to the main process (domain 1)");
                table.process_core = Some(core);
            }
            parsed => table.skip(CorePosition::Process, parsed, field),
        }

        for (index, &domain) in first_domains.iter().enumerate() {
            let storm = index + 1;
            let field = fields.next();
            let parsed = CoreField::parse(field);
            let CoreField::Core(core) = parsed else {
                table.skip(CorePosition::Storm(storm), parsed, field);
                continue;
            };
            if domain.slot_index() >= MAX_DOMAINS {
                table.warn(ConfigParseWarning::DomainOutOfRange { storm, domain });
                continue;
            }
            info!(core, storm, %domain, "assigning core to storm");
            table.domain_cores[domain.slot_index()] = Some(core);
        }

        table
    }

    fn skip(&mut self, position: CorePosition, parsed: CoreField, raw: Option<&str>) {
        match parsed {
            CoreField::Core(_) => {}
            CoreField::Negative => debug!(%position, "negative core ID, leaving unpinned"),
            CoreField::Missing => self.warn(ConfigParseWarning::MissingCore { position }),
            CoreField::Invalid => self.warn(ConfigParseWarning::InvalidCore {
                position,
                entry: raw.unwrap_or_default().to_owned(),
            }),
        }
    }

    fn warn(&mut self, warning: ConfigParseWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Core for the controlling process.
    #[inline]
    #[must_use]
    pub fn process_core(&self) -> Option<usize> {
        self.process_core
    }

    /// Core for a domain's worker.
    #[inline]
    #[must_use]
    pub fn domain_core(&self, domain: DomainId) -> Option<usize> {
        self.domain_cores.get(domain.slot_index()).copied().flatten()
    }

    /// Fields that were skipped while resolving.
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[ConfigParseWarning] {
        &self.warnings
    }

    /// Returns true if nothing is pinned.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.process_core.is_none() && self.domain_cores.iter().all(Option::is_none)
    }
}

/// Pins the calling thread to `core`.
///
/// A refused bind is logged and reported as `false`; the thread keeps the
/// default scheduling.
pub fn bind_current_thread(core: usize) -> bool {
    let bound = core_affinity::set_for_current(core_affinity::CoreId { id: core });
    if bound {
        debug!(core, "thread pinned");
    } else {
        warn!(core, "could not pin thread to core");
    }
    bound
}
