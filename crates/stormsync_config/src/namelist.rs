//! # Namelist Domain Layout
//!
//! Reads the domain layout out of a Fortran-style namelist:
//!
//! ```text
//!  &domains
//!   max_dom   = 5,
//!   parent_id = 0, 1, 2, 1, 4,
//!  /
//! ```
//!
//! Every domain whose parent is domain 1 is the outermost moving nest of one
//! storm. Here domains 2 and 4 are, so the run tracks two storms.
//!
//! Lines are matched after removing all whitespace and lowercasing, so
//! `MAX_DOM = 5` and `max_dom=5` are the same line.

use stormsync_core::DomainId;

use crate::error::{ConfigError, ConfigResult};

/// Domain layout read from a namelist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamelistSummary {
    /// Number of domains.
    pub max_dom: usize,
    /// Parent domain of each domain, in domain order (`max_dom` entries).
    pub parent_ids: Vec<u32>,
}

impl NamelistSummary {
    /// Parses `max_dom` and the last `parent_id` line.
    ///
    /// Only the first `max_dom` parent IDs are inspected; extra entries are
    /// ignored.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MaxDomNotNumeric`] if `max_dom` has no leading integer
    /// - [`ConfigError::MissingDomainLayout`] without a positive `max_dom` and a
    ///   `parent_id` line
    /// - [`ConfigError::ParentIdNotNumeric`] for a non-integer parent ID
    /// - [`ConfigError::ParentIdTooShort`] with fewer than `max_dom` parent IDs
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut max_dom: Option<i64> = None;
        let mut parent_line: Option<String> = None;

        for raw in text.lines() {
            let line: String = raw
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            if line.is_empty() {
                continue;
            }

            if let Some(value) = line.strip_prefix("max_dom=") {
                let parsed = leading_integer(value)
                    .ok_or_else(|| ConfigError::MaxDomNotNumeric(value.to_owned()))?;
                max_dom = Some(parsed);
            }
            if let Some(value) = line.strip_prefix("parent_id=") {
                parent_line = Some(value.to_owned());
            }
        }

        let (Some(max_dom), Some(parent_line)) = (max_dom, parent_line) else {
            return Err(ConfigError::MissingDomainLayout);
        };
        let max_dom = usize::try_from(max_dom)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(ConfigError::MissingDomainLayout)?;

        let parent_ids = parent_line
            .split(',')
            .filter(|entry| !entry.is_empty())
            .take(max_dom)
            .map(|entry| {
                if entry.bytes().all(|b| b.is_ascii_digit()) {
                    entry.parse::<u32>().ok()
                } else {
                    None
                }
                .ok_or_else(|| ConfigError::ParentIdNotNumeric(entry.to_owned()))
            })
            .collect::<ConfigResult<Vec<u32>>>()?;

        if parent_ids.len() < max_dom {
            return Err(ConfigError::ParentIdTooShort {
                found: parent_ids.len(),
                expected: max_dom,
            });
        }

        Ok(Self { max_dom, parent_ids })
    }

    /// First moving domain of each storm: every domain other than domain 1
    /// whose parent is domain 1, in domain order.
    ///
    /// Domain 1's own `parent_id` entry is never counted, even when a
    /// namelist writes it as `1`. Older tooling counted every `1` in the
    /// list, which overstates the storm count by one for such namelists.
    #[must_use]
    pub fn first_domains(&self) -> Vec<DomainId> {
        self.parent_ids
            .iter()
            .zip(1u32..)
            .skip(1)
            .filter(|(&parent, _)| parent == 1)
            .filter_map(|(_, domain)| DomainId::new(domain))
            .collect()
    }

    /// Number of storms.
    #[must_use]
    pub fn storm_count(&self) -> usize {
        self.first_domains().len()
    }
}

/// Leading optionally-signed integer of `s`, ignoring anything after it.
fn leading_integer(s: &str) -> Option<i64> {
    let digits_start = usize::from(s.starts_with(['-', '+']));
    let digits_len = s[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    s[..digits_start + digits_len].parse().ok()
}
