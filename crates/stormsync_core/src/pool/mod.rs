//! # Domain Worker Pool
//!
//! Spawns one OS thread per domain for a simulation step and joins them all at
//! the end of the step.
//!
//! ## Lifecycle
//!
//! ```text
//!   step N:   launch(d2) ─┐
//!             launch(d5) ─┼──> [worker threads run concurrently]
//!             launch(d8) ─┘
//!             wait_all()  ───> join d2, d5, d8 (slot order), slots idle
//!   step N+1: launch(d2) ...
//! ```
//!
//! Threads are created and destroyed every step rather than parked in a
//! persistent pool. This keeps each worker's affinity fixed at spawn time
//! and keeps the lifecycle trivially correct; the cost is one spawn and one
//! join per domain per step.

mod attributes;

pub use attributes::{ThreadAttributes, DEFAULT_STACK_SIZE, MIN_STACK_SIZE};

use tracing::{debug, error, warn};

use crate::affinity::{self, AffinityTable};
use crate::domain::DomainId;
use crate::error::{InitResult, SpawnError, SpawnResult};
use crate::registry::DomainRegistry;

/// Outcome of joining every worker of a step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Domains whose worker finished normally, in slot order.
    pub joined: Vec<DomainId>,
    /// Domains whose integration callback panicked, in slot order.
    pub panicked: Vec<DomainId>,
}

impl StepReport {
    /// Returns true if no worker panicked.
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.panicked.is_empty()
    }

    /// Returns true if there was nothing to join.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.panicked.is_empty()
    }

    /// Total workers joined, panicked or not.
    #[inline]
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.joined.len() + self.panicked.len()
    }
}

/// Per-step domain workers over a fixed-capacity registry.
///
/// Must be driven from a single orchestrating thread; `&mut self` enforces it.
/// Dropping the pool joins any worker still running.
#[derive(Debug)]
pub struct WorkerPool {
    registry: DomainRegistry,
    attributes: ThreadAttributes,
}

impl WorkerPool {
    /// Sizes the registry and fixes the worker attributes.
    ///
    /// # Errors
    ///
    /// Registry capacity errors.
    pub fn initialize(max_domains: usize, attributes: ThreadAttributes) -> InitResult<Self> {
        let registry = DomainRegistry::new(max_domains)?;
        debug!(
            max_domains,
            stack_size = attributes.stack_size(),
            "worker pool initialized"
        );
        Ok(Self { registry, attributes })
    }

    /// Copies worker cores from a resolved affinity table.
    pub fn apply_affinity(&mut self, table: &AffinityTable) {
        self.registry.assign_affinity(table);
    }

    /// The underlying registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Worker attributes.
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &ThreadAttributes {
        &self.attributes
    }

    /// Spawns the worker for `domain`.
    ///
    /// The worker pins itself to the slot's core (if any), runs `integrate`
    /// with its domain ID and exits. The slot becomes active only if the
    /// spawn succeeds.
    ///
    /// # Errors
    ///
    /// - [`SpawnError::Registry`] if the domain is out of range
    /// - [`SpawnError::AlreadyActive`] if the slot has an unjoined worker
    /// - [`SpawnError::SpawnFailed`] if the OS refused the thread
    pub fn launch<F>(&mut self, domain: DomainId, integrate: F) -> SpawnResult<()>
    where
        F: FnOnce(DomainId) + Send + 'static,
    {
        let slot = self.registry.slot_mut(domain)?;
        if slot.is_active() {
            return Err(SpawnError::AlreadyActive(domain));
        }

        let core = slot.core;
        let handle = self
            .attributes
            .builder(domain)
            .spawn(move || {
                if let Some(core) = core {
                    affinity::bind_current_thread(core);
                }
                integrate(domain);
            })
            .map_err(|source| SpawnError::SpawnFailed { domain, source })?;

        slot.worker = Some(handle);
        debug!(%domain, ?core, "domain worker launched");
        Ok(())
    }

    /// Joins every active worker in slot order and marks each slot idle.
    ///
    /// With nothing active this is a no-op returning an empty report.
    pub fn wait_all(&mut self) -> StepReport {
        let mut report = StepReport::default();

        for (domain, slot) in self.registry.iter_mut() {
            let Some(handle) = slot.worker.take() else {
                continue;
            };
            match handle.join() {
                Ok(()) => {
                    debug!(%domain, "domain worker joined");
                    report.joined.push(domain);
                }
                Err(_) => {
                    error!(%domain, "domain integration panicked");
                    report.panicked.push(domain);
                }
            }
        }

        report
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let active = self.registry.active_count();
        if active > 0 {
            warn!(active, "worker pool dropped with active workers, joining");
            let _ = self.wait_all();
        }
    }
}
