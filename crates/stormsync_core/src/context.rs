//! # Integration Context
//!
//! The one object a host simulation holds for a threaded run. It owns the
//! worker pool and the resolved affinity, and shares the privilege gate and
//! storm barrier with workers through `Arc` handles.
//!
//! Built once per run by [`IntegrationContext::initialize`]; dropping it joins
//! any worker that is still running. Several contexts can coexist, which is
//! how the tests run in parallel.

use std::sync::Arc;

use tracing::info;

use crate::affinity::{self, AffinityTable};
use crate::domain::DomainId;
use crate::error::{InitResult, SpawnResult, SyncResult};
use crate::pool::{StepReport, ThreadAttributes, WorkerPool};
use crate::registry::DomainRegistry;
use crate::sync::{BarrierRole, PrivilegeGate, StormBarrier};

/// Inputs for [`IntegrationContext::initialize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrationSettings {
    /// Total domains in the simulation (`1..=40`).
    pub max_domains: usize,
    /// Rank of this process on its node, selecting the affinity entry.
    pub local_rank: usize,
    /// First moving domain of each storm; its length is the storm count.
    pub first_domain_of_storm: Vec<DomainId>,
    /// Affinity configuration string, if any.
    pub affinity: Option<String>,
    /// Attributes for every worker thread.
    pub attributes: ThreadAttributes,
    /// Domain holding privilege when the run starts.
    pub initial_holder: DomainId,
}

impl IntegrationSettings {
    /// Settings for `max_domains` domains, no storms, no affinity.
    #[must_use]
    pub fn new(max_domains: usize) -> Self {
        Self {
            max_domains,
            local_rank: 0,
            first_domain_of_storm: Vec::new(),
            affinity: None,
            attributes: ThreadAttributes::default(),
            initial_holder: DomainId::PARENT,
        }
    }

    /// Sets the first domain of every storm.
    #[must_use]
    pub fn with_storms(mut self, first_domain_of_storm: Vec<DomainId>) -> Self {
        self.first_domain_of_storm = first_domain_of_storm;
        self
    }

    /// Sets the local node rank.
    #[must_use]
    pub fn with_local_rank(mut self, local_rank: usize) -> Self {
        self.local_rank = local_rank;
        self
    }

    /// Sets the affinity configuration string.
    #[must_use]
    pub fn with_affinity(mut self, affinity: impl Into<String>) -> Self {
        self.affinity = Some(affinity.into());
        self
    }

    /// Sets the worker attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: ThreadAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the initial privilege holder.
    #[must_use]
    pub fn with_initial_holder(mut self, holder: DomainId) -> Self {
        self.initial_holder = holder;
        self
    }

    /// Number of storms.
    #[inline]
    #[must_use]
    pub fn storm_count(&self) -> usize {
        self.first_domain_of_storm.len()
    }
}

/// Process-scoped state for threaded domain integration.
#[derive(Debug)]
pub struct IntegrationContext {
    pool: WorkerPool,
    affinity: AffinityTable,
    privilege: Arc<PrivilegeGate>,
    barrier: Arc<StormBarrier>,
    first_domain_of_storm: Vec<DomainId>,
}

impl IntegrationContext {
    /// Sizes the registry, fixes worker attributes, resolves affinity, pins
    /// the calling thread to the process core (if one is set) and builds the
    /// gate and barrier.
    ///
    /// # Errors
    ///
    /// Capacity errors, or an initial holder outside `1..=max_domains`.
    pub fn initialize(settings: IntegrationSettings) -> InitResult<Self> {
        let IntegrationSettings {
            max_domains,
            local_rank,
            first_domain_of_storm,
            affinity,
            attributes,
            initial_holder,
        } = settings;

        let mut pool = WorkerPool::initialize(max_domains, attributes)?;
        let privilege = Arc::new(PrivilegeGate::new(max_domains, initial_holder)?);
        let barrier = Arc::new(StormBarrier::new(first_domain_of_storm.len()));

        let affinity = affinity.map_or_else(AffinityTable::unset, |config| {
            AffinityTable::resolve(&config, local_rank, &first_domain_of_storm)
        });
        pool.apply_affinity(&affinity);
        if let Some(core) = affinity.process_core() {
            affinity::bind_current_thread(core);
        }

        info!(
            max_domains,
            storms = first_domain_of_storm.len(),
            local_rank,
            barrier_parties = barrier.parties(),
            affinity_warnings = affinity.warnings().len(),
            "threaded integration initialized"
        );

        Ok(Self {
            pool,
            affinity,
            privilege,
            barrier,
            first_domain_of_storm,
        })
    }

    /// Spawns the worker for `domain` running `integrate`.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::launch`].
    pub fn launch_domain<F>(&mut self, domain: DomainId, integrate: F) -> SpawnResult<()>
    where
        F: FnOnce(DomainId) + Send + 'static,
    {
        self.pool.launch(domain, integrate)
    }

    /// Joins every running worker. Call once per step after all launches.
    pub fn wait_all_domains(&mut self) -> StepReport {
        self.pool.wait_all()
    }

    /// Blocks until `domain` holds privilege.
    ///
    /// # Errors
    ///
    /// See [`PrivilegeGate::await_privilege`].
    pub fn await_privilege(&self, domain: DomainId) -> SyncResult<()> {
        self.privilege.await_privilege(domain)
    }

    /// Hands privilege to `domain` and wakes all waiters.
    ///
    /// # Errors
    ///
    /// See [`PrivilegeGate::grant_privilege`].
    pub fn grant_privilege(&self, domain: DomainId) -> SyncResult<()> {
        self.privilege.grant_privilege(domain)
    }

    /// Arrives at the storm barrier.
    pub fn barrier_arrive(&self) -> BarrierRole {
        self.barrier.arrive()
    }

    /// Shared handle to the privilege gate, for worker closures.
    #[must_use]
    pub fn privilege(&self) -> Arc<PrivilegeGate> {
        Arc::clone(&self.privilege)
    }

    /// Shared handle to the storm barrier, for worker closures.
    #[must_use]
    pub fn barrier(&self) -> Arc<StormBarrier> {
        Arc::clone(&self.barrier)
    }

    /// Resolved affinity.
    #[inline]
    #[must_use]
    pub fn affinity(&self) -> &AffinityTable {
        &self.affinity
    }

    /// Domain registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &DomainRegistry {
        self.pool.registry()
    }

    /// First moving domain of each storm.
    #[inline]
    #[must_use]
    pub fn first_domain_of_storm(&self) -> &[DomainId] {
        &self.first_domain_of_storm
    }

    /// Number of storms.
    #[inline]
    #[must_use]
    pub fn storm_count(&self) -> usize {
        self.first_domain_of_storm.len()
    }
}
