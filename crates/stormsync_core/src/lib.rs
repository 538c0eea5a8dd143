//! # STORMSYNC Core
//!
//! Thread lifecycle and synchronization for threaded multi-storm integration.
//!
//! Each storm is tracked by a chain of nested moving domains. Every simulation
//! step the host spawns one OS thread per domain it wants integrated in
//! parallel, lets those threads take turns on shared state through a privilege
//! gate, rendezvous them at a storm barrier, and finally joins all of them.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │      IntegrationContext      │
//!                 │                              │
//!                 │  ┌────────────┐ ┌─────────┐  │
//!                 │  │ WorkerPool │ │Affinity │  │
//!                 │  │ (registry) │ │  Table  │  │
//!                 │  └─────┬──────┘ └─────────┘  │
//!                 └────────┼─────────────────────┘
//!                          │ spawn / join (per step)
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!    ┌───────────┐   ┌───────────┐   ┌───────────┐
//!    │ domain-02 │   │ domain-05 │   │ domain-08 │
//!    └─────┬─────┘   └─────┬─────┘   └─────┬─────┘
//!          └──────┬────────┴────────┬──────┘
//!                 ▼                 ▼
//!         ┌──────────────┐  ┌──────────────┐
//!         │PrivilegeGate │  │ StormBarrier │
//!         └──────────────┘  └──────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. **No globals** - every piece of state hangs off one [`IntegrationContext`]
//! 2. **No busy polling** - waits are condition variables with predicate loops
//! 3. **No silent failures** - spawn and gate misuse come back as errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use stormsync_core::{DomainId, IntegrationContext, IntegrationSettings};
//!
//! let storms = vec![DomainId::new(2).unwrap(), DomainId::new(5).unwrap()];
//! let mut ctx = IntegrationContext::initialize(
//!     IntegrationSettings::new(7).with_storms(storms.clone()),
//! )?;
//!
//! for &domain in &storms {
//!     ctx.launch_domain(domain, |d| integrate(d))?;
//! }
//! let report = ctx.wait_all_domains();
//! assert!(report.is_clean());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod affinity;
pub mod context;
pub mod domain;
pub mod error;
pub mod pool;
pub mod registry;
pub mod sync;

pub use affinity::{AffinityTable, ConfigParseWarning, CorePosition};
pub use context::{IntegrationContext, IntegrationSettings};
pub use domain::{DomainId, MAX_DOMAINS};
pub use error::{
    InitError, InitResult, RegistryError, RegistryResult, SpawnError, SpawnResult, SyncError,
    SyncResult,
};
pub use pool::{StepReport, ThreadAttributes, WorkerPool, DEFAULT_STACK_SIZE, MIN_STACK_SIZE};
pub use registry::{DomainRegistry, DomainSlot};
pub use sync::{BarrierRole, PrivilegeGate, StormBarrier};
