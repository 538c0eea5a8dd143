//! # Storm Stepper
//!
//! One simulation step across every storm:
//! ```text
//! Step N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. LAUNCH                                                           │
//! │    └─ One worker per storm, on the storm's first domain             │
//! │                                                                     │
//! │ 2. INTEGRATE (workers, concurrently)                                │
//! │    └─ Caller-supplied integrator                                    │
//! │                                                                     │
//! │ 3. RENDEZVOUS                                                       │
//! │    └─ Every storm arrives at the barrier                            │
//! │                                                                     │
//! │ 4. PRIVILEGED SECTION (workers, one at a time)                      │
//! │    ├─ Controller grants storm 1                                     │
//! │    ├─ Storm i hands privilege to storm i+1                          │
//! │    └─ Last storm hands it back to domain 1                          │
//! │                                                                     │
//! │ 5. JOIN                                                             │
//! │    └─ wait_all, then report panics                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A panicking integrator still walks its worker through the barrier and the
//! hand-off before the panic resumes, so sibling storms never deadlock on it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use stormsync_core::{
    BarrierRole, DomainId, IntegrationContext, PrivilegeGate, SpawnError, StepReport,
    StormBarrier, SyncError,
};
use thiserror::Error;
use tracing::{debug, error};

/// Integration callback: `(domain, step)`.
pub type Integrator = Arc<dyn Fn(DomainId, usize) + Send + Sync>;

/// Errors that end a step.
#[derive(Error, Debug)]
pub enum StepError {
    /// A storm worker could not be started.
    #[error("failed to launch storm worker: {0}")]
    Spawn(#[from] SpawnError),

    /// The controller misused the privilege gate.
    #[error("privilege hand-off failed: {0}")]
    Sync(#[from] SyncError),

    /// One or more integrators panicked.
    #[error("step {step}: integrator panicked on domains {domains:?}")]
    WorkerPanicked {
        /// Step number.
        step: usize,
        /// Domains whose integrator panicked.
        domains: Vec<DomainId>,
    },
}

/// Result type for stepping.
pub type StepResult<T> = Result<T, StepError>;

/// What happened during one step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Step number.
    pub step: usize,
    /// Domains in the order they held privilege.
    pub privilege_order: Vec<DomainId>,
    /// Domain that received the serial barrier role.
    pub serial_domain: Option<DomainId>,
    /// Join result.
    pub report: StepReport,
    /// Wall time of the step.
    pub elapsed: Duration,
}

/// Per-step state shared with the workers.
#[derive(Default)]
struct StepLog {
    privilege_order: Vec<DomainId>,
    serial_domain: Option<DomainId>,
}

/// Runs steps on an [`IntegrationContext`].
pub struct StormStepper {
    ctx: IntegrationContext,
    integrator: Integrator,
    steps_run: usize,
}

impl StormStepper {
    /// Wraps a context and the integrator every storm worker runs.
    #[must_use]
    pub fn new(ctx: IntegrationContext, integrator: Integrator) -> Self {
        Self {
            ctx,
            integrator,
            steps_run: 0,
        }
    }

    /// The wrapped context.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &IntegrationContext {
        &self.ctx
    }

    /// Steps completed so far.
    #[inline]
    #[must_use]
    pub fn steps_run(&self) -> usize {
        self.steps_run
    }

    /// Runs one step.
    ///
    /// With no storms nothing is launched and the report is empty.
    ///
    /// # Errors
    ///
    /// - [`StepError::Spawn`] if a worker cannot be started; workers already
    ///   launched are joined first
    /// - [`StepError::WorkerPanicked`] if an integrator panicked
    /// - [`StepError::Sync`] never in practice: every domain the controller
    ///   names was validated at initialization
    pub fn step(&mut self) -> StepResult<StepStats> {
        let step = self.steps_run;
        let start = Instant::now();
        let storms = self.ctx.first_domain_of_storm().to_vec();
        let log = Arc::new(Mutex::new(StepLog::default()));

        // The controller holds privilege while workers start.
        self.ctx.grant_privilege(DomainId::PARENT)?;

        for (index, &domain) in storms.iter().enumerate() {
            let next = storms.get(index + 1).copied().unwrap_or(DomainId::PARENT);
            let worker = StormWorker {
                gate: self.ctx.privilege(),
                barrier: self.ctx.barrier(),
                integrator: Arc::clone(&self.integrator),
                log: Arc::clone(&log),
                next,
                step,
            };
            if let Err(err) = self.ctx.launch_domain(domain, move |d| worker.run(d)) {
                // Unblock whoever already launched, then join them.
                self.abandon_step(&storms[..index]);
                return Err(err.into());
            }
        }

        if let Some(&first) = storms.first() {
            self.ctx.grant_privilege(first)?;
            self.ctx.await_privilege(DomainId::PARENT)?;
        }
        let report = self.ctx.wait_all_domains();
        self.steps_run += 1;

        if !report.is_clean() {
            return Err(StepError::WorkerPanicked {
                step,
                domains: report.panicked,
            });
        }

        let log = std::mem::take(&mut *log.lock());
        let stats = StepStats {
            step,
            privilege_order: log.privilege_order,
            serial_domain: log.serial_domain,
            report,
            elapsed: start.elapsed(),
        };
        debug!(step, elapsed_us = stats.elapsed.as_micros(), "step complete");
        Ok(stats)
    }

    /// Runs `steps` steps, stopping at the first error.
    ///
    /// # Errors
    ///
    /// The first [`Self::step`] error.
    pub fn run(&mut self, steps: usize) -> StepResult<Vec<StepStats>> {
        (0..steps).map(|_| self.step()).collect()
    }

    /// Consumes the stepper, returning the context.
    #[must_use]
    pub fn into_context(self) -> IntegrationContext {
        self.ctx
    }

    /// Releases workers parked in a step that cannot complete. They wait at
    /// a barrier the missing storms will never reach, so the controller
    /// arrives in their place without waiting, then starts the hand-off
    /// chain and joins.
    fn abandon_step(&mut self, launched: &[DomainId]) {
        let Some(&first) = launched.first() else {
            return;
        };
        let barrier = self.ctx.barrier();
        for _ in launched.len()..barrier.parties() {
            barrier.arrive_and_leave();
        }
        if let Err(err) = self.ctx.grant_privilege(first) {
            error!(error = %err, "cannot release launched storm workers");
        }
        let report = self.ctx.wait_all_domains();
        debug!(joined = report.worker_count(), "abandoned step joined");
    }
}

/// Everything one storm worker needs for a step.
struct StormWorker {
    gate: Arc<PrivilegeGate>,
    barrier: Arc<StormBarrier>,
    integrator: Integrator,
    log: Arc<Mutex<StepLog>>,
    next: DomainId,
    step: usize,
}

impl StormWorker {
    fn run(self, domain: DomainId) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.integrator)(domain, self.step)));

        if self.barrier.arrive() == BarrierRole::Serial {
            self.log.lock().serial_domain = Some(domain);
        }

        let handed_off = self
            .gate
            .await_privilege(domain)
            .map(|()| self.log.lock().privilege_order.push(domain))
            .and_then(|()| self.gate.grant_privilege(self.next));
        if let Err(err) = handed_off {
            error!(%domain, error = %err, "storm worker privilege hand-off failed");
        }

        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use stormsync_core::{IntegrationSettings, ThreadAttributes};

    use super::*;

    fn d(raw: u32) -> DomainId {
        DomainId::new(raw).unwrap()
    }

    fn stepper(max_domains: usize, storms: &[u32], integrator: Integrator) -> StormStepper {
        let settings = IntegrationSettings::new(max_domains)
            .with_storms(storms.iter().map(|&s| d(s)).collect())
            .with_attributes(ThreadAttributes::with_stack_size(1024 * 1024).unwrap());
        StormStepper::new(IntegrationContext::initialize(settings).unwrap(), integrator)
    }

    #[test]
    fn test_privilege_follows_storm_order() {
        let mut stepper = stepper(6, &[2, 4, 6], Arc::new(|_: DomainId, _: usize| {}));
        let stats = stepper.run(5).unwrap();

        assert_eq!(stats.len(), 5);
        for (step, s) in stats.iter().enumerate() {
            assert_eq!(s.step, step);
            assert_eq!(s.privilege_order, vec![d(2), d(4), d(6)]);
            assert!(s.serial_domain.is_some());
            assert_eq!(s.report.joined, vec![d(2), d(4), d(6)]);
        }
        assert_eq!(stepper.steps_run(), 5);
        assert_eq!(stepper.context().privilege().current_holder(), DomainId::PARENT);
    }

    #[test]
    fn test_integrator_sees_every_storm_every_step() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut stepper = stepper(
            4,
            &[2, 3],
            Arc::new(move |_: DomainId, _: usize| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        stepper.run(3).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_no_storms_is_empty_step() {
        let mut stepper = stepper(1, &[], Arc::new(|_: DomainId, _: usize| {}));
        let stats = stepper.step().unwrap();
        assert!(stats.report.is_empty());
        assert!(stats.privilege_order.is_empty());
    }

    #[test]
    fn test_panicking_integrator_does_not_deadlock() {
        let mut stepper = stepper(
            5,
            &[2, 3, 5],
            Arc::new(|domain: DomainId, _: usize| {
                assert_ne!(domain.get(), 3, "storm on domain 3 blew up");
            }),
        );

        match stepper.step() {
            Err(StepError::WorkerPanicked { step, domains }) => {
                assert_eq!(step, 0);
                assert_eq!(domains, vec![d(3)]);
            }
            other => panic!("expected a worker panic, got {other:?}"),
        }
        assert_eq!(stepper.context().registry().active_count(), 0);

        // The context is reusable afterwards.
        let mut ctx = stepper.into_context();
        ctx.launch_domain(d(2), |_| {}).unwrap();
        assert!(ctx.wait_all_domains().is_clean());
    }

    #[test]
    fn test_failed_launch_releases_launched_storms() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        // Domain 5 is outside a 3-domain run: storm 2 cannot launch.
        let mut stepper = stepper(
            3,
            &[2, 5],
            Arc::new(move |_: DomainId, _: usize| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(matches!(
            stepper.step(),
            Err(StepError::Spawn(SpawnError::Registry(_)))
        ));
        assert_eq!(stepper.context().registry().active_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stepper.steps_run(), 0);

        // The barrier round was completed, not left half full.
        assert_eq!(stepper.context().barrier().generation(), 1);
    }
}

