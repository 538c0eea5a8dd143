//! # Domain Privilege Gate
//!
//! Lets domain workers take turns on shared simulation state. The gate owns
//! the current holder; [`PrivilegeGate::grant_privilege`] changes it and wakes
//! everybody, and each waiter re-checks whether it is now the holder.
//!
//! All domains share one lock and one condition variable. A hand-off wakes
//! every waiter regardless, so per-domain gates would add lock traffic
//! without waking fewer threads.

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::domain::{DomainId, MAX_DOMAINS};
use crate::error::{RegistryError, RegistryResult, SyncError, SyncResult};

/// Mutex + condition variable gate granting one domain privilege at a time.
///
/// No ordering policy: after a broadcast every woken waiter races for the
/// lock and checks its own domain against the holder.
#[derive(Debug)]
pub struct PrivilegeGate {
    /// Domain that currently holds privilege.
    holder: Mutex<DomainId>,
    /// Broadcast on every hand-off.
    turn_changed: Condvar,
    /// Domains `1..=num_domains` may use the gate.
    num_domains: usize,
}

impl PrivilegeGate {
    /// Creates a gate for `num_domains` domains with `initial_holder` holding
    /// privilege.
    ///
    /// # Errors
    ///
    /// Capacity errors as for the domain registry, or
    /// [`RegistryError::InvalidDomain`] if `initial_holder` is out of range.
    pub fn new(num_domains: usize, initial_holder: DomainId) -> RegistryResult<Self> {
        if num_domains > MAX_DOMAINS {
            return Err(RegistryError::CapacityExceeded {
                requested: num_domains,
                max: MAX_DOMAINS,
            });
        }
        if num_domains == 0 {
            return Err(RegistryError::NoDomains);
        }
        if initial_holder.slot_index() >= num_domains {
            return Err(RegistryError::InvalidDomain {
                domain: initial_holder,
                max_domains: num_domains,
            });
        }
        Ok(Self {
            holder: Mutex::new(initial_holder),
            turn_changed: Condvar::new(),
            num_domains,
        })
    }

    /// Number of domains covered.
    #[inline]
    #[must_use]
    pub fn num_domains(&self) -> usize {
        self.num_domains
    }

    /// Domain that currently holds privilege.
    #[must_use]
    pub fn current_holder(&self) -> DomainId {
        *self.holder.lock()
    }

    fn check(&self, domain: DomainId) -> SyncResult<()> {
        if domain.slot_index() < self.num_domains {
            Ok(())
        } else {
            Err(SyncError::UnknownDomain {
                domain,
                num_domains: self.num_domains,
            })
        }
    }

    /// Blocks until `domain` holds privilege.
    ///
    /// Returns immediately if it already does.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownDomain`] if the domain is not covered.
    pub fn await_privilege(&self, domain: DomainId) -> SyncResult<()> {
        self.check(domain)?;
        let mut holder = self.holder.lock();
        while *holder != domain {
            self.turn_changed.wait(&mut holder);
        }
        Ok(())
    }

    /// Blocks until `current_holder()` reports `domain`.
    ///
    /// For callers that keep the holder in their own shared state. The closure
    /// runs under the gate's lock before the first wait and after every
    /// wakeup. Whoever changes that state must call
    /// [`PrivilegeGate::wake_all`] afterwards, or waiters will not notice.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownDomain`] if the domain is not covered.
    pub fn await_privilege_with<F>(&self, domain: DomainId, mut current_holder: F) -> SyncResult<()>
    where
        F: FnMut() -> DomainId,
    {
        self.check(domain)?;
        let mut guard = self.holder.lock();
        while current_holder() != domain {
            self.turn_changed.wait(&mut guard);
        }
        Ok(())
    }

    /// Hands privilege to `domain` and wakes every waiter.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownDomain`] if the domain is not covered; the holder
    /// is left unchanged.
    pub fn grant_privilege(&self, domain: DomainId) -> SyncResult<()> {
        self.check(domain)?;
        let mut holder = self.holder.lock();
        *holder = domain;
        let woken = self.turn_changed.notify_all();
        trace!(%domain, woken, "privilege granted");
        Ok(())
    }

    /// Wakes every waiter without changing the holder.
    ///
    /// Pairs with [`PrivilegeGate::await_privilege_with`].
    pub fn wake_all(&self) {
        let _holder = self.holder.lock();
        let woken = self.turn_changed.notify_all();
        trace!(woken, "privilege re-check forced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn d(raw: u32) -> DomainId {
        DomainId::new(raw).unwrap()
    }

    #[test]
    fn test_holder_proceeds_immediately() {
        let gate = PrivilegeGate::new(3, d(1)).unwrap();
        gate.await_privilege(d(1)).unwrap();
        assert_eq!(gate.current_holder(), d(1));
    }

    #[test]
    fn test_construction_limits() {
        assert!(PrivilegeGate::new(41, d(1)).is_err());
        assert!(PrivilegeGate::new(0, d(1)).is_err());
        assert!(PrivilegeGate::new(2, d(3)).is_err());
        assert!(PrivilegeGate::new(40, d(40)).is_ok());
    }

    #[test]
    fn test_unknown_domain() {
        let gate = PrivilegeGate::new(2, d(1)).unwrap();
        let err = SyncError::UnknownDomain { domain: d(3), num_domains: 2 };
        assert_eq!(gate.await_privilege(d(3)).unwrap_err(), err);
        assert_eq!(gate.grant_privilege(d(3)).unwrap_err(), err);
        assert_eq!(gate.current_holder(), d(1));
    }

    #[test]
    fn test_grant_releases_waiter() {
        let gate = Arc::new(PrivilegeGate::new(4, d(1)).unwrap());
        let (tx, rx) = crossbeam_channel::unbounded();

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.await_privilege(d(4)).unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        gate.grant_privilege(d(4)).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_external_holder_needs_wake() {
        let gate = Arc::new(PrivilegeGate::new(3, d(1)).unwrap());
        let external = Arc::new(AtomicU32::new(1));
        let (tx, rx) = crossbeam_channel::unbounded();

        let waiter = {
            let gate = Arc::clone(&gate);
            let external = Arc::clone(&external);
            thread::spawn(move || {
                gate.await_privilege_with(d(3), || d(external.load(Ordering::SeqCst)))
                    .unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        external.store(3, Ordering::SeqCst);
        gate.wake_all();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();

        // The gate's own holder is untouched by the external form.
        assert_eq!(gate.current_holder(), d(1));
    }
}
