//! # Domain Registry
//!
//! Fixed-capacity table of per-domain worker state.
//!
//! The registry is sized once (at most [`MAX_DOMAINS`] slots) and is only
//! mutated from the orchestrating thread: `&mut self` on every writer is the
//! single-writer guarantee. Workers never touch it; they receive their core ID
//! by value when they are spawned.

use std::thread::JoinHandle;

use crate::affinity::AffinityTable;
use crate::domain::{DomainId, MAX_DOMAINS};
use crate::error::{RegistryError, RegistryResult};

/// State of one domain slot.
#[derive(Debug, Default)]
pub struct DomainSlot {
    /// Handle of the unjoined worker, if any.
    pub(crate) worker: Option<JoinHandle<()>>,
    /// Core the worker binds itself to.
    pub(crate) core: Option<usize>,
}

impl DomainSlot {
    /// Returns true while a spawned worker has not been joined.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    /// Returns the core this domain's worker is pinned to.
    #[inline]
    #[must_use]
    pub fn assigned_core(&self) -> Option<usize> {
        self.core
    }
}

/// Bounded arena of domain slots, indexed by validated [`DomainId`].
#[derive(Debug)]
pub struct DomainRegistry {
    slots: Box<[DomainSlot]>,
}

impl DomainRegistry {
    /// Creates a registry with every slot inactive and unpinned.
    ///
    /// # Errors
    ///
    /// [`RegistryError::CapacityExceeded`] above [`MAX_DOMAINS`],
    /// [`RegistryError::NoDomains`] for zero.
    pub fn new(max_domains: usize) -> RegistryResult<Self> {
        check_capacity(max_domains)?;
        Ok(Self {
            slots: (0..max_domains).map(|_| DomainSlot::default()).collect(),
        })
    }

    /// Resizes the registry and clears every slot.
    ///
    /// On error nothing is changed.
    ///
    /// # Errors
    ///
    /// Capacity errors as for [`DomainRegistry::new`], or
    /// [`RegistryError::WorkersStillActive`] if any worker is unjoined.
    pub fn reset(&mut self, max_domains: usize) -> RegistryResult<()> {
        check_capacity(max_domains)?;
        let active = self.active_count();
        if active > 0 {
            return Err(RegistryError::WorkersStillActive { active });
        }
        *self = Self::new(max_domains)?;
        Ok(())
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn max_domains(&self) -> usize {
        self.slots.len()
    }

    /// Looks up a slot.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidDomain`] if `domain > max_domains`.
    pub fn slot(&self, domain: DomainId) -> RegistryResult<&DomainSlot> {
        let max_domains = self.slots.len();
        self.slots
            .get(domain.slot_index())
            .ok_or(RegistryError::InvalidDomain { domain, max_domains })
    }

    pub(crate) fn slot_mut(&mut self, domain: DomainId) -> RegistryResult<&mut DomainSlot> {
        let max_domains = self.slots.len();
        self.slots
            .get_mut(domain.slot_index())
            .ok_or(RegistryError::InvalidDomain { domain, max_domains })
    }

    /// Number of unjoined workers.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_active()).count()
    }

    /// Domains with an unjoined worker, in slot order.
    pub fn active_domains(&self) -> impl Iterator<Item = DomainId> + '_ {
        self.iter()
            .filter(|(_, slot)| slot.is_active())
            .map(|(domain, _)| domain)
    }

    /// Iterates over all slots with their domain IDs.
    pub fn iter(&self) -> impl Iterator<Item = (DomainId, &DomainSlot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| (DomainId::from_slot_index(index), slot))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (DomainId, &mut DomainSlot)> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(index, slot)| (DomainId::from_slot_index(index), slot))
    }

    /// Copies core assignments from a resolved affinity table.
    ///
    /// Slots beyond this registry's size are ignored.
    pub fn assign_affinity(&mut self, table: &AffinityTable) {
        for (domain, slot) in self.iter_mut() {
            slot.core = table.domain_core(domain);
        }
    }
}

fn check_capacity(max_domains: usize) -> RegistryResult<()> {
    if max_domains > MAX_DOMAINS {
        return Err(RegistryError::CapacityExceeded {
            requested: max_domains,
            max: MAX_DOMAINS,
        });
    }
    if max_domains == 0 {
        return Err(RegistryError::NoDomains);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(raw: u32) -> DomainId {
        DomainId::new(raw).unwrap()
    }

    #[test]
    fn test_every_size_up_to_capacity_starts_idle() {
        for max in 1..=MAX_DOMAINS {
            let registry = DomainRegistry::new(max).unwrap();
            assert_eq!(registry.max_domains(), max);
            assert_eq!(registry.active_count(), 0);
            for (_, slot) in registry.iter() {
                assert!(!slot.is_active());
                assert_eq!(slot.assigned_core(), None);
            }
        }
    }

    #[test]
    fn test_capacity_exceeded() {
        assert_eq!(
            DomainRegistry::new(MAX_DOMAINS + 1).unwrap_err(),
            RegistryError::CapacityExceeded { requested: 41, max: 40 }
        );
        assert_eq!(DomainRegistry::new(0).unwrap_err(), RegistryError::NoDomains);
    }

    #[test]
    fn test_failed_reset_leaves_registry_untouched() {
        let mut registry = DomainRegistry::new(5).unwrap();
        registry.slots[2].core = Some(3);

        assert!(registry.reset(41).is_err());
        assert_eq!(registry.max_domains(), 5);
        assert_eq!(registry.slot(d(3)).unwrap().assigned_core(), Some(3));

        registry.reset(8).unwrap();
        assert_eq!(registry.max_domains(), 8);
        assert_eq!(registry.slot(d(3)).unwrap().assigned_core(), None);
    }

    #[test]
    fn test_reset_refused_with_active_worker() {
        let mut registry = DomainRegistry::new(3).unwrap();
        registry.slot_mut(d(2)).unwrap().worker = Some(std::thread::spawn(|| {}));

        assert_eq!(
            registry.reset(3).unwrap_err(),
            RegistryError::WorkersStillActive { active: 1 }
        );

        let handle = registry.slot_mut(d(2)).unwrap().worker.take().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_out_of_range_domain_rejected() {
        let registry = DomainRegistry::new(4).unwrap();
        assert!(registry.slot(d(4)).is_ok());
        assert_eq!(
            registry.slot(d(5)).unwrap_err(),
            RegistryError::InvalidDomain { domain: d(5), max_domains: 4 }
        );
    }

    #[test]
    fn test_assign_affinity_copies_cores() {
        let table = AffinityTable::resolve("7,1,2", 0, &[d(2), d(3)]);
        let mut registry = DomainRegistry::new(3).unwrap();
        registry.assign_affinity(&table);

        assert_eq!(registry.slot(d(1)).unwrap().assigned_core(), None);
        assert_eq!(registry.slot(d(2)).unwrap().assigned_core(), Some(1));
        assert_eq!(registry.slot(d(3)).unwrap().assigned_core(), Some(2));
    }
}
