//! # Storm Barrier
//!
//! Reusable rendezvous for the storm workers of a run.
//!
//! Each round ("generation") completes when `parties` threads have arrived.
//! The thread that completes the round is [`BarrierRole::Serial`] and may do
//! one-off work for the round; everybody else is [`BarrierRole::Follower`].
//! The generation counter makes early arrivals for the next round wait for
//! the next round, so the barrier can be reused every step.

use parking_lot::{Condvar, Mutex};
use tracing::trace;

/// What a thread was told when the barrier released it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BarrierRole {
    /// Exactly one thread per round.
    Serial,
    /// Every other thread of the round.
    Follower,
}

impl BarrierRole {
    /// Returns true for the serial thread.
    #[inline]
    #[must_use]
    pub fn is_serial(self) -> bool {
        matches!(self, Self::Serial)
    }
}

#[derive(Debug)]
struct RoundState {
    /// Threads waiting in the current round.
    arrived: usize,
    /// Completed rounds.
    generation: u64,
}

/// Reusable barrier sized to the storm count.
#[derive(Debug)]
pub struct StormBarrier {
    state: Mutex<RoundState>,
    released: Condvar,
    parties: usize,
}

impl StormBarrier {
    /// Creates a barrier for `storm_count` threads.
    ///
    /// A count of zero is treated as one, which makes [`StormBarrier::arrive`]
    /// return at once.
    #[must_use]
    pub fn new(storm_count: usize) -> Self {
        Self {
            state: Mutex::new(RoundState {
                arrived: 0,
                generation: 0,
            }),
            released: Condvar::new(),
            parties: storm_count.max(1),
        }
    }

    /// Arrivals needed to complete a round.
    #[inline]
    #[must_use]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Rounds completed so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Blocks until `parties` threads have arrived in this round.
    pub fn arrive(&self) -> BarrierRole {
        let mut state = self.state.lock();
        let round = state.generation;
        if let Some(role) = self.count_arrival(&mut state) {
            return role;
        }

        while state.generation == round {
            self.released.wait(&mut state);
        }
        BarrierRole::Follower
    }

    /// Counts an arrival for this round without waiting for it to complete.
    ///
    /// Stands in for a party that will never arrive, so the ones that did
    /// are not left blocked.
    pub fn arrive_and_leave(&self) -> BarrierRole {
        let mut state = self.state.lock();
        self.count_arrival(&mut state)
            .unwrap_or(BarrierRole::Follower)
    }

    /// Records one arrival; completes the round if it was the last.
    fn count_arrival(&self, state: &mut RoundState) -> Option<BarrierRole> {
        state.arrived += 1;
        if state.arrived < self.parties {
            return None;
        }

        let round = state.generation;
        state.arrived = 0;
        state.generation = state.generation.wrapping_add(1);
        let woken = self.released.notify_all();
        trace!(round, woken, "storm barrier released");
        Some(BarrierRole::Serial)
    }
}
