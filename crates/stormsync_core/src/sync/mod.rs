//! # Cross-Domain Synchronization
//!
//! Two blocking primitives shared by the domain workers of a run:
//!
//! ```text
//!   PrivilegeGate:  one holder at a time, hand-off driven by the caller
//!
//!       d2 ──wait──┐                    ┌──> d2 proceeds
//!       d3 ──wait──┼── grant(d2) ─ broadcast ─┤
//!       d5 ──wait──┘                    └──> d3, d5 re-check, block again
//!
//!   StormBarrier:   N arrivals release everybody, one of them is Serial
//!
//!       storm 1 ──arrive──┐
//!       storm 2 ──arrive──┼──> all released (storm k: Serial, rest: Follower)
//!       storm 3 ──arrive──┘
//! ```
//!
//! Both are a `parking_lot` mutex plus condition variable with the predicate
//! re-checked under the lock after every wakeup, so spurious and stolen
//! wakeups are harmless. Neither has a timeout: a holder that is never granted
//! or a barrier that never fills blocks its waiters forever.

mod barrier;
mod privilege;

pub use barrier::{BarrierRole, StormBarrier};
pub use privilege::PrivilegeGate;
