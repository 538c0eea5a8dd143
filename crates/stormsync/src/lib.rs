//! # STORMSYNC
//!
//! Threaded multi-storm domain integration, assembled.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           STORMSYNC                            │
//! ├────────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  ┌──────────────────┐          ┌────────────────────────────┐  │
//! │  │ stormsync_config │          │       stormsync_core       │  │
//! │  │                  │ settings │                            │  │
//! │  │ • ThreadingMode  │─────────>│ • IntegrationContext       │  │
//! │  │ • Namelist       │          │ • WorkerPool + Registry    │  │
//! │  │ • RunConfig      │          │ • AffinityTable            │  │
//! │  └──────────────────┘          │ • PrivilegeGate, Barrier   │  │
//! │                                └─────────────┬──────────────┘  │
//! │                                              │                 │
//! │                                ┌─────────────▼──────────────┐  │
//! │                                │        StormStepper        │  │
//! │                                │ launch ─ barrier ─ handoff │  │
//! │                                └────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `stepper`: one full threaded step per call

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod stepper;

pub use stormsync_config as config;
pub use stormsync_core as core;

pub use stepper::{Integrator, StepError, StepResult, StepStats, StormStepper};
