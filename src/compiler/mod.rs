//! Pipeline infrastructure for the generator passes.
//!
//! This module provides the glue between the application model and the
//! individual passes:
//!
//! - [`crate::model`]: the arena every pass mutates
//! - [`compiler`](self): the pass trait, the scheduler and the run events
//! - [`crate::passes`]: the passes themselves
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Generator Pipeline                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  AppContext                  Single-writer arena                 │
//! │    ├─ assemblies/types/...   (handle-addressed definitions)      │
//! │    ├─ SideTables             (per-pass products)                 │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassScheduler               Ordered, run-once execution         │
//! │    └─ from_config()          Builds the standard pipeline        │
//! │                                                                  │
//! │  GeneratorPass trait         Interface for all passes            │
//! │    └─ process()              Whole-context transformation        │
//! │                                                                  │
//! │  EventLog                    Change tracking and diagnostics     │
//! │  DerivedStats                Counts derived from the log         │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod events;
mod pass;
mod scheduler;

pub use events::{DerivedStats, Event, EventKind, EventLog};
pub use pass::GeneratorPass;
pub use scheduler::PassScheduler;
