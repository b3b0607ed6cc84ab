//! Common test fixtures for packguard.
//!
//! Provides an in-memory archive builder, an opener over canned archives,
//! and recording/failing checks for exercising the engine's isolation and
//! ordering guarantees in tests across the workspace.

pub mod archives;
pub mod checks;

pub use archives::{simple_package, ArchiveBuilder, FixtureOpener};
pub use checks::{shared_log, EventKind, FailingCheck, RecordingCheck, SharedLog};
