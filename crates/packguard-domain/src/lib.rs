//! Domain logic: checklist construction + configuration resolution.
//!
//! This crate is designed to be I/O-free and highly testable. It computes
//! the deterministic effective check list from named checklists plus
//! caller-supplied overrides, and resolves checklist bootstrap directives
//! into init stages for the scan engine to apply.

pub mod checklist;
pub mod init;
pub mod planner;
pub mod spec;

pub use checklist::{Checklist, ChecklistBuilder, ChecklistError};
pub use init::{InitStage, InitStageBuilder};
pub use planner::{PlanError, Planner};
pub use spec::{inherit_merge, inherits, merge_config, overlay_merge, overrides};
