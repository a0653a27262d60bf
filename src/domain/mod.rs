//! Domain types for the pipewright compiler.
//!
//! This module contains the core data structures:
//! - Step: A parsed step and its resolved result
//! - PipelineProgram: The assembled script
//! - Plan: Multi-topic input produced upstream
//! - CompileReport: Per-topic summary written after compilation

pub mod plan;
pub mod program;
pub mod report;
pub mod step;

// Re-export commonly used types
pub use plan::{Plan, PlannedTopic};
pub use program::PipelineProgram;
pub use report::{CompileReport, StepSummary};
pub use step::{OutputType, ProcessingMode, ResultOrigin, Step, StepResult};
