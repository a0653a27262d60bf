//! pipewright - Step-to-pipeline compiler
//!
//! Turns an ordered list of natural-language task steps into one composed
//! shell pipeline. Each step is sent to a text-generation backend for a
//! single command fragment, the fragment's data-flow contract is inferred
//! and repaired, and the fragments are chained into an executable script.
//!
//! # Architecture
//!
//! The compiler is built around a per-step cache:
//! - Every resolved step is persisted once, keyed by topic and step index
//! - Recompiling a topic replays cached steps without calling the backend
//! - A failed or interrupted run resumes from the first missing step
//!
//! # Modules
//!
//! - `adapters`: Snippet generation backends (chat endpoint, external command)
//! - `core`: Compilation logic (parser, cache, corrector, assembler, compiler)
//! - `domain`: Data structures (Step, StepResult, PipelineProgram, Plan)
//! - `roles`: Role and skill context for the backend
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Compile a step list
//! printf '1. List files\n2. Sort them\n' | pipewright compile --topic demo
//!
//! # Compile every topic of a plan
//! pipewright plan --plan plan.json --session 20240101
//!
//! # Replay from cache only
//! pipewright --strict-cache compile --topic demo --input steps.txt
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod roles;

// Re-export main types at crate root for convenience
pub use adapters::{Generation, SnippetRequester};
pub use crate::core::{CompileError, Compiler, TopicRequest};
pub use domain::{OutputType, PipelineProgram, ProcessingMode, Step, StepResult};
pub use roles::{RoleContext, RoleLoader};
