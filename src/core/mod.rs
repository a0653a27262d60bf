//! Core compilation logic.
//!
//! This module contains:
//! - Parser: Step-list recognition
//! - Cache: Per-step result persistence
//! - Metadata / Corrector: Fragment extraction and repair
//! - Assembler: Script generation
//! - Compiler: Main compilation engine

pub mod assembler;
pub mod cache;
pub mod compiler;
pub mod corrector;
pub mod metadata;
pub mod parser;
pub mod prompt;
pub mod shell;

// Re-export commonly used types
pub use assembler::{assemble, render_script};
pub use cache::{cache_key, CacheRecord, CacheStore, StoreOutcome};
pub use compiler::{
    build_result, plan_topic_id, CompileError, CompileOptions, CompiledTopic, Compiler,
    TopicRequest,
};
pub use corrector::{correct, Fragment, STREAM_TOOLS};
pub use metadata::{extract, Extracted};
pub use parser::{parse_steps, StepParser, MAX_STEPS};
pub use prompt::step_prompt;
