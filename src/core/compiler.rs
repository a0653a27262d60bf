//! Step-to-pipeline compilation.
//!
//! Drives one topic from step-list text to a script on disk:
//!
//! ```text
//! parse -> for each step, in order:
//!            cache lookup -> (miss) request -> extract -> correct -> cache store
//!       -> assemble -> write script
//! ```
//!
//! Steps are resolved strictly in order, since each prompt describes the
//! previous step's output type.

use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{Generation, SnippetRequester};
use crate::config::paths;
use crate::domain::{
    CompileReport, OutputType, Plan, PipelineProgram, ResultOrigin, Step, StepResult, StepSummary,
};
use crate::roles::{RoleContext, RoleError, RoleLoader};

use super::assembler;
use super::cache::{CacheStore, StoreOutcome};
use super::corrector::{self, Fragment};
use super::metadata;
use super::parser::StepParser;
use super::prompt::step_prompt;

/// Compilation failures
///
/// Everything else (cache corruption, requester failures, cache write
/// failures) degrades instead of failing.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Strict cache mode: no cached result for step {step} ({})", path.display())]
    StrictCacheMiss { step: u32, path: PathBuf },

    #[error("Failed to write pipeline script {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Role(#[from] RoleError),
}

/// Settings the compiler is constructed with
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Directory receiving generated scripts
    pub work_dir: PathBuf,

    /// Treat any cache miss as fatal
    pub strict_cache: bool,

    /// Bound on parsed steps
    pub max_steps: usize,
}

/// One topic to compile
#[derive(Debug, Clone)]
pub struct TopicRequest {
    /// Cache identity of the topic
    pub topic_id: String,
    pub req_idx: u32,
    pub title: String,
    pub topic: String,
    pub skill: String,

    /// Step-list text
    pub steps_text: String,
}

/// A compiled topic
#[derive(Debug, Clone)]
pub struct CompiledTopic {
    pub program: PipelineProgram,
    pub report: CompileReport,
}

/// Cache identity of a plan topic
pub fn plan_topic_id(session: &str, req_idx: u32, topic: &str) -> String {
    format!("{}.req_{}.{}", session, req_idx, topic)
}

/// Step-to-pipeline compiler
pub struct Compiler {
    requester: Box<dyn SnippetRequester>,
    cache: CacheStore,
    parser: StepParser,
    options: CompileOptions,
    run_id: Uuid,
}

impl Compiler {
    pub fn new(
        requester: Box<dyn SnippetRequester>,
        cache: CacheStore,
        options: CompileOptions,
        run_id: Uuid,
    ) -> Self {
        Self {
            requester,
            cache,
            parser: StepParser::new(options.max_steps),
            options,
            run_id,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Compile one topic and write its script
    #[instrument(skip(self, request, role), fields(topic = %request.topic_id, req_idx = request.req_idx))]
    pub async fn compile_topic(
        &self,
        request: &TopicRequest,
        role: &RoleContext,
    ) -> Result<CompiledTopic, CompileError> {
        info!(title = %request.title, "Compiling topic");

        let steps = self.parser.parse(&request.steps_text);
        if steps.is_empty() {
            warn!("No steps recognized, emitting an empty program");
        }

        let results = self
            .resolve_steps(&request.topic_id, &steps, &request.skill, role)
            .await?;
        let program = assembler::assemble(results);

        let path = paths::script_path(&self.options.work_dir, self.run_id, request.req_idx);
        write_script(&path, program.script()).await?;
        info!(path = %path.display(), blocks = program.block_count(), "Pipeline script written");

        let report = CompileReport {
            run_id: self.run_id,
            req_idx: request.req_idx,
            title: request.title.clone(),
            topic: request.topic.clone(),
            path,
            compiled_at: Utc::now(),
            steps: program.steps().iter().map(StepSummary::from).collect(),
        };

        Ok(CompiledTopic { program, report })
    }

    /// Compile every topic of a plan, in order
    ///
    /// Each topic gets the role context for its own skill.
    pub async fn compile_plan(
        &self,
        plan: &Plan,
        session: &str,
        roles: &RoleLoader,
        role_name: &str,
    ) -> Result<Vec<CompileReport>, CompileError> {
        let mut reports = Vec::with_capacity(plan.planned_topics.len());

        for planned in &plan.planned_topics {
            let skills: Vec<String> = if planned.skill.is_empty() {
                Vec::new()
            } else {
                vec![planned.skill.clone()]
            };
            let role = roles.load(role_name, &skills)?;
            let request = TopicRequest {
                topic_id: plan_topic_id(session, planned.req_idx, &planned.topic),
                req_idx: planned.req_idx,
                title: planned.title.clone(),
                topic: planned.topic.clone(),
                skill: planned.skill.clone(),
                steps_text: planned.refined_out.clone(),
            };
            let compiled = self.compile_topic(&request, &role).await?;
            reports.push(compiled.report);
        }

        Ok(reports)
    }

    /// Resolve `steps` in order, from cache or by generation
    pub async fn resolve_steps(
        &self,
        topic_id: &str,
        steps: &[Step],
        skill: &str,
        role: &RoleContext,
    ) -> Result<Vec<StepResult>, CompileError> {
        let mut results: Vec<StepResult> = Vec::with_capacity(steps.len());

        for step in steps {
            let previous = results.last().map(|r| r.output_type);
            let result = self
                .resolve_step(topic_id, step, skill, role, previous)
                .await?;

            info!(
                step = step.index,
                total = steps.len(),
                processing = %result.processing,
                output_type = %result.output_type,
                cached = result.origin == ResultOrigin::Cached,
                "Step resolved"
            );
            debug!(step = step.index, snippet = %result.snippet, "Step snippet");

            results.push(result);
        }

        Ok(results)
    }

    async fn resolve_step(
        &self,
        topic_id: &str,
        step: &Step,
        skill: &str,
        role: &RoleContext,
        previous: Option<OutputType>,
    ) -> Result<StepResult, CompileError> {
        if let Some(cached) = self.cache.lookup(topic_id, step.index).await {
            if cached.step.description != step.description {
                debug!(
                    step = step.index,
                    cached = %cached.step.description,
                    "Cached description differs from the current plan"
                );
            }
            return Ok(cached);
        }

        if self.options.strict_cache {
            return Err(CompileError::StrictCacheMiss {
                step: step.index,
                path: self.cache.entry_path(topic_id, step.index),
            });
        }

        info!(step = step.index, description = %step.description, "Requesting snippet");
        let prompt = step_prompt(step, skill, previous);
        let generation = self.requester.generate(role, &prompt).await;
        if let Generation::Failed(reason) = &generation {
            warn!(
                step = step.index,
                backend = self.requester.name(),
                %reason,
                "Generation failed, step will be skipped"
            );
        }

        let result = build_result(step.clone(), generation.into_raw_text());

        match self.cache.store(topic_id, step.index, &result).await {
            Ok(StoreOutcome::Written) => {}
            Ok(StoreOutcome::AlreadyPresent) => {
                debug!(step = step.index, "Cache entry appeared concurrently, keeping it");
            }
            Err(e) => {
                warn!(step = step.index, error = %format!("{:#}", e), "Failed to write cache entry");
            }
        }

        Ok(result)
    }
}

/// Extract and correct raw generated text into a step result
pub fn build_result(step: Step, raw_output: String) -> StepResult {
    let extracted = metadata::extract(&raw_output);
    let fragment = corrector::correct(
        Fragment::new(extracted.snippet, extracted.processing, extracted.output_type),
        step.index,
    );

    StepResult {
        step,
        raw_output,
        snippet: fragment.snippet,
        processing: fragment.processing,
        output_type: fragment.output_type,
        origin: ResultOrigin::Generated,
    }
}

async fn write_script(path: &std::path::Path, script: &str) -> Result<(), CompileError> {
    let wrap = |source| CompileError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(wrap)?;
    }
    fs::write(path, script).await.map_err(wrap)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(wrap)?;
    }

    Ok(())
}
