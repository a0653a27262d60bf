//! Command-line interface for pipewright.
//!
//! Provides commands for compiling step lists and plans into pipeline
//! scripts, inspecting parsed steps, showing configuration and managing the
//! step cache.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::{build_base_url, ChatRequester, CommandRequester, SnippetRequester};
use crate::config::{self, Backend, GeneratorSettings, ResolvedConfig};
use crate::core::{CacheStore, Compiler, StepParser, TopicRequest};
use crate::domain::Plan;

pub mod cache;

/// pipewright - Compile natural-language step lists into shell pipelines
#[derive(Parser, Debug)]
#[command(name = "pipewright")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides applied on top of the resolved configuration
#[derive(clap::Args, Debug, Default)]
pub struct GlobalArgs {
    /// Config file (skips .pipewright/config.yaml discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory receiving generated scripts
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Fail on any cache miss instead of generating
    #[arg(long, global = true)]
    pub strict_cache: bool,

    /// Snippet generator backend
    #[arg(long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Chat endpoint host, optionally with scheme and port
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Chat model name
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Generator command line for the command backend
    #[arg(long = "command", global = true)]
    pub generator_command: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile one step list into a pipeline script
    Compile {
        /// Topic identifier (cache key namespace)
        #[arg(short, long)]
        topic: String,

        /// Step list file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Skill id to include in the role context
        #[arg(short, long, default_value = "")]
        skill: String,

        /// Run ID (UUID) used in the script file name
        #[arg(long)]
        run_id: Option<String>,

        /// Request index used in the script file name
        #[arg(long, default_value = "1")]
        req_idx: u32,

        /// Human-readable title for the report
        #[arg(long)]
        title: Option<String>,

        /// Write a JSON compile report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Compile every topic of a plan file
    Plan {
        /// Plan JSON with planned_topics
        #[arg(short, long)]
        plan: PathBuf,

        /// Session identifier (cache key namespace)
        #[arg(short, long)]
        session: String,

        /// Run ID (UUID) used in script file names
        #[arg(long)]
        run_id: Option<String>,

        /// Write the compile reports as JSON to this file
        #[arg(long)]
        out_json: Option<PathBuf>,
    },

    /// Show the steps recognized in a step list
    Parse {
        /// Step list file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,

    /// Manage the step cache
    Cache {
        #[command(subcommand)]
        command: cache::CacheCommands,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = resolve_config(&self.global)?;

        match self.command {
            Commands::Compile {
                topic,
                input,
                skill,
                run_id,
                req_idx,
                title,
                report,
            } => {
                let request = TopicRequest {
                    title: title.unwrap_or_else(|| topic.clone()),
                    topic_id: topic.clone(),
                    topic,
                    req_idx,
                    skill,
                    steps_text: read_input(input.as_deref())?,
                };
                compile_topic(&config, request, run_id.as_deref(), report.as_deref()).await
            }
            Commands::Plan {
                plan,
                session,
                run_id,
                out_json,
            } => compile_plan(&config, &plan, &session, run_id.as_deref(), out_json.as_deref()).await,
            Commands::Parse { input } => parse_steps(&config, input.as_deref()),
            Commands::Config => show_config(&config),
            Commands::Cache { command } => execute_cache(&config, command).await,
        }
    }
}

/// Execute cache subcommands
async fn execute_cache(config: &ResolvedConfig, command: cache::CacheCommands) -> Result<()> {
    match command {
        cache::CacheCommands::List { topic } => cache::execute_list(config, topic.as_deref()).await,
        cache::CacheCommands::Clear { topic, step } => {
            cache::execute_clear(config, &topic, step).await
        }
    }
}

/// Load configuration and apply command-line overrides
pub fn resolve_config(global: &GlobalArgs) -> Result<ResolvedConfig> {
    let mut config = config::load_config(global.config.as_deref())?;

    if let Some(ref work_dir) = global.work_dir {
        config.set_work_dir(work_dir.clone());
    }
    if global.strict_cache {
        config.compile.strict_cache = true;
    }
    if let Some(backend) = global.backend {
        config.generator.backend = backend;
    }
    if let Some(ref url) = global.url {
        config.generator.url = url.clone();
    }
    if let Some(ref model) = global.model {
        config.generator.model = model.clone();
    }
    if let Some(ref command) = global.generator_command {
        config.generator.command = Some(command.clone());
    }

    Ok(config)
}

/// Construct the configured snippet requester
pub fn build_requester(settings: &GeneratorSettings) -> Result<Box<dyn SnippetRequester>> {
    match settings.backend {
        Backend::Chat => {
            let base_url = build_base_url(&settings.url, settings.port);
            info!(url = %base_url, model = %settings.model, "Using chat backend");
            Ok(Box::new(ChatRequester::new(
                &base_url,
                settings.model.clone(),
                settings.timeout(),
            )))
        }
        Backend::Command => {
            let command_line = settings
                .command
                .as_deref()
                .context("The command backend needs a generator command (--command or generator.command)")?;
            let requester = CommandRequester::new(command_line, settings.timeout())?;
            info!(program = requester.program(), "Using command backend");
            Ok(Box::new(requester))
        }
    }
}

fn parse_run_id(run_id: Option<&str>) -> Result<Uuid> {
    match run_id {
        Some(s) => Uuid::parse_str(s).with_context(|| format!("Invalid run ID: {}", s)),
        None => Ok(Uuid::new_v4()),
    }
}

async fn build_compiler(config: &ResolvedConfig, run_id: Option<&str>) -> Result<Compiler> {
    let run_id = parse_run_id(run_id)?;
    let cache = CacheStore::open(&config.cache_dir).await?;
    let requester = build_requester(&config.generator)?;

    Ok(Compiler::new(
        requester,
        cache,
        config.compile_options(),
        run_id,
    ))
}

/// Compile a single topic and print the script path
async fn compile_topic(
    config: &ResolvedConfig,
    request: TopicRequest,
    run_id: Option<&str>,
    report_path: Option<&Path>,
) -> Result<()> {
    let compiler = build_compiler(config, run_id).await?;

    let skills: Vec<String> = if request.skill.is_empty() {
        Vec::new()
    } else {
        vec![request.skill.clone()]
    };
    let role = config.role_loader().load(&config.compile.role, &skills)?;

    let compiled = compiler.compile_topic(&request, &role).await?;
    let report = &compiled.report;

    if let Some(path) = report_path {
        write_json(path, report)?;
    }

    println!("{}", report.path.display());
    eprintln!(
        "\n[Run {}: {} step(s), {} from cache]",
        report.run_id,
        report.steps.len(),
        report.cached_steps()
    );

    Ok(())
}

/// Compile every topic of a plan and print the script paths
async fn compile_plan(
    config: &ResolvedConfig,
    plan_path: &Path,
    session: &str,
    run_id: Option<&str>,
    out_json: Option<&Path>,
) -> Result<()> {
    let plan = Plan::from_file(plan_path)?;
    if plan.is_empty() {
        warn!(plan = %plan_path.display(), "Plan has no topics");
    }

    let compiler = build_compiler(config, run_id).await?;
    let reports = compiler
        .compile_plan(&plan, session, &config.role_loader(), &config.compile.role)
        .await?;

    if let Some(path) = out_json {
        write_json(path, &reports)?;
    }

    for report in &reports {
        println!("{}", report.path.display());
    }
    eprintln!(
        "\n[Run {}: {} topic(s) compiled]",
        compiler.run_id(),
        reports.len()
    );

    Ok(())
}

/// Print the recognized steps
fn parse_steps(config: &ResolvedConfig, input: Option<&Path>) -> Result<()> {
    let text = read_input(input)?;
    let steps = StepParser::new(config.compile.max_steps).parse(&text);

    if steps.is_empty() {
        println!("No steps found");
        return Ok(());
    }

    for step in steps {
        println!("{:>3}. {}", step.index, step.description);
    }

    Ok(())
}

fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("pipewright configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Roles:     {}", config::paths::roles_dir(&cfg.home).display());
    println!("  Skills:    {}", config::paths::skills_dir(&cfg.home).display());
    println!("  Work dir:  {}", cfg.work_dir.display());
    println!("  Cache:     {}", cfg.cache_dir.display());
    println!();
    println!("Generator:");
    println!("  Backend:   {}", cfg.generator.backend);
    match cfg.generator.backend {
        Backend::Chat => {
            println!(
                "  URL:       {}",
                build_base_url(&cfg.generator.url, cfg.generator.port)
            );
            println!("  Model:     {}", cfg.generator.model);
        }
        Backend::Command => {
            println!(
                "  Command:   {}",
                cfg.generator.command.as_deref().unwrap_or("(not set)")
            );
        }
    }
    println!("  Timeout:   {}s", cfg.generator.timeout_seconds);
    println!();
    println!("Compile:");
    println!("  Role:         {}", cfg.compile.role);
    println!("  Max steps:    {}", cfg.compile.max_steps);
    println!("  Strict cache: {}", cfg.compile.strict_cache);

    Ok(())
}

/// Read text from a file, or from stdin when no file is given
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}
