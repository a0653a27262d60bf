//! Configuration for pipewright.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied by the CLI on top of the resolved value)
//! 2. Environment variables (PIPEWRIGHT_HOME, PIPEWRIGHT_FORCE_CACHE,
//!    PIPEWRIGHT_MODEL, PIPEWRIGHT_URL)
//! 3. Config file (.pipewright/config.yaml)
//! 4. Defaults (./tmp work dir, ~/.pipewright home)
//!
//! Config file discovery:
//! - Searches current directory and parents for .pipewright/config.yaml
//! - Paths in config file are relative to the directory containing .pipewright/

pub mod paths;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::compiler::CompileOptions;
use crate::core::parser::MAX_STEPS;
use crate::roles::RoleLoader;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
    #[serde(default)]
    pub compile: Option<CompileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Roles and skills home (relative to project root)
    pub home: Option<String>,
    /// Script output directory (relative to project root)
    pub work_dir: Option<String>,
    /// Step cache directory (defaults to <work_dir>/cache)
    pub cache_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub backend: Option<Backend>,
    pub url: Option<String>,
    pub port: Option<u16>,
    pub model: Option<String>,
    pub command: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompileConfig {
    pub max_steps: Option<usize>,
    pub strict_cache: Option<bool>,
    pub role: Option<String>,
}

/// Which requester backend produces snippets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OpenAI-compatible chat completions endpoint
    #[default]
    Chat,

    /// External command reading the prompt on stdin
    Command,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Chat => write!(f, "chat"),
            Backend::Command => write!(f, "command"),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Roles and skills home
    pub home: PathBuf,
    /// Directory receiving generated scripts
    pub work_dir: PathBuf,
    /// Step cache directory
    pub cache_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Requester settings
    pub generator: GeneratorSettings,
    /// Compilation settings
    pub compile: CompileSettings,
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub backend: Backend,
    /// Host, optionally with scheme and port
    pub url: String,
    pub port: Option<u16>,
    pub model: String,
    /// Command line for the command backend
    pub command: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Chat,
            url: "localhost".to_string(),
            port: None,
            model: "gemma3n:e4b".to_string(),
            command: None,
            timeout_seconds: 120,
        }
    }
}

impl GeneratorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct CompileSettings {
    pub max_steps: usize,
    pub strict_cache: bool,
    pub role: String,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            max_steps: MAX_STEPS,
            strict_cache: false,
            role: "coder".to_string(),
        }
    }
}

impl ResolvedConfig {
    /// Compiler options derived from this configuration
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            work_dir: self.work_dir.clone(),
            strict_cache: self.compile.strict_cache,
            max_steps: self.compile.max_steps,
        }
    }

    /// Role loader rooted at the home directory
    pub fn role_loader(&self) -> RoleLoader {
        RoleLoader::new(paths::roles_dir(&self.home), paths::skills_dir(&self.home))
    }

    /// Point scripts (and the default cache) at another work directory
    pub fn set_work_dir(&mut self, work_dir: PathBuf) {
        if self.cache_dir == paths::cache_dir(&self.work_dir) {
            self.cache_dir = paths::cache_dir(&work_dir);
        }
        self.work_dir = work_dir;
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current
            .join(paths::CONFIG_DIR_NAME)
            .join(paths::CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Load configuration from all sources
///
/// `explicit` replaces config file discovery when given.
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config_file = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    resolve(config_file, paths::default_home, |key| std::env::var(key).ok())
}

/// Merge config file, environment and defaults
fn resolve(
    config_file: Option<PathBuf>,
    default_home: impl FnOnce() -> Result<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let file = config_file.as_deref().map(load_config_file).transpose()?;

    // Base directory is the parent of .pipewright/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let paths_cfg = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = if let Some(env_home) = env("PIPEWRIGHT_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = paths_cfg.home {
        resolve_path(&base_dir, home_path)
    } else {
        default_home()?
    };

    let work_dir = match paths_cfg.work_dir {
        Some(ref dir) => resolve_path(&base_dir, dir),
        None => PathBuf::from(paths::DEFAULT_WORK_DIR),
    };

    let cache_dir = match paths_cfg.cache_dir {
        Some(ref dir) => resolve_path(&base_dir, dir),
        None => paths::cache_dir(&work_dir),
    };

    let mut generator = GeneratorSettings::default();
    if let Some(g) = file.as_ref().and_then(|f| f.generator.clone()) {
        generator.backend = g.backend.unwrap_or(generator.backend);
        generator.url = g.url.unwrap_or(generator.url);
        generator.port = g.port.or(generator.port);
        generator.model = g.model.unwrap_or(generator.model);
        generator.command = g.command.or(generator.command);
        generator.timeout_seconds = g.timeout_seconds.unwrap_or(generator.timeout_seconds);
    }
    if let Some(url) = env("PIPEWRIGHT_URL") {
        generator.url = url;
    }
    if let Some(model) = env("PIPEWRIGHT_MODEL") {
        generator.model = model;
    }

    let mut compile = CompileSettings::default();
    if let Some(c) = file.as_ref().and_then(|f| f.compile.clone()) {
        compile.max_steps = c.max_steps.unwrap_or(compile.max_steps);
        compile.strict_cache = c.strict_cache.unwrap_or(compile.strict_cache);
        compile.role = c.role.unwrap_or(compile.role);
    }
    if let Some(force) = env("PIPEWRIGHT_FORCE_CACHE") {
        compile.strict_cache = is_truthy(&force);
    }

    Ok(ResolvedConfig {
        home,
        work_dir,
        cache_dir,
        config_file,
        generator,
        compile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn fixed_home() -> Result<PathBuf> {
        Ok(PathBuf::from("/home/user/.pipewright"))
    }

    fn write_config(temp: &TempDir, yaml: &str) -> PathBuf {
        let dir = temp.path().join(paths::CONFIG_DIR_NAME);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(paths::CONFIG_FILE_NAME);
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, fixed_home, no_env).unwrap();

        assert_eq!(config.home, PathBuf::from("/home/user/.pipewright"));
        assert_eq!(config.work_dir, PathBuf::from("tmp"));
        assert_eq!(config.cache_dir, PathBuf::from("tmp/cache"));
        assert!(config.config_file.is_none());
        assert_eq!(config.generator.backend, Backend::Chat);
        assert_eq!(config.generator.model, "gemma3n:e4b");
        assert_eq!(config.compile.max_steps, MAX_STEPS);
        assert!(!config.compile.strict_cache);
        assert_eq!(config.compile.role, "coder");
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
version: "1.0"
paths:
  home: ./pw-home
  work_dir: ./build
generator:
  backend: command
  command: "llm -m gpt-4o-mini"
  timeout_seconds: 30
compile:
  max_steps: 5
  strict_cache: true
"#,
        );

        let config = resolve(Some(path.clone()), fixed_home, no_env).unwrap();
        assert_eq!(config.config_file, Some(path));
        assert_eq!(config.home, temp.path().join("pw-home"));
        assert!(config.work_dir.ends_with("build"));
        assert_eq!(config.cache_dir, config.work_dir.join("cache"));
        assert_eq!(config.generator.backend, Backend::Command);
        assert_eq!(config.generator.command.as_deref(), Some("llm -m gpt-4o-mini"));
        assert_eq!(config.generator.timeout(), Duration::from_secs(30));
        assert_eq!(config.compile.max_steps, 5);
        assert!(config.compile.strict_cache);
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            "version: \"1.0\"\ngenerator:\n  model: from-file\ncompile:\n  strict_cache: true\n",
        );
        let env: HashMap<&str, &str> = [
            ("PIPEWRIGHT_HOME", "/srv/pw"),
            ("PIPEWRIGHT_MODEL", "from-env"),
            ("PIPEWRIGHT_URL", "gpu-box:8080"),
            ("PIPEWRIGHT_FORCE_CACHE", "0"),
        ]
        .into_iter()
        .collect();

        let config = resolve(Some(path), fixed_home, |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.home, PathBuf::from("/srv/pw"));
        assert_eq!(config.generator.model, "from-env");
        assert_eq!(config.generator.url, "gpu-box:8080");
        assert!(!config.compile.strict_cache);
    }

    #[test]
    fn test_force_cache_values() {
        for (value, expected) in [("1", true), ("TRUE", true), ("yes", true), ("off", false), ("", false)] {
            let config = resolve(None, fixed_home, |key| {
                (key == "PIPEWRIGHT_FORCE_CACHE").then(|| value.to_string())
            })
            .unwrap();
            assert_eq!(config.compile.strict_cache, expected, "value {:?}", value);
        }
    }

    #[test]
    fn test_invalid_config_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "version: [unclosed");
        assert!(resolve(Some(path), fixed_home, no_env).is_err());
    }

    #[test]
    fn test_set_work_dir_moves_default_cache() {
        let mut config = resolve(None, fixed_home, no_env).unwrap();
        config.set_work_dir(PathBuf::from("/out"));
        assert_eq!(config.cache_dir, PathBuf::from("/out/cache"));

        config.cache_dir = PathBuf::from("/shared/cache");
        config.set_work_dir(PathBuf::from("/other"));
        assert_eq!(config.cache_dir, PathBuf::from("/shared/cache"));
        assert_eq!(config.compile_options().work_dir, PathBuf::from("/other"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
