//! Canonical paths for pipewright.
//!
//! Single source of truth - use these instead of joining paths by hand.
//!
//! | Location | Purpose |
//! |----------|---------|
//! | `<work_dir>/<run_id>.req_<n>.sh` | Generated pipeline scripts |
//! | `<work_dir>/cache/` | Per-step result cache |
//! | `<home>/roles/` | Role prompts |
//! | `<home>/config/` | Skills documents |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

/// Project-level config directory, searched upward from the current directory
pub const CONFIG_DIR_NAME: &str = ".pipewright";

/// Config file inside `CONFIG_DIR_NAME`
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default work directory, relative to the current directory
pub const DEFAULT_WORK_DIR: &str = "tmp";

/// Default home (~/.pipewright)
pub fn default_home() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".pipewright"))
}

/// Script artifact for one topic of a run
pub fn script_path(work_dir: &Path, run_id: Uuid, req_idx: u32) -> PathBuf {
    work_dir.join(format!("{}.req_{}.sh", run_id, req_idx))
}

/// Step cache under a work directory
pub fn cache_dir(work_dir: &Path) -> PathBuf {
    work_dir.join("cache")
}

/// Role prompts under a home directory
pub fn roles_dir(home: &Path) -> PathBuf {
    home.join("roles")
}

/// Skills documents under a home directory
pub fn skills_dir(home: &Path) -> PathBuf {
    home.join("config")
}
