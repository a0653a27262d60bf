//! Cache CLI subcommands.
//!
//! - `list`: Show cached step entries, optionally for one topic
//! - `clear`: Remove a topic's entries, or a single step's

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::ResolvedConfig;
use crate::core::{CacheRecord, CacheStore};

/// Cache-related subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// List cached step entries
    List {
        /// Restrict to one topic
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Remove cached entries so they are regenerated
    Clear {
        /// Topic to clear
        #[arg(short, long)]
        topic: String,

        /// Only this step index
        #[arg(long)]
        step: Option<u32>,
    },
}

pub async fn execute_list(config: &ResolvedConfig, topic: Option<&str>) -> Result<()> {
    let store = CacheStore::open(&config.cache_dir).await?;
    let entries = store.entries(topic)?;

    if entries.is_empty() {
        println!("No cache entries in {}", store.dir().display());
        return Ok(());
    }

    println!("{:<36} {:<10} {:<7} SNIPPET", "FILE", "PROCESSING", "OUTPUT");
    println!("{}", "-".repeat(80));

    for path in entries {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let record = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read cache entry: {}", path.display()))
            .and_then(|content| {
                serde_json::from_str::<CacheRecord>(&content).context("Malformed cache entry")
            });

        match record {
            Ok(record) => {
                let snippet = record.snippet.lines().next().unwrap_or("");
                println!(
                    "{:<36} {:<10} {:<7} {}",
                    name,
                    record.processing.to_string(),
                    record.output_type.to_string(),
                    snippet
                );
            }
            Err(e) => println!("{:<36} (unreadable: {:#})", name, e),
        }
    }

    Ok(())
}

pub async fn execute_clear(config: &ResolvedConfig, topic: &str, step: Option<u32>) -> Result<()> {
    let store = CacheStore::open(&config.cache_dir).await?;
    let removed = store.invalidate(topic, step).await?;

    match step {
        Some(index) => println!("Removed {} entry for step {} of '{}'", removed, index, topic),
        None => println!("Removed {} entries for '{}'", removed, topic),
    }

    Ok(())
}
