//! Sessions command - list and clean up session directories.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use tracing::debug;

/// Arguments for the sessions command.
#[derive(Args)]
pub struct SessionsArgs {
    /// Directory that session directories live under
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    #[command(subcommand)]
    action: SessionsAction,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List existing sessions
    List,
    /// Remove all session directories
    Clean,
}

pub fn run(args: SessionsArgs) -> anyhow::Result<()> {
    match args.action {
        SessionsAction::List => list(&args.output_dir),
        SessionsAction::Clean => clean(&args.output_dir),
    }
}

fn session_dirs(output_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !output_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("session_"))
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn list(output_dir: &Path) -> anyhow::Result<()> {
    let dirs = session_dirs(output_dir)?;
    if dirs.is_empty() {
        println!("No sessions under {}", output_dir.display());
        return Ok(());
    }

    for dir in &dirs {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("?")
            .to_string();
        match read_manifest(dir) {
            Some(manifest) => {
                let created = manifest
                    .get("created_at")
                    .and_then(|v| v.as_str())
                    .unwrap_or("?");
                let regions = manifest
                    .pointer("/summary/total_regions")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                let matched = manifest
                    .pointer("/summary/matched")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                println!(
                    "{}  {}  {} receipt(s), {} matched",
                    style(&name).cyan(),
                    created,
                    regions,
                    matched
                );
            }
            None => {
                println!("{}  (no manifest)", style(&name).yellow());
            }
        }
    }
    Ok(())
}

fn read_manifest(dir: &Path) -> Option<serde_json::Value> {
    let text = fs::read_to_string(dir.join("session.json")).ok()?;
    serde_json::from_str(&text).ok()
}

fn clean(output_dir: &Path) -> anyhow::Result<()> {
    let dirs = session_dirs(output_dir)?;
    let count = dirs.len();
    for dir in dirs {
        debug!("removing {}", dir.display());
        fs::remove_dir_all(&dir)?;
    }
    println!("{} Removed {} session(s)", style("✓").green(), count);
    Ok(())
}
