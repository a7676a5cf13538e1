use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::repository::Storage;

/// Environment variable naming the database file.
pub(crate) const DB_ENV: &str = "BOOKKEEPER_DB";

/// Where the data lives and what to do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub(crate) storage: Storage,
    pub(crate) command: Vec<String>,
}

impl Config {
    /// Build from the process arguments, program name excluded.
    pub(crate) fn from_args(args: &[String]) -> Result<Self> {
        Self::resolve(args, std::env::var_os(DB_ENV))
    }

    fn resolve(args: &[String], env_db: Option<OsString>) -> Result<Self> {
        let mut memory = false;
        let mut db: Option<PathBuf> = None;
        let mut command = Vec::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--memory" => memory = true,
                "--db" => {
                    let path = iter
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--db needs a path"))?;
                    db = Some(PathBuf::from(shellexpand(path)));
                }
                _ => command.push(arg.clone()),
            }
        }

        if memory && db.is_some() {
            anyhow::bail!("--db and --memory cannot be used together");
        }

        let storage = if memory {
            Storage::Memory
        } else if let Some(path) = db {
            Storage::File(path)
        } else if let Some(path) = env_db.filter(|p| !p.is_empty()) {
            Storage::File(PathBuf::from(path))
        } else {
            Storage::File(default_db_path()?)
        };

        Ok(Self { storage, command })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "bookkeeper", "Bookkeeper")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("bookkeeper.db"))
}

pub(crate) fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
