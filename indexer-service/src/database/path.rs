use anyhow::{bail, Result};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

pub const MEMORY_DB: &str = ":memory:";

/// Where the projection store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    Memory,
    File(PathBuf),
}

impl DbLocation {
    /// Parses `DB_PATH`. File paths must name a regular file (or nothing yet)
    /// and may not climb out of the working tree.
    pub fn parse(db_path: &str) -> Result<Self> {
        if db_path == MEMORY_DB {
            return Ok(DbLocation::Memory);
        }
        if db_path.trim().is_empty() {
            bail!("DB_PATH is empty");
        }
        if db_path.chars().any(char::is_control) {
            bail!("DB_PATH contains control characters");
        }

        let path = Path::new(db_path);
        if path.components().any(|c| c == Component::ParentDir) {
            bail!("DB_PATH may not contain '..': {}", db_path);
        }
        if path.file_name().is_none() {
            bail!("DB_PATH must name a file: {}", db_path);
        }

        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                bail!("DB_PATH may not be a symlink: {}", db_path)
            }
            Ok(meta) if meta.is_dir() => bail!("DB_PATH is a directory: {}", db_path),
            _ => Ok(DbLocation::File(path.to_path_buf())),
        }
    }
}
