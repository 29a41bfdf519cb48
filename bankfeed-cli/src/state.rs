use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$BANKFEED_HOME`, or `~/.bankfeed`.
pub fn bankfeed_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("BANKFEED_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".bankfeed"))
}

pub fn ensure_bankfeed_home() -> Result<PathBuf> {
    let dir = bankfeed_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}
