//! State file location and stack loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use stratus_decl::{load_manifest_str, Declaration};

use crate::error::CliError;

const STATE_FILE: &str = "state.db";

/// Where reconciliation state lives unless overridden.
fn data_dir() -> Result<PathBuf> {
    ProjectDirs::from("io", "stratus", "stratus")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("could not determine data directory")
}

/// Resolve the state file path, creating the parent directory.
pub fn state_path(override_path: Option<&Path>) -> Result<PathBuf> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => data_dir()?.join(STATE_FILE),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(path)
}

/// Parse repeated `--set key=value` arguments.
pub fn parse_set_args(args: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    let mut config = BTreeMap::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            return Err(CliError::BadSetArg(arg.clone()));
        };
        config.insert(key.trim().to_string(), value.to_string());
    }
    Ok(config)
}

/// Read and parse a stack file, substituting `${config.*}` values.
pub fn load_stack(path: &Path, sets: &[String]) -> Result<Declaration> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::ReadStack {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse_set_args(sets)?;
    let decl = load_manifest_str(&contents, &config)
        .with_context(|| format!("invalid stack file {}", path.display()))?;
    Ok(decl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_args() {
        let config = parse_set_args(&["region=us-east-1".to_string(), "a=b=c".to_string()])
            .unwrap();
        assert_eq!(config["region"], "us-east-1");
        assert_eq!(config["a"], "b=c");

        assert!(parse_set_args(&["nokey".to_string()]).is_err());
    }
}
