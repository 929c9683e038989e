use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

pub const CONFIG_FILE: &str = ".shiftjis2utf8.yaml";
pub const DEFAULT_PATTERN: &str = "*.txt";
pub const DEFAULT_DEPTH: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Files,
    Dir,
    Clear,
}

/// Operating parameters for one invocation, whether they came from the
/// command line or from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunConfig {
    Files {
        patterns: Vec<String>,
        encoding: Option<String>,
    },
    Dir {
        dir: PathBuf,
        patterns: Vec<String>,
        depth: usize,
        encoding: Option<String>,
    },
    Clear,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    mode: RunMode,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    dir: Option<PathBuf>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    depth: Option<usize>,
    #[serde(default)]
    encoding: Option<String>,
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.as_ref().split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn trim_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Reads the config file, returning `None` when it does not exist.
pub fn load_config(path: &Path) -> Result<Option<RunConfig>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("reading config {}", path.display())),
    };
    let file: ConfigFile = serde_yaml::from_slice(&data)
        .with_context(|| format!("parsing config {}", path.display()))?;
    resolve(file).map(Some)
}

fn resolve(file: ConfigFile) -> Result<RunConfig> {
    match file.mode {
        RunMode::Files => {
            let patterns = trim_list(file.files);
            if patterns.is_empty() {
                bail!("mode 'files' requires a non-empty 'files' list");
            }
            Ok(RunConfig::Files {
                patterns,
                encoding: file.encoding,
            })
        }
        RunMode::Dir => {
            let mut patterns = trim_list(file.patterns);
            if patterns.is_empty() {
                patterns.push(DEFAULT_PATTERN.to_string());
            }
            Ok(RunConfig::Dir {
                dir: file.dir.unwrap_or_else(|| PathBuf::from(".")),
                patterns,
                // A zero depth in the file falls back to the default.
                depth: file.depth.filter(|depth| *depth > 0).unwrap_or(DEFAULT_DEPTH),
                encoding: file.encoding,
            })
        }
        RunMode::Clear => Ok(RunConfig::Clear),
    }
}
