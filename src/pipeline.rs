use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Result;
use encoding_rs::Encoding;

use crate::convert::convert_to_canonical;
use crate::encoding::is_canonical_encoding;
use crate::files::{compile_pattern, expand_file_pattern, find_matches};
use crate::history::{HistoryStore, absolutize};

const RULE: &str = "---------------------------------";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub converted: usize,
    pub skipped: usize,
}

impl RunResult {
    fn count(&mut self, outcome: &FileOutcome) {
        if matches!(outcome, FileOutcome::Converted) {
            self.converted += 1;
        } else {
            self.skipped += 1;
        }
    }

    fn print(&self) {
        println!(
            "converted: {} | skipped: {}",
            self.converted, self.skipped
        );
    }
}

/// Terminal state of one file candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Converted,
    AlreadyKnown,
    AlreadyCanonical,
    NotFound,
    NotAFile,
    Failed(String),
}

/// Runs discovery, history filtering, detection and conversion for one
/// invocation. The history store is borrowed for the whole run and persisted
/// once when the run finishes.
pub struct Pipeline<'a> {
    history: &'a mut HistoryStore,
    legacy: &'static Encoding,
}

impl<'a> Pipeline<'a> {
    pub fn new(history: &'a mut HistoryStore, legacy: &'static Encoding) -> Self {
        Self { history, legacy }
    }

    pub fn run_files(&mut self, patterns: &[String]) -> RunResult {
        println!("files mode");
        println!("targets: {}", patterns.join(", "));
        println!("source encoding: {}", self.legacy.name());
        println!("known files: {}", self.history.entry_count());
        println!("{RULE}");

        let mut result = RunResult::default();
        for pattern in patterns {
            for path in expand_file_pattern(pattern) {
                let outcome = self.process_file(&path);
                result.count(&outcome);
            }
        }
        self.finish(result)
    }

    pub fn run_dir(&mut self, dir: &Path, patterns: &[String], depth: usize) -> Result<RunResult> {
        let matchers = patterns
            .iter()
            .map(|pattern| compile_pattern(pattern))
            .collect::<Result<Vec<_>>>()?;

        println!("directory mode");
        println!("directory: {}", dir.display());
        println!("depth: {depth}");
        println!("patterns: {}", patterns.join(", "));
        println!("source encoding: {}", self.legacy.name());
        println!("known files: {}", self.history.entry_count());
        println!("{RULE}");
        if !dir.is_dir() {
            eprintln!("warning: {} is not a readable directory", dir.display());
        }

        let mut unique: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        for matcher in &matchers {
            for path in find_matches(dir, matcher, depth) {
                let key = absolutize(&path).unwrap_or_else(|_| path.clone());
                unique.entry(key).or_insert(path);
            }
        }

        let mut result = RunResult::default();
        for path in unique.values() {
            let outcome = self.process_file(path);
            result.count(&outcome);
        }
        Ok(self.finish(result))
    }

    pub fn process_file(&mut self, path: &Path) -> FileOutcome {
        let outcome = self.classify(path);
        match &outcome {
            FileOutcome::Converted => println!("converted: {}", path.display()),
            FileOutcome::AlreadyCanonical => println!("already utf-8: {}", path.display()),
            FileOutcome::AlreadyKnown => {}
            FileOutcome::NotFound => eprintln!("not found: {}", path.display()),
            FileOutcome::NotAFile => eprintln!("not a regular file: {}", path.display()),
            FileOutcome::Failed(reason) => eprintln!("failed: {} - {reason}", path.display()),
        }
        outcome
    }

    fn classify(&mut self, path: &Path) -> FileOutcome {
        let key = match absolutize(path) {
            Ok(abs) => abs,
            Err(err) => return FileOutcome::Failed(format!("{err:#}")),
        };

        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => return FileOutcome::NotAFile,
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return FileOutcome::NotFound,
            Err(err) => return FileOutcome::Failed(err.to_string()),
        }

        if self.history.is_converted(&key) {
            return FileOutcome::AlreadyKnown;
        }

        match is_canonical_encoding(path) {
            Ok(true) => {
                self.history.mark_converted(&key);
                return FileOutcome::AlreadyCanonical;
            }
            Ok(false) => {}
            Err(err) => return FileOutcome::Failed(format!("{err:#}")),
        }

        match convert_to_canonical(path, self.legacy) {
            Ok(()) => {
                self.history.mark_converted(&key);
                FileOutcome::Converted
            }
            Err(err) => FileOutcome::Failed(err.to_string()),
        }
    }

    fn finish(&self, result: RunResult) -> RunResult {
        if let Err(err) = self.history.save() {
            eprintln!("warning: unable to save conversion history: {err:#}");
        }
        println!("{RULE}");
        println!("done");
        result.print();
        result
    }
}
