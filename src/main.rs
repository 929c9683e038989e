use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueHint};

mod config;
mod convert;
mod encoding;
mod files;
mod history;
mod pipeline;

use config::{CONFIG_FILE, DEFAULT_DEPTH, DEFAULT_PATTERN, RunConfig, load_config, split_list};
use encoding::{DEFAULT_LEGACY_LABEL, legacy_encoding};
use history::HistoryStore;
use pipeline::Pipeline;

const CONFIG_HELP: &str = "\
Without arguments, settings are read from .shiftjis2utf8.yaml in the current directory:

  mode: files
  files:
    - job/tmp/sample_01.log
    - \"test*.log\"

or

  mode: dir
  dir: ./test/tmp
  depth: 2
  patterns:
    - \"*.md\"
    - \"*.log\"

Examples:
  sjis2utf8 files job/tmp/sample_01.log,job/tmp/test*.log
  sjis2utf8 dir ./test/tmp --depth 2 --patterns \"*.md,*.log\"
  sjis2utf8 clear";

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match cli.command {
        Some(command) => RunConfig::try_from(command)?,
        None => match load_config(Path::new(CONFIG_FILE))? {
            Some(config) => config,
            None => {
                println!("nothing to do: no mode given and no {CONFIG_FILE} found.\n");
                Cli::command().print_help()?;
                return Ok(());
            }
        },
    };
    run(config)
}

fn run(config: RunConfig) -> Result<()> {
    let history_path = history::default_location()?;
    match config {
        RunConfig::Clear => {
            history::clear(&history_path)?;
            println!("conversion history cleared");
        }
        RunConfig::Files { patterns, encoding } => {
            let legacy = legacy_encoding(encoding.as_deref())?;
            let mut store = HistoryStore::load(&history_path)?;
            Pipeline::new(&mut store, legacy).run_files(&patterns);
        }
        RunConfig::Dir {
            dir,
            patterns,
            depth,
            encoding,
        } => {
            let legacy = legacy_encoding(encoding.as_deref())?;
            let mut store = HistoryStore::load(&history_path)?;
            Pipeline::new(&mut store, legacy).run_dir(&dir, &patterns, depth)?;
        }
    }
    Ok(())
}

impl TryFrom<Command> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(command: Command) -> Result<Self> {
        match command {
            Command::Files(cmd) => {
                let patterns = split_list(&cmd.paths);
                if patterns.is_empty() {
                    bail!("files: no file paths given");
                }
                Ok(RunConfig::Files {
                    patterns,
                    encoding: Some(cmd.source.from),
                })
            }
            Command::Dir(cmd) => {
                let patterns = split_list(&cmd.patterns);
                if patterns.is_empty() {
                    bail!("dir: --patterns must name at least one pattern");
                }
                Ok(RunConfig::Dir {
                    dir: cmd.dir,
                    patterns,
                    depth: cmd.depth,
                    encoding: Some(cmd.source.from),
                })
            }
            Command::Clear => Ok(RunConfig::Clear),
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "sjis2utf8",
    version,
    about = "Convert Shift_JIS text files to UTF-8 in place",
    after_help = CONFIG_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert the listed files (comma-separated, glob patterns allowed)
    Files(FilesCommand),
    /// Convert matching files below a directory
    Dir(DirCommand),
    /// Forget every file recorded in the conversion history
    Clear,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Encoding the files are converted from
    #[arg(long = "from", value_name = "ENCODING", default_value = DEFAULT_LEGACY_LABEL)]
    from: String,
}

#[derive(Debug, Args)]
struct FilesCommand {
    #[arg(value_name = "PATHS", required = true, value_hint = ValueHint::AnyPath)]
    paths: Vec<String>,
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Debug, Args)]
struct DirCommand {
    #[arg(value_name = "DIR", value_hint = ValueHint::DirPath)]
    dir: PathBuf,
    /// How many directory levels to search; 1 means only DIR itself
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    depth: usize,
    /// Comma-separated file name patterns
    #[arg(long = "patterns", value_name = "PATTERNS", default_value = DEFAULT_PATTERN)]
    patterns: Vec<String>,
    #[command(flatten)]
    source: SourceArgs,
}
