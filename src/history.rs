use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};

const HISTORY_FILE: &str = ".local.shiftjis2utf8";

/// Set of absolute paths that earlier runs already handled.
///
/// The store is loaded once per invocation, mutated in memory while files are
/// processed and written back once at the end. A store without a location is
/// purely in-memory and `save` is a no-op for it.
#[derive(Debug, Default)]
pub struct HistoryStore {
    converted: HashSet<PathBuf>,
    location: Option<PathBuf>,
}

impl HistoryStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load(location: &Path) -> Result<Self> {
        let converted = match fs::read(location) {
            Ok(data) => data
                .split(|byte| *byte == b'\n')
                .filter(|line| !line.is_empty())
                .map(path_from_bytes)
                .collect(),
            Err(err) if err.kind() == ErrorKind::NotFound => HashSet::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading history {}", location.display()));
            }
        };
        Ok(Self {
            converted,
            location: Some(location.to_path_buf()),
        })
    }

    pub fn is_converted(&self, path: &Path) -> bool {
        self.converted.contains(path)
    }

    pub fn mark_converted(&mut self, path: &Path) {
        self.converted.insert(path.to_path_buf());
    }

    pub fn entry_count(&self) -> usize {
        self.converted.len()
    }

    pub fn save(&self) -> Result<()> {
        let Some(location) = &self.location else {
            return Ok(());
        };
        let file = fs::File::create(location)
            .with_context(|| format!("creating history {}", location.display()))?;
        let mut writer = BufWriter::new(file);
        for path in &self.converted {
            writer.write_all(&path_to_bytes(path))?;
            writer.write_all(b"\n")?;
        }
        writer
            .flush()
            .with_context(|| format!("writing history {}", location.display()))?;
        Ok(())
    }
}

/// History lines hold the raw path bytes so that non-UTF-8 file names keep
/// their identity.
#[cfg(unix)]
fn path_from_bytes(line: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    PathBuf::from(OsStr::from_bytes(line))
}

#[cfg(not(unix))]
fn path_from_bytes(line: &[u8]) -> PathBuf {
    let text = String::from_utf8_lossy(line);
    PathBuf::from(text.trim_end_matches('\r'))
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;

    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    Cow::Owned(path.to_string_lossy().into_owned().into_bytes())
}

pub fn default_location() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to resolve the home directory"))?;
    Ok(home.join(HISTORY_FILE))
}

pub fn clear(location: &Path) -> Result<()> {
    match fs::remove_file(location) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("removing history {}", location.display())),
    }
}

/// Absolute form of `path` used as the history key.
///
/// Relative paths are joined onto the working directory and `.`/`..` are
/// resolved lexically; symlinks are left alone.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolving the current directory")?
            .join(path)
    };
    Ok(clean(&joined))
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_location_loads_empty() {
        let temp = tempdir().expect("temp dir");
        let store = HistoryStore::load(&temp.path().join("absent")).expect("load");
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn save_then_load_keeps_every_path() {
        let temp = tempdir().expect("temp dir");
        let location = temp.path().join("history");
        let mut store = HistoryStore::load(&location).expect("load");
        store.mark_converted(Path::new("/data/a.txt"));
        store.mark_converted(Path::new("/data/b.txt"));
        store.mark_converted(Path::new("/data/a.txt"));
        assert_eq!(store.entry_count(), 2);
        store.save().expect("save");

        let text = fs::read_to_string(&location).expect("read history");
        assert_eq!(text.lines().count(), 2);

        let reloaded = HistoryStore::load(&location).expect("reload");
        assert!(reloaded.is_converted(Path::new("/data/a.txt")));
        assert!(reloaded.is_converted(Path::new("/data/b.txt")));
        assert!(!reloaded.is_converted(Path::new("/data/A.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_keep_their_identity() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempdir().expect("temp dir");
        let location = temp.path().join("history");
        // Shift_JIS bytes for the half-width katakana names "ｱ.txt" and "ｲ.txt".
        let first = Path::new("/data").join(OsStr::from_bytes(b"\xb1.txt"));
        let second = Path::new("/data").join(OsStr::from_bytes(b"\xb2.txt"));

        let mut store = HistoryStore::load(&location).expect("load");
        store.mark_converted(&first);
        assert!(!store.is_converted(&second));
        store.save().expect("save");

        let reloaded = HistoryStore::load(&location).expect("reload");
        assert!(reloaded.is_converted(&first));
        assert!(!reloaded.is_converted(&second));
        assert_eq!(reloaded.entry_count(), 1);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let temp = tempdir().expect("temp dir");
        let mut store =
            HistoryStore::load(&temp.path().join("absent/history")).expect("load");
        store.mark_converted(Path::new("/a.txt"));
        assert!(store.save().is_err());
    }

    #[test]
    fn in_memory_save_is_noop() {
        let mut store = HistoryStore::in_memory();
        store.mark_converted(Path::new("/x"));
        store.save().expect("save");
        assert!(store.location.is_none());
    }

    #[test]
    fn clear_tolerates_missing_file() {
        let temp = tempdir().expect("temp dir");
        let location = temp.path().join("history");
        clear(&location).expect("clear missing");
        fs::write(&location, "/a\n").expect("write");
        clear(&location).expect("clear existing");
        assert!(!location.exists());
    }

    #[test]
    fn clean_resolves_dot_segments() {
        assert_eq!(
            clean(Path::new("/a/./b/../c.txt")),
            PathBuf::from("/a/c.txt")
        );
        assert_eq!(clean(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn absolutize_joins_relative_paths() {
        let abs = absolutize(Path::new("some/file.txt")).expect("absolutize");
        assert!(abs.is_absolute());
        assert!(abs.ends_with("some/file.txt"));
    }
}
