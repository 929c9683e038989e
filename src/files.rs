use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use glob::glob;
use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

/// Compiles a base-name pattern. `*` and `?` never cross a separator.
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|err| anyhow!("invalid file pattern '{pattern}': {err}"))
}

/// Files under `root` whose base name matches `pattern`.
///
/// A file directly inside `root` has depth 0 and is yielded only when
/// `0 < max_depth`; directories whose children would be too deep are never
/// entered. Entries that cannot be read are dropped and the walk continues.
pub fn find_matches<'a>(
    root: &Path,
    pattern: &'a GlobMatcher,
    max_depth: usize,
) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(root)
        .follow_links(false)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.depth() > 0 && !entry.file_type().is_dir())
        .filter(move |entry| pattern.is_match(Path::new(entry.file_name())))
        .map(|entry| entry.into_path())
}

/// Flat expansion of one entry of an explicit file list.
///
/// When the pattern is invalid or matches nothing the literal text is
/// returned as a path, so a missing file is only noticed when it is processed.
pub fn expand_file_pattern(pattern: &str) -> Vec<PathBuf> {
    let matches: Vec<PathBuf> = match glob(pattern) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).collect(),
        Err(_) => Vec::new(),
    };
    if matches.is_empty() {
        vec![PathBuf::from(pattern)]
    } else {
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(root: &Path, pattern: &str, depth: usize) -> Vec<String> {
        let matcher = compile_pattern(pattern).expect("pattern");
        let mut found: Vec<String> = find_matches(root, &matcher, depth)
            .map(|path| {
                path.strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        found.sort();
        found
    }

    fn sample_tree() -> tempfile::TempDir {
        let temp = tempdir().expect("temp dir");
        let root = temp.path();
        fs::create_dir_all(root.join("x/y")).expect("dirs");
        fs::write(root.join("a.txt"), "a").expect("a");
        fs::write(root.join("x/b.txt"), "b").expect("b");
        fs::write(root.join("x/y/c.txt"), "c").expect("c");
        fs::write(root.join("notes.md"), "n").expect("md");
        temp
    }

    #[test]
    fn depth_limits_traversal() {
        let temp = sample_tree();
        assert_eq!(names(temp.path(), "*.txt", 1), vec!["a.txt"]);
        assert_eq!(names(temp.path(), "*.txt", 2), vec!["a.txt", "x/b.txt"]);
        assert_eq!(
            names(temp.path(), "*.txt", 3),
            vec!["a.txt", "x/b.txt", "x/y/c.txt"]
        );
    }

    #[test]
    fn zero_depth_matches_nothing() {
        let temp = sample_tree();
        assert!(names(temp.path(), "*", 0).is_empty());
    }

    #[test]
    fn directories_are_never_matches() {
        let temp = sample_tree();
        assert_eq!(names(temp.path(), "x*", 3), Vec::<String>::new());
    }

    #[test]
    fn pattern_applies_to_base_name() {
        let temp = sample_tree();
        assert_eq!(names(temp.path(), "?.txt", 3).len(), 3);
        assert_eq!(names(temp.path(), "[ab].txt", 3), vec!["a.txt", "x/b.txt"]);
        assert!(names(temp.path(), "x/*.txt", 3).is_empty());
    }

    #[test]
    fn missing_root_yields_nothing() {
        let temp = tempdir().expect("temp dir");
        assert!(names(&temp.path().join("absent"), "*", 5).is_empty());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(compile_pattern("[abc").is_err());
    }

    #[test]
    fn expansion_falls_back_to_literal() {
        let temp = sample_tree();
        let pattern = temp.path().join("*.txt").to_string_lossy().into_owned();
        assert_eq!(expand_file_pattern(&pattern), vec![temp.path().join("a.txt")]);

        let missing = temp.path().join("nothing*.log").to_string_lossy().into_owned();
        assert_eq!(expand_file_pattern(&missing), vec![PathBuf::from(&missing)]);
    }
}
