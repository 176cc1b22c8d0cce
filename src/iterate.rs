//! Source enumeration: turns an iterator URI plus source arguments into the
//! list of candidate document paths.

use crate::error::ConfigError;

use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How source arguments are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorMode {
    /// Each source is a directory walked for `.geojson` files.
    Directory,
    /// Each source is a data repository; its `data/` directory is walked.
    Repo,
    /// Each source is a single document.
    File,
    /// Each source is a text file listing one document path per line.
    FileList,
}

impl IteratorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IteratorMode::Directory => "directory://",
            IteratorMode::Repo => "repo://",
            IteratorMode::File => "file://",
            IteratorMode::FileList => "filelist://",
        }
    }
}

impl FromStr for IteratorMode {
    type Err = ConfigError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let scheme = uri.split("://").next().unwrap_or_default();
        match scheme {
            "directory" => Ok(IteratorMode::Directory),
            "repo" => Ok(IteratorMode::Repo),
            "file" => Ok(IteratorMode::File),
            "filelist" => Ok(IteratorMode::FileList),
            _ => Err(ConfigError::UnsupportedIterator(uri.to_string())),
        }
    }
}

impl std::fmt::Display for IteratorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumerate candidate documents for every source.
///
/// Unreadable directories and list files are logged and skipped.
pub fn discover(mode: IteratorMode, sources: &[String]) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for source in sources {
        let source = Path::new(source);
        match mode {
            IteratorMode::Directory => walk(source, &mut paths),
            IteratorMode::Repo => walk(&source.join("data"), &mut paths),
            IteratorMode::File => paths.push(source.to_path_buf()),
            IteratorMode::FileList => read_list(source, &mut paths),
        }
    }

    tracing::info!(count = paths.len(), %mode, "discovered candidate documents");
    paths
}

fn walk(root: &Path, paths: &mut Vec<PathBuf>) {
    if !root.is_dir() {
        tracing::warn!(path = %root.display(), "source is not a directory");
        return;
    }

    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .build();

    for entry in walker {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().is_some_and(|t| t.is_file()) && is_indexable(path) {
                    paths.push(path.to_path_buf());
                }
            }
            Err(error) => {
                tracing::warn!(path = %root.display(), %error, "failed to walk directory");
            }
        }
    }
}

fn read_list(list: &Path, paths: &mut Vec<PathBuf>) {
    let content = match std::fs::read_to_string(list) {
        Ok(content) => content,
        Err(error) => {
            tracing::warn!(path = %list.display(), %error, "failed to read file list");
            return;
        }
    };

    paths.extend(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(PathBuf::from),
    );
}

fn is_indexable(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("geojson")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iterator_uris() {
        assert_eq!("repo://".parse::<IteratorMode>().unwrap(), IteratorMode::Repo);
        assert_eq!(
            "directory://".parse::<IteratorMode>().unwrap(),
            IteratorMode::Directory
        );
        assert_eq!("filelist".parse::<IteratorMode>().unwrap(), IteratorMode::FileList);
        assert!("git://".parse::<IteratorMode>().is_err());
    }

    #[test]
    fn repo_mode_walks_data_directory_for_geojson() {
        let temp = tempfile::tempdir().expect("tempdir");
        let data = temp.path().join("data/101/736/545");
        std::fs::create_dir_all(&data).expect("mkdir");
        std::fs::write(data.join("101736545.geojson"), "{}").expect("write");
        std::fs::write(data.join("README.md"), "#").expect("write");
        std::fs::create_dir_all(temp.path().join("data/.git")).expect("mkdir");
        std::fs::write(temp.path().join("data/.git/x.geojson"), "{}").expect("write");
        std::fs::write(temp.path().join("outside.geojson"), "{}").expect("write");

        let sources = vec![temp.path().to_string_lossy().to_string()];
        let paths = discover(IteratorMode::Repo, &sources);

        assert_eq!(paths, vec![data.join("101736545.geojson")]);
    }

    #[test]
    fn file_list_skips_blank_and_comment_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let list = temp.path().join("files.txt");
        std::fs::write(&list, "a.geojson\n\n# comment\n  b.geojson  \n").expect("write");

        let sources = vec![list.to_string_lossy().to_string()];
        let paths = discover(IteratorMode::FileList, &sources);

        assert_eq!(paths, vec![PathBuf::from("a.geojson"), PathBuf::from("b.geojson")]);
    }
}
