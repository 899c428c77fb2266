//! Finding files a tool asked for

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::FileAccessConfig;
use crate::types::{keys, ToolOutput};

/// Directories never searched
const SKIP_DIRS: &[&str] = &["target", "node_modules", ".git"];

/// Where a gathered file list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    NextCall,
    Glob,
    SessionCache,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatheredFiles {
    /// Sorted, de-duplicated
    pub files: Vec<String>,
    pub source: Option<FileSource>,
}

impl GatheredFiles {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Sorted, de-duplicated copy of a file list
pub fn normalize_files<I, S>(files: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    files
        .into_iter()
        .map(|f| f.as_ref().trim().to_string())
        .filter(|f| !f.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Resolves a files-required result into concrete paths
///
/// Sources are tried in order and the first non-empty one wins: files named
/// in the tool's next call, glob expansion inside the allowed roots, then
/// the files remembered by the session cache.
#[derive(Debug, Clone)]
pub struct FileGatherer {
    config: FileAccessConfig,
}

impl FileGatherer {
    pub fn new(config: FileAccessConfig) -> Self {
        Self { config }
    }

    pub fn gather(&self, output: &ToolOutput, session_files: &[String]) -> GatheredFiles {
        let explicit = output
            .next_call
            .as_ref()
            .and_then(|next| next.arguments.get(keys::FILES))
            .and_then(|v| v.as_array())
            .map(|items| normalize_files(items.iter().filter_map(|v| v.as_str())))
            .unwrap_or_default();
        if !explicit.is_empty() {
            return GatheredFiles {
                files: explicit,
                source: Some(FileSource::NextCall),
            };
        }

        let expanded = self.expand(&output.files_needed);
        if !expanded.is_empty() {
            return GatheredFiles {
                files: expanded,
                source: Some(FileSource::Glob),
            };
        }

        let cached = normalize_files(session_files);
        if !cached.is_empty() {
            return GatheredFiles {
                files: cached,
                source: Some(FileSource::SessionCache),
            };
        }

        GatheredFiles::default()
    }

    /// Expand patterns inside the allowed roots, capped at `max_glob_matches`
    pub fn expand(&self, patterns: &[String]) -> Vec<String> {
        let roots: Vec<PathBuf> = self
            .config
            .allowed_roots
            .iter()
            .filter_map(|r| r.canonicalize().ok())
            .collect();
        if roots.is_empty() || patterns.is_empty() {
            return vec![];
        }

        let limit = self.config.max_glob_matches;
        let mut found = BTreeSet::new();

        for pattern in patterns {
            if let Some(path) = literal_within(pattern, &roots) {
                found.insert(path);
            }
        }

        if let Some(globs) = build_globset(patterns) {
            'roots: for root in &roots {
                let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|e| {
                    !(e.depth() > 0
                        && e.file_type().is_dir()
                        && SKIP_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
                });
                for entry in walker {
                    if found.len() >= limit {
                        break 'roots;
                    }
                    let Ok(entry) = entry else { continue };
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                    if globs.is_match(rel) || globs.is_match(entry.path()) {
                        found.insert(entry.path().display().to_string());
                    }
                }
            }
        }

        found.into_iter().take(limit).collect()
    }
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut any = false;
    for pattern in patterns {
        if let Ok(glob) = GlobBuilder::new(pattern).literal_separator(false).build() {
            builder.add(glob);
            any = true;
        }
    }
    if !any {
        return None;
    }
    builder.build().ok()
}

/// An existing file named literally, if it lies inside an allowed root
fn literal_within(pattern: &str, roots: &[PathBuf]) -> Option<String> {
    let candidate = Path::new(pattern);
    if !candidate.is_absolute() {
        return None;
    }
    let resolved = candidate.canonicalize().ok()?;
    if resolved.is_file() && roots.iter().any(|root| resolved.starts_with(root)) {
        Some(resolved.display().to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NextCall;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn gatherer(roots: Vec<PathBuf>, max: usize) -> FileGatherer {
        FileGatherer::new(FileAccessConfig {
            allowed_roots: roots,
            max_glob_matches: max,
            max_file_rounds: 3,
        })
    }

    #[test]
    fn normalizes() {
        assert_eq!(normalize_files(["b", "a", " b ", ""]), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn next_call_files_win() {
        let mut output = ToolOutput::files_required(vec!["**/*.rs".into()]);
        output.next_call = Some(NextCall {
            tool: None,
            arguments: json!({"files": ["/x/b.rs", "/x/a.rs"]}).as_object().unwrap().clone(),
        });
        let gathered = gatherer(vec![], 10).gather(&output, &["/cached.rs".to_string()]);
        assert_eq!(gathered.files, vec!["/x/a.rs", "/x/b.rs"]);
        assert_eq!(gathered.source, Some(FileSource::NextCall));
    }

    #[test]
    fn globs_stay_inside_allowed_roots() {
        let allowed = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::create_dir_all(allowed.path().join("src")).unwrap();
        fs::create_dir_all(allowed.path().join("target")).unwrap();
        fs::write(allowed.path().join("src/lib.rs"), "").unwrap();
        fs::write(allowed.path().join("src/main.rs"), "").unwrap();
        fs::write(allowed.path().join("target/gen.rs"), "").unwrap();
        fs::write(allowed.path().join("README.md"), "").unwrap();
        let secret = outside.path().join("secret.rs");
        fs::write(&secret, "").unwrap();

        let g = gatherer(vec![allowed.path().to_path_buf()], 10);
        let found = g.expand(&["**/*.rs".into(), secret.display().to_string()]);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|f| f.ends_with("lib.rs") || f.ends_with("main.rs")));

        let capped = gatherer(vec![allowed.path().to_path_buf()], 1).expand(&["**/*".into()]);
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn falls_back_to_session_files() {
        let output = ToolOutput::files_required(vec!["missing.rs".into()]);
        let gathered = gatherer(vec![], 10).gather(&output, &["/cached.rs".to_string()]);
        assert_eq!(gathered.source, Some(FileSource::SessionCache));

        let nothing = gatherer(vec![], 10).gather(&output, &[]);
        assert!(nothing.is_empty());
        assert_eq!(nothing.source, None);
    }
}
