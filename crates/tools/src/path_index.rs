//! Fuzzy path correction.
//!
//! Models often get a relative path almost right: a missing extension, a
//! singular/plural slip, a wrong directory level. The index walks the
//! workspace and picks the file whose path is most similar to the
//! candidate by normalised edit distance.

use async_trait::async_trait;
use codewright_core::workspace::PathAdjuster;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::search::is_skipped_dir;

pub struct FuzzyPathIndex {
    root: PathBuf,
}

impl FuzzyPathIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Workspace-relative file paths, `/`-separated.
fn index_files(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path().strip_prefix(root).ok().map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
        })
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// 1.0 for identical strings, 0.0 for nothing in common.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if dot > path.rfind('/').map_or(0, |s| s + 1) => &path[..dot],
        _ => path,
    }
}

/// Best-scoring file for `candidate`. Extensionless candidates are also
/// compared against files with their extension dropped.
fn best_match<'a>(files: &'a [String], candidate: &str) -> Option<(&'a str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for file in files {
        let score = similarity(candidate, file).max(similarity(candidate, strip_extension(file)));
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((file, score));
        }
    }
    best
}

fn relative_candidate(root: &Path, candidate: &str) -> String {
    let path = Path::new(candidate);
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = rel.to_string_lossy().replace('\\', "/");
    rel.trim_start_matches("./").to_string()
}

#[async_trait]
impl PathAdjuster for FuzzyPathIndex {
    async fn adjust_path(&self, candidate: &str, threshold: f64) -> Option<PathBuf> {
        let root = self.root.clone();
        let wanted = relative_candidate(&self.root, candidate);

        let found = tokio::task::spawn_blocking(move || {
            let files = index_files(&root);
            best_match(&files, &wanted).map(|(f, s)| (f.to_string(), s))
        })
        .await;

        match found {
            Ok(Some((file, score))) if score >= threshold => {
                debug!(candidate, file = %file, score, "Path match");
                Some(self.root.join(file))
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Path index task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert!((similarity("kitten", "sitting") - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn strip_extension_only_touches_file_name() {
        assert_eq!(strip_extension("src/utils/format.ts"), "src/utils/format");
        assert_eq!(strip_extension("src/v1.2/readme"), "src/v1.2/readme");
        assert_eq!(strip_extension(".gitignore"), ".gitignore");
    }

    #[test]
    fn extensionless_candidate_matches_exactly() {
        let files = vec!["src/app.ts".to_string(), "src/utils/format.ts".to_string()];
        let (file, score) = best_match(&files, "src/utils/format").unwrap();
        assert_eq!(file, "src/utils/format.ts");
        assert_eq!(score, 1.0);
    }

    #[tokio::test]
    async fn adjusts_near_miss_within_threshold() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/utils")).unwrap();
        std::fs::write(dir.path().join("src/utils/format.ts"), "").unwrap();

        let index = FuzzyPathIndex::new(dir.path());
        let found = index.adjust_path("src/util/format.ts", 0.6).await;
        assert_eq!(found, Some(dir.path().join("src/utils/format.ts")));

        assert_eq!(index.adjust_path("lib/other/thing.py", 0.9).await, None);
    }

    #[tokio::test]
    async fn absolute_candidate_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "").unwrap();

        let index = FuzzyPathIndex::new(dir.path());
        let candidate = dir.path().join("mian.rs");
        let found = index
            .adjust_path(&candidate.to_string_lossy(), 0.5)
            .await;
        assert_eq!(found, Some(dir.path().join("main.rs")));
    }
}
