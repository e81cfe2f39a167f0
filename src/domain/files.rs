//! Changed-file metadata and the testable-file filter.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One file touched by a pull request, as reported by the code host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Repository-relative path
    pub path: String,

    /// Change status ("added", "modified", "removed", ...)
    pub status: String,

    /// Unified diff hunk for this file, when the code host provides one
    pub patch: Option<String>,
}

impl ChangedFile {
    /// File name component of the path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A changed file with its full current content, ready for generation.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    pub patch: Option<String>,
}

/// Selects the files worth generating tests for.
///
/// A candidate must carry a recognized source extension, must not match any
/// exclusion pattern (test/spec/config naming conventions), and must not be
/// a removal.
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: Vec<String>,
    exclude: Vec<Pattern>,
}

/// Extensions the generator knows how to write tests for.
pub const DEFAULT_EXTENSIONS: &[&str] = &["cs", "js", "ts", "jsx", "tsx", "py", "java"];

/// Name shapes that are already tests or plumbing, never inputs.
pub const DEFAULT_EXCLUDES: &[&str] = &["*test*", "*spec*", "*.config.*"];

impl FileFilter {
    /// Build a filter from extension and glob-pattern lists.
    ///
    /// Invalid patterns are skipped with a warning rather than failing
    /// startup.
    pub fn new(extensions: &[String], exclude_globs: &[String]) -> Self {
        let extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        let exclude = exclude_globs
            .iter()
            .filter_map(|g| match Pattern::new(&g.to_ascii_lowercase()) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(pattern = %g, error = %e, "Ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            extensions,
            exclude,
        }
    }

    /// Check a single changed file against the filter rules.
    pub fn is_candidate(&self, file: &ChangedFile) -> bool {
        if file.status == "removed" {
            return false;
        }

        let lower = file.path.to_ascii_lowercase();
        let has_extension = self
            .extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext)));
        if !has_extension {
            return false;
        }

        !self.exclude.iter().any(|p| p.matches(&lower))
    }

    /// Keep only the files worth generating tests for.
    pub fn filter(&self, files: Vec<ChangedFile>) -> Vec<ChangedFile> {
        files.into_iter().filter(|f| self.is_candidate(f)).collect()
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(
            &DEFAULT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
            &DEFAULT_EXCLUDES
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        )
    }
}
