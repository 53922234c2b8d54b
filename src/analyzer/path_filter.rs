//! Path filtering using .gitignore-style patterns
//!
//! Architectural Principle: Service Layer - PathFilter orchestrates complex path matching logic
//! - Encapsulates the rules for include/exclude pattern evaluation
//! - Restricts directory discovery to the configured file extensions
//! - Handles .guardianignore file discovery and parsing

use crate::domain::violations::{GuardianError, GuardianResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Manages path filtering using .gitignore-style patterns
#[derive(Debug, Clone)]
pub struct PathFilter {
    /// Include/exclude patterns
    patterns: Vec<FilterPattern>,
    /// Whether to process .guardianignore files
    process_ignore_files: bool,
    /// Name of ignore files to process
    ignore_filename: String,
    /// Extensions accepted during directory discovery, lower-cased
    extensions: Vec<String>,
}

/// A single path filter pattern
#[derive(Debug, Clone)]
struct FilterPattern {
    pattern: glob::Pattern,
    /// Re-includes matching paths (pattern started with `!`)
    is_include: bool,
    /// Pattern text without the `!`, used for the .gitignore slash rules
    source: String,
    /// Pattern ended with `/`: matches directories and everything below them
    directory_only: bool,
}

impl FilterPattern {
    fn parse(source: &str) -> Result<Self, glob::PatternError> {
        let (is_include, pattern_str) = match source.strip_prefix('!') {
            Some(stripped) => (true, stripped),
            None => (false, source),
        };
        let glob_str = pattern_str.trim_start_matches('/').trim_end_matches('/');

        Ok(Self {
            pattern: glob::Pattern::new(glob_str)?,
            is_include,
            source: pattern_str.to_string(),
            directory_only: pattern_str.ends_with('/'),
        })
    }

    /// Match using .gitignore-style rules
    fn matches(&self, path: &Path) -> bool {
        if self.directory_only {
            // a file is covered when any directory above it matches
            let skip = usize::from(!path.is_dir());
            return path
                .ancestors()
                .skip(skip)
                .any(|dir| self.matches_entry(dir));
        }

        self.matches_entry(path)
    }

    fn matches_entry(&self, path: &Path) -> bool {
        if self.source.trim_end_matches('/').contains('/') {
            self.pattern.matches_path(path)
        } else {
            // no slash: match the file name only
            path.file_name()
                .is_some_and(|name| self.pattern.matches(&name.to_string_lossy()))
        }
    }
}

impl PathFilter {
    /// Create a new path filter with the given patterns
    pub fn new(patterns: Vec<String>, ignore_filename: Option<String>) -> GuardianResult<Self> {
        let patterns = patterns
            .iter()
            .map(|source| {
                FilterPattern::parse(source).map_err(|e| {
                    GuardianError::config(format!("Invalid path pattern '{source}': {e}"))
                })
            })
            .collect::<GuardianResult<Vec<_>>>()?;

        Ok(Self {
            patterns,
            process_ignore_files: ignore_filename.is_some(),
            ignore_filename: ignore_filename.unwrap_or_else(|| ".guardianignore".to_string()),
            extensions: vec!["xml".to_string()],
        })
    }

    /// Create a default path filter with sensible exclusions
    pub fn with_defaults() -> GuardianResult<Self> {
        Self::new(
            vec![
                "**/target/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
            ],
            Some(".guardianignore".to_string()),
        )
    }

    /// Restrict directory discovery to these extensions (compared case-insensitively)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Stop consulting ignore files
    pub fn without_ignore_files(mut self) -> Self {
        self.process_ignore_files = false;
        self
    }

    /// Check if a file should be analyzed based on all patterns and ignore files
    pub fn should_analyze<P: AsRef<Path>>(&self, path: P) -> GuardianResult<bool> {
        let path = path.as_ref();

        // Apply patterns in order (like .gitignore), last match wins
        let mut should_include = true;
        for pattern in &self.patterns {
            if pattern.matches(path) {
                should_include = pattern.is_include;
            }
        }

        if !should_include {
            return Ok(false);
        }

        if self.process_ignore_files && self.is_ignored_by_files(path)? {
            return Ok(false);
        }

        Ok(true)
    }

    /// Whether the extension allow-list accepts this file
    pub fn has_allowed_extension<P: AsRef<Path>>(&self, path: P) -> bool {
        let Some(ext) = path.as_ref().extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    /// Check if path is ignored by .guardianignore files
    fn is_ignored_by_files(&self, path: &Path) -> GuardianResult<bool> {
        let mut current_dir = path.parent();
        let mut is_ignored = false;

        // Walk up the directory tree looking for .guardianignore files
        while let Some(dir) = current_dir {
            let ignore_file = dir.join(&self.ignore_filename);

            if ignore_file.is_file() {
                if let Ok(relative_path) = path.strip_prefix(dir) {
                    for pattern in self.load_ignore_file(&ignore_file)? {
                        if pattern.matches(relative_path) {
                            is_ignored = !pattern.is_include;
                        }
                    }
                }
            }

            current_dir = dir.parent();
        }

        Ok(is_ignored)
    }

    /// Load patterns from a .guardianignore file
    fn load_ignore_file(&self, path: &Path) -> GuardianResult<Vec<FilterPattern>> {
        let content = fs::read_to_string(path).map_err(|e| {
            GuardianError::config(format!(
                "Failed to read ignore file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut patterns = Vec::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match FilterPattern::parse(line) {
                Ok(pattern) => patterns.push(pattern),
                // Invalid lines are skipped, not fatal
                Err(e) => {
                    tracing::warn!("Invalid pattern '{}' in {}: {}", line, path.display(), e);
                }
            }
        }

        Ok(patterns)
    }

    /// Get all files with an allowed extension that should be analyzed in a directory tree
    pub fn find_files<P: AsRef<Path>>(&self, root: P) -> GuardianResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root.as_ref())
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file()
                && self.has_allowed_extension(path)
                && self.should_analyze(path)?
            {
                files.push(path.to_path_buf());
            }
        }

        tracing::debug!(
            "Discovered {} files under {}",
            files.len(),
            root.as_ref().display()
        );
        Ok(files)
    }

    /// Filter a list of paths to only those that should be analyzed
    pub fn filter_paths<P: AsRef<Path>>(&self, paths: &[P]) -> GuardianResult<Vec<PathBuf>> {
        let mut filtered = Vec::new();

        for path in paths {
            if self.should_analyze(path)? {
                filtered.push(path.as_ref().to_path_buf());
            }
        }

        Ok(filtered)
    }

    /// Add a pattern to the filter
    pub fn add_pattern(&mut self, pattern: &str) -> GuardianResult<()> {
        let parsed = FilterPattern::parse(pattern)
            .map_err(|e| GuardianError::config(format!("Invalid path pattern '{pattern}': {e}")))?;
        self.patterns.push(parsed);
        Ok(())
    }
}
