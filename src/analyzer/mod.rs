//! File discovery and per-file rule evaluation
//!
//! CDD Principle: Domain Services - Analyzer turns paths into a ValidationReport
//! - Directories are walked and explicit files kept by extension, then both pass the PathFilter
//! - Every file is parsed into its own Document and evaluated with its own IssueSink
//! - Unreadable or malformed files are skipped and counted unless fail_fast is set

pub mod path_filter;
pub mod xml;

pub use path_filter::PathFilter;

use crate::analyzer::xml::XmlAnalyzer;
use crate::config::GuardianConfig;
use crate::domain::violations::{GuardianError, GuardianResult, ValidationReport, Violation};
use crate::rules::RuleSet;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Runs the configured rule set over XML files on disk
pub struct Analyzer {
    config: GuardianConfig,
    path_filter: PathFilter,
    xml_analyzer: XmlAnalyzer,
}

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Evaluate files on the rayon pool
    pub parallel: bool,
    /// Cap on discovered files, applied after filtering
    pub max_files: Option<usize>,
    /// Abort on the first file that cannot be read or parsed
    pub fail_fast: bool,
    /// Extra exclude patterns for this run only
    pub exclude_patterns: Vec<String>,
    /// Skip `.guardianignore` lookups
    pub ignore_ignore_files: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_files: None,
            fail_fast: false,
            exclude_patterns: Vec::new(),
            ignore_ignore_files: false,
        }
    }
}

/// Outcome of analyzing one file
enum FileOutcome {
    Analyzed(Vec<Violation>),
    Skipped,
}

impl Analyzer {
    /// Create a new analyzer with the given configuration
    pub fn new(config: GuardianConfig) -> GuardianResult<Self> {
        let rules = RuleSet::from_config(&config)?;

        let ignore_file = if config.paths.ignore_file.as_deref() == Some("") {
            None
        } else {
            config.paths.ignore_file.clone()
        };

        let path_filter = PathFilter::new(config.paths.patterns.clone(), ignore_file)
            .map_err(|e| GuardianError::config(format!("Failed to create path filter: {e}")))?
            .with_extensions(&config.paths.extensions);

        let xml_analyzer = XmlAnalyzer::new(rules).with_extensions(config.paths.extensions.clone());

        tracing::debug!(
            "Analyzer ready with {} rules for extensions {:?}",
            xml_analyzer.rules().len(),
            config.paths.extensions
        );

        Ok(Self {
            config,
            path_filter,
            xml_analyzer,
        })
    }

    /// Create an analyzer with default configuration
    pub fn with_defaults() -> GuardianResult<Self> {
        Self::new(GuardianConfig::default())
    }

    /// The rules this analyzer evaluates
    pub fn rules(&self) -> &RuleSet {
        self.xml_analyzer.rules()
    }

    /// Analyze a single file and return violations.
    ///
    /// Files excluded by the path filter yield no violations. Unreadable or
    /// malformed files are analysis errors.
    pub fn analyze_file<P: AsRef<Path>>(&self, file_path: P) -> GuardianResult<Vec<Violation>> {
        let file_path = file_path.as_ref();

        if !self.should_analyze(file_path)? {
            return Ok(Vec::new());
        }

        self.read_and_analyze(file_path)
    }

    /// Whether the configured path filter lets `file_path` through
    pub fn should_analyze(&self, file_path: &Path) -> GuardianResult<bool> {
        self.path_filter.should_analyze(file_path)
    }

    /// Read and evaluate a file that already passed filtering
    fn read_and_analyze(&self, file_path: &Path) -> GuardianResult<Vec<Violation>> {
        let content = fs::read_to_string(file_path).map_err(|e| {
            GuardianError::analysis(
                file_path.display().to_string(),
                format!("Failed to read file: {e}"),
            )
        })?;

        self.analyze_content(file_path, &content)
    }

    /// Analyze in-memory content as if it were read from `file_path`
    pub fn analyze_content(
        &self,
        file_path: &Path,
        content: &str,
    ) -> GuardianResult<Vec<Violation>> {
        self.xml_analyzer.analyze(file_path, content).map_err(|e| match e {
            GuardianError::Analysis { .. } => e,
            other => GuardianError::analysis(file_path.display().to_string(), other.to_string()),
        })
    }

    /// Analyze multiple files and return a complete validation report
    pub fn analyze_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> GuardianResult<ValidationReport> {
        let start_time = Instant::now();
        let mut report = ValidationReport::new();

        let mut path_filter = self.path_filter.clone();
        if options.ignore_ignore_files {
            path_filter = path_filter.without_ignore_files();
        }
        for pattern in &options.exclude_patterns {
            path_filter.add_pattern(pattern)?;
        }

        let mut files_to_analyze = Vec::new();
        for path in paths {
            let path = path.as_ref();

            if path.is_file() {
                if self.xml_analyzer.handles_file(path) {
                    files_to_analyze.push(path.to_path_buf());
                } else {
                    tracing::debug!("Skipping {}: not an XML file", path.display());
                }
            } else if path.is_dir() {
                files_to_analyze.extend(path_filter.find_files(path)?);
            } else {
                tracing::warn!("Skipping {}: no such file or directory", path.display());
            }
        }

        files_to_analyze = path_filter.filter_paths(&files_to_analyze)?;

        if let Some(max_files) = options.max_files {
            files_to_analyze.truncate(max_files);
        }

        let total_files = files_to_analyze.len();

        let outcomes = if options.parallel && files_to_analyze.len() > 1 {
            self.analyze_files_parallel(&files_to_analyze, options)?
        } else {
            self.analyze_files_sequential(&files_to_analyze, options)?
        };

        let mut skipped = 0;
        for outcome in outcomes {
            match outcome {
                FileOutcome::Analyzed(violations) => {
                    for violation in violations {
                        report.add_violation(violation);
                    }
                }
                FileOutcome::Skipped => skipped += 1,
            }
        }

        report.set_files_analyzed(total_files);
        report.set_files_skipped(skipped);
        report.set_execution_time(start_time.elapsed().as_millis() as u64);
        report.set_config_fingerprint(self.config.fingerprint());
        report.sort_violations();

        tracing::info!(
            "Analyzed {} files ({} skipped), {} violations",
            total_files,
            skipped,
            report.violations.len()
        );

        Ok(report)
    }

    /// Analyze one file, turning its failure into a skip unless failing fast
    fn analyze_one(
        &self,
        file_path: &Path,
        options: &AnalysisOptions,
    ) -> GuardianResult<FileOutcome> {
        match self.read_and_analyze(file_path) {
            Ok(violations) => Ok(FileOutcome::Analyzed(violations)),
            Err(e) if options.fail_fast => Err(e),
            Err(e) => {
                tracing::warn!("Failed to analyze {}: {}", file_path.display(), e);
                Ok(FileOutcome::Skipped)
            }
        }
    }

    fn analyze_files_sequential(
        &self,
        files: &[PathBuf],
        options: &AnalysisOptions,
    ) -> GuardianResult<Vec<FileOutcome>> {
        files
            .iter()
            .map(|file_path| self.analyze_one(file_path, options))
            .collect()
    }

    /// Analyze files in parallel; results keep the input order
    fn analyze_files_parallel(
        &self,
        files: &[PathBuf],
        options: &AnalysisOptions,
    ) -> GuardianResult<Vec<FileOutcome>> {
        files
            .par_iter()
            .map(|file_path| self.analyze_one(file_path, options))
            .collect()
    }

    /// Analyze a directory tree and return a validation report
    pub fn analyze_directory<P: AsRef<Path>>(
        &self,
        root: P,
        options: &AnalysisOptions,
    ) -> GuardianResult<ValidationReport> {
        self.analyze_paths(&[root.as_ref()], options)
    }

    /// Get configuration fingerprint recorded in reports
    pub fn config_fingerprint(&self) -> String {
        self.config.fingerprint()
    }

    /// Get statistics about the configured rules
    pub fn rule_stats(&self) -> RuleStats {
        let mut stats = RuleStats::default();

        for rule in self.rules().rules() {
            stats.enabled_rules += 1;
            if rule.metadata().severity.is_blocking() {
                stats.blocking_rules += 1;
            }
        }

        let configured_custom = self
            .config
            .custom_rules
            .iter()
            .map(|rule| rule.key.as_str());
        stats.disabled_rules = crate::rules::BUILTIN_RULE_KEYS
            .iter()
            .copied()
            .chain(configured_custom)
            .filter(|key| self.rules().get(key).is_none())
            .count();

        stats
    }
}

/// Statistics about configured rules
#[derive(Debug, Default)]
pub struct RuleStats {
    pub enabled_rules: usize,
    pub disabled_rules: usize,
    /// Enabled rules whose violations fail a run
    pub blocking_rules: usize,
}

impl RuleStats {
    pub fn total_rules(&self) -> usize {
        self.enabled_rules + self.disabled_rules
    }
}

/// Turns the content of one file into violations
pub trait FileAnalyzer {
    fn analyze(&self, file_path: &Path, content: &str) -> GuardianResult<Vec<Violation>>;

    /// Whether `file_path` has a format this analyzer understands
    fn handles_file(&self, file_path: &Path) -> bool;
}
