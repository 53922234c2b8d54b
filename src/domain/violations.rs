//! Severities, file-level violations and validation reports
//!
//! Architecture: Rich Domain Models - Violations are entities with behavior, not just data
//! - A Violation is an Issue placed in a file and graded by its rule's severity
//! - ValidationReport acts as an aggregate root managing collections of violations
//! - GuardianError is the single error type shared by every layer of the crate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity levels for rule violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    /// Fails `check` with exit code 1
    Error,
}

impl Severity {
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A rule violation located in a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Key of the reporting rule
    pub rule_id: String,
    pub severity: Severity,
    pub file_path: PathBuf,
    /// 1-based position of the start tag of the offending element
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
    pub message: String,
    /// The trimmed source line holding the start tag
    pub context: Option<String>,
    /// Markup the rule proposes, e.g. `scope="..."`
    pub suggested_fix: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl Violation {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        file_path: PathBuf,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            file_path,
            line_number: None,
            column_number: None,
            message: message.into(),
            context: None,
            suggested_fix: None,
            detected_at: Utc::now(),
        }
    }

    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line_number = Some(line);
        self.column_number = Some(column);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_fix = Some(suggestion.into());
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }

    /// `path:line:col [severity] rule: message`, as printed by the compact human format
    pub fn format_display(&self) -> String {
        let mut out = self.file_path.display().to_string();
        if let Some(line) = self.line_number {
            out.push_str(&format!(":{line}"));
            if let Some(column) = self.column_number {
                out.push_str(&format!(":{column}"));
            }
        }
        format!(
            "{out} [{}] {}: {}",
            self.severity.as_str(),
            self.rule_id,
            self.message
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// Files parsed and evaluated
    pub total_files: usize,
    /// Files that could not be read or parsed
    pub skipped_files: usize,
    pub violations_by_severity: ViolationCounts,
    pub execution_time_ms: u64,
    pub validated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl ViolationCounts {
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    pub fn has_blocking(&self) -> bool {
        self.error > 0
    }

    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Violations of one `check` run plus the counters the formatters print
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub summary: ValidationSummary,
    /// Hash of the configuration the rules were built from
    pub config_fingerprint: Option<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
            summary: ValidationSummary {
                validated_at: Utc::now(),
                ..Default::default()
            },
            config_fingerprint: None,
        }
    }

    pub fn add_violation(&mut self, violation: Violation) {
        self.summary.violations_by_severity.add(violation.severity);
        self.violations.push(violation);
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Whether any violation is blocking
    pub fn has_errors(&self) -> bool {
        self.summary.violations_by_severity.has_blocking()
    }

    pub fn violations_for_rule<'a>(
        &'a self,
        rule_id: &'a str,
    ) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| v.rule_id == rule_id)
    }

    pub fn set_files_analyzed(&mut self, count: usize) {
        self.summary.total_files = count;
    }

    pub fn set_files_skipped(&mut self, count: usize) {
        self.summary.skipped_files = count;
    }

    pub fn set_execution_time(&mut self, duration_ms: u64) {
        self.summary.execution_time_ms = duration_ms;
    }

    pub fn set_config_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.config_fingerprint = Some(fingerprint.into());
    }

    /// Sort violations by file path and position for consistent output.
    ///
    /// The sort is stable: violations at the same position keep the order in
    /// which the rules reported them.
    pub fn sort_violations(&mut self) {
        let position = |v: &Violation| (v.line_number.unwrap_or(0), v.column_number.unwrap_or(0));
        self.violations.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| position(a).cmp(&position(b)))
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Every failure the crate reports, from config loading to markup parsing
#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Markup could not be tokenized
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        line: u32,
        column: u32,
        message: String,
    },

    /// Markup was tokenized but does not form a single well-formed tree
    #[error("Malformed document: {message}")]
    Document { message: String },

    /// Path query could not be compiled
    #[error("Query error at offset {offset}: {message}")]
    Query { message: String, offset: usize },

    /// Analysis failed for a specific file
    #[error("Analysis error in {file}: {message}")]
    Analysis { file: String, message: String },
}

impl GuardianError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn parse(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn document(message: impl Into<String>) -> Self {
        Self::Document {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>, offset: usize) -> Self {
        Self::Query {
            message: message.into(),
            offset,
        }
    }

    pub fn analysis(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analysis {
            file: file.into(),
            message: message.into(),
        }
    }
}

pub type GuardianResult<T> = Result<T, GuardianError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_violation_creation() {
        let violation = Violation::new(
            "SpringBeanScope",
            Severity::Error,
            PathBuf::from("conf/beans.xml"),
            "Test message",
        );

        assert_eq!(violation.rule_id, "SpringBeanScope");
        assert_eq!(violation.severity, Severity::Error);
        assert_eq!(violation.file_path, Path::new("conf/beans.xml"));
        assert_eq!(violation.message, "Test message");
        assert!(violation.is_blocking());
    }

    #[test]
    fn test_violation_with_position() {
        let violation = Violation::new(
            "SpringBeanScope",
            Severity::Warning,
            PathBuf::from("conf/beans.xml"),
            "Test message",
        )
        .with_position(42, 15)
        .with_context("<bean id=\"pool\"/>");

        assert_eq!(violation.line_number, Some(42));
        assert_eq!(violation.column_number, Some(15));
        assert_eq!(violation.context.as_deref(), Some("<bean id=\"pool\"/>"));
        assert!(!violation.is_blocking());
        assert_eq!(
            violation.format_display(),
            "conf/beans.xml:42:15 [warning] SpringBeanScope: Test message"
        );
    }

    #[test]
    fn test_validation_report() {
        let mut report = ValidationReport::new();

        report.add_violation(Violation::new(
            "rule1",
            Severity::Error,
            PathBuf::from("a.xml"),
            "Error message",
        ));
        report.add_violation(Violation::new(
            "rule2",
            Severity::Warning,
            PathBuf::from("b.xml"),
            "Warning message",
        ));

        assert!(report.has_violations());
        assert!(report.has_errors());
        assert_eq!(report.summary.violations_by_severity.total(), 2);
        assert_eq!(report.summary.violations_by_severity.error, 1);
        assert_eq!(report.summary.violations_by_severity.warning, 1);
        assert_eq!(report.violations_for_rule("rule2").count(), 1);
    }

    #[test]
    fn test_sort_keeps_rule_order_on_same_position() {
        let mut report = ValidationReport::new();
        let file = PathBuf::from("beans.xml");

        report.add_violation(
            Violation::new("B", Severity::Error, file.clone(), "later")
                .with_position(3, 5),
        );
        report.add_violation(
            Violation::new("A", Severity::Warning, file.clone(), "first")
                .with_position(1, 8),
        );
        report.add_violation(
            Violation::new("B", Severity::Error, file.clone(), "second")
                .with_position(1, 8),
        );

        report.sort_violations();

        let messages: Vec<_> = report
            .violations
            .iter()
            .map(|v| v.message.as_str())
            .collect();
        assert_eq!(messages, vec!["first", "second", "later"]);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert!(Severity::Error.is_blocking());
        assert!(!Severity::Warning.is_blocking());
    }

    #[test]
    fn test_error_display() {
        let err = GuardianError::parse(3, 7, "unexpected end of file");
        assert_eq!(
            err.to_string(),
            "Parse error at 3:7: unexpected end of file"
        );

        let err = GuardianError::query("expected a name", 4);
        assert_eq!(err.to_string(), "Query error at offset 4: expected a name");
    }
}
