//! XML Guardian - structural rule checks for XML configuration files
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Document model, path queries and rules form a pure core with no I/O
//! - Parsing, file discovery and reporting are adapters around that core
//! - GuardianValidator bundles them into validation workflows for hosts and the CLI

pub mod analyzer;
pub mod config;
pub mod domain;
pub mod query;
pub mod report;
pub mod rules;

// Re-export main types for convenient access
pub use domain::document::{Document, DocumentBuilder, ElementRef, Location, NodeId};
pub use domain::issues::{Issue, IssueSink};
pub use domain::violations::{
    GuardianError, GuardianResult, Severity, ValidationReport, ValidationSummary, Violation,
};

pub use config::{ConfigBuilder, CustomRule, CustomRuleKind, GuardianConfig, RuleSetting};

pub use analyzer::xml::parse_document;
pub use analyzer::{AnalysisOptions, Analyzer, RuleStats};

pub use query::PathQuery;

pub use report::{OutputFormat, ReportFormatter, ReportOptions};

pub use rules::{default_rules, Rule, RuleMetadata, RuleSet};

use std::path::Path;

/// Evaluate the built-in Spring rules against a document.
///
/// Issues come out rule by rule (reconnect-on-exception first, then bean
/// scope) and in document order within each rule.
pub fn evaluate(document: &Document) -> Vec<Issue> {
    default_rules().evaluate(document)
}

/// Main Guardian validator providing high-level validation operations
pub struct GuardianValidator {
    analyzer: Analyzer,
    report_formatter: ReportFormatter,
}

impl GuardianValidator {
    /// Create a new validator with the given configuration
    pub fn new_with_config(config: GuardianConfig) -> GuardianResult<Self> {
        let analyzer = Analyzer::new(config)?;
        Ok(Self {
            analyzer,
            report_formatter: ReportFormatter::default(),
        })
    }

    /// Create a validator with default configuration
    pub fn new() -> GuardianResult<Self> {
        Self::new_with_config(GuardianConfig::default())
    }

    /// Create a validator loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> GuardianResult<Self> {
        let config = GuardianConfig::load_from_file(path)?;
        Self::new_with_config(config)
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    /// Validate a single file; a file excluded by the path filter yields an empty report
    pub fn validate_file<P: AsRef<Path>>(&self, file_path: P) -> GuardianResult<ValidationReport> {
        let file_path = file_path.as_ref();
        let fingerprint = self.analyzer.config_fingerprint();

        if !self.analyzer.should_analyze(file_path)? {
            tracing::debug!("{} is excluded by the path filter", file_path.display());
            let mut report = ValidationReport::new();
            report.set_config_fingerprint(fingerprint);
            return Ok(report);
        }

        let violations = self.analyzer.analyze_file(file_path)?;
        Ok(Self::single_file_report(violations, fingerprint))
    }

    /// Validate in-memory content under a display name
    pub fn validate_str(&self, name: &str, content: &str) -> GuardianResult<ValidationReport> {
        let violations = self.analyzer.analyze_content(Path::new(name), content)?;
        let fingerprint = self.analyzer.config_fingerprint();
        Ok(Self::single_file_report(violations, fingerprint))
    }

    /// Validate files and directory trees
    pub fn validate_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> GuardianResult<ValidationReport> {
        self.analyzer.analyze_paths(paths, options)
    }

    /// Format a validation report for output
    pub fn format_report(
        &self,
        report: &ValidationReport,
        format: OutputFormat,
    ) -> GuardianResult<String> {
        self.report_formatter.format_report(report, format)
    }

    /// The rules this validator runs
    pub fn rules(&self) -> &RuleSet {
        self.analyzer.rules()
    }

    /// Get rule statistics
    pub fn rule_statistics(&self) -> RuleStats {
        self.analyzer.rule_stats()
    }

    fn single_file_report(violations: Vec<Violation>, fingerprint: String) -> ValidationReport {
        let mut report = ValidationReport::new();
        for violation in violations {
            report.add_violation(violation);
        }
        report.set_files_analyzed(1);
        report.set_config_fingerprint(fingerprint);
        report.sort_violations();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SCF: &str = "org.springframework.jms.connection.SingleConnectionFactory";

    fn rule_keys(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(Issue::rule_key).collect()
    }

    #[test]
    fn test_bare_factory_bean_fails_both_rules() {
        let doc = parse_document(&format!(r#"<beans><bean class="{SCF}"/></beans>"#)).unwrap();
        let issues = evaluate(&doc);

        assert_eq!(
            rule_keys(&issues),
            vec!["SpringReconnectOnException", "SpringBeanScope"]
        );
        assert_eq!(issues[0].element(), issues[1].element());
        assert_eq!(
            issues[0].message(),
            "Add a \"reconnectOnException\" property, set to \"true\""
        );
        assert_eq!(
            issues[1].message(),
            "This bean does not have a scope. Scope is mandatory for every bean"
        );
    }

    #[test]
    fn test_compliant_factory_bean() {
        let doc = parse_document(&format!(
            r#"<beans><bean class="{SCF}" p:reconnectOnException="true" scope="singleton"/></beans>"#
        ))
        .unwrap();
        assert!(evaluate(&doc).is_empty());
    }

    #[test]
    fn test_issues_are_grouped_by_rule_then_document_order() {
        let doc = parse_document(&format!(
            r#"<beans>
  <bean id="b1" class="{SCF}"/>
  <bean id="b2"/>
  <bean id="b3" class="{SCF}" scope="prototype"/>
</beans>"#
        ))
        .unwrap();

        let issues = evaluate(&doc);
        let summary: Vec<_> = issues
            .iter()
            .map(|issue| (issue.rule_key(), issue.location().line))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("SpringReconnectOnException", 2),
                ("SpringReconnectOnException", 4),
                ("SpringBeanScope", 2),
                ("SpringBeanScope", 3),
            ]
        );
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let doc = parse_document(&format!(
            r#"<beans><bean class="{SCF}"/><bean/><bean scope=""/><bean class="{SCF}" p:reconnectOnException="TRUE"/></beans>"#
        ))
        .unwrap();
        assert_eq!(evaluate(&doc), evaluate(&doc));
    }

    #[test]
    fn test_documents_built_without_parser() {
        let mut builder = DocumentBuilder::new();
        builder.start_element("beans", Location::new(1, 1)).unwrap();
        builder.start_element("bean", Location::new(2, 3)).unwrap();
        builder.attribute("class", SCF).unwrap();
        builder.attribute("scope", "singleton").unwrap();
        builder.start_element("property", Location::new(3, 5)).unwrap();
        builder.attribute("name", "reconnectOnException").unwrap();
        builder.start_element("value", Location::new(3, 40)).unwrap();
        builder.text("true", Location::new(3, 47)).unwrap();
        builder.end_element().unwrap();
        builder.end_element().unwrap();
        builder.end_element().unwrap();
        builder.end_element().unwrap();
        let doc = builder.finish().unwrap();

        assert!(evaluate(&doc).is_empty());
    }

    #[test]
    fn test_validate_str_and_formatting() {
        let validator = GuardianValidator::new().unwrap();
        let report = validator
            .validate_str("inline.xml", "<beans>\n  <bean id=\"x\"/>\n</beans>")
            .unwrap();

        assert_eq!(report.summary.total_files, 1);
        assert_eq!(report.violations.len(), 1);
        assert!(report.has_errors());

        let github = validator.format_report(&report, OutputFormat::GitHub).unwrap();
        let expected = "::error file=inline.xml,line=2,col=3,title=SpringBeanScope::";
        assert!(github.starts_with(expected));

        let json = validator.format_report(&report, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["violations"][0]["context"], "<bean id=\"x\"/>");
    }

    #[test]
    fn test_validate_str_rejects_malformed_xml() {
        let validator = GuardianValidator::new().unwrap();
        let err = validator.validate_str("broken.xml", "<beans>").unwrap_err();
        assert!(matches!(err, GuardianError::Analysis { .. }));
    }

    #[test]
    fn test_file_and_directory_validation() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("spring")).unwrap();
        let file = root.join("spring/jms.xml");
        let xml = format!("<beans>\n  <bean class=\"{SCF}\"/>\n</beans>\n");
        fs::write(&file, xml).unwrap();

        let validator = GuardianValidator::new().unwrap();
        let report = validator.validate_file(&file).unwrap();
        assert_eq!(report.violations.len(), 2);
        assert_eq!(report.violations[0].rule_id, "SpringReconnectOnException");

        let report = validator.validate_paths(&[root], &AnalysisOptions::default()).unwrap();
        assert_eq!(report.summary.total_files, 1);
        assert_eq!(report.violations.len(), 2);
    }

    #[test]
    fn test_excluded_file_reports_no_files() {
        let temp_dir = TempDir::new().unwrap();
        let excluded = temp_dir.path().join("target/beans.xml");
        fs::create_dir_all(excluded.parent().unwrap()).unwrap();
        fs::write(&excluded, "<beans>\n  <bean id=\"x\"/>\n</beans>\n").unwrap();

        let validator = GuardianValidator::new().unwrap();
        let report = validator.validate_file(&excluded).unwrap();

        assert_eq!(report.summary.total_files, 0);
        assert!(!report.has_violations());
        assert!(report.config_fingerprint.is_some());
    }

    #[test]
    fn test_validator_from_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("xml_guardian.yaml");
        fs::write(
            &config_path,
            "version: \"1.0\"\npaths:\n  patterns: []\nrules:\n  SpringReconnectOnException:\n    enabled: false\n",
        )
        .unwrap();

        let validator = GuardianValidator::from_config_file(&config_path).unwrap();
        assert_eq!(validator.rule_statistics().enabled_rules, 1);
        assert_eq!(validator.rules().len(), 1);

        let xml = format!(r#"<beans><bean class="{SCF}" scope="s"/></beans>"#);
        let report = validator.validate_str("jms.xml", &xml).unwrap();
        assert!(!report.has_violations());
    }
}
