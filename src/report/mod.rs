//! Rendering of validation reports for terminals, tools and CI
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - Human output groups violations per file and shows the offending start tag
//! - Json mirrors the serde shape of Violation; Sarif and GitHub follow their external schemas
//! - Severity filtering and truncation happen once, before any format is rendered

use crate::domain::violations::{
    GuardianError, GuardianResult, Severity, ValidationReport, Violation,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    /// SARIF 2.1.0, for code scanning upload
    Sarif,
    /// `::error file=...` workflow commands
    GitHub,
}

impl OutputFormat {
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "sarif", "github"]
    }
}

impl FromStr for OutputFormat {
    type Err = GuardianError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "sarif" => Ok(Self::Sarif),
            "github" => Ok(Self::GitHub),
            other => Err(GuardianError::config(format!(
                "Unknown output format '{other}'. Available: {}",
                Self::all_formats().join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// ANSI colors in the human format
    pub use_colors: bool,
    /// Print the start tag line under each violation
    pub show_context: bool,
    /// Print the markup a rule proposes as a fix
    pub show_suggestions: bool,
    pub max_violations: Option<usize>,
    /// Violations below this severity are dropped from every format
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_context: true,
            show_suggestions: true,
            max_violations: None,
            min_severity: None,
        }
    }
}

/// Renders a [`ValidationReport`] in any [`OutputFormat`]
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn format_report(
        &self,
        report: &ValidationReport,
        format: OutputFormat,
    ) -> GuardianResult<String> {
        let shown = self.filter_violations(&report.violations);

        match format {
            OutputFormat::Human => Ok(self.format_human(report, &shown)),
            OutputFormat::Json => self.format_json(report, &shown),
            OutputFormat::Sarif => self.format_sarif(&shown),
            OutputFormat::GitHub => Ok(self.format_github(&shown)),
        }
    }

    pub fn write_report<W: Write>(
        &self,
        report: &ValidationReport,
        format: OutputFormat,
        mut writer: W,
    ) -> GuardianResult<()> {
        let formatted = self.format_report(report, format)?;
        writer.write_all(formatted.as_bytes())?;
        Ok(())
    }

    fn filter_violations<'a>(&self, violations: &'a [Violation]) -> Vec<&'a Violation> {
        let min = self.options.min_severity.unwrap_or(Severity::Info);
        let limit = self.options.max_violations.unwrap_or(usize::MAX);
        violations
            .iter()
            .filter(|v| v.severity >= min)
            .take(limit)
            .collect()
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.options.use_colors {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn format_human(&self, report: &ValidationReport, violations: &[&Violation]) -> String {
        let mut output = String::new();

        if violations.is_empty() {
            let headline = self.paint("32", "No XML rule violations found");
            output.push_str(&format!("✅ {headline}\n"));
        } else {
            let has_errors = violations.iter().any(|v| v.is_blocking());
            let (icon, color) = if has_errors {
                ("❌", "31")
            } else {
                ("⚠️", "33")
            };
            let headline = self.paint(color, "XML Rule Violations Found");
            output.push_str(&format!("{icon} {headline}\n\n"));

            // per file, in report order
            let mut by_file: BTreeMap<&Path, Vec<&Violation>> = BTreeMap::new();
            for violation in violations {
                by_file
                    .entry(violation.file_path.as_path())
                    .or_default()
                    .push(violation);
            }

            for (file_path, file_violations) in by_file {
                output.push_str(&format!("📁 {}\n", file_path.display()));

                for violation in file_violations {
                    let severity_color = match violation.severity {
                        Severity::Error => "31",
                        Severity::Warning => "33",
                        Severity::Info => "36",
                    };

                    let position = match (violation.line_number, violation.column_number) {
                        (Some(line), Some(col)) => format!("{line}:{col}"),
                        (Some(line), None) => line.to_string(),
                        _ => "?".to_string(),
                    };

                    output.push_str(&format!(
                        "  {} [{}] {}\n",
                        self.paint("2", &format!("{position}:{}", violation.rule_id)),
                        self.paint(severity_color, violation.severity.as_str()),
                        violation.message
                    ));

                    if self.options.show_context {
                        if let Some(context) = &violation.context {
                            let line = self.paint("2", &format!("│ {context}"));
                            output.push_str(&format!("    {line}\n"));
                        }
                    }

                    if self.options.show_suggestions {
                        if let Some(suggestion) = &violation.suggested_fix {
                            let line = self.paint("32", &format!("💡 {suggestion}"));
                            output.push_str(&format!("    {line}\n"));
                        }
                    }

                    output.push('\n');
                }
            }

            let hidden = report.violations.len() - violations.len();
            if hidden > 0 {
                output.push_str(&format!("… {hidden} more violations not shown\n\n"));
            }
        }

        output.push_str(&self.format_summary(report));
        output
    }

    fn format_json(
        &self,
        report: &ValidationReport,
        violations: &[&Violation],
    ) -> GuardianResult<String> {
        let document = serde_json::json!({
            "violations": violations,
            "summary": report.summary,
            "config_fingerprint": report.config_fingerprint
        });

        serde_json::to_string_pretty(&document)
            .map_err(|e| GuardianError::config(format!("JSON serialization failed: {e}")))
    }

    fn format_sarif(&self, violations: &[&Violation]) -> GuardianResult<String> {
        let sarif_results: Vec<JsonValue> = violations
            .iter()
            .map(|v| {
                let mut physical_location = serde_json::json!({
                    "artifactLocation": {
                        "uri": v.file_path.display().to_string()
                    },
                    "region": {
                        "startLine": v.line_number.unwrap_or(1),
                        "startColumn": v.column_number.unwrap_or(1)
                    }
                });
                if let Some(context) = &v.context {
                    physical_location["contextRegion"] = serde_json::json!({
                        "startLine": v.line_number.unwrap_or(1),
                        "snippet": { "text": context }
                    });
                }

                serde_json::json!({
                    "ruleId": v.rule_id,
                    "level": sarif_level(v.severity),
                    "message": {
                        "text": v.message
                    },
                    "locations": [{
                        "physicalLocation": physical_location
                    }]
                })
            })
            .collect();

        let mut rule_ids: Vec<&str> = violations.iter().map(|v| v.rule_id.as_str()).collect();
        rule_ids.sort_unstable();
        rule_ids.dedup();
        let rules: Vec<JsonValue> = rule_ids
            .iter()
            .map(|id| serde_json::json!({ "id": id }))
            .collect();

        let sarif_report = serde_json::json!({
            "version": "2.1.0",
            "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                        "rules": rules
                    }
                },
                "results": sarif_results
            }]
        });

        serde_json::to_string_pretty(&sarif_report)
            .map_err(|e| GuardianError::config(format!("SARIF serialization failed: {e}")))
    }

    fn format_github(&self, violations: &[&Violation]) -> String {
        let mut output = String::new();

        for violation in violations {
            let level = match violation.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "notice",
            };

            let position = match (violation.line_number, violation.column_number) {
                (Some(line), Some(col)) => format!(",line={line},col={col}"),
                (Some(line), None) => format!(",line={line}"),
                _ => String::new(),
            };

            output.push_str(&format!(
                "::{} file={}{},title={}::{}\n",
                level,
                escape_workflow_property(&violation.file_path.display().to_string()),
                position,
                escape_workflow_property(&violation.rule_id),
                escape_workflow_data(&violation.message)
            ));
        }

        output
    }

    fn format_summary(&self, report: &ValidationReport) -> String {
        let counts = &report.summary.violations_by_severity;
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;

        let mut summary = format!("📊 {} ", self.paint("1", "Summary:"));

        if counts.total() == 0 {
            summary.push_str(&self.paint("32", "0 violations"));
        } else {
            let mut parts = Vec::new();
            if counts.error > 0 {
                let text = format!("{} error{}", counts.error, plural(counts.error));
                parts.push(self.paint("31", &text));
            }
            if counts.warning > 0 {
                let text = format!("{} warning{}", counts.warning, plural(counts.warning));
                parts.push(self.paint("33", &text));
            }
            if counts.info > 0 {
                parts.push(self.paint("36", &format!("{} info", counts.info)));
            }
            summary.push_str(&parts.join(", "));
        }

        summary.push_str(&format!(
            " in {} files ({:.1}s)",
            report.summary.total_files, execution_time
        ));
        if report.summary.skipped_files > 0 {
            summary.push_str(&format!(", {} skipped", report.summary.skipped_files));
        }
        summary.push('\n');
        summary
    }
}

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Escape the message part of a workflow command
fn escape_workflow_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a `key=value` property of a workflow command
fn escape_workflow_property(s: &str) -> String {
    escape_workflow_data(s)
        .replace(':', "%3A")
        .replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_test_report() -> ValidationReport {
        let mut report = ValidationReport::new();

        report.add_violation(
            Violation::new(
                "SpringBeanScope",
                Severity::Error,
                PathBuf::from("conf/beans.xml"),
                "This bean does not have a scope. Scope is mandatory for every bean",
            )
            .with_position(4, 3)
            .with_context("<bean id=\"dataSource\"/>")
            .with_suggestion("scope=\"...\""),
        );

        report.set_files_analyzed(10);
        report.set_execution_time(1200);

        report
    }

    #[test]
    fn test_human_format() {
        let formatter = ReportFormatter::new(ReportOptions {
            use_colors: false,
            ..Default::default()
        });

        let report = create_test_report();
        let output = formatter.format_report(&report, OutputFormat::Human).unwrap();

        assert!(output.contains("XML Rule Violations Found"));
        assert!(output.contains("conf/beans.xml"));
        let line = "4:3:SpringBeanScope [error] This bean does not have a scope";
        assert!(output.contains(line));
        assert!(output.contains("│ <bean id=\"dataSource\"/>"));
        assert!(output.contains("💡 scope=\"...\""));
        assert!(output.contains("Summary: 1 error in 10 files (1.2s)"));
        assert!(!output.contains('\x1b'));
    }

    #[test]
    fn test_human_format_without_context() {
        let formatter = ReportFormatter::new(ReportOptions {
            use_colors: false,
            show_context: false,
            ..Default::default()
        });

        let report = create_test_report();
        let output = formatter.format_report(&report, OutputFormat::Human).unwrap();
        assert!(!output.contains("dataSource"));
        assert!(output.contains("💡"));
    }

    #[test]
    fn test_json_format() {
        let formatter = ReportFormatter::default();
        let report = create_test_report();
        let output = formatter.format_report(&report, OutputFormat::Json).unwrap();

        let json: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(json["violations"].as_array().unwrap().len(), 1);
        assert_eq!(json["violations"][0]["rule_id"], "SpringBeanScope");
        assert_eq!(json["violations"][0]["line_number"], 4);
        assert_eq!(json["violations"][0]["severity"], "error");
        assert_eq!(json["violations"][0]["file_path"], "conf/beans.xml");
        assert_eq!(json["summary"]["total_files"], 10);
        assert_eq!(json["summary"]["violations_by_severity"]["error"], 1);
    }

    #[test]
    fn test_sarif_format() {
        let formatter = ReportFormatter::default();
        let report = create_test_report();
        let output = formatter.format_report(&report, OutputFormat::Sarif).unwrap();

        let json: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(json["version"], "2.1.0");
        let run = &json["runs"][0];
        assert_eq!(run["tool"]["driver"]["rules"][0]["id"], "SpringBeanScope");
        let result = &run["results"][0];
        assert_eq!(result["level"], "error");
        let location = &result["locations"][0]["physicalLocation"];
        assert_eq!(location["region"]["startLine"], 4);
        assert_eq!(
            location["contextRegion"]["snippet"]["text"],
            "<bean id=\"dataSource\"/>"
        );
    }

    #[test]
    fn test_github_format() {
        let formatter = ReportFormatter::default();
        let report = create_test_report();
        let output = formatter.format_report(&report, OutputFormat::GitHub).unwrap();

        assert_eq!(
            output,
            "::error file=conf/beans.xml,line=4,col=3,title=SpringBeanScope::This bean does not have a scope. Scope is mandatory for every bean\n"
        );
    }

    #[test]
    fn test_github_format_escapes_properties() {
        let mut report = ValidationReport::new();
        report.add_violation(
            Violation::new(
                "Team:Scope",
                Severity::Warning,
                PathBuf::from("conf/a,b.xml"),
                "50% done\nnext",
            )
            .with_position(2, 3),
        );

        let output = ReportFormatter::default()
            .format_report(&report, OutputFormat::GitHub)
            .unwrap();
        assert_eq!(
            output,
            "::warning file=conf/a%2Cb.xml,line=2,col=3,title=Team%3AScope::50%25 done%0Anext\n"
        );
    }

    #[test]
    fn test_empty_report() {
        let formatter = ReportFormatter::new(ReportOptions {
            use_colors: false,
            ..Default::default()
        });

        let report = ValidationReport::new();
        let output = formatter.format_report(&report, OutputFormat::Human).unwrap();

        assert!(output.contains("No XML rule violations found"));
        assert!(output.contains("0 violations in 0 files"));
    }

    #[test]
    fn test_severity_filtering_and_truncation() {
        let mut report = ValidationReport::new();
        for (rule, severity) in
            [("a", Severity::Warning), ("b", Severity::Error), ("c", Severity::Error)]
        {
            report.add_violation(Violation::new(rule, severity, PathBuf::from("x.xml"), "m"));
        }

        let formatter = ReportFormatter::new(ReportOptions {
            min_severity: Some(Severity::Error),
            max_violations: Some(1),
            ..Default::default()
        });
        let output = formatter.format_report(&report, OutputFormat::Json).unwrap();
        let json: JsonValue = serde_json::from_str(&output).unwrap();

        assert_eq!(json["violations"].as_array().unwrap().len(), 1);
        assert_eq!(json["violations"][0]["rule_id"], "b");
    }

    #[test]
    fn test_format_names() {
        let sarif: OutputFormat = "SARIF".parse().unwrap();
        let github: OutputFormat = "github".parse().unwrap();
        assert_eq!(sarif, OutputFormat::Sarif);
        assert_eq!(github, OutputFormat::GitHub);
        assert!("junit".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_write_report() {
        let mut buffer = Vec::new();
        ReportFormatter::default()
            .write_report(&create_test_report(), OutputFormat::GitHub, &mut buffer)
            .unwrap();
        assert!(String::from_utf8(buffer).unwrap().starts_with("::error"));
    }
}
