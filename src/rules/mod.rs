//! Structural rules evaluated against parsed documents
//!
//! Architecture: Strategy Pattern - every rule implements the shared Rule capability
//! - Rules carry their compiled queries and metadata as plain data, no inheritance
//! - A RuleSet runs rules in registration order into a single IssueSink per document
//! - Rules are stateless between documents and safe to share across threads

pub mod companion_property;
pub mod required_attribute;

pub use companion_property::CompanionPropertyRule;
pub use required_attribute::RequiredAttributeRule;

use crate::config::{CustomRuleKind, GuardianConfig};
use crate::domain::document::Document;
use crate::domain::issues::{Issue, IssueSink};
use crate::domain::violations::{GuardianError, GuardianResult, Severity};
use crate::query::PathQuery;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Keys of the rules registered by [`RuleSet::spring_defaults`]
pub const BUILTIN_RULE_KEYS: &[&str] =
    &[companion_property::RECONNECT_ON_EXCEPTION_KEY, required_attribute::BEAN_SCOPE_KEY];

/// Registration metadata carried alongside a rule; never consulted by the analysis itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMetadata {
    pub key: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub tags: Vec<String>,
}

impl RuleMetadata {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: String::new(),
            severity: Severity::Error,
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A check that maps a document to the issues it finds
pub trait Rule: Send + Sync {
    fn metadata(&self) -> &RuleMetadata;

    fn metadata_mut(&mut self) -> &mut RuleMetadata;

    /// Report every non-compliant element of `document` to `sink`, in document order
    fn check(&self, document: &Document, sink: &mut IssueSink);

    /// Queries the rule evaluates, in the order it evaluates them
    fn queries(&self) -> Vec<&PathQuery>;

    /// Markup that would fix an element this rule reports
    fn suggestion(&self) -> Option<String> {
        None
    }

    /// Evaluate the rule with a fresh sink
    fn evaluate(&self, document: &Document) -> Vec<Issue> {
        let mut sink = IssueSink::new();
        self.check(document, &mut sink);
        sink.into_issues()
    }
}

/// Ordered collection of rules evaluated together
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Spring bean checks: reconnect-on-exception first, then bean scope
    pub fn spring_defaults() -> Self {
        Self::new()
            .with_rule(CompanionPropertyRule::reconnect_on_exception())
            .with_rule(RequiredAttributeRule::bean_scope())
    }

    /// Built-in rules filtered and re-graded by the configuration, followed by custom rules
    pub fn from_config(config: &GuardianConfig) -> GuardianResult<Self> {
        let mut set = Self::new();

        for rule in Self::spring_defaults().rules {
            set.push_configured(rule, config);
        }

        for custom in &config.custom_rules {
            if !custom.enabled {
                tracing::debug!("Custom rule '{}' is disabled", custom.key);
                continue;
            }

            let name = custom.name.as_deref().unwrap_or(&custom.key);
            let metadata = RuleMetadata::new(&custom.key, name)
                .with_description(custom.description.clone().unwrap_or_default())
                .with_severity(custom.severity)
                .with_tags(custom.tags.iter().cloned());

            let rule: Box<dyn Rule> = match &custom.kind {
                CustomRuleKind::RequiredAttribute { query, attribute } => {
                    let target = compile(&custom.key, query)?;
                    let rule = RequiredAttributeRule::new(metadata, target, attribute)
                        .with_message(&custom.message);
                    Box::new(rule)
                }
                CustomRuleKind::CompanionProperty {
                    query,
                    attribute,
                    value,
                    companion,
                } => {
                    let target = compile(&custom.key, query)?;
                    let companion = compile(&custom.key, companion)?;
                    let rule =
                        CompanionPropertyRule::new(metadata, target, attribute, value, companion)
                            .with_message(&custom.message);
                    Box::new(rule)
                }
            };
            set.push_configured(rule, config);
        }

        Ok(set)
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.push(Box::new(rule));
        self
    }

    pub fn push(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> + '_ {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    pub fn get(&self, key: &str) -> Option<&dyn Rule> {
        self.rules().find(|rule| rule.metadata().key == key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule, in registration order, into `sink`
    pub fn check(&self, document: &Document, sink: &mut IssueSink) {
        for rule in &self.rules {
            let before = sink.len();
            rule.check(document, sink);
            tracing::debug!(
                "Rule '{}' reported {} issues",
                rule.metadata().key,
                sink.len() - before
            );
        }
    }

    /// Evaluate every rule into one ordered issue list
    pub fn evaluate(&self, document: &Document) -> Vec<Issue> {
        let mut sink = IssueSink::new();
        self.check(document, &mut sink);
        sink.into_issues()
    }

    fn push_configured(&mut self, mut rule: Box<dyn Rule>, config: &GuardianConfig) {
        if let Some(setting) = config.rules.get(&rule.metadata().key) {
            if !setting.enabled {
                tracing::debug!("Rule '{}' disabled by configuration", rule.metadata().key);
                return;
            }
            if let Some(severity) = setting.severity {
                rule.metadata_mut().severity = severity;
            }
        }
        self.rules.push(rule);
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules().map(|rule| &rule.metadata().key))
            .finish()
    }
}

/// The default rule set, built once and shared
pub fn default_rules() -> &'static RuleSet {
    static DEFAULT_RULES: OnceLock<RuleSet> = OnceLock::new();
    DEFAULT_RULES.get_or_init(RuleSet::spring_defaults)
}

fn compile(rule_key: &str, source: &str) -> GuardianResult<PathQuery> {
    PathQuery::compile(source).map_err(|e| {
        GuardianError::config(format!(
            "Invalid query '{source}' in rule '{rule_key}': {e}"
        ))
    })
}
