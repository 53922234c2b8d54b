//! Configuration loading and management for XML Guardian
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean domain objects
//! - Built-in rules stay in the rules module; configuration only switches and re-grades them
//! - Custom rules are declared as data and compiled into rules by the RuleSet

use crate::domain::violations::{GuardianError, GuardianResult, Severity};
use crate::query::PathQuery;
use crate::rules::BUILTIN_RULE_KEYS;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Main configuration structure for XML Guardian
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// Configuration format version
    pub version: String,
    /// Path filtering configuration
    pub paths: PathConfig,
    /// Per-rule switches and severity overrides, keyed by rule key
    #[serde(default)]
    pub rules: BTreeMap<String, RuleSetting>,
    /// Rules declared in configuration, run after the built-in ones
    #[serde(default)]
    pub custom_rules: Vec<CustomRule>,
}

/// Path filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Include/exclude patterns (gitignore-style)
    pub patterns: Vec<String>,
    /// Optional .guardianignore file name
    pub ignore_file: Option<String>,
    /// File extensions picked up when walking directories
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

/// Override for a single rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSetting {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub severity: Option<Severity>,
}

impl Default for RuleSetting {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: None,
        }
    }
}

/// A rule declared in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRule {
    /// Unique rule key, reported with every issue
    pub key: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: CustomRuleKind,
    /// Message attached to every issue the rule reports
    pub message: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// The check a custom rule performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomRuleKind {
    /// Every element matched by `query` must carry `attribute`
    RequiredAttribute { query: String, attribute: String },
    /// Every element matched by `query` must have `attribute="value"` or a child matching `companion`
    CompanionProperty {
        query: String,
        attribute: String,
        value: String,
        companion: String,
    },
}

impl CustomRuleKind {
    /// Query sources declared by this rule
    pub fn queries(&self) -> Vec<&str> {
        match self {
            Self::RequiredAttribute { query, .. } => vec![query.as_str()],
            Self::CompanionProperty {
                query,
                companion,
                ..
            } => vec![query.as_str(), companion.as_str()],
        }
    }
}

impl GuardianConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> GuardianResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            GuardianError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            GuardianError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> GuardianResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| GuardianError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Default configuration: built-in rules enabled, build output excluded
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: PathConfig {
                patterns: vec![
                    "**/target/**".to_string(),
                    "**/node_modules/**".to_string(),
                    "**/.git/**".to_string(),
                ],
                ignore_file: Some(".guardianignore".to_string()),
                extensions: default_extensions(),
            },
            rules: BTreeMap::new(),
            custom_rules: Vec::new(),
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> GuardianResult<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            return Err(GuardianError::config(format!(
                "Unsupported configuration version: {}. Supported versions: 1.0",
                self.version
            )));
        }

        let mut keys: HashSet<&str> = BUILTIN_RULE_KEYS.iter().copied().collect();
        for rule in &self.custom_rules {
            if rule.key.trim().is_empty() {
                return Err(GuardianError::config("Custom rule with an empty key"));
            }
            if !keys.insert(rule.key.as_str()) {
                return Err(GuardianError::config(format!(
                    "Duplicate rule key '{}'",
                    rule.key
                )));
            }

            for source in rule.kind.queries() {
                PathQuery::compile(source).map_err(|e| {
                    GuardianError::config(format!(
                        "Invalid query '{}' in rule '{}': {}",
                        source, rule.key, e
                    ))
                })?;
            }
        }

        if let Some(unknown) = self.rules.keys().find(|key| !keys.contains(key.as_str())) {
            let mut known: Vec<_> = keys.into_iter().collect();
            known.sort_unstable();
            return Err(GuardianError::config(format!(
                "Setting for unknown rule '{unknown}'. Known rules: {}",
                known.join(", ")
            )));
        }

        Ok(())
    }

    /// Whether a rule is switched on, built-in or custom
    pub fn is_rule_enabled(&self, key: &str) -> bool {
        let custom_enabled = self
            .custom_rules
            .iter()
            .find(|rule| rule.key == key)
            .map_or(true, |rule| rule.enabled);
        custom_enabled && self.rules.get(key).map_or(true, |setting| setting.enabled)
    }

    /// Convert to JSON for serialization
    pub fn to_json(&self) -> GuardianResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GuardianError::config(format!("Failed to serialize config: {e}")))
    }

    /// Stable fingerprint of the configuration, recorded in reports
    pub fn fingerprint(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        // rules is a BTreeMap, so the JSON form is already ordered
        match serde_json::to_string(self) {
            Ok(json) => json.hash(&mut hasher),
            Err(e) => {
                tracing::warn!("Falling back to partial config fingerprint: {}", e);
                self.version.hash(&mut hasher);
                self.paths.patterns.hash(&mut hasher);
            }
        }

        format!("{:x}", hasher.finish())
    }
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_true() -> bool {
    true
}

fn default_severity() -> Severity {
    Severity::Error
}

fn default_extensions() -> Vec<String> {
    vec!["xml".to_string()]
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: GuardianConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: GuardianConfig::default(),
        }
    }

    /// Add a path pattern
    pub fn add_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.paths.patterns.push(pattern.into());
        self
    }

    /// Set the ignore file name
    pub fn ignore_file(mut self, filename: impl Into<String>) -> Self {
        self.config.paths.ignore_file = Some(filename.into());
        self
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.paths.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn rule_setting(mut self, key: impl Into<String>, setting: RuleSetting) -> Self {
        self.config.rules.insert(key.into(), setting);
        self
    }

    pub fn disable_rule(self, key: impl Into<String>) -> Self {
        let setting = RuleSetting {
            enabled: false,
            severity: None,
        };
        self.rule_setting(key, setting)
    }

    pub fn add_custom_rule(mut self, rule: CustomRule) -> Self {
        self.config.custom_rules.push(rule);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> GuardianResult<GuardianConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
