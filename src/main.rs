//! XML Guardian CLI - Command-line interface for structural XML rule checks
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to domain operations
//! - Handles external concerns like file I/O, process exit codes, and terminal output
//! - Provides clean separation between user interface and business logic

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;
use xml_guardian::{
    parse_document, AnalysisOptions, GuardianConfig, GuardianResult, GuardianValidator,
    OutputFormat, PathQuery, ReportFormatter, ReportOptions, RuleSet, Severity,
};

const DEFAULT_CONFIG_FILES: [&str; 3] = [
    "xml_guardian.yaml",
    "xml_guardian.yml",
    ".xml_guardian.yaml",
];

/// XML Guardian - structural rule checks for XML configuration
#[derive(Parser)]
#[command(name = "xml-guardian")]
#[command(version)]
#[command(about = "Structural rule checks for XML configuration files")]
#[command(long_about = "XML Guardian evaluates path-query based rules against XML documents, \
    such as Spring bean definitions that must declare a scope. \
    Designed for local use and CI/CD integration.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check XML files for rule violations
    Check {
        /// Paths to analyze (files or directories)
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Minimum severity level to report
        #[arg(short, long, value_enum)]
        severity: Option<SeverityArg>,

        /// Maximum number of violations to report
        #[arg(long)]
        max_violations: Option<usize>,

        /// Additional exclude patterns
        #[arg(long, action = clap::ArgAction::Append)]
        exclude: Vec<String>,

        /// Ignore .guardianignore files
        #[arg(long)]
        no_ignore: bool,

        /// Disable parallel processing
        #[arg(long)]
        no_parallel: bool,

        /// Fail on first file that cannot be analyzed
        #[arg(long)]
        fail_fast: bool,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Explain what a specific rule does
    Explain {
        /// Rule key to explain
        rule_key: String,
    },

    /// List available rules
    Rules {
        /// Show only enabled rules
        #[arg(long)]
        enabled_only: bool,
    },

    /// Run a path query against a file and print the matching elements
    Query {
        /// Query expression, e.g. "beans/bean[@scope='prototype']"
        expression: String,

        /// XML file to query
        file: PathBuf,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
    Sarif,
    Github,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Sarif => OutputFormat::Sarif,
            OutputFormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

/// Arguments of the `check` command
struct CheckArgs {
    paths: Vec<PathBuf>,
    format: OutputFormatArg,
    severity: Option<SeverityArg>,
    max_violations: Option<usize>,
    exclude: Vec<String>,
    no_ignore: bool,
    no_parallel: bool,
    fail_fast: bool,
    use_colors: bool,
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run_command(cli) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_command(cli: Cli) -> GuardianResult<i32> {
    match cli.command {
        Commands::Check {
            paths,
            format,
            severity,
            max_violations,
            exclude,
            no_ignore,
            no_parallel,
            fail_fast,
        } => run_check(
            cli.config,
            CheckArgs {
                paths,
                format,
                severity,
                max_violations,
                exclude,
                no_ignore,
                no_parallel,
                fail_fast,
                use_colors: !cli.no_color,
            },
        ),
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
        Commands::Explain { rule_key } => run_explain(cli.config, &rule_key),
        Commands::Rules { enabled_only } => run_list_rules(cli.config, enabled_only),
        Commands::Query { expression, file } => run_query(&expression, &file),
    }
}

/// Load the explicit config, else the first default config file found, else defaults
fn load_config(config_path: Option<PathBuf>) -> GuardianResult<GuardianConfig> {
    if let Some(config_path) = config_path {
        return GuardianConfig::load_from_file(config_path);
    }

    for config_name in DEFAULT_CONFIG_FILES {
        if Path::new(config_name).exists() {
            tracing::debug!("Using configuration file {}", config_name);
            return GuardianConfig::load_from_file(config_name);
        }
    }

    Ok(GuardianConfig::default())
}

fn run_check(config_path: Option<PathBuf>, args: CheckArgs) -> GuardianResult<i32> {
    let config = load_config(config_path)?;

    let report_options = ReportOptions {
        use_colors: args.use_colors,
        max_violations: args.max_violations,
        min_severity: args.severity.map(Into::into),
        ..Default::default()
    };
    let validator = GuardianValidator::new_with_config(config)?
        .with_report_formatter(ReportFormatter::new(report_options));

    // Use current directory if no paths specified
    let paths = if args.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.paths
    };

    let analysis_options = AnalysisOptions {
        parallel: !args.no_parallel,
        fail_fast: args.fail_fast,
        exclude_patterns: args.exclude,
        ignore_ignore_files: args.no_ignore,
        ..Default::default()
    };

    let report = validator.validate_paths(&paths, &analysis_options)?;

    let formatted = validator.format_report(&report, args.format.into())?;
    println!("{formatted}");

    Ok(if report.has_errors() { 1 } else { 0 })
}

fn run_validate_config(config_path: Option<PathBuf>) -> GuardianResult<i32> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));

    println!("Validating configuration: {}", config_path.display());

    match GuardianConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("✅ Configuration is valid");

            let rules = RuleSet::from_config(&config)?;
            println!("📊 Configuration summary:");
            println!("  Rule overrides: {}", config.rules.len());
            println!("  Custom rules: {}", config.custom_rules.len());
            println!("  Enabled rules: {}", rules.len());
            println!("  Path patterns: {}", config.paths.patterns.len());
            println!("  Extensions: {}", config.paths.extensions.join(", "));

            Ok(0)
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {e}");
            Ok(1)
        }
    }
}

fn run_explain(config_path: Option<PathBuf>, rule_key: &str) -> GuardianResult<i32> {
    let config = load_config(config_path)?;
    let rules = RuleSet::from_config(&config)?;

    let Some(rule) = rules.get(rule_key) else {
        eprintln!("❌ Rule '{rule_key}' not found or disabled");
        println!();
        println!("Available rules:");
        for rule in rules.rules() {
            println!("  - {}", rule.metadata().key);
        }
        return Ok(1);
    };

    let metadata = rule.metadata();
    println!("📖 Rule: {}", metadata.key);
    println!("🏷️  Name: {}", metadata.name);
    println!("⚠️  Severity: {}", metadata.severity.as_str());
    if !metadata.tags.is_empty() {
        println!("🔖 Tags: {}", metadata.tags.join(", "));
    }
    if !metadata.description.is_empty() {
        println!();
        println!("📝 Description:");
        println!("   {}", metadata.description);
    }
    println!();
    println!("🔎 Queries:");
    for query in rule.queries() {
        println!("   {query}");
    }
    if let Some(suggestion) = rule.suggestion() {
        println!();
        println!("💡 Fix: {suggestion}");
    }

    Ok(0)
}

fn run_list_rules(config_path: Option<PathBuf>, enabled_only: bool) -> GuardianResult<i32> {
    let config = load_config(config_path)?;
    let rules = RuleSet::from_config(&config)?;

    println!("📋 Available Rules\n");

    for rule in rules.rules() {
        let metadata = rule.metadata();
        println!(
            "  ✅ {} [{}] - {}",
            metadata.key,
            metadata.severity.as_str(),
            metadata.name
        );
    }

    if !enabled_only {
        let disabled = xml_guardian::rules::BUILTIN_RULE_KEYS
            .iter()
            .copied()
            .chain(config.custom_rules.iter().map(|rule| rule.key.as_str()))
            .filter(|key| rules.get(key).is_none());
        for key in disabled {
            println!("  ❌ {key} [disabled]");
        }
    }

    Ok(0)
}

fn run_query(expression: &str, file: &Path) -> GuardianResult<i32> {
    let query = PathQuery::compile(expression)?;
    let content = fs::read_to_string(file)?;
    let document = parse_document(&content)?;

    let matches = query.evaluate(&document);
    for element in &matches {
        let attributes: Vec<String> = element
            .attributes()
            .map(|(name, value)| format!("{name}=\"{value}\""))
            .collect();
        if attributes.is_empty() {
            println!(
                "{}:{} <{}>",
                file.display(),
                element.location(),
                element.name()
            );
        } else {
            println!(
                "{}:{} <{} {}>",
                file.display(),
                element.location(),
                element.name(),
                attributes.join(" ")
            );
        }
    }
    let suffix = if matches.len() == 1 { "" } else { "es" };
    eprintln!("{} match{suffix}", matches.len());

    Ok(if matches.is_empty() { 1 } else { 0 })
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("xml_guardian={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
