// src/main.rs
// CLI entry point for the endpoint verification harness

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use endpoint_check::config::helpers::secs_to_duration;
use endpoint_check::config::HarnessConfig;
use endpoint_check::harness::probe::BasicAuth;
use endpoint_check::harness::ProbeRunner;
use endpoint_check::plans::{Entry, PlanParser, ProbePlan};
use endpoint_check::reporters::{get_reporter, OutputFormat};

#[derive(Parser)]
#[command(name = "endpoint-check")]
#[command(about = "Verify a running service's HTTP and WebSocket endpoints")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a probe plan
    Run {
        /// Plan file or directory (defaults to the built-in auction plan)
        plan: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
        format: OutputFormat,

        /// Only run sections whose title contains this text
        #[arg(long)]
        section: Option<String>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// List the sections and probes of a plan
    List {
        /// Plan file or directory (defaults to the built-in auction plan)
        plan: Option<PathBuf>,
    },

    /// Validate plan files without touching the network
    Validate {
        /// Plan file or directory (defaults to the built-in auction plan)
        plan: Option<PathBuf>,
    },
}

/// Overrides for values loaded from the environment
#[derive(Args)]
struct TargetArgs {
    /// Base URL for relative HTTP paths
    #[arg(long, env = "PROBE_BASE_URL")]
    base_url: Option<String>,

    /// Default WebSocket URL
    #[arg(long, env = "PROBE_WS_URL")]
    ws_url: Option<String>,

    /// HTTP response timeout in seconds
    #[arg(long, env = "PROBE_HTTP_TIMEOUT_SECS", value_parser = parse_secs)]
    timeout: Option<Duration>,

    /// Connect timeout in seconds
    #[arg(long, env = "PROBE_CONNECT_TIMEOUT_SECS", value_parser = parse_secs)]
    connect_timeout: Option<Duration>,

    /// WebSocket step timeout in seconds
    #[arg(long, env = "PROBE_WS_TIMEOUT_SECS", value_parser = parse_secs)]
    ws_timeout: Option<Duration>,

    /// Username for probes with use_credentials
    #[arg(long, env = "PROBE_USERNAME")]
    username: Option<String>,

    /// Password for probes with use_credentials
    #[arg(long, env = "PROBE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Dispatch independent probes concurrently (output order is kept)
    #[arg(long)]
    parallel: bool,

    /// Maximum concurrent probes when --parallel is set (0 = unlimited)
    #[arg(long, env = "PROBE_MAX_PARALLEL")]
    max_parallel: Option<usize>,
}

/// Positive seconds, fractions allowed
fn parse_secs(value: &str) -> Result<Duration, String> {
    value
        .parse::<f64>()
        .ok()
        .and_then(secs_to_duration)
        .ok_or_else(|| format!("'{}' is not a positive number of seconds", value))
}

impl TargetArgs {
    fn apply(self, mut config: HarnessConfig) -> HarnessConfig {
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if let Some(url) = self.ws_url {
            config.ws_url = url;
        }
        if let Some(timeout) = self.timeout {
            config.http_timeout = timeout;
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout = timeout;
        }
        if let Some(timeout) = self.ws_timeout {
            config.ws_timeout = timeout;
        }
        if let Some(username) = self.username {
            let password = self
                .password
                .or_else(|| config.credentials.take().and_then(|c| c.password));
            config.credentials = Some(BasicAuth { username, password });
        } else if let (Some(password), Some(creds)) = (self.password, config.credentials.as_mut()) {
            creds.password = Some(password);
        }
        if self.parallel {
            config.parallel = true;
        }
        if let Some(max) = self.max_parallel {
            config.max_parallel = max;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env feeds both the clap env fallbacks and HarnessConfig::from_env
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Diagnostics go to stderr so the report on stdout stays clean
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Run {
            plan,
            target,
            format,
            section,
            no_color,
        } => run_plans(plan, target, format, section, no_color).await,
        Commands::List { plan } => list_plans(plan),
        Commands::Validate { plan } => validate_plans(plan),
    }
}

async fn run_plans(
    path: Option<PathBuf>,
    target: TargetArgs,
    format: OutputFormat,
    section: Option<String>,
    no_color: bool,
) -> Result<()> {
    let mut plans = PlanParser::load(path.as_deref())?;

    if let Some(ref pattern) = section {
        plans = PlanParser::filter_by_section(plans, pattern);
    }

    if plans.is_empty() {
        println!("No plans match the specified filters");
        return Ok(());
    }

    let config = target.apply(HarnessConfig::from_env());
    info!("Base URL: {}", config.base_url);
    info!("WebSocket URL: {}", config.ws_url);

    let colors = !no_color && console::colors_enabled();
    let mut reporter = get_reporter(format, Box::new(std::io::stdout()), colors);

    if format == OutputFormat::Console {
        print_header(&plans, &config);
    }

    let runner = ProbeRunner::new(config).context("Failed to build HTTP client")?;
    let summary = runner.run(&plans, reporter.as_mut()).await;

    // Exit with appropriate code
    if !summary.all_passed() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_header(plans: &[ProbePlan], config: &HarnessConfig) {
    for plan in plans {
        println!("{}", plan.name);
        if !plan.description.is_empty() {
            println!("{}", plan.description);
        }
    }
    println!("API Base URL: {}", config.base_url);
    println!("WebSocket URL: {}", config.ws_url);
}

fn list_plans(path: Option<PathBuf>) -> Result<()> {
    let plans = PlanParser::load(path.as_deref())?;

    println!("Available Probes");
    println!("================");

    for plan in &plans {
        println!();
        println!("Plan: {}", plan.name);
        if !plan.description.is_empty() {
            println!("  Description: {}", plan.description);
        }
        for section in &plan.sections {
            println!("  [{}]", section.title);
            for entry in &section.entries {
                match entry {
                    Entry::Probe(probe) => println!("    - {}", probe.name),
                    Entry::Group(group) => {
                        println!("    * group '{}' (shared connection)", group.name);
                        for probe in &group.probes {
                            println!("      - {}", probe.name);
                        }
                    }
                }
            }
        }
    }

    println!();
    let total: usize = plans.iter().map(|p| p.probe_count()).sum();
    println!("Total: {} probe(s) in {} plan(s)", total, plans.len());

    Ok(())
}

fn validate_plans(path: Option<PathBuf>) -> Result<()> {
    println!("Validating Plans");
    println!("================");
    println!();

    let paths: Vec<Option<PathBuf>> = match path {
        Some(ref p) if p.is_dir() => {
            let mut files: Vec<PathBuf> = std::fs::read_dir(p)
                .with_context(|| format!("Failed to read directory: {}", p.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .map(|ext| ext == "yaml" || ext == "yml")
                        .unwrap_or(false)
                })
                .collect();
            files.sort();
            files.into_iter().map(Some).collect()
        }
        other => vec![other],
    };

    let mut valid_count = 0;
    let mut invalid_count = 0;
    let mut valid_plans = Vec::new();

    for file_path in paths {
        let label = file_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<built-in>".to_string());
        let parsed = match file_path {
            Some(ref p) => PlanParser::parse_file(p),
            None => PlanParser::builtin(),
        };
        match parsed {
            Ok(plan) => {
                println!("[VALID] {} - {} ({} probes)", label, plan.name, plan.probe_count());
                valid_count += 1;
                valid_plans.push(plan);
            }
            Err(e) => {
                println!("[INVALID] {} - {:#}", label, e);
                invalid_count += 1;
            }
        }
    }

    if let Err(e) = PlanParser::ensure_unique_names(&valid_plans) {
        println!("[INVALID] across plans - {:#}", e);
        invalid_count += 1;
    }

    println!();
    println!("Valid: {}, Invalid: {}", valid_count, invalid_count);

    if invalid_count > 0 {
        std::process::exit(1);
    }

    Ok(())
}
