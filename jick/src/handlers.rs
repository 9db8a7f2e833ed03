use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use jick_core::CoreError;
use jick_core::config::{expand_path, load_generation_config, write_default_config};
use jick_core::crawl::{CrawlOptions, execute_crawl, generate_crawl_report};
use jick_core::output::{OutputFormat, default_output_path, write_outcome};
use jick_scanner::{
    CrawlOutcome, CrawlSettings, DelayBounds, Features, FingerprintScope, Scope, SessionSettings,
    TerminationReason,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Exit status when seeding turned up nothing to visit.
pub const EXIT_NOTHING_FOUND: i32 = 4;

/// Startup problems that stop the run before any request is made.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("You must enter a URL to start crawling at, with the --urls or --hosts-file argument.")]
    NoUrls,

    #[error("Invalid URL specified: {0}")]
    InvalidUrl(String),

    #[error(
        "Nothing to do. Enable at least one of --href, --iframe, --get, --post, --robots or --site-map."
    )]
    NothingToDo,

    #[error("Failed to read hosts file {path}: {source}")]
    HostsFile {
        path: String,
        source: std::io::Error,
    },
}

impl SetupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupError::NoUrls | SetupError::HostsFile { .. } => 1,
            SetupError::InvalidUrl(_) => 2,
            SetupError::NothingToDo => 3,
        }
    }
}

/// Everything `crawl` needs, resolved from the command line.
pub struct CrawlPlan {
    pub seeds: Vec<String>,
    pub settings: CrawlSettings,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub config_path: Option<PathBuf>,
}

// Helper functions for crawl handler

/// Load URLs from either a file or the comma-separated `--urls` value
pub fn load_urls_from_source(
    urls: Option<&String>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, SetupError> {
    if let Some(hosts_file_path) = hosts_file {
        return load_urls_from_file(hosts_file_path);
    }
    let Some(urls) = urls else {
        return Err(SetupError::NoUrls);
    };

    let mut parsed = Vec::new();
    for raw in urls.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match parse_url_line(raw) {
            Some(url) => parsed.push(url),
            None => return Err(SetupError::InvalidUrl(raw.to_string())),
        }
    }
    if parsed.is_empty() {
        return Err(SetupError::NoUrls);
    }
    Ok(parsed)
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, SetupError> {
    let content = fs::read_to_string(path).map_err(|source| SetupError::HostsFile {
        path: path.display().to_string(),
        source,
    })?;

    let urls: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| parse_url_line(line.trim()))
        .collect();

    if urls.is_empty() {
        return Err(SetupError::NoUrls);
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.has_host()
        && !line.contains(char::is_whitespace)
    {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Unset `max` means three times `min`; anything negative or inverted
/// disables the pause.
pub fn resolve_delay(min: i64, max: Option<i64>) -> DelayBounds {
    DelayBounds::normalized(min, max.unwrap_or(min.saturating_mul(3)))
}

pub fn features_from_args(args: &ArgMatches) -> Features {
    Features {
        href: args.get_flag("href"),
        iframe: args.get_flag("iframe"),
        get: args.get_flag("get"),
        post: args.get_flag("post"),
        robots: args.get_flag("robots"),
        sitemap: args.get_flag("site-map"),
    }
}

/// Validates the `crawl` arguments and resolves defaults.
pub fn build_crawl_plan(args: &ArgMatches) -> Result<CrawlPlan, SetupError> {
    let seeds = load_urls_from_source(
        args.get_one::<String>("urls"),
        args.get_one::<PathBuf>("hosts-file"),
    )?;
    let features = features_from_args(args);
    if !features.any() {
        return Err(SetupError::NothingToDo);
    }

    let scope = Scope::parse(&seeds[0]).map_err(|_| SetupError::InvalidUrl(seeds[0].clone()))?;

    let min_delay = args.get_one::<i64>("min-delay").copied().unwrap_or(0);
    let max_delay = args.get_one::<i64>("max-delay").copied();
    let session = SessionSettings {
        user_agent: args
            .get_one::<String>("user-agent")
            .cloned()
            .unwrap_or_else(|| SessionSettings::default().user_agent),
        timeout: Duration::from_secs(args.get_one::<u64>("timeout").copied().unwrap_or(5)),
        proxy: args.get_one::<String>("proxy").cloned(),
        use_cookies: args.get_flag("use-cookies"),
        delay: resolve_delay(min_delay, max_delay),
    };

    let fingerprint_scope = if args.get_flag("path-aware-dedup") {
        FingerprintScope::PathAndParams
    } else {
        FingerprintScope::ParamsOnly
    };

    let settings = CrawlSettings::new(scope)
        .with_features(features)
        .with_session(session)
        .with_max_time(Duration::from_secs(
            args.get_one::<u64>("max-time").copied().unwrap_or(600),
        ))
        .with_max_results(args.get_one::<usize>("max-results").copied().unwrap_or(300))
        .with_fingerprint_scope(fingerprint_scope);

    let output = match args.get_one::<PathBuf>("output") {
        Some(path) => expand_path(&path.to_string_lossy()),
        None => default_output_path(chrono::Local::now().naive_local()),
    };
    let format = args
        .get_one::<String>("format")
        .and_then(|f| OutputFormat::parse(f))
        .unwrap_or(OutputFormat::Text);

    Ok(CrawlPlan {
        seeds,
        settings,
        output,
        format,
        config_path: args.get_one::<PathBuf>("config").cloned(),
    })
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let plan = match build_crawl_plan(args) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    };
    let config = load_generation_config(plan.config_path.as_deref())
        .context("could not load form generation rules")?;
    debug!("Crawl settings: {:?}", plan.settings);

    if !quiet {
        println!("{} Crawling {}", "→".blue(), plan.settings.scope.origin().bright_white());
        println!(
            "{} Limits: {}s, {} endpoints",
            "→".blue(),
            plan.settings.max_time.as_secs(),
            plan.settings.max_results
        );
        println!("{} Output: {}\n", "→".blue(), plan.output.display());
    }

    let options = CrawlOptions {
        seeds: plan.seeds,
        settings: plan.settings,
        config: Arc::new(config),
        show_progress_bars: !quiet,
    };
    let outcome = execute_crawl(options, None).await?;

    if !persist_outcome(&outcome, &plan.output, plan.format)? {
        println!("{} Did not find any new URLs. Done.", "✗".yellow().bold());
        std::process::exit(EXIT_NOTHING_FOUND);
    }

    if !quiet {
        print!("{}", generate_crawl_report(&outcome));
    }
    println!(
        "{} {} endpoints written to {}",
        "✓".green().bold(),
        outcome.endpoints.len(),
        plan.output.display()
    );
    Ok(())
}

/// Writes the outcome unless seeding found nothing; returns whether a file
/// was written.
pub fn persist_outcome(
    outcome: &CrawlOutcome,
    output: &Path,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    if outcome.reason == TerminationReason::NothingFound {
        return Ok(false);
    }
    write_outcome(outcome, output, format)
        .with_context(|| format!("could not write {}", output.display()))?;
    Ok(true)
}

/// Writes the bundled generation rules, hinting at `--force` when the file
/// is already there.
pub fn init_config_at(raw_path: &str, force: bool) -> anyhow::Result<PathBuf> {
    match write_default_config(raw_path, force) {
        Ok(path) => Ok(path),
        Err(e @ CoreError::AlreadyExists(_)) => {
            Err(anyhow::Error::new(e).context("refusing to overwrite; use --force to replace it"))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn handle_init_config(args: &ArgMatches) -> anyhow::Result<()> {
    let raw_path = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(jick_core::config::DEFAULT_CONFIG_PATH);
    let written = init_config_at(raw_path, args.get_flag("force"))?;
    println!(
        "{} Form generation rules written to {}",
        "✓".green().bold(),
        written.display().to_string().bright_white()
    );
    Ok(())
}
