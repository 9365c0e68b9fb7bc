use anyhow::{Context, anyhow, bail};
use clap::ArgMatches;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use trawl_core::aggregator::MAX_BATCH_SIZE;
use trawl_core::config::expand_path;
use trawl_core::model::{
    BatchReport, BatchStatus, CheckLevel, CheckerKind, DomainCheck, DomainValidation, RiskLevel,
    SimilarDomains, Verdict, VerdictReport,
};
use trawl_core::validation::validate_domain;
use trawl_core::{Aggregator, Config};
use url::Url;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Install the fmt subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn print_banner() {
    println!(
        "{}",
        r"  _                     _
 | |_ _ __ __ ___      _| |
 | __| '__/ _` \ \ /\ / / |
 | |_| | | (_| |\ V  V /| |
  \__|_|  \__,_| \_/\_/ |_|"
            .bright_blue()
            .bold()
    );
    println!(
        "  {} {}",
        "multi-source URL verdicts".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    println!();
}

/// Load the config file (or defaults) and overlay API keys from the environment.
pub fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    let path = path.map(expand_path);
    let mut config =
        Config::load_or_default(path.as_deref()).context("Failed to load configuration")?;
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

fn build_aggregator(config: &Config) -> anyhow::Result<Aggregator> {
    Aggregator::from_config(config).context("Failed to set up checkers")
}

// Helper functions for input handling

/// Parse a single line as an http(s) URL, adding https:// when no scheme is given
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(line.to_string());
    }

    if !line.contains("://") {
        let with_scheme = format!("https://{}", line);
        if let Ok(url) = Url::parse(&with_scheme)
            && url.host_str().is_some()
        {
            return Some(with_scheme);
        }
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

/// Reduce a line to a bare lowercase domain. Full URLs contribute their host.
pub fn parse_domain_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let candidate = if line.contains("://") {
        line.to_string()
    } else {
        format!("http://{}", line)
    };

    match Url::parse(&candidate) {
        Ok(url) => match url.host_str() {
            Some(host) if !host.is_empty() => Some(host.to_lowercase()),
            _ => {
                eprintln!("⚠️  Skipping '{}': no host", line);
                None
            }
        },
        Err(_) => {
            eprintln!("⚠️  Skipping invalid domain '{}'", line);
            None
        }
    }
}

/// Load domains from a file. Blank lines and `#` comments are ignored.
pub fn load_domains_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let domains: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_domain_line)
        .collect();

    if domains.is_empty() {
        return Err(format!("No valid domains found in {}", path.display()));
    }

    Ok(domains)
}

/// Load domains from either positional arguments or a hosts file
pub fn load_domains_from_source(
    domains: Option<Vec<String>>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        return load_domains_from_file(hosts_file_path);
    }

    let domains: Vec<String> = domains
        .unwrap_or_default()
        .iter()
        .filter_map(|d| parse_domain_line(d))
        .collect();

    if domains.is_empty() {
        Err("Either DOMAINS or --hosts-file must be provided".to_string())
    } else {
        Ok(domains)
    }
}

// Text rendering

fn divider() -> ColoredString {
    "═".repeat(60).bright_blue().bold()
}

fn colorize_verdict(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Safe => verdict.as_str().green().bold(),
        Verdict::Dangerous => verdict.as_str().red().bold(),
        Verdict::Suspicious => verdict.as_str().yellow().bold(),
        Verdict::Unverified | Verdict::Unknown => verdict.as_str().bright_white().bold(),
    }
}

fn colorize_risk(risk: RiskLevel) -> ColoredString {
    let label = risk.to_string();
    match risk {
        RiskLevel::High => label.red().bold(),
        RiskLevel::Medium => label.yellow().bold(),
        RiskLevel::Low => label.green().bold(),
    }
}

pub fn format_verdict_report(report: &VerdictReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}\n", divider()));
    out.push_str(&format!(
        "  VERDICT: {} ({}%)\n",
        colorize_verdict(report.verdict),
        report.confidence
    ));
    out.push_str(&format!("{}\n", divider()));
    out.push_str(&format!("{} URL:      {}\n", "→".blue(), report.url.bright_white()));
    out.push_str(&format!("{} Domain:   {}\n", "→".blue(), report.domain.bright_white()));
    out.push_str(&format!("{} Level:    {}\n", "→".blue(), report.check_level));
    out.push_str(&format!(
        "{} Took:     {}ms\n\n",
        "→".blue(),
        report.processing_time_ms
    ));

    out.push_str(&format!("{}\n", "CHECKERS".bright_blue().bold()));
    for kind in CheckerKind::ALL {
        let Some(result) = report.checker(kind) else {
            continue;
        };
        let name = format!("{:<20}", result.name);
        match result.error {
            Some(ref err) => out.push_str(&format!(
                "  {} {} {}\n",
                "✗".red().bold(),
                name.bright_white(),
                format!("error: {}", err).red()
            )),
            None => {
                out.push_str(&format!(
                    "  {} {} {:>3}%\n",
                    "✓".green().bold(),
                    name.bright_white(),
                    result.confidence
                ));
                for signal in &result.signals {
                    out.push_str(&format!("      {} {}\n", "•".bright_black(), signal.detail));
                }
            }
        }
    }

    if !report.warnings.is_empty() {
        out.push_str(&format!("\n{}\n", "WARNINGS".yellow().bold()));
        for warning in &report.warnings {
            out.push_str(&format!("  {} {}\n", "⚠".yellow(), warning));
        }
    }

    if !report.recommendations.is_empty() {
        out.push_str(&format!("\n{}\n", "RECOMMENDATIONS".bright_blue().bold()));
        for rec in &report.recommendations {
            out.push_str(&format!("  {} {}\n", "•".cyan(), rec));
        }
    }

    if let Some(ref explanation) = report.explanation {
        out.push_str(&format!("\n{}\n", "WHY".bright_blue().bold()));
        out.push_str(&format!("  {}\n", explanation.summary.bright_white()));
        for reason in &explanation.reasons {
            out.push_str(&format!("  {} {}\n", "-".bright_black(), reason));
        }
        out.push_str(&format!(
            "  {} {}\n",
            "Tip:".cyan().bold(),
            explanation.educational_tip
        ));
    }

    out
}

pub fn format_domain_check(check: &DomainCheck) -> String {
    let mut out = String::new();

    if check.is_official {
        out.push_str(&format!(
            "{} {} is an official domain\n",
            "✓".green().bold(),
            check.domain.bright_white()
        ));
    } else {
        out.push_str(&format!(
            "{} {} is not in the official registry\n",
            "✗".yellow().bold(),
            check.domain.bright_white()
        ));
    }

    if let Some(ref entity) = check.entity {
        out.push_str(&format!(
            "  {} Entity:   {} ({})\n",
            "→".blue(),
            entity.name.bright_white(),
            entity.category
        ));
        if let Some(ref website) = entity.website {
            out.push_str(&format!("  {} Website:  {}\n", "→".blue(), website));
        }
        if let Some(ref country) = entity.country {
            out.push_str(&format!("  {} Country:  {}\n", "→".blue(), country));
        }
    }

    out
}

pub fn format_batch_report(report: &BatchReport) -> String {
    let mut out = String::new();

    for entry in &report.results {
        match (entry.status, entry.is_official) {
            (BatchStatus::Success, Some(true)) => {
                let entity = entry
                    .entity
                    .as_ref()
                    .map(|e| format!(" ({})", e.name))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "  {} {}{}\n",
                    "✓".green().bold(),
                    entry.domain.bright_white(),
                    entity
                ));
            }
            (BatchStatus::Success, _) => {
                out.push_str(&format!(
                    "  {} {} not official\n",
                    "✗".yellow().bold(),
                    entry.domain.bright_white()
                ));
            }
            (BatchStatus::Error, _) => {
                out.push_str(&format!(
                    "  {} {} {}\n",
                    "⚠".red().bold(),
                    entry.domain.bright_white(),
                    entry.error.as_deref().unwrap_or("unknown error").red()
                ));
            }
        }
    }

    out.push_str(&format!(
        "{} Processed {} domain(s)\n",
        "→".blue(),
        report.processed
    ));
    out
}

pub fn format_similar_domains(result: &SimilarDomains) -> String {
    let mut out = String::new();

    if result.similar_domains.is_empty() {
        out.push_str(&format!(
            "{} No official domains resemble {}\n",
            "✓".green().bold(),
            result.input_domain.bright_white()
        ));
        return out;
    }

    out.push_str(&format!(
        "{} {} official domain(s) resemble {}\n",
        "⚠".yellow().bold(),
        result.count,
        result.input_domain.bright_white()
    ));
    for similar in &result.similar_domains {
        out.push_str(&format!(
            "  {} {:<30} {:>3}%  {}\n",
            "•".yellow(),
            similar.domain,
            similar.similarity,
            similar.warning.bright_black()
        ));
    }
    out
}

pub fn format_validation(validation: &DomainValidation) -> String {
    let mut out = String::new();

    let format_marker = if validation.is_valid {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    out.push_str(&format!(
        "{} {} (format {})\n",
        format_marker,
        validation.domain.bright_white(),
        if validation.is_valid { "valid" } else { "invalid" }
    ));
    out.push_str(&format!(
        "  {} Risk:     {} (score {})\n",
        "→".blue(),
        colorize_risk(validation.risk_level),
        validation.suspicion_score
    ));

    for issue in &validation.issues {
        out.push_str(&format!("  {} {}\n", "⚠".yellow(), issue));
    }
    for rec in &validation.recommendations {
        out.push_str(&format!("  {} {}\n", "•".cyan(), rec));
    }
    out
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    Ok(spinner)
}

// Command handlers

pub fn handle_init(args: &ArgMatches) -> anyhow::Result<()> {
    let dir = args
        .get_one::<String>("PATH")
        .ok_or_else(|| anyhow!("PATH is required"))?;
    let force = args.get_flag("force");
    let config_dir = expand_path(dir);
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    println!("{} Target: {}", "→".blue(), config_path.display().to_string().bright_white());

    if config_path.exists() && !force {
        bail!(
            "{} already exists. Re-run with --force to overwrite it.",
            config_path.display()
        );
    }

    let progress = spinner("Writing default configuration")?;
    let written = write_default_config(&config_dir, &config_path);
    progress.finish_and_clear();
    written?;

    println!(
        "{} Wrote {}",
        "✓".green().bold(),
        config_path.display().to_string().bright_white()
    );
    println!(
        "{} Set {} and {} to enable threat intelligence",
        "→".blue(),
        "VIRUSTOTAL_API_KEY".cyan(),
        "GOOGLE_SAFE_BROWSING_API_KEY".cyan()
    );
    Ok(())
}

fn write_default_config(dir: &Path, path: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub async fn handle_verify(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let raw = args
        .get_one::<String>("url")
        .ok_or_else(|| anyhow!("--url is required"))?;
    let url = parse_url_line(raw).ok_or_else(|| anyhow!("'{}' is not a valid http(s) URL", raw))?;
    let level = if args.get_flag("full") {
        CheckLevel::Full
    } else {
        CheckLevel::Basic
    };
    let as_json = args.get_one::<String>("format").map(String::as_str) == Some("json");

    let aggregator = build_aggregator(config)?;

    let progress = if as_json {
        None
    } else {
        Some(spinner(&format!("Checking {} ({} check)", url, level))?)
    };
    let report = aggregator.evaluate(&url, level).await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    let report = report?;

    if as_json {
        print_json(&report)
    } else {
        print!("{}", format_verdict_report(&report));
        Ok(())
    }
}

pub async fn handle_domain(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let domain = args
        .get_one::<String>("DOMAIN")
        .ok_or_else(|| anyhow!("DOMAIN is required"))?;

    let aggregator = build_aggregator(config)?;
    let check = aggregator.check_domain(domain).await?;
    print!("{}", format_domain_check(&check));
    Ok(())
}

pub async fn handle_batch(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let positional = args
        .get_many::<String>("DOMAINS")
        .map(|values| values.cloned().collect::<Vec<_>>());
    let hosts_file = args.get_one::<PathBuf>("hosts-file");
    let domains = load_domains_from_source(positional, hosts_file).map_err(|e| anyhow!(e))?;

    let aggregator = build_aggregator(config)?;
    let as_json = args.get_flag("json");

    // The registry accepts at most MAX_BATCH_SIZE domains per call
    let mut reports = Vec::new();
    for chunk in domains.chunks(MAX_BATCH_SIZE) {
        reports.push(aggregator.check_domains(chunk).await?);
    }

    if as_json {
        return print_json(&reports);
    }
    for report in &reports {
        print!("{}", format_batch_report(report));
    }
    Ok(())
}

pub fn handle_similar(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let domain = args
        .get_one::<String>("DOMAIN")
        .ok_or_else(|| anyhow!("DOMAIN is required"))?;

    let aggregator = build_aggregator(config)?;
    let result = aggregator.find_similar(domain)?;

    if args.get_flag("json") {
        print_json(&result)
    } else {
        print!("{}", format_similar_domains(&result));
        Ok(())
    }
}

pub fn handle_validate(args: &ArgMatches) -> anyhow::Result<()> {
    let domain = args
        .get_one::<String>("DOMAIN")
        .ok_or_else(|| anyhow!("DOMAIN is required"))?;

    let validation = validate_domain(domain);
    if args.get_flag("json") {
        print_json(&validation)
    } else {
        print!("{}", format_validation(&validation));
        Ok(())
    }
}

pub async fn handle_serve(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let bind = args
        .get_one::<String>("bind")
        .cloned()
        .unwrap_or_else(|| config.server.bind.clone());

    let aggregator = Arc::new(build_aggregator(config)?);
    println!(
        "{} Listening on {}",
        "→".blue(),
        format!("http://{}", bind).bright_white()
    );
    crate::server::serve(aggregator, &bind).await
}
