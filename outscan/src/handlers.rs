use clap::ArgMatches;
use colored::Colorize;
use outscan_core::allowlist::Allowlist;
use outscan_core::classify::ScanResult;
use outscan_core::config::{self, ScanOptions};
use outscan_core::error::CheckError;
use outscan_core::report::{ReportPaths, write_reports};
use outscan_core::scan::execute_scan;
use outscan_scanner::BatchSpec;
use std::path::PathBuf;
use url::Url;

pub const ALLOWLIST_PATH_VAR: &str = "ALLOWLIST_FILEPATH";
pub const EXTRA_URLS_PATH_VAR: &str = "EXTRA_URLS_FILEPATH";
pub const USER_AGENT_VAR: &str = "USER_AGENT";

/// The flag's value when given; the environment fallback only when the
/// flag is absent.
pub fn flag_or_env(matches: &ArgMatches, flag: &str, var: &str) -> Option<String> {
    matches
        .get_one::<String>(flag)
        .cloned()
        .or_else(|| std::env::var(var).ok())
}

/// Turn the parsed `scan` arguments into a fully-resolved options struct
/// plus the allowlist path. All environment reads happen here; nothing
/// deeper in the call chain touches the environment.
pub fn build_scan_options(matches: &ArgMatches) -> Result<(ScanOptions, PathBuf), CheckError> {
    let sitemap_url = matches
        .get_one::<Url>("sitemap-url")
        .map(|url| url.to_string());
    let specific_urls: Vec<String> = matches
        .get_many::<Url>("specific-url")
        .map(|urls| urls.map(|url| url.to_string()).collect())
        .unwrap_or_default();

    if sitemap_url.is_none() && specific_urls.is_empty() {
        return Err(CheckError::Config(
            "No sitemap or input URLs specified. Cannot proceed.".into(),
        ));
    }

    let batch: BatchSpec = match matches.get_one::<String>("batch") {
        Some(raw) => raw.parse()?,
        None => BatchSpec::default(),
    };

    let allowlist_path = flag_or_env(matches, "allowlist", ALLOWLIST_PATH_VAR).ok_or_else(|| {
        CheckError::Config(format!(
            "No allowlist given via --allowlist or {ALLOWLIST_PATH_VAR}"
        ))
    })?;
    let allowlist_path = PathBuf::from(shellexpand::tilde(&allowlist_path).into_owned());

    let user_agent = flag_or_env(matches, "user-agent", USER_AGENT_VAR)
        .unwrap_or_else(|| config::DEFAULT_USER_AGENT.to_string());

    let mut options = ScanOptions {
        sitemap_url,
        specific_urls,
        batch,
        maintain_hostname: matches.get_flag("maintain-hostname"),
        export_cache: matches.get_flag("export-cache"),
        output_dir: matches
            .get_one::<PathBuf>("output")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(config::DEFAULT_OUTPUT_DIR)),
        user_agent,
        timeout_secs: *matches
            .get_one::<u64>("timeout")
            .unwrap_or(&config::DEFAULT_TIMEOUT_SECS),
        max_sitemap_depth: *matches
            .get_one::<usize>("max-sitemap-depth")
            .unwrap_or(&outscan_scanner::sitemap::DEFAULT_MAX_DEPTH),
        show_progress: true,
        ..Default::default()
    };

    if let Some(path) = flag_or_env(matches, "extra-urls", EXTRA_URLS_PATH_VAR) {
        let path = shellexpand::tilde(&path).into_owned();
        let hostname = options.hostname()?;
        options.extra_urls = config::load_extra_urls(&path, &hostname)?;
    }

    Ok((options, allowlist_path))
}

/// Run one scan end to end and write the report artifacts.
pub async fn run_scan(
    matches: &ArgMatches,
) -> Result<(ScanResult, Option<ReportPaths>), CheckError> {
    let (options, allowlist_path) = build_scan_options(matches)?;
    let hostname = options.hostname()?;
    let allowlist = Allowlist::load(&allowlist_path, &hostname)?;

    let result = execute_scan(&options, &allowlist, None).await?;
    let paths = write_reports(
        &result,
        &hostname,
        &options.batch.label(),
        &options.output_dir,
    )?;
    Ok((result, paths))
}

pub async fn handle_scan(matches: &ArgMatches) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    match run_scan(matches).await {
        Ok((result, paths)) => {
            if result.is_clean() {
                println!(
                    "{} Checks completed and no unexpected outbound URLs found",
                    "✓".green().bold()
                );
            } else {
                if result.has_unexpected() {
                    println!(
                        "{} {} unexpected outbound URL(s) found",
                        "!".yellow().bold(),
                        result.unexpected_urls().len()
                    );
                }
                if !result.issues().is_empty() {
                    println!(
                        "{} {} document(s) could not be fully scanned",
                        "!".yellow().bold(),
                        result.issues().len()
                    );
                }
                if let Some(paths) = paths
                    && let Some(dir) = paths.flat.parent()
                {
                    println!("Reports written to {}", dir.display());
                }
            }
            // Finding violations is still a completed scan: exit 0 either way
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
