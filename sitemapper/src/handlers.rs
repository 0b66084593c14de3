use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitemapper_core::crawl::{CrawlOptions, CrawlTarget, crawl_site};
use sitemapper_core::data::{Database, SharedDatabase, lock_database, shared};
use sitemapper_core::model::UrlQuery;
use sitemapper_core::scheduler::RecrawlWorker;
use sitemapper_core::sitemap::{generate_sitemap, write_sitemap_file};
use sitemapper_core::SitemapError;
use sitemapper_scanner::ProgressCallback;
use std::fs;
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::server::{self, AppState};

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/sitemapper/";
pub const DATABASE_FILE: &str = "sitemapper.db";

// Helper functions for crawl handler

/// Load domains from either a file or a single domain argument
pub fn load_domains_from_source(
    domain: Option<&String>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_domains_from_file(hosts_file_path)
    } else if let Some(domain) = domain {
        Ok(vec![domain.clone()])
    } else {
        Err("Either --domain or --hosts-file must be provided".to_string())
    }
}

/// Load and parse domains from a newline-delimited file. Lines starting
/// with `#` are comments.
pub fn load_domains_from_file(path: &Path) -> Result<Vec<String>, String> {
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

/// Parse a single line as a crawl target, keeping it only if it has a host
pub fn parse_domain_line(line: &str) -> Option<String> {
    match CrawlTarget::parse(line) {
        Ok(_) => Some(line.to_string()),
        Err(_) => {
            eprintln!("{} Skipping invalid domain '{}'", "⚠".yellow(), line);
            None
        }
    }
}

/// Resolve the database file from `--db`, `SITEMAPPER_DB` or the default
/// config directory. A path ending in a separator or naming a directory gets
/// `sitemapper.db` appended.
pub fn resolve_db_path(arg: Option<&String>) -> PathBuf {
    let raw = arg.map(String::as_str).unwrap_or(DEFAULT_CONFIG_DIR);
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());

    if raw.ends_with('/') || path.is_dir() {
        path.join(DATABASE_FILE)
    } else {
        path
    }
}

fn open_database(args: &ArgMatches) -> anyhow::Result<SharedDatabase> {
    let db_path = resolve_db_path(args.get_one::<String>("db"));
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db = Database::new(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    Ok(shared(db))
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

pub fn handle_init(args: &ArgMatches) -> anyhow::Result<()> {
    print_divider();
    println!("{}", "  SITEMAPPER INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let config_arg = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_DIR);
    let force = args.get_flag("force");
    let expanded_config_dir = shellexpand::tilde(config_arg);
    let config_dir = Path::new(expanded_config_dir.as_ref());
    let db_loc = config_dir.join(DATABASE_FILE);
    let db_path = db_loc.as_path();

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    if Database::exists(db_path) {
        let overwrite = if force {
            true
        } else {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!("Database already exists at:");
            println!(
                "  {} {}",
                "•".yellow(),
                db_path.display().to_string().bright_white()
            );
            println!();
            let response = print_prompt("Would you like to overwrite it? [y/N]:")?;
            println!();
            response == "y" || response == "yes"
        };

        if overwrite {
            Database::remove(db_path)
                .with_context(|| format!("Failed to remove {}", db_path.display()))?;
            println!("{} Existing database removed", "✓".green().bold());
        } else {
            println!("{} Keeping existing database", "→".blue());
        }
        println!();
    }

    fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    if !Database::exists(db_path) {
        println!("{} Creating database...", "→".blue());
        Database::new(db_path)
            .with_context(|| format!("Failed to create database at {}", db_path.display()))?;
    }

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config directory: {}",
        "✓".green().bold(),
        config_dir.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

pub async fn handle_serve(args: &ArgMatches) -> anyhow::Result<()> {
    let host = args
        .get_one::<IpAddr>("host")
        .copied()
        .context("--host is required")?;
    let port = args
        .get_one::<u16>("port")
        .copied()
        .context("--port is required")?;
    let no_schedule = args.get_flag("no-schedule");

    let options = CrawlOptions {
        max_urls: *args.get_one::<usize>("max-urls").unwrap_or(&CrawlOptions::default().max_urls),
        ..CrawlOptions::default()
    };
    let db = open_database(args)?;

    let worker = if no_schedule {
        println!("{} Scheduled re-crawl disabled", "→".yellow());
        None
    } else {
        Some(RecrawlWorker::new(db.clone(), options.clone()).start())
    };

    println!(
        "{} Serving on {}",
        "✓".green().bold(),
        format!("http://{}:{}", host, port).bright_white()
    );

    let result = server::serve(AppState::new(db, options), SocketAddr::new(host, port)).await;

    if let Some(worker) = worker {
        worker.abort();
    }
    result
}

pub async fn handle_crawl(args: &ArgMatches) -> anyhow::Result<()> {
    let domain = args.get_one::<String>("domain");
    let hosts_file = args.get_one::<PathBuf>("hosts-file");
    let defaults = CrawlOptions::default();
    let options = CrawlOptions {
        max_urls: *args.get_one::<usize>("max-urls").unwrap_or(&defaults.max_urls),
        timeout_secs: *args.get_one::<u64>("timeout").unwrap_or(&defaults.timeout_secs),
    };

    let domains = load_domains_from_source(domain, hosts_file).map_err(anyhow::Error::msg)?;
    let db = open_database(args)?;

    println!("\n{} Crawling {} domain(s)", "→".blue().bold(), domains.len());
    println!("Max URLs: {}", options.max_urls);
    println!("Timeout: {}s\n", options.timeout_secs);

    let mut failures = 0;
    for input in &domains {
        let target = match CrawlTarget::parse(input) {
            Ok(target) => target,
            Err(e) => {
                eprintln!("{} {}", "✗".red().bold(), e);
                failures += 1;
                continue;
            }
        };

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("{}: starting", target.domain));

        let bar = spinner.clone();
        let host = target.domain.clone();
        let progress: ProgressCallback = Arc::new(move |count: usize, url: String| {
            bar.set_message(format!("{}: [{}] {}", host, count, url));
        });

        match crawl_site(&db, &target, &options, Some(progress)).await {
            Ok(outcome) => {
                spinner.finish_and_clear();
                print_crawl_summary(
                    &db,
                    &outcome.domain,
                    outcome.summary.pages_crawled,
                    outcome.summary.pages_failed,
                );
            }
            Err(e) => {
                spinner.finish_and_clear();
                eprintln!("{} Crawl of {} failed: {}", "✗".red().bold(), target.domain, e);
                failures += 1;
            }
        }
    }

    if failures == domains.len() {
        bail!("All crawls failed");
    }
    Ok(())
}

fn print_crawl_summary(db: &SharedDatabase, domain: &str, crawled: usize, failed: usize) {
    print_divider();
    println!("{} {}", "✓ Crawl complete:".green().bold(), domain.bright_white());
    println!("  Pages stored: {}", crawled.to_string().cyan());
    println!("  Pages failed: {}", failed.to_string().cyan());

    let stats =
        lock_database(db).and_then(|conn| conn.stats(domain).map_err(SitemapError::from));
    match stats {
        Ok(stats) => {
            println!("  Known URLs:   {}", stats.total.to_string().cyan());
            println!(
                "  OK / broken:  {} / {}",
                stats.ok.to_string().green(),
                stats.broken.to_string().red()
            );
        }
        Err(e) => warn!("Could not read stats for {}: {}", domain, e),
    }
    print_divider();
    println!();
}

pub fn handle_generate(args: &ArgMatches) -> anyhow::Result<()> {
    let domain = args
        .get_one::<String>("domain")
        .context("--domain is required")?;
    let output = args.get_one::<PathBuf>("output");
    let compress = args.get_flag("gzip");

    let target = CrawlTarget::parse(domain)?;
    let db = open_database(args)?;
    let sitemap = generate_sitemap(&db, &target.domain)?;

    match output {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            let path = PathBuf::from(expanded);
            write_sitemap_file(&path, &sitemap, compress)?;
            println!(
                "{} Sitemap for {} written to {} ({} URLs)",
                "✓".green().bold(),
                target.domain.bright_white(),
                path.display().to_string().bright_white(),
                sitemap.total_urls.to_string().cyan()
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            if compress {
                stdout.write_all(&sitemap.gzipped)?;
            } else {
                stdout.write_all(sitemap.xml.as_bytes())?;
            }
            stdout.flush()?;
        }
    }
    Ok(())
}

pub fn handle_stats(args: &ArgMatches) -> anyhow::Result<()> {
    let domain = args
        .get_one::<String>("domain")
        .context("--domain is required")?;
    let target = CrawlTarget::parse(domain)?;
    let db = open_database(args)?;

    let stats = lock_database(&db)?.stats(&target.domain)?;

    println!("{} {}", "Domain:".blue().bold(), target.domain.bright_white());
    println!("  Total URLs:   {}", stats.total.to_string().cyan());
    println!("  OK (200):     {}", stats.ok.to_string().green());
    println!("  Broken:       {}", stats.broken.to_string().red());
    match stats.last_crawled {
        Some(at) => println!("  Last crawled: {}", at.to_rfc3339().bright_white()),
        None => println!("  Last crawled: {}", "never".yellow()),
    }
    Ok(())
}

pub fn handle_urls(args: &ArgMatches) -> anyhow::Result<()> {
    let domain = args
        .get_one::<String>("domain")
        .context("--domain is required")?;
    let target = CrawlTarget::parse(domain)?;

    let mut query = UrlQuery::new(target.domain);
    query.status = args.get_one::<u16>("status").copied();
    query.page = *args.get_one::<u32>("page").unwrap_or(&1);
    query.limit = *args.get_one::<u32>("limit").unwrap_or(&UrlQuery::DEFAULT_LIMIT);

    let db = open_database(args)?;
    let page = lock_database(&db)?.list_urls(&query)?;

    for url in &page.urls {
        let status = match url.http_status {
            200..=299 => url.http_status.to_string().green(),
            300..=399 => url.http_status.to_string().cyan(),
            400..=499 => url.http_status.to_string().yellow(),
            _ => url.http_status.to_string().red(),
        };
        println!(
            "  {} {:.1} {:<7} {}",
            status,
            url.priority,
            url.change_frequency.as_str(),
            url.url
        );
    }

    println!(
        "\nPage {} of {} ({} URLs total)",
        page.pagination.current_page,
        page.pagination.pages.max(1),
        page.pagination.total
    );
    Ok(())
}
