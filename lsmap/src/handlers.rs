use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use lsmap_core::crawl::{CrawlOptions, CrawlReport, execute_crawl, generate_crawl_report};
use lsmap_scanner::HarvestConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub fn print_banner() {
    println!(
        "{} {}",
        "lsmap".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_white()
    );
    println!("{}", "lookup service crawler and measurement host harvester".blue());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Expand a leading `~` in the output directory
pub fn expand_output_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Turn `crawl` arguments into crawl options
pub fn crawl_options_from_args(args: &ArgMatches, quiet: bool) -> anyhow::Result<CrawlOptions> {
    let hints_url = args
        .get_one::<Url>("HINTS_URL")
        .context("missing hints URL")?;
    let output_dir = args
        .get_one::<String>("output-dir")
        .map(|raw| expand_output_dir(raw))
        .unwrap_or_else(|| PathBuf::from("."));
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&10);
    let port = *args.get_one::<u16>("port").unwrap_or(&80);
    let no_progress = args.get_flag("no-progress");

    Ok(CrawlOptions {
        hints_url: hints_url.as_str().to_string(),
        output_dir,
        harvest: HarvestConfig::default()
            .with_port(port)
            .with_timeout(Duration::from_secs(timeout)),
        show_progress_bars: !quiet && !no_progress,
    })
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    // Logs go to stderr, stdout carries the spinner and report
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let options = crawl_options_from_args(sub_matches, quiet)?;

    if !quiet {
        print_divider();
        println!("{}", "  CRAWL".bright_white().bold());
        print_divider();
        println!("{} Directory: {}", "→".blue(), options.hints_url.bright_white());
        println!(
            "{} Output: {}",
            "→".blue(),
            options.output_dir.display().to_string().bright_white()
        );
        println!(
            "{} Timeout: {}s, port {}",
            "→".blue(),
            options.harvest.timeout.as_secs(),
            options.harvest.port
        );
        println!();
    }

    let progress_callback = Arc::new(move |msg: String| {
        if !quiet {
            println!("{} {}", "ℹ".blue(), msg);
        }
    });

    let hints_url = options.hints_url.clone();
    let report = execute_crawl(options, Some(progress_callback))
        .await
        .with_context(|| format!("crawl of {} failed", hints_url))?;

    if !quiet {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &CrawlReport) {
    println!("\n{} Crawl complete!\n", "✓".green().bold());
    print!("{}", generate_crawl_report(report));
    if report.stats.dispatched == 0 {
        println!(
            "{} No hosts were reached; check the directory URL",
            "⚠".yellow().bold()
        );
    }
}
