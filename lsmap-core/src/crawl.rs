use crate::error::Result;
use crate::output::{LineCounts, OutputPaths, OutputWriters};
use crate::source::{ArchiveTable, DEFAULT_HINTS_URL, fetch_archive, fetch_directory};
use indicatif::{ProgressBar, ProgressStyle};
use lsmap_scanner::{HarvestConfig, Mapper, OutputSink, ResolvedAddress, StatsSnapshot};
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub hints_url: String,
    pub output_dir: PathBuf,
    pub harvest: HarvestConfig,
    pub show_progress_bars: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            hints_url: DEFAULT_HINTS_URL.to_string(),
            output_dir: PathBuf::from("."),
            harvest: HarvestConfig::default(),
            show_progress_bars: false,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// What a finished crawl produced
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub hints_url: String,
    pub locations: usize,
    pub stats: StatsSnapshot,
    pub lines: LineCounts,
    pub paths: OutputPaths,
}

/// Execute a full crawl: directory, archives, every reachable host.
///
/// Returns once every archive, table and harvest task has finished and all
/// three logs have been flushed.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlReport> {
    let CrawlOptions {
        hints_url,
        output_dir,
        harvest,
        show_progress_bars,
    } = options;

    let paths = OutputPaths::for_startup(&output_dir);
    let (sink, receivers) = OutputSink::channel();
    let writers = OutputWriters::open(&paths, receivers).await?;
    info!(
        edges = %paths.edges.display(),
        summaries = %paths.summaries.display(),
        results = %paths.results.display(),
        "Opened output logs"
    );

    // Set up single progress bar for overall crawl progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Fetching directory...");
        Some(pb)
    } else {
        None
    };

    let client = Client::builder()
        .user_agent(harvest.user_agent.clone())
        .timeout(harvest.timeout)
        .build()
        .map_err(lsmap_scanner::ScanError::from)?;

    let mut mapper = Mapper::new(harvest, sink)?;
    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        mapper = mapper.with_progress_callback(Arc::new(
            move |address: &ResolvedAddress, count: usize| {
                pb.set_message(format!("Harvesting... {} hosts dispatched ({})", count, address));
            },
        ));
    }

    let locations = fetch_directory(&client, &hints_url).await?;
    if let Some(ref callback) = progress_callback {
        callback(format!("Found {} cache archive(s)", locations.len()));
    }

    for location in &locations {
        let archive_mapper = mapper.clone();
        let client = client.clone();
        let location = location.clone();
        mapper.spawn(async move {
            process_archive(&archive_mapper, &client, &location).await;
        });
    }

    mapper.wait().await;
    let stats = mapper.stats();
    // Last senders go with the mapper; the writers finish once drained
    drop(mapper);
    let lines = writers.join().await?;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Crawl complete! {} hosts dispatched",
            stats.dispatched
        ));
    }
    info!(
        dispatched = stats.dispatched,
        edges = lines.edges,
        summaries = lines.summaries,
        results = lines.results,
        "Crawl complete"
    );

    Ok(CrawlReport {
        hints_url,
        locations: locations.len(),
        stats,
        lines,
        paths,
    })
}

/// Fetch one archive and spawn a resolution task per table
async fn process_archive(mapper: &Mapper, client: &Client, location: &str) {
    let tables = match fetch_archive(client, location).await {
        Ok(tables) => tables,
        Err(e) => {
            warn!(location = %location, "Skipping archive: {}", e);
            return;
        }
    };

    for table in tables {
        info!(location = %location, table = %table.name, rows = table.locators.len(), "Processing cache file");
        let table_mapper = mapper.clone();
        let location = location.to_string();
        mapper.spawn(async move {
            process_table(&table_mapper, &table, &location).await;
        });
    }
}

async fn process_table(mapper: &Mapper, table: &ArchiveTable, location: &str) {
    for record in table.records(location) {
        mapper.resolve(&record).await;
    }
}

/// Generate a crawl report
pub fn generate_crawl_report(report: &CrawlReport) -> String {
    let mut out = String::new();
    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    out.push_str("# Summary:\n");
    out.push_str(&format!("  Directory: {}\n", report.hints_url));
    out.push_str(&format!("  Cache archives: {}\n", report.locations));
    out.push_str(&format!("  Hosts dispatched: {}\n", report.stats.dispatched));
    out.push_str(&format!("  Hosts abandoned: {}\n", report.stats.abandoned));
    out.push_str(&format!("  Tests listed: {}\n", report.stats.tests));
    out.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    out.push_str("# Logs:\n");
    let rows = [
        ("edges", report.lines.edges, &report.paths.edges),
        ("summaries", report.lines.summaries, &report.paths.summaries),
        ("results", report.lines.results, &report.paths.results),
    ];
    for (name, count, path) in rows {
        out.push_str(&format!("  {:<10} {:>8}  {}\n", name, count, path.display()));
    }
    out.push('\n');

    out
}
