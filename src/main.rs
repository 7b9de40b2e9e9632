mod coords;
mod crawler;
mod dataset;
mod describe;
mod extractor;
mod fetch;
mod parser;
mod pipeline;
mod record;
mod settings;
mod store;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::crawler::PageCrawler;
use crate::dataset::DatasetAccumulator;
use crate::extractor::FieldExtractor;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::pipeline::Pipeline;
use crate::record::COLUMNS;
use crate::settings::{Pagination, Settings};

#[derive(Parser)]
#[command(name = "wta_scraper", about = "Washington Trails Association hike scraper")]
struct Cli {
    /// Log why each field came back NR
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct PageArgs {
    /// First listing page (0-based)
    #[arg(long)]
    start_page: Option<usize>,
    /// Number of listing pages (fixed pagination)
    #[arg(short = 'n', long)]
    pages: Option<usize>,
    /// fixed: one crawl per page offset; follow-next: chase "next" links
    #[arg(long, value_enum)]
    pagination: Option<Pagination>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl, extract and rewrite the dataset file
    Run {
        #[command(flatten)]
        pages: PageArgs,
        /// Parallel detail fetches
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Pause after each request, per worker
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Dataset CSV (read, then rewritten)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List detail links without fetching them
    Crawl {
        #[command(flatten)]
        pages: PageArgs,
    },
    /// Extract one trail page and print it as JSON
    Extract { url: String },
    /// Print a trail's description
    Describe { url: String },
    /// Row and NR counts of a stored dataset
    Stats {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl PageArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(p) = self.start_page {
            settings.start_page = p;
        }
        if let Some(n) = self.pages {
            settings.total_pages = n;
        }
        if let Some(mode) = self.pagination {
            settings.pagination = mode;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let t0 = Instant::now();
    let mut settings = Settings::load()?;

    let result = match cli.command {
        Commands::Run {
            pages,
            concurrency,
            delay_ms,
            output,
        } => {
            pages.apply(&mut settings);
            if let Some(c) = concurrency {
                settings.concurrency = c;
            }
            if let Some(ms) = delay_ms {
                settings.request_delay_ms = ms;
            }
            if let Some(path) = output {
                settings.output = path;
            }
            settings.validate()?;
            run(&settings).await
        }
        Commands::Crawl { pages } => {
            pages.apply(&mut settings);
            settings.validate()?;
            crawl(&settings).await
        }
        Commands::Extract { url } => {
            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&settings)?);
            let record = FieldExtractor::new(fetcher).extract(&url).await?;
            println!("{}", serde_json::to_string_pretty(&record.to_json())?);
            Ok(())
        }
        Commands::Describe { url } => {
            let fetcher = HttpFetcher::new(&settings)?;
            match describe::fetch_description(&fetcher, &url).await? {
                Some(text) => println!("{}", text),
                None => println!("No description found on {}", url),
            }
            Ok(())
        }
        Commands::Stats { output } => {
            let path = output.unwrap_or(settings.output);
            let ds = store::load(&path)?;
            if ds.is_empty() {
                println!("No rows in {}.", path.display());
                return Ok(());
            }
            let rows: Vec<_> = ds.iter().map(|(_, r)| r.unreported_columns()).collect();
            println!("Rows:      {}", ds.len());
            for col in &COLUMNS[1..11] {
                let nr = rows.iter().filter(|cols| cols.contains(col)).count();
                println!("{:<15} NR {:>6} ({:.1}%)", col, nr, 100.0 * nr as f64 / ds.len() as f64);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: &Settings) -> anyhow::Result<()> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(settings)?);
    let dataset = store::load(&settings.output)?;
    let mut acc = DatasetAccumulator::new(dataset);

    let pipeline = Pipeline::new(fetcher, settings);
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight pages, then saving");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let plan = pipeline::segments(settings);
    info!("Plan: {} listing segment(s), {:?} pagination", plan.len(), settings.pagination);

    // Save whatever was committed even if the run failed part way.
    let outcome = pipeline.run(&plan, &mut acc).await;
    let saved = acc.snapshot();
    store::save(&settings.output, &saved)
        .with_context(|| format!("Failed to write {}", settings.output.display()))?;
    let stats = outcome?;

    println!(
        "Started {}: {} listing segment(s), {} links, {} rows committed, {} skipped.",
        stats.started_at.format("%Y-%m-%d %H:%M:%S"),
        stats.segments,
        stats.links,
        stats.committed,
        stats.skipped
    );
    for (row, reason) in acc.skipped() {
        let kept = if saved.get(*row).is_some() { " (previous row kept)" } else { "" };
        println!("  skipped row {}{}: {}", row, kept, reason);
    }
    if !stats.not_reported.is_empty() {
        let nr: Vec<String> = stats
            .not_reported
            .iter()
            .map(|(col, n)| format!("{} {}", col, n))
            .collect();
        println!("NR by column: {}", nr.join(", "));
    }
    if stats.cancelled {
        match stats.last_row {
            Some(row) => println!(
                "Cancelled after row {}. Resume with --start-page {}.",
                row,
                row / settings.page_size
            ),
            None => println!("Cancelled before any row was committed."),
        }
    }
    Ok(())
}

async fn crawl(settings: &Settings) -> anyhow::Result<()> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(settings)?);
    let crawler = PageCrawler::new(fetcher, Duration::from_millis(settings.request_delay_ms));
    let mut total = 0;
    for seg in pipeline::segments(settings) {
        let links = crawler.collect_detail_links(&seg.url, seg.max_pages).await?;
        for (i, link) in links.iter().enumerate() {
            println!("{:>6}  {}", seg.first_row + i, link);
        }
        total += links.len();
    }
    println!("\n{} links", total);
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
