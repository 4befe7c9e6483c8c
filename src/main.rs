mod config;
mod enrich;
mod error;
mod fetch;
mod import;
mod output;
mod parser;
mod record;
mod summary;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{ExtractConfig, Settings};
use parser::fields::DetailSet;
use record::{identifier, CertNumber};

#[derive(Parser)]
#[command(name = "cmvp_scraper", about = "NIST CMVP validated modules → static JSON API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape both listings, enrich, and write the API files
    Run {
        /// Fetch each certificate page and merge its fields
        #[arg(long)]
        details: bool,
        /// Max certificate pages to fetch (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Precomputed certificate → algorithms JSON file
        #[arg(long)]
        algorithms: Option<PathBuf>,
        /// Output directory (default: NIST_OUTPUT_DIR or ./api)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract the first table of a local HTML file
    Table { file: PathBuf },
    /// Extract certificate fields from local detail pages (HTML or markdown)
    Details {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Summarize a precomputed certificate → algorithms file
    Summary { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let extract_config = ExtractConfig::from_settings(&settings);

    let result = match cli.command {
        Commands::Run {
            details,
            limit,
            algorithms,
            output,
        } => {
            let opts = RunOptions {
                details,
                limit,
                algorithms,
                output: output.unwrap_or_else(|| settings.output_dir.clone()),
            };
            run_pipeline(&settings, &extract_config, opts).await
        }
        Commands::Table { file } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let extraction = parser::table::extract_bytes(&bytes, &extract_config.origin)?;
            if let Some(condition) = &extraction.condition {
                warn!("{}: {}", file.display(), condition);
            }
            println!("{}", serde_json::to_string_pretty(&extraction.records)?);
            Ok(())
        }
        Commands::Details { files } => {
            let results: Vec<(String, anyhow::Result<DetailSet>)> = files
                .par_iter()
                .map(|file| {
                    let set = std::fs::read(file)
                        .with_context(|| format!("Failed to read {}", file.display()))
                        .map(|bytes| {
                            let body = String::from_utf8_lossy(&bytes);
                            parser::process_detail_page(&body, &extract_config)
                        });
                    (file.display().to_string(), set)
                })
                .collect();

            let mut out: IndexMap<String, DetailSet> = IndexMap::new();
            for (name, set) in results {
                match set {
                    Ok(set) => {
                        out.insert(name, set);
                    }
                    Err(e) => warn!("{:#}", e),
                }
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Commands::Summary { file } => {
            let imported: BTreeMap<CertNumber, Vec<String>> =
                import::import_all(&file).into_iter().collect();
            let s = summary::summarize(&imported);
            println!("{}", serde_json::to_string_pretty(&s)?);
            Ok(())
        }
    };

    // stdout carries subcommand JSON
    if let Some(line) = done_line(t0.elapsed()) {
        eprintln!("{}", line);
    }

    result
}

fn done_line(elapsed: std::time::Duration) -> Option<String> {
    (elapsed.as_secs() >= 1).then(|| format!("\nDone in {}", format_duration(elapsed)))
}

struct RunOptions {
    details: bool,
    limit: Option<usize>,
    algorithms: Option<PathBuf>,
    output: PathBuf,
}

async fn run_pipeline(
    settings: &Settings,
    extract_config: &ExtractConfig,
    opts: RunOptions,
) -> anyhow::Result<()> {
    let client = fetch::client(settings)?;

    // Phase 1: listings
    let listing_url = settings.listing_url();
    let in_process_url = settings.in_process_url();
    println!("Scraping validated modules: {}", listing_url);
    let mut modules = scrape_listing(&client, &listing_url, extract_config).await;
    if modules.is_empty() {
        bail!(
            "No validated modules found. Verify the URL is correct (set NIST_SEARCH_PATH to override): {}",
            listing_url
        );
    }
    println!("Found {} validated modules", modules.len());

    println!("Scraping modules in process: {}", in_process_url);
    let in_process = scrape_listing(&client, &in_process_url, extract_config).await;
    println!("Found {} modules in process", in_process.len());

    // Phase 2: enrichment
    let report = enrich::enrich_urls(&mut modules, &extract_config.origin);
    info!(
        "URL enrichment: {} merged, {} without certificate number",
        report.merged, report.missing_identifier
    );

    let mut categories: BTreeMap<CertNumber, Vec<String>> = BTreeMap::new();

    if let Some(path) = &opts.algorithms {
        let imported = import::import_all(path);
        let report = enrich::enrich_algorithms(&mut modules, &imported);
        info!("Algorithm import: {} modules enriched", report.merged);
        categories.extend(imported);
    }

    let mut enriched = None;
    if opts.details {
        let t_details = Instant::now();
        let details = crawl_details(&client, settings, extract_config, &modules, opts.limit).await?;
        let report = enrich::enrich_details(&mut modules, &details);
        println!(
            "Enriched {} modules from certificate pages in {:.1}s ({} without a page)",
            report.merged,
            t_details.elapsed().as_secs_f64(),
            report.unmatched,
        );
        for (cert, set) in details {
            if !set.algorithms.is_empty() {
                categories.insert(cert, set.algorithms);
            }
        }
        enriched = Some(report.merged);
    }

    let algorithms = (!categories.is_empty()).then(|| summary::summarize(&categories));

    // Phase 3: API files
    let mut metadata =
        output::Metadata::new(&modules, &in_process, &listing_url, &in_process_url);
    metadata.total_enriched = enriched;
    let payload = output::ApiPayload {
        metadata,
        modules: &modules,
        in_process: &in_process,
        algorithms: algorithms.as_ref(),
    };
    let written = output::write_api(&opts.output, &payload)?;
    println!(
        "Wrote {} files to {} ({} modules, {} in process, {} algorithm categories)",
        written.len(),
        opts.output.display(),
        modules.len(),
        in_process.len(),
        algorithms.as_ref().map_or(0, |a| a.len()),
    );
    Ok(())
}

/// Fetch one listing page and extract its records; any failure yields none.
async fn scrape_listing(
    client: &reqwest::Client,
    url: &str,
    extract_config: &ExtractConfig,
) -> Vec<record::Record> {
    match fetch::fetch_page(client, url).await {
        Ok(body) => parser::listing_records(&body, url, extract_config),
        Err(e) => {
            warn!("{:#}", e);
            Vec::new()
        }
    }
}

/// Fetch certificate pages, then extract them in parallel.
async fn crawl_details(
    client: &reqwest::Client,
    settings: &Settings,
    extract_config: &ExtractConfig,
    modules: &[record::Record],
    limit: Option<usize>,
) -> anyhow::Result<BTreeMap<CertNumber, DetailSet>> {
    let mut certs: Vec<CertNumber> = modules.iter().filter_map(identifier).collect();
    certs.sort_unstable();
    certs.dedup();
    if let Some(n) = limit {
        certs.truncate(n);
    }

    let pages: Vec<(CertNumber, String)> = certs
        .into_iter()
        .map(|cert| (cert, enrich::certificate_url(&extract_config.origin, cert)))
        .collect();
    println!("Fetching {} certificate pages...", pages.len());
    let (bodies, stats) = fetch::fetch_details(client, pages, settings.concurrency).await?;
    println!(
        "Fetched {} pages ({} ok, {} errors)",
        stats.total, stats.ok, stats.errors
    );

    let details = bodies
        .par_iter()
        .map(|(cert, body)| (*cert, parser::process_detail_page(body, extract_config)))
        .collect();
    Ok(details)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn done_line_only_after_a_second() {
        assert_eq!(done_line(Duration::from_millis(400)), None);
        assert_eq!(done_line(Duration::from_secs(75)).as_deref(), Some("\nDone in 1m 15s"));
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
