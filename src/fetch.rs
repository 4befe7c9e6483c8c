use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Settings;
use crate::record::CertNumber;

/// Crawl stats returned after completion.
pub struct CrawlStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

pub fn client(settings: &Settings) -> Result<Client> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch a page body. No retries; callers decide what a failure means.
pub async fn fetch_page(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Error fetching {}", url))?
        .error_for_status()
        .with_context(|| format!("Bad status from {}", url))?;
    let body = response
        .bytes()
        .await
        .with_context(|| format!("Error reading body of {}", url))?;
    Ok(body.to_vec())
}

/// Fetch every certificate page concurrently, collecting bodies as they arrive.
/// A failed fetch only drops that certificate.
pub async fn fetch_details(
    client: &Client,
    pages: Vec<(CertNumber, String)>,
    concurrency: usize,
) -> Result<(BTreeMap<CertNumber, String>, CrawlStats)> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = pages.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send bodies, main loop collects them
    let (tx, mut rx) =
        tokio::sync::mpsc::channel::<(CertNumber, Option<String>)>(concurrency.max(1) * 2);

    for (cert, url) in pages {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let body = match fetch_page(&client, &url).await {
                Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => {
                    warn!("Certificate {}: {:#}", cert, e);
                    None
                }
            };
            let _ = tx.send((cert, body)).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut bodies = BTreeMap::new();
    let mut errors = 0usize;
    while let Some((cert, body)) = rx.recv().await {
        match body {
            Some(body) => {
                bodies.insert(cert, body);
            }
            None => errors += 1,
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    let ok = bodies.len();
    info!("Fetched {} certificate pages ({} ok, {} errors)", total, ok, errors);

    Ok((bodies, CrawlStats { total, ok, errors }))
}
