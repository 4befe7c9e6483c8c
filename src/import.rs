use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::error::Condition;
use crate::record::CertNumber;

/// Load a precomputed `{"<certificate>": ["AES", ...]}` file.
///
/// Stands in for fetching and classifying every detail page. Lists come back
/// sorted and deduplicated, the same shape the line classifier produces. An
/// unreadable or malformed source yields an empty map.
pub fn import_all(path: &Path) -> HashMap<CertNumber, Vec<String>> {
    match try_import(path) {
        Ok(entries) => {
            info!("Imported algorithms for {} certificates from {}", entries.len(), path.display());
            entries
        }
        Err(e) => {
            warn!(
                "{}: {:#}",
                Condition::ImportSourceUnavailable(path.display().to_string()),
                e
            );
            HashMap::new()
        }
    }
}

fn try_import(path: &Path) -> Result<HashMap<CertNumber, Vec<String>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: BTreeMap<String, Vec<String>> =
        serde_json::from_str(&raw).context("Expected an object of certificate → string list")?;

    let mut entries = HashMap::with_capacity(parsed.len());
    for (key, values) in parsed {
        let Ok(cert) = key.trim().parse::<CertNumber>() else {
            debug!("Skipping non-numeric certificate key {:?}", key);
            continue;
        };
        let categories: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        entries.insert(cert, categories.into_iter().collect());
    }
    Ok(entries)
}
