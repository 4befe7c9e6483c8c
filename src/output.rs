use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::record::Record;
use crate::summary::AggregateSummary;

pub const API_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub generated_at: String,
    pub total_modules: usize,
    pub total_modules_in_process: usize,
    pub source: String,
    pub modules_in_process_source: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_enriched: Option<usize>,
}

impl Metadata {
    pub fn new(
        modules: &[Record],
        in_process: &[Record],
        source: &str,
        in_process_source: &str,
    ) -> Self {
        Metadata {
            generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            total_modules: modules.len(),
            total_modules_in_process: in_process.len(),
            source: source.to_string(),
            modules_in_process_source: in_process_source.to_string(),
            version: API_VERSION.to_string(),
            total_enriched: None,
        }
    }
}

/// Everything that ends up in the static API directory.
pub struct ApiPayload<'a> {
    pub metadata: Metadata,
    pub modules: &'a [Record],
    pub in_process: &'a [Record],
    pub algorithms: Option<&'a AggregateSummary>,
}

/// Write every API file under `dir`, returning the paths written.
pub fn write_api(dir: &Path, payload: &ApiPayload) -> Result<Vec<PathBuf>> {
    let meta = &payload.metadata;
    let mut written = Vec::new();
    let mut write = |name: &str, value: &serde_json::Value| -> Result<()> {
        let path = dir.join(name);
        save_json(value, &path)?;
        written.push(path);
        Ok(())
    };

    write(
        "modules.json",
        &json!({ "metadata": meta, "modules": payload.modules }),
    )?;
    write(
        "modules-in-process.json",
        &json!({ "metadata": meta, "modules_in_process": payload.in_process }),
    )?;
    write("metadata.json", &serde_json::to_value(meta)?)?;

    let mut endpoints = json!({
        "modules": "/api/modules.json",
        "modules_in_process": "/api/modules-in-process.json",
        "metadata": "/api/metadata.json",
    });
    if let Some(summary) = payload.algorithms {
        write(
            "algorithms.json",
            &json!({ "metadata": meta, "algorithms": summary }),
        )?;
        endpoints["algorithms"] = json!("/api/algorithms.json");
    }

    write(
        "index.json",
        &json!({
            "name": "NIST CMVP Data API",
            "description": "Static API for NIST Cryptographic Module Validation Program validated modules",
            "endpoints": endpoints,
            "last_updated": meta.generated_at,
            "total_modules": meta.total_modules,
            "total_modules_in_process": meta.total_modules_in_process,
        }),
    )?;

    Ok(written)
}

/// Pretty-print `value` to `path`, creating parent directories.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    info!("Saved: {}", path.display());
    Ok(())
}
