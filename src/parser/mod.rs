pub mod fields;
pub mod lines;
pub mod page;
pub mod table;

use tracing::warn;

use crate::config::ExtractConfig;
use crate::record::Record;
use fields::DetailSet;

/// Records from a fetched listing page. Parse failures and missing tables
/// are logged and yield an empty list so other sources keep going.
pub fn listing_records(body: &[u8], source: &str, config: &ExtractConfig) -> Vec<Record> {
    match table::extract_bytes(body, &config.origin) {
        Ok(extraction) => {
            if let Some(condition) = extraction.condition {
                warn!("{}: {}", source, condition);
            }
            extraction.records
        }
        Err(e) => {
            warn!("Skipping {}: {}", source, e);
            Vec::new()
        }
    }
}

/// Two-pass pipeline for a detail page: body → lines → detail set.
pub fn process_detail_page(body: &str, config: &ExtractConfig) -> DetailSet {
    let text = page::to_lines(body);
    fields::extract(&text, config)
}
