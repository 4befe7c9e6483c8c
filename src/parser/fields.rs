use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::lines::{self, Classification};
use crate::config::ExtractConfig;
use crate::record::Record;

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Label phrase on a certificate page → canonical field name.
pub const DEFAULT_LABELS: &[(&str, &str)] = &[
    ("module name", "module_name"),
    ("standard", "standard"),
    ("status", "status"),
    ("sunset date", "sunset_date"),
    ("validation dates", "validation_dates"),
    ("overall level", "overall_level"),
    ("caveat", "caveat"),
    ("security level exceptions", "security_level_exceptions"),
    ("module type", "module_type"),
    ("embodiment", "embodiment"),
    ("description", "description"),
    ("tested configuration", "tested_configurations"),
    ("vendor", "vendor_name"),
    ("lab", "lab"),
    ("hardware version", "hardware_versions"),
    ("firmware version", "firmware_versions"),
    ("software version", "software_versions"),
];

pub const NUMERIC_FIELDS: &[&str] = &["overall_level"];

/// Everything extracted from one certificate's detail document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetailSet {
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,
    pub algorithms: Vec<String>,
    pub algorithms_detailed: Vec<String>,
}

impl DetailSet {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn into_record(self) -> Record {
        let mut record: Record = self
            .fields
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        record.insert("algorithms".to_string(), strings(self.algorithms));
        record.insert("algorithms_detailed".to_string(), strings(self.algorithms_detailed));
        record
    }
}

fn strings(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

/// Pull labeled values out of semi-structured text. The first line that
/// yields a value for a field wins; later restatements are ignored.
pub fn extract(text: &str, config: &ExtractConfig) -> DetailSet {
    let lines: Vec<&str> = text.lines().collect();
    let mut fields: IndexMap<String, String> = IndexMap::new();

    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        let lower = line.to_lowercase();
        if lower.is_empty() {
            continue;
        }
        for (label, field) in &config.label_map {
            if fields.contains_key(field) || !starts_with_label(&lower, label) {
                continue;
            }
            let next = lines.get(i + 1).copied();
            if let Some(value) = resolve_value(line, next, &config.label_map) {
                fields.insert(field.clone(), value);
            }
        }
    }

    for field in &config.numeric_fields {
        if let Some(value) = fields.get_mut(field) {
            if let Some(m) = INTEGER_RE.find(value) {
                *value = m.as_str().to_string();
            }
        }
    }

    let Classification {
        details,
        categories,
    } = lines::classify(text, &config.keywords);

    DetailSet {
        fields,
        algorithms: categories.into_iter().collect(),
        algorithms_detailed: details,
    }
}

/// `lower` starts with the label itself or with its table-cell form `| label`.
fn starts_with_label(lower: &str, label: &str) -> bool {
    lower.starts_with(label)
        || lower
            .strip_prefix('|')
            .is_some_and(|rest| rest.trim_start().starts_with(label))
}

/// Pipe cell, then text after a colon, then the following line.
fn resolve_value(line: &str, next: Option<&str>, labels: &[(String, String)]) -> Option<String> {
    if line.contains('|') {
        let segments: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        return match segments.get(1) {
            Some(value) if *value != "---" => Some(value.to_string()),
            _ => None,
        };
    }

    if let Some((_, rest)) = line.split_once(':') {
        let rest = rest.trim();
        return (!rest.is_empty()).then(|| rest.to_string());
    }

    let next = next?.trim();
    let next_lower = next.to_lowercase();
    if next.is_empty() || labels.iter().any(|(l, _)| starts_with_label(&next_lower, l)) {
        return None;
    }
    Some(next.to_string())
}
