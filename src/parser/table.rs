use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::error::{Condition, ExtractError};
use crate::record::{is_empty_value, Record};

static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Where a table's column names came from. Resolved once per table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSource {
    Explicit(Vec<String>),
    InferredFromFirstRow(Vec<String>),
    None,
}

impl HeaderSource {
    fn names(&self) -> &[String] {
        match self {
            HeaderSource::Explicit(names) | HeaderSource::InferredFromFirstRow(names) => names,
            HeaderSource::None => &[],
        }
    }
}

#[derive(Debug, Default)]
pub struct TableExtraction {
    pub records: Vec<Record>,
    pub condition: Option<Condition>,
}

/// Decode raw bytes and extract the first table. Non-UTF-8 input is a parse error.
pub fn extract_bytes(bytes: &[u8], origin: &str) -> Result<TableExtraction, ExtractError> {
    let markup = std::str::from_utf8(bytes).map_err(|e| ExtractError::Parse(e.to_string()))?;
    Ok(extract(markup, origin))
}

/// Turn the first table in `markup` into records, one per data row.
pub fn extract(markup: &str, origin: &str) -> TableExtraction {
    let document = Html::parse_document(markup);
    let Some(table) = document.select(&TABLE_SEL).next() else {
        return TableExtraction {
            records: Vec::new(),
            condition: Some(Condition::NoTableFound),
        };
    };

    let rows = body_rows(table);
    let headers = resolve_headers(table, &rows);
    let skip = usize::from(matches!(headers, HeaderSource::InferredFromFirstRow(_)));

    let records = rows[skip..]
        .iter()
        .filter_map(|row| row_record(*row, &headers, origin))
        .collect();

    TableExtraction {
        records,
        condition: None,
    }
}

fn resolve_headers(table: ElementRef, rows: &[ElementRef]) -> HeaderSource {
    let header_row = child_elements(table, "thead")
        .first()
        .and_then(|thead| child_elements(*thead, "tr").into_iter().next());
    if let Some(row) = header_row {
        let names: Vec<String> = cells(row).into_iter().map(cell_text).collect();
        if !names.is_empty() {
            return HeaderSource::Explicit(names);
        }
    }

    if let Some(first) = rows.first() {
        let first_cells = cells(*first);
        if !first_cells.is_empty() && first_cells.iter().all(|c| c.value().name() == "th") {
            return HeaderSource::InferredFromFirstRow(
                first_cells.into_iter().map(cell_text).collect(),
            );
        }
    }

    HeaderSource::None
}

fn row_record(row: ElementRef, headers: &HeaderSource, origin: &str) -> Option<Record> {
    let names = headers.names();
    let mut record = Record::new();

    for (idx, cell) in cells(row).into_iter().enumerate() {
        let key = match names.get(idx) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("column_{}", idx),
        };
        let href = cell
            .select(&ANCHOR_SEL)
            .next()
            .and_then(|a| a.value().attr("href"))
            .filter(|h| !h.trim().is_empty());

        record.insert(key.clone(), Value::String(cell_text(cell)));
        if let Some(href) = href {
            record.insert(format!("{}_url", key), Value::String(absolutize(href.trim(), origin)));
        }
    }

    if record.values().all(is_empty_value) {
        None
    } else {
        Some(record)
    }
}

/// Prefix site-relative targets with `origin`; anything else passes through.
pub fn absolutize(href: &str, origin: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", origin.trim_end_matches('/'), href)
    } else {
        href.to_string()
    }
}

/// Rows of the table body: every `<tbody>`'s rows plus bare `<tr>` children.
fn body_rows(table: ElementRef) -> Vec<ElementRef> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tbody" => rows.extend(child_elements(child, "tr")),
            "tr" => rows.push(child),
            _ => {}
        }
    }
    rows
}

fn child_elements<'a>(parent: ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == name)
        .collect()
}

fn cells(row: ElementRef) -> Vec<ElementRef> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

/// Visible text, trimmed at both ends.
fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://csrc.nist.gov";

    fn records(html: &str) -> Vec<Record> {
        extract(html, ORIGIN).records
    }

    fn field<'a>(r: &'a Record, key: &str) -> Option<&'a str> {
        r.get(key).and_then(|v| v.as_str())
    }

    #[test]
    fn simple_table_with_thead() {
        let html = r#"
            <table>
              <thead><tr><th>Certificate Number</th><th>Vendor</th><th>Module Name</th></tr></thead>
              <tbody>
                <tr><td>1234</td><td>Test Vendor</td><td><a href="/test">Test Module</a></td></tr>
                <tr><td>5678</td><td>Another Vendor</td><td>Another Module</td></tr>
              </tbody>
            </table>"#;
        let r = records(html);
        assert_eq!(r.len(), 2);
        assert_eq!(field(&r[0], "Certificate Number"), Some("1234"));
        assert_eq!(field(&r[0], "Vendor"), Some("Test Vendor"));
        assert_eq!(field(&r[0], "Module Name"), Some("Test Module"));
        assert_eq!(field(&r[0], "Module Name_url"), Some("https://csrc.nist.gov/test"));
        assert_eq!(field(&r[1], "Certificate Number"), Some("5678"));
        assert!(r[1].get("Module Name_url").is_none());
    }

    #[test]
    fn end_to_end_field_order() {
        let html = r#"<table><thead><tr><th>Certificate Number</th><th>Vendor</th><th>Module Name</th></tr></thead>
            <tbody><tr><td>1234</td><td>Test Vendor</td><td><a href="/test">Test Module</a></td></tr></tbody></table>"#;
        let r = records(html);
        assert_eq!(r.len(), 1);
        let keys: Vec<&str> = r[0].keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["Certificate Number", "Vendor", "Module Name", "Module Name_url"]
        );
    }

    #[test]
    fn table_without_thead() {
        let html = "<table><tr><th>ID</th><th>Name</th></tr><tr><td>100</td><td>Module A</td></tr></table>";
        let r = records(html);
        assert_eq!(r.len(), 1);
        assert_eq!(field(&r[0], "ID"), Some("100"));
        assert_eq!(field(&r[0], "Name"), Some("Module A"));
    }

    #[test]
    fn header_presence_invariance() {
        let explicit = "<table><thead><tr><th>ID</th><th>Name</th></tr></thead><tbody><tr><td>1</td><td>A</td></tr></tbody></table>";
        let inferred = "<table><tr><th>ID</th><th>Name</th></tr><tr><td>1</td><td>A</td></tr></table>";
        assert_eq!(records(explicit), records(inferred));
    }

    #[test]
    fn empty_table() {
        let html = "<table><thead><tr><th>Column 1</th></tr></thead><tbody></tbody></table>";
        let out = extract(html, ORIGIN);
        assert!(out.records.is_empty());
        assert_eq!(out.condition, None);
    }

    #[test]
    fn no_table_is_a_condition() {
        let out = extract("<html><body><p>nothing here</p></body></html>", ORIGIN);
        assert!(out.records.is_empty());
        assert_eq!(out.condition, Some(Condition::NoTableFound));
    }

    #[test]
    fn positional_names_without_headers() {
        let html = "<table><tr><td>1</td><td>A</td></tr></table>";
        let r = records(html);
        assert_eq!(field(&r[0], "column_0"), Some("1"));
        assert_eq!(field(&r[0], "column_1"), Some("A"));
    }

    #[test]
    fn mixed_first_row_is_data() {
        let html = "<table><tr><th>1</th><td>A</td></tr><tr><td>2</td><td>B</td></tr></table>";
        let r = records(html);
        assert_eq!(r.len(), 2);
        assert_eq!(field(&r[0], "column_0"), Some("1"));
    }

    #[test]
    fn short_and_long_rows() {
        let html = "<table><thead><tr><th>A</th><th>B</th></tr></thead><tbody>
            <tr><td>1</td></tr>
            <tr><td>1</td><td>2</td><td>3</td></tr></tbody></table>";
        let r = records(html);
        assert_eq!(r[0].len(), 1);
        assert!(r[0].get("B").is_none());
        assert_eq!(field(&r[1], "column_2"), Some("3"));
    }

    #[test]
    fn blank_header_falls_back_to_position() {
        let html = "<table><thead><tr><th>A</th><th></th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>";
        let r = records(html);
        assert_eq!(field(&r[0], "column_1"), Some("2"));
    }

    #[test]
    fn duplicate_headers_later_cell_wins() {
        let html = "<table><thead><tr><th>X</th><th>X</th></tr></thead><tbody><tr><td>first</td><td>second</td></tr></tbody></table>";
        let r = records(html);
        assert_eq!(r[0].len(), 1);
        assert_eq!(field(&r[0], "X"), Some("second"));
    }

    #[test]
    fn empty_rows_dropped() {
        let html = "<table><thead><tr><th>A</th></tr></thead><tbody><tr><td>  </td></tr><tr></tr><tr><td>x</td></tr></tbody></table>";
        let r = records(html);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn absolute_links_untouched() {
        let html = r#"<table><tr><td><a href="https://example.com/sp.pdf">SP</a></td></tr></table>"#;
        let r = records(html);
        assert_eq!(field(&r[0], "column_0_url"), Some("https://example.com/sp.pdf"));
    }

    #[test]
    fn cell_text_trimmed_not_collapsed() {
        let html = "<table><tr><td>\n   Acme  Corp  </td><td> <b>Acme</b>\tLabs </td></tr></table>";
        let r = records(html);
        assert_eq!(field(&r[0], "column_0"), Some("Acme  Corp"));
        assert_eq!(field(&r[0], "column_1"), Some("Acme\tLabs"));
    }

    #[test]
    fn only_first_table_used() {
        let html = "<table><tr><td>one</td></tr></table><table><tr><td>two</td></tr></table>";
        let r = records(html);
        assert_eq!(r.len(), 1);
        assert_eq!(field(&r[0], "column_0"), Some("one"));
    }

    #[test]
    fn invalid_utf8_is_parse_error() {
        let err = extract_bytes(&[0x3c, 0xff, 0xfe], ORIGIN).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn validated_modules_fixture() {
        let html = std::fs::read("tests/fixtures/validated_modules.html").unwrap();
        let out = extract_bytes(&html, ORIGIN).unwrap();
        assert_eq!(out.records.len(), 4);
        for r in &out.records {
            assert!(r.contains_key("Certificate Number"));
            assert!(r.contains_key("Certificate Number_url"));
            assert!(r.contains_key("Vendor Name"));
        }
        assert_eq!(
            field(&out.records[0], "Certificate Number_url"),
            Some("https://csrc.nist.gov/projects/cryptographic-module-validation-program/certificate/4282")
        );
    }
}
