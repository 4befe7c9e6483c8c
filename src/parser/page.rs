use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static BLANKS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "noscript", "template", "svg"];
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "fieldset",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "html", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "ul",
];

/// Render a fetched detail page as line-oriented text.
///
/// HTML is flattened into markdown-like lines: headings keep their `#`
/// markers, two-cell table rows become `| label | value |`, and every leaf
/// block or inline run gets its own line so label/value pairs laid out as
/// sibling elements end up on consecutive lines. Anything else is treated
/// as markdown and only has its images stripped.
pub fn to_lines(body: &str) -> String {
    if looks_like_html(body) {
        let document = Html::parse_document(body);
        let mut out = Vec::new();
        walk(document.root_element(), &mut out);
        out.join("\n")
    } else {
        strip_images(body)
    }
}

fn looks_like_html(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

/// Remove markdown image syntax: ![alt](url)
fn strip_images(md: &str) -> String {
    let cleaned = IMAGE_RE.replace_all(md, "");
    BLANKS_RE.replace_all(&cleaned, "\n\n").to_string()
}

fn walk(el: ElementRef, out: &mut Vec<String>) {
    let name = el.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    if let Some(level) = heading_level(name) {
        push(out, format!("{} {}", "#".repeat(level), inline_text(el)));
        return;
    }
    if name == "table" {
        render_table(el, out);
        return;
    }
    if !has_block_descendant(el) {
        let inline: Vec<ElementRef> = el.children().filter_map(ElementRef::wrap).collect();
        let loose_text = el
            .children()
            .any(|c| c.value().as_text().is_some_and(|t| !t.trim().is_empty()));
        if inline.len() > 1 && !loose_text {
            for child in inline {
                push_leaf(child, out);
            }
        } else {
            push_leaf(el, out);
        }
        return;
    }

    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            walk(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            push(out, collapse(text));
        }
    }
}

fn render_table(table: ElementRef, out: &mut Vec<String>) {
    for row in table.select(&ROW_SEL) {
        let texts: Vec<String> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|e| matches!(e.value().name(), "td" | "th"))
            .map(inline_text)
            .collect();
        match texts.len() {
            0 => {}
            2 => out.push(format!("| {} | {} |", texts[0], texts[1])),
            _ => push(out, texts.join(" | ")),
        }
    }
}

/// One line for an element with no block children; a lone link keeps its target.
fn push_leaf(el: ElementRef, out: &mut Vec<String>) {
    let text = inline_text(el);
    if text.is_empty() {
        return;
    }
    let href = if el.value().name() == "a" {
        el.value().attr("href")
    } else {
        let mut anchors = el
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| c.value().name() == "a");
        match (anchors.next(), anchors.next()) {
            (Some(a), None) if inline_text(a) == text => a.value().attr("href"),
            _ => None,
        }
    };
    match href {
        Some(href) => out.push(format!("[{}]({})", text, href)),
        None => out.push(text),
    }
}

fn has_block_descendant(el: ElementRef) -> bool {
    el.children().filter_map(ElementRef::wrap).any(|c| {
        let name = c.value().name();
        BLOCK_TAGS.contains(&name) || SKIPPED_TAGS.contains(&name) || has_block_descendant(c)
    })
}

fn heading_level(name: &str) -> Option<usize> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element on one line.
fn inline_text(el: ElementRef) -> String {
    collapse(&el.text().collect::<String>())
}

fn push(out: &mut Vec<String>, line: String) {
    if !line.is_empty() {
        out.push(line);
    }
}
