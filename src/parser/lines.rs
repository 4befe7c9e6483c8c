use std::collections::{BTreeSet, HashSet};

/// Keyword → category, most specific first. A line is categorized by the
/// first keyword it contains, so a compound name must precede any keyword
/// it contains (`ECDSA` before `DSA`, `HMAC` before `SHA`).
pub const DEFAULT_KEYWORDS: &[(&str, &str)] = &[
    ("ML-KEM", "ML-KEM"),
    ("ML-DSA", "ML-DSA"),
    ("SLH-DSA", "SLH-DSA"),
    ("KAS-ECC", "KAS-ECC"),
    ("KAS-FFC", "KAS-FFC"),
    ("KAS-IFC", "KAS-IFC"),
    ("KAS", "KAS"),
    ("KTS-IFC", "KTS-IFC"),
    ("KTS", "KTS"),
    ("CVL", "CVL"),
    ("PBKDF", "PBKDF"),
    ("KDA", "KDA"),
    ("KDF", "KDF"),
    ("DRBG", "DRBG"),
    ("ECDSA", "ECDSA"),
    ("EDDSA", "EdDSA"),
    ("DSA", "DSA"),
    ("RSA", "RSA"),
    ("HMAC", "HMAC"),
    ("CMAC", "CMAC"),
    ("SHA-3", "SHA-3"),
    ("SHA3", "SHA-3"),
    ("SHAKE", "SHA-3"),
    ("SHA", "SHS"),
    ("TRIPLE-DES", "Triple-DES"),
    ("TDES", "Triple-DES"),
    ("AES", "AES"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Matched lines, first-seen order, no duplicates.
    pub details: Vec<String>,
    pub categories: BTreeSet<String>,
}

/// Categorize each prose line of `text` by the first keyword it contains.
/// Matched lines are recorded verbatim; skip rules look at the trimmed form.
/// `keywords` must already be upper-case.
pub fn classify(text: &str, keywords: &[(String, String)]) -> Classification {
    let mut out = Classification::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for raw in text.lines() {
        let line = raw.trim();
        if is_skipped(line) {
            continue;
        }
        let upper = line.to_uppercase();
        let Some((_, category)) = keywords.iter().find(|(kw, _)| upper.contains(kw.as_str()))
        else {
            continue;
        };
        if seen.insert(raw) {
            out.details.push(raw.to_string());
        }
        out.categories.insert(category.clone());
    }

    out
}

/// Links, headings, table rows and separators carry no prose.
fn is_skipped(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('[')
        || line.starts_with('#')
        || line.starts_with('|')
        || line == "---"
        || line.chars().count() < 3
}
