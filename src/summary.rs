use indexmap::IndexMap;
use serde::Serialize;

use crate::record::CertNumber;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub count: usize,
    pub keys: Vec<CertNumber>,
}

/// Category → stats, most referenced first.
pub type AggregateSummary = IndexMap<String, CategoryStats>;

/// Reverse-index per-certificate categories. Equal counts keep the order in
/// which their category was first seen.
pub fn summarize<'a, I>(entries: I) -> AggregateSummary
where
    I: IntoIterator<Item = (&'a CertNumber, &'a Vec<String>)>,
{
    let mut summary = AggregateSummary::new();
    for (cert, categories) in entries {
        for category in categories {
            let stats = summary.entry(category.clone()).or_default();
            stats.count += 1;
            stats.keys.push(*cert);
        }
    }
    summary.sort_by(|_, a, _, b| b.count.cmp(&a.count));
    summary
}
