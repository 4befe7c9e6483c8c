use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use crate::error::Condition;
use crate::parser::fields::DetailSet;
use crate::record::{identifier, is_empty_value, CertNumber, Record};

const SECURITY_POLICY_PATH: &str =
    "/CSRC/media/projects/cryptographic-module-validation-program/documents/security-policies";
const CERTIFICATE_PATH: &str = "/projects/cryptographic-module-validation-program/certificate";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub merged: usize,
    pub missing_identifier: usize,
    pub unmatched: usize,
}

/// Copy every non-empty auxiliary value onto the record with the same
/// certificate number, overwriting fields of the same name. Records without
/// a usable certificate number pass through untouched.
pub fn merge(records: &mut [Record], aux: &HashMap<CertNumber, Record>) -> MergeReport {
    let mut report = MergeReport::default();

    for record in records.iter_mut() {
        let Some(cert) = identifier(record) else {
            report.missing_identifier += 1;
            continue;
        };
        let Some(extra) = aux.get(&cert) else {
            report.unmatched += 1;
            continue;
        };
        for (key, value) in extra {
            if !is_empty_value(value) {
                record.insert(key.clone(), value.clone());
            }
        }
        report.merged += 1;
    }

    if report.missing_identifier > 0 {
        debug!(
            "{} record(s) skipped: {}",
            report.missing_identifier,
            Condition::MissingIdentifier
        );
    }
    report
}

pub fn security_policy_url(origin: &str, cert: CertNumber) -> String {
    format!("{}{}/140sp{}.pdf", origin, SECURITY_POLICY_PATH, cert)
}

pub fn certificate_url(origin: &str, cert: CertNumber) -> String {
    format!("{}{}/{}", origin, CERTIFICATE_PATH, cert)
}

/// Attach the security-policy and certificate-page locations.
pub fn enrich_urls(records: &mut [Record], origin: &str) -> MergeReport {
    let aux: HashMap<CertNumber, Record> = records
        .iter()
        .filter_map(identifier)
        .map(|cert| {
            let mut extra = Record::new();
            extra.insert(
                "security_policy_url".to_string(),
                Value::String(security_policy_url(origin, cert)),
            );
            extra.insert(
                "certificate_detail_url".to_string(),
                Value::String(certificate_url(origin, cert)),
            );
            (cert, extra)
        })
        .collect();
    merge(records, &aux)
}

/// Attach per-certificate algorithm lists, e.g. from an imported dataset.
pub fn enrich_algorithms(
    records: &mut [Record],
    algorithms: &HashMap<CertNumber, Vec<String>>,
) -> MergeReport {
    let aux: HashMap<CertNumber, Record> = algorithms
        .iter()
        .map(|(cert, list)| {
            let mut extra = Record::new();
            extra.insert(
                "algorithms".to_string(),
                Value::Array(list.iter().cloned().map(Value::String).collect()),
            );
            (*cert, extra)
        })
        .collect();
    merge(records, &aux)
}

/// Attach every field extracted from the certificate detail pages.
pub fn enrich_details(
    records: &mut [Record],
    details: &BTreeMap<CertNumber, DetailSet>,
) -> MergeReport {
    let aux: HashMap<CertNumber, Record> = details
        .iter()
        .map(|(cert, set)| (*cert, set.clone().into_record()))
        .collect();
    merge(records, &aux)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::IDENTIFIER_FIELD;
    use serde_json::json;

    const ORIGIN: &str = "https://csrc.nist.gov";

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn base() -> Vec<Record> {
        vec![
            record(&[(IDENTIFIER_FIELD, "1234"), ("Vendor", "Old Vendor")]),
            record(&[(IDENTIFIER_FIELD, "n/a"), ("Vendor", "Someone")]),
            record(&[("Vendor", "No Cert")]),
            record(&[(IDENTIFIER_FIELD, "9999")]),
        ]
    }

    fn aux() -> HashMap<CertNumber, Record> {
        let mut extra = record(&[("Vendor", "New Vendor"), ("status", "")]);
        extra.insert("algorithms".into(), json!(["AES"]));
        extra.insert("empty_list".into(), json!([]));
        HashMap::from([(1234, extra)])
    }

    #[test]
    fn merge_overwrites_and_skips_empty() {
        let mut records = base();
        let report = merge(&mut records, &aux());
        assert_eq!(
            report,
            MergeReport {
                merged: 1,
                missing_identifier: 2,
                unmatched: 1
            }
        );
        assert_eq!(records[0]["Vendor"], json!("New Vendor"));
        assert_eq!(records[0]["algorithms"], json!(["AES"]));
        assert!(records[0].get("status").is_none());
        assert!(records[0].get("empty_list").is_none());
        assert_eq!(records[1]["Vendor"], json!("Someone"));
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut once = base();
        merge(&mut once, &aux());
        let mut twice = base();
        merge(&mut twice, &aux());
        merge(&mut twice, &aux());
        assert_eq!(once, twice);
    }

    #[test]
    fn url_enrichment() {
        let mut records = base();
        let report = enrich_urls(&mut records, ORIGIN);
        assert_eq!(report.merged, 2);
        assert_eq!(
            records[0]["security_policy_url"],
            json!("https://csrc.nist.gov/CSRC/media/projects/cryptographic-module-validation-program/documents/security-policies/140sp1234.pdf")
        );
        assert_eq!(
            records[0]["certificate_detail_url"],
            json!("https://csrc.nist.gov/projects/cryptographic-module-validation-program/certificate/1234")
        );
        assert!(records[2].get("security_policy_url").is_none());
    }

    #[test]
    fn passes_compose() {
        let mut records = base();
        enrich_urls(&mut records, ORIGIN);
        enrich_algorithms(
            &mut records,
            &HashMap::from([(1234, vec!["AES".to_string(), "RSA".to_string()])]),
        );
        let details = BTreeMap::from([(
            1234,
            DetailSet {
                fields: [("status".to_string(), "Active".to_string())].into_iter().collect(),
                algorithms: vec!["AES".into()],
                algorithms_detailed: vec!["AES-CBC A1".into()],
            },
        )]);
        enrich_details(&mut records, &details);

        let r = &records[0];
        assert_eq!(r["status"], json!("Active"));
        assert_eq!(r["algorithms"], json!(["AES"]));
        assert_eq!(r["algorithms_detailed"], json!(["AES-CBC A1"]));
        assert!(r.contains_key("security_policy_url"));

        let snapshot = records.clone();
        enrich_details(&mut records, &details);
        enrich_urls(&mut records, ORIGIN);
        assert_eq!(records, snapshot);
    }

    #[test]
    fn detail_with_no_algorithms_keeps_imported_list() {
        let mut records = base();
        enrich_algorithms(&mut records, &HashMap::from([(1234, vec!["RSA".to_string()])]));
        let details = BTreeMap::from([(1234, DetailSet::default())]);
        enrich_details(&mut records, &details);
        assert_eq!(records[0]["algorithms"], json!(["RSA"]));
    }
}
