use indexmap::IndexMap;
use serde_json::Value;

/// Field that keys a record across sources.
pub const IDENTIFIER_FIELD: &str = "Certificate Number";

/// One extracted row: field name → value, in discovery order.
pub type Record = IndexMap<String, Value>;

pub type CertNumber = u32;

/// Certificate number of a record, if the field is present and purely numeric.
pub fn identifier(record: &Record) -> Option<CertNumber> {
    let raw = record.get(IDENTIFIER_FIELD)?.as_str()?.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_with_cert(value: Value) -> Record {
        let mut r = Record::new();
        r.insert(IDENTIFIER_FIELD.to_string(), value);
        r
    }

    #[test]
    fn numeric_identifier() {
        assert_eq!(identifier(&record_with_cert(json!("4282"))), Some(4282));
        assert_eq!(identifier(&record_with_cert(json!(" 17 "))), Some(17));
    }

    #[test]
    fn rejects_unusable_identifiers() {
        assert_eq!(identifier(&record_with_cert(json!(""))), None);
        assert_eq!(identifier(&record_with_cert(json!("#4282"))), None);
        assert_eq!(identifier(&record_with_cert(json!("12a"))), None);
        assert_eq!(identifier(&Record::new()), None);
    }

    #[test]
    fn empty_values() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("  ")));
        assert!(is_empty_value(&json!([])));
        assert!(!is_empty_value(&json!("x")));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(["AES"])));
    }
}
