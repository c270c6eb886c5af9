//! Value encoding shared by the state store and the environment config.
//!
//! Scalars are stored as plain strings with `"null"` standing in for an absent
//! value. Lists are stored as one comma-joined string; elements are expected
//! to be non-empty tokens without commas (IPs, bucket names, ids).

/// Sentinel written by external tooling for an absent scalar
pub const NULL_SENTINEL: &str = "null";

/// Encode an ordered list as a single field value
pub fn encode_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| item.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a field value written by [`encode_list`]
pub fn decode_list(value: &str) -> Vec<String> {
    if value.is_empty() || value == NULL_SENTINEL {
        return Vec::new();
    }

    value.split(',').map(|item| item.trim().to_string()).collect()
}

/// Normalize a raw scalar read from the store, mapping the sentinel to `None`
pub fn decode_scalar(value: Option<String>) -> Option<String> {
    value.filter(|v| v != NULL_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_encodes_to_empty_string() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(encode_list(&empty), "");
        assert!(decode_list("").is_empty());
    }

    #[test]
    fn test_list_round_trip_preserves_order() {
        let ips = vec!["10.0.0.3", "10.0.0.1", "10.0.0.2"];
        let decoded = decode_list(&encode_list(&ips));
        assert_eq!(decoded, ips);
    }

    #[test]
    fn test_null_sentinel_decodes_to_nothing() {
        assert!(decode_list("null").is_empty());
        assert_eq!(decode_scalar(Some("null".to_string())), None);
        assert_eq!(decode_scalar(Some("7.6.0".to_string())), Some("7.6.0".to_string()));
        assert_eq!(decode_scalar(None), None);
    }

    #[test]
    fn test_decode_trims_whitespace_around_items() {
        assert_eq!(decode_list("a, b ,c"), vec!["a", "b", "c"]);
    }
}
