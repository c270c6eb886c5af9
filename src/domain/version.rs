//! Dotted software version comparison

use std::cmp::Ordering;

/// Compare two dotted versions numerically, field by field.
///
/// The shorter version is padded with zeros; a field that is not a plain
/// number compares as zero.
pub fn compare(left: &str, right: &str) -> Ordering {
    if left == right {
        return Ordering::Equal;
    }

    let left_fields: Vec<&str> = left.split('.').collect();
    let right_fields: Vec<&str> = right.split('.').collect();
    let len = left_fields.len().max(right_fields.len());

    for i in 0..len {
        let l = field_value(left_fields.get(i).copied());
        let r = field_value(right_fields.get(i).copied());
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    Ordering::Equal
}

fn field_value(field: Option<&str>) -> u64 {
    field.and_then(|f| f.parse().ok()).unwrap_or(0)
}

/// Whether `found` is at least `minimum`
pub fn meets_minimum(found: &str, minimum: &str) -> bool {
    compare(found, minimum) != Ordering::Less
}
