//! Bill against camera comparison.

use std::collections::HashMap;
use std::fmt;

/// One product whose billed and detected quantities differ.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub name: String,
    pub billed: u32,
    pub detected: u32,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: Billed {}, Detected {}", self.name, self.billed, self.detected)
    }
}

/// Compare billed quantities with detected counts.
///
/// Both sides are `(name, quantity)` lists; repeated names are summed. A
/// name missing from one side counts as zero there. Mismatches are reported
/// for billed names in billing order, then for detected-only names in
/// detection order. Neither input is modified.
pub fn verify(billed: &[(String, u32)], detected: &[(String, u32)]) -> Vec<Mismatch> {
    let billed = tally(billed);
    let detected = tally(detected);
    let billed_lookup: HashMap<&str, u32> = billed.iter().copied().collect();
    let detected_lookup: HashMap<&str, u32> = detected.iter().copied().collect();

    let mut out = Vec::new();
    for (name, b) in &billed {
        let d = detected_lookup.get(name).copied().unwrap_or(0);
        if *b != d {
            out.push(Mismatch {
                name: name.to_string(),
                billed: *b,
                detected: d,
            });
        }
    }
    for (name, d) in &detected {
        if !billed_lookup.contains_key(name) && *d != 0 {
            out.push(Mismatch {
                name: name.to_string(),
                billed: 0,
                detected: *d,
            });
        }
    }
    out
}

fn tally(items: &[(String, u32)]) -> Vec<(&str, u32)> {
    let mut out: Vec<(&str, u32)> = Vec::new();
    for (name, qty) in items {
        match out.iter_mut().find(|(n, _)| *n == name.as_str()) {
            Some(entry) => entry.1 = entry.1.saturating_add(*qty),
            None => out.push((name.as_str(), *qty)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(list: &[(&str, u32)]) -> Vec<(String, u32)> {
        list.iter().map(|(n, q)| (n.to_string(), *q)).collect()
    }

    #[test]
    fn matching_sets_verify_clean() {
        let billed = items(&[("Apple", 2), ("KitKat", 1)]);
        let detected = items(&[("KitKat", 1), ("Apple", 2)]);
        assert!(verify(&billed, &detected).is_empty());
    }

    #[test]
    fn billed_names_come_before_detected_only_names() {
        let billed = items(&[("Apple", 2), ("Banana", 1)]);
        let detected = items(&[("KitKat", 1), ("Apple", 1)]);
        let lines: Vec<String> = verify(&billed, &detected)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            lines,
            vec![
                "Apple: Billed 2, Detected 1",
                "Banana: Billed 1, Detected 0",
                "KitKat: Billed 0, Detected 1",
            ]
        );
    }

    #[test]
    fn repeated_bill_lines_are_summed() {
        let billed = items(&[("Apple", 1), ("Apple", 2)]);
        let detected = items(&[("Apple", 3)]);
        assert!(verify(&billed, &detected).is_empty());
    }

    #[test]
    fn verification_is_idempotent() {
        let billed = items(&[("Soda", 1)]);
        let detected = items(&[]);
        assert_eq!(verify(&billed, &detected), verify(&billed, &detected));
        assert_eq!(billed, items(&[("Soda", 1)]));
    }
}
