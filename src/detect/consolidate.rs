//! Distance-based de-duplication of same-class detections.
//!
//! A heat-map detector tends to report one object as several nearby blobs.
//! Consolidation walks the detections from most to least confident; each
//! detection not yet claimed becomes a cluster seed and claims every other
//! unclaimed detection whose center lies strictly closer than the class
//! threshold. The seed's own box and score represent the cluster.

use std::collections::HashMap;

use super::result::{ConsolidatedRecord, Detection, FrameSummary};

/// Threshold used for classes without an explicit entry.
pub const DEFAULT_DISTANCE_THRESHOLD: u32 = 30;

/// Per-class merge radius in pixels.
///
/// Lookup is by exact label; anything else falls back to the default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistanceThresholds {
    per_class: HashMap<String, u32>,
    default: u32,
}

impl DistanceThresholds {
    pub fn new(default: u32) -> Self {
        Self {
            per_class: HashMap::new(),
            default,
        }
    }

    pub fn with_class(mut self, label: &str, threshold: u32) -> Self {
        self.per_class.insert(label.to_string(), threshold);
        self
    }

    pub fn insert(&mut self, label: &str, threshold: u32) {
        self.per_class.insert(label.to_string(), threshold);
    }

    pub fn threshold_for(&self, label: &str) -> u32 {
        self.per_class.get(label).copied().unwrap_or(self.default)
    }

    pub fn default_threshold(&self) -> u32 {
        self.default
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, u32)> {
        self.per_class.iter().map(|(label, t)| (label.as_str(), *t))
    }

    pub fn len(&self) -> usize {
        self.per_class.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_class.is_empty()
    }
}

impl Default for DistanceThresholds {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_THRESHOLD)
    }
}

/// Merge detections of a single class.
///
/// Output length never exceeds input length and the counts always sum to
/// the input length.
pub fn consolidate(detections: &[Detection], threshold: u32) -> Vec<ConsolidatedRecord> {
    if detections.is_empty() {
        return Vec::new();
    }

    // Stable: equal scores keep their input order.
    let mut order: Vec<&Detection> = detections.iter().collect();
    order.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let limit = f64::from(threshold);
    let mut claimed = vec![false; order.len()];
    let mut records = Vec::new();

    for i in 0..order.len() {
        if claimed[i] {
            continue;
        }
        claimed[i] = true;
        let seed = order[i];
        let mut count = 1u32;

        for j in 0..order.len() {
            if claimed[j] {
                continue;
            }
            if seed.bbox.center_distance(&order[j].bbox) < limit {
                claimed[j] = true;
                count += 1;
            }
        }

        records.push(ConsolidatedRecord {
            label: seed.label.clone(),
            bbox: seed.bbox,
            confidence: seed.confidence,
            count,
        });
    }

    records
}

/// Group a frame's detections by label and consolidate each group.
///
/// Classes keep the order in which they first appear in `detections`.
pub fn consolidate_frame(
    detections: &[Detection],
    thresholds: &DistanceThresholds,
) -> FrameSummary {
    let mut groups: Vec<(&str, Vec<Detection>)> = Vec::new();
    for det in detections {
        match groups.iter_mut().find(|(label, _)| *label == det.label) {
            Some((_, members)) => members.push(det.clone()),
            None => groups.push((det.label.as_str(), vec![det.clone()])),
        }
    }

    let mut summary = FrameSummary::new();
    for (label, members) in groups {
        let threshold = thresholds.threshold_for(label);
        let records = consolidate(&members, threshold);
        log::debug!(
            "consolidated {} {} detection(s) into {} record(s) (threshold {}px)",
            members.len(),
            label,
            records.len(),
            threshold
        );
        summary.push(label, records);
    }
    summary
}
