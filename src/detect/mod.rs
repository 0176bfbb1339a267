//! On-device detection post-processing.
//!
//! Model output flows through these stages once per frame:
//! - `heatmap`: per-class blob extraction from the probability map
//! - `nms`: per-class suppression and scaling to frame pixels
//! - `consolidate`: distance-based merging into per-class records

mod backend;
pub mod backends;
pub mod consolidate;
pub mod heatmap;
pub mod nms;
mod result;

pub use backend::DetectorBackend;
pub use backends::{SceneBackend, StubBackend};
pub use consolidate::{
    consolidate, consolidate_frame, DistanceThresholds, DEFAULT_DISTANCE_THRESHOLD,
};
pub use heatmap::{binarization_threshold, ProbabilityMap};
pub use nms::{non_max_suppression, FrameScale, DEFAULT_NMS_IOU};
pub use result::{BoundingBox, ClassSummary, ConsolidatedRecord, Detection, FrameSummary};

/// Run blob extraction, suppression and scaling on one probability map.
pub fn detections_from_map(
    map: &ProbabilityMap,
    labels: &[String],
    frame_size: (u32, u32),
    min_confidence: f32,
    nms_iou: f32,
) -> Vec<Detection> {
    let candidates = heatmap::extract_candidates(map, min_confidence);
    let mut kept = non_max_suppression(candidates, nms_iou);
    // Classes are reported in channel order.
    kept.sort_by_key(|c| c.class_index);
    let scale = FrameScale::new(map.width, map.height, frame_size.0, frame_size.1);
    nms::to_detections(&kept, labels, scale)
}
