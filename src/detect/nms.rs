use super::heatmap::Candidate;
use super::result::{BoundingBox, Detection};

/// IoU above which a same-class box is suppressed.
pub const DEFAULT_NMS_IOU: f32 = 0.1;

/// Greedy per-class suppression: highest score first, drop any later box of
/// the same class whose IoU with a kept box exceeds `iou_threshold`.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(candidates[i]);
        for j in (i + 1)..candidates.len() {
            if candidates[j].class_index == candidates[i].class_index
                && candidates[i].rect.iou(&candidates[j].rect) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }

    kept
}

/// Map-to-frame coordinate scaling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameScale {
    pub sx: f32,
    pub sy: f32,
}

impl FrameScale {
    pub fn new(map_width: usize, map_height: usize, frame_width: u32, frame_height: u32) -> Self {
        let sx = if map_width == 0 { 1.0 } else { frame_width as f32 / map_width as f32 };
        let sy = if map_height == 0 { 1.0 } else { frame_height as f32 / map_height as f32 };
        Self { sx, sy }
    }

    pub fn apply(&self, rect: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            (rect.x as f32 * self.sx).round() as i32,
            (rect.y as f32 * self.sy).round() as i32,
            (rect.w as f32 * self.sx).round() as i32,
            (rect.h as f32 * self.sy).round() as i32,
        )
    }
}

/// Turn surviving candidates into labelled frame-space detections.
///
/// Candidates whose class index has no label are dropped.
pub fn to_detections(
    candidates: &[Candidate],
    labels: &[String],
    scale: FrameScale,
) -> Vec<Detection> {
    candidates
        .iter()
        .filter_map(|c| match labels.get(c.class_index) {
            Some(label) => Some(Detection::new(label, scale.apply(&c.rect), c.score)),
            None => {
                log::warn!("no label for class index {}, dropping candidate", c.class_index);
                None
            }
        })
        .collect()
}
