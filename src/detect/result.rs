/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Box center using integer halving of width and height.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Euclidean distance between the centers of two boxes.
    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        let dx = f64::from(ax - bx);
        let dy = f64::from(ay - by);
        (dx * dx + dy * dy).sqrt()
    }

    pub fn area(&self) -> i64 {
        i64::from(self.w.max(0)) * i64::from(self.h.max(0))
    }

    pub fn intersect(&self, other: &BoundingBox) -> i64 {
        let left = self.x.max(other.x);
        let right = (self.x + self.w).min(other.x + other.w);
        let top = self.y.max(other.y);
        let bottom = (self.y + self.h).min(other.y + other.h);
        i64::from((right - left).max(0)) * i64::from((bottom - top).max(0))
    }

    /// Intersection over union. Zero when either box is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersect(other);
        if inter == 0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        inter as f32 / union as f32
    }

    /// True when the rectangles share at least one pixel.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }

    /// Smallest box covering both.
    pub fn union_rect(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let x2 = (self.x + self.w).max(other.x + other.w);
        let y2 = (self.y + self.h).max(other.y + other.h);
        BoundingBox::new(x, y, x2 - x, y2 - y)
    }
}

/// A single raw detection candidate for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub label: String,
}

impl Detection {
    pub fn new(label: &str, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            label: label.to_string(),
        }
    }
}

/// One cluster of same-class detections after consolidation.
///
/// `bbox` and `confidence` come from the highest-confidence member (the seed);
/// `count` is the number of raw detections merged into the cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsolidatedRecord {
    pub label: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub count: u32,
}

/// Consolidated records for every class seen in one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSummary {
    classes: Vec<ClassSummary>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassSummary {
    pub label: String,
    pub records: Vec<ConsolidatedRecord>,
}

impl ClassSummary {
    /// Highest-confidence record; the first one wins on ties.
    pub fn best(&self) -> Option<&ConsolidatedRecord> {
        self.records.iter().fold(None, |best, rec| match best {
            Some(b) if b.confidence >= rec.confidence => Some(b),
            _ => Some(rec),
        })
    }

    /// Raw detections merged across every cluster of this class.
    pub fn total_count(&self) -> u32 {
        self.records.iter().map(|r| r.count).sum()
    }
}

impl FrameSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a class. Classes with no records are not kept.
    pub fn push(&mut self, label: &str, records: Vec<ConsolidatedRecord>) {
        if records.is_empty() {
            return;
        }
        self.classes.push(ClassSummary {
            label: label.to_string(),
            records,
        });
    }

    pub fn classes(&self) -> &[ClassSummary] {
        &self.classes
    }

    pub fn get(&self, label: &str) -> Option<&ClassSummary> {
        self.classes.iter().find(|c| c.label == label)
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Raw detections merged across the whole frame.
    pub fn detection_count(&self) -> u32 {
        self.classes.iter().map(ClassSummary::total_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_uses_integer_halving() {
        let b = BoundingBox::new(10, 20, 5, 7);
        assert_eq!(b.center(), (12, 23));
    }

    #[test]
    fn distance_between_centers() {
        let a = BoundingBox::new(0, 0, 0, 0);
        let b = BoundingBox::new(3, 4, 0, 0);
        assert!((a.center_distance(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0, 0, 4, 4);
        let b = BoundingBox::new(10, 10, 4, 4);
        assert_eq!(a.iou(&b), 0.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::new(0, 0, 4, 4);
        let b = BoundingBox::new(2, 0, 4, 4);
        // 8 / (16 + 16 - 8)
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn best_record_prefers_first_on_ties() {
        let class = ClassSummary {
            label: "Apple".into(),
            records: vec![
                ConsolidatedRecord {
                    label: "Apple".into(),
                    bbox: BoundingBox::new(0, 0, 1, 1),
                    confidence: 0.8,
                    count: 2,
                },
                ConsolidatedRecord {
                    label: "Apple".into(),
                    bbox: BoundingBox::new(50, 0, 1, 1),
                    confidence: 0.8,
                    count: 5,
                },
            ],
        };
        assert_eq!(class.best().map(|r| r.count), Some(2));
        assert_eq!(class.total_count(), 7);
    }

    #[test]
    fn summary_skips_empty_classes() {
        let mut summary = FrameSummary::new();
        summary.push("Apple", vec![]);
        assert!(summary.is_empty());
    }
}
