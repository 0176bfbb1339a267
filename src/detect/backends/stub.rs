use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::heatmap::ProbabilityMap;

/// Stub backend for testing. Always sees an empty counter.
pub struct StubBackend {
    labels: Vec<String>,
    map_size: (usize, usize),
    frame_size: (u32, u32),
}

impl StubBackend {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels,
            map_size: (12, 12),
            frame_size: (320, 240),
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(vec!["background".to_string()])
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    fn infer(&mut self) -> Result<ProbabilityMap> {
        let (w, h) = self.map_size;
        Ok(ProbabilityMap::zeros(w, h, self.labels.len().max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::heatmap::extract_candidates;

    #[test]
    fn stub_map_has_no_candidates() {
        let mut backend = StubBackend::new(vec!["background".into(), "Apple".into()]);
        let map = backend.infer().unwrap();
        assert_eq!(map.channels, 2);
        assert!(extract_candidates(&map, 0.1).is_empty());
    }
}
