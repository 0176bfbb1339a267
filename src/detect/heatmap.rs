//! Blob extraction from per-class probability maps.
//!
//! The detector emits one low-resolution probability channel per class where
//! hot pixels mark object centroids. Each channel is scaled to 0..=255,
//! binarized against the session confidence, and split into 4-connected
//! blobs. Blobs whose rectangles overlap are merged. A blob's score is the
//! mean in-range intensity inside its rectangle.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use super::result::BoundingBox;

/// Channel index reserved for the background class.
pub const BACKGROUND_CHANNEL: usize = 0;

/// Dense model output in height-width-channel layout, values in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbabilityMap {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    data: Vec<f32>,
}

impl ProbabilityMap {
    pub fn zeros(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0.0; width * height * channels],
        }
    }

    pub fn from_data(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height * channels {
            return Err(anyhow!(
                "probability map expects {} values for {}x{}x{}, got {}",
                width * height * channels,
                width,
                height,
                channels,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    fn index(&self, x: usize, y: usize, channel: usize) -> Option<usize> {
        if x >= self.width || y >= self.height || channel >= self.channels {
            return None;
        }
        Some((y * self.width + x) * self.channels + channel)
    }

    pub fn get(&self, x: usize, y: usize, channel: usize) -> Option<f32> {
        self.index(x, y, channel).map(|i| self.data[i])
    }

    pub fn set(&mut self, x: usize, y: usize, channel: usize, value: f32) -> Result<()> {
        let i = self
            .index(x, y, channel)
            .ok_or_else(|| anyhow!("({}, {}, {}) is outside the probability map", x, y, channel))?;
        self.data[i] = value;
        Ok(())
    }

    /// One channel scaled to 8-bit intensities.
    pub fn channel_image(&self, channel: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let p = self.get(x, y, channel).unwrap_or(0.0);
                out.push((p * 255.0).clamp(0.0, 255.0) as u8);
            }
        }
        out
    }
}

/// Lower bound of the binarization range for a minimum confidence.
pub fn binarization_threshold(min_confidence: f32) -> u8 {
    (min_confidence * 255.0).ceil().clamp(0.0, 255.0) as u8
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blob {
    pub rect: BoundingBox,
    pub score: f32,
}

/// A blob found on a class channel, still in map coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub class_index: usize,
    pub rect: BoundingBox,
    pub score: f32,
}

/// Find blobs of pixels in `[low, 255]` on a single 8-bit channel.
pub fn find_blobs(pixels: &[u8], width: usize, height: usize, low: u8) -> Vec<Blob> {
    let in_range = |v: u8| v >= low;
    let mut visited = vec![false; pixels.len()];
    let mut rects = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..pixels.len().min(width * height) {
        if visited[start] || !in_range(pixels[start]) {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let (mut min_x, mut min_y) = (start % width, start / width);
        let (mut max_x, mut max_y) = (min_x, min_y);

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % width, idx / width);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            let mut visit = |n: usize| {
                if !visited[n] && in_range(pixels[n]) {
                    visited[n] = true;
                    queue.push_back(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < width {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - width);
            }
            if y + 1 < height {
                visit(idx + width);
            }
        }

        rects.push(BoundingBox::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x + 1) as i32,
            (max_y - min_y + 1) as i32,
        ));
    }

    merge_overlapping(&mut rects);

    rects
        .into_iter()
        .map(|rect| Blob {
            rect,
            score: mean_in_range(pixels, width, &rect, low) / 255.0,
        })
        .collect()
}

fn merge_overlapping(rects: &mut Vec<BoundingBox>) {
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if rects[i].overlaps(&rects[j]) {
                    let other = rects.remove(j);
                    rects[i] = rects[i].union_rect(&other);
                    merged = true;
                    break 'outer;
                }
            }
        }
    }
}

fn mean_in_range(pixels: &[u8], width: usize, rect: &BoundingBox, low: u8) -> f32 {
    let mut sum = 0u64;
    let mut n = 0u64;
    for y in rect.y..rect.y + rect.h {
        for x in rect.x..rect.x + rect.w {
            let v = pixels[y as usize * width + x as usize];
            if v >= low {
                sum += u64::from(v);
                n += 1;
            }
        }
    }
    if n == 0 {
        0.0
    } else {
        sum as f32 / n as f32
    }
}

/// Blob candidates for every non-background channel.
pub fn extract_candidates(map: &ProbabilityMap, min_confidence: f32) -> Vec<Candidate> {
    let low = binarization_threshold(min_confidence);
    let mut out = Vec::new();
    for channel in 0..map.channels {
        if channel == BACKGROUND_CHANNEL {
            continue;
        }
        let image = map.channel_image(channel);
        for blob in find_blobs(&image, map.width, map.height, low) {
            out.push(Candidate {
                class_index: channel,
                rect: blob.rect,
                score: blob.score,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_rounds_up() {
        assert_eq!(binarization_threshold(0.6), 153);
        assert_eq!(binarization_threshold(0.5), 128);
        assert_eq!(binarization_threshold(1.0), 255);
        assert_eq!(binarization_threshold(0.0), 0);
    }

    #[test]
    fn from_data_checks_length() {
        assert!(ProbabilityMap::from_data(2, 2, 2, vec![0.0; 7]).is_err());
        assert!(ProbabilityMap::from_data(2, 2, 2, vec![0.0; 8]).is_ok());
    }

    #[test]
    fn separate_blobs_are_found() {
        #[rustfmt::skip]
        let px = vec![
            200, 200, 0,   0,   0,
            200, 0,   0,   0,   0,
            0,   0,   0,   0,   0,
            0,   0,   0,   250, 250,
        ];
        let blobs = find_blobs(&px, 5, 4, 153);
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].rect, BoundingBox::new(0, 0, 2, 2));
        assert!((blobs[0].score - 200.0 / 255.0).abs() < 1e-6);
        assert_eq!(blobs[1].rect, BoundingBox::new(3, 3, 2, 1));
    }

    #[test]
    fn diagonal_pixels_are_separate_components_until_rects_overlap() {
        #[rustfmt::skip]
        let px = vec![
            255, 0,   0,
            0,   255, 0,
            0,   0,   0,
        ];
        // The two 1x1 rects do not overlap, so they stay apart.
        let blobs = find_blobs(&px, 3, 3, 200);
        assert_eq!(blobs.len(), 2);
    }

    #[test]
    fn overlapping_rects_are_merged() {
        #[rustfmt::skip]
        let px = vec![
            255, 255, 255, 0,
            0,   0,   255, 0,
            255, 0,   255, 0,
            255, 255, 0,   0,
        ];
        // Component A spans (0..3, 0..3), component B (0..2, 2..4); rects overlap.
        let blobs = find_blobs(&px, 4, 4, 200);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].rect, BoundingBox::new(0, 0, 3, 4));
    }

    #[test]
    fn background_channel_is_skipped() {
        let mut map = ProbabilityMap::zeros(4, 4, 2);
        map.set(1, 1, BACKGROUND_CHANNEL, 1.0).unwrap();
        map.set(2, 2, 1, 0.9).unwrap();
        let found = extract_candidates(&map, 0.6);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].class_index, 1);
        assert_eq!(found[0].rect, BoundingBox::new(2, 2, 1, 1));
    }

    #[test]
    fn cold_pixels_below_confidence_are_ignored() {
        let mut map = ProbabilityMap::zeros(4, 4, 2);
        map.set(0, 0, 1, 0.5).unwrap();
        assert!(extract_candidates(&map, 0.6).is_empty());
        assert_eq!(extract_candidates(&map, 0.4).len(), 1);
    }
}
