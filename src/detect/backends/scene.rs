//! Scripted scene backend.
//!
//! Replays a fixed sequence of sparse probability maps, looping at the end.
//! Scenes can be built in code or loaded from a JSON file:
//!
//! ```json
//! {
//!   "labels": ["background", "Apple", "KitKat"],
//!   "frames": [
//!     { "hot": [ { "label": "Apple", "x": 3, "y": 4, "value": 0.9 } ] },
//!     { "hot": [] }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::detect::backend::DetectorBackend;
use crate::detect::heatmap::ProbabilityMap;

const DEFAULT_MAP_SIZE: usize = 12;
const DEFAULT_FRAME_WIDTH: u32 = 320;
const DEFAULT_FRAME_HEIGHT: u32 = 240;

/// A rectangle of equally hot pixels on one class channel.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HotSpot {
    pub label: String,
    pub x: usize,
    pub y: usize,
    #[serde(default = "one")]
    pub w: usize,
    #[serde(default = "one")]
    pub h: usize,
    pub value: f32,
}

fn one() -> usize {
    1
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SceneFrame {
    #[serde(default)]
    pub hot: Vec<HotSpot>,
}

#[derive(Debug, Deserialize)]
struct SceneFile {
    labels: Vec<String>,
    map_width: Option<usize>,
    map_height: Option<usize>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
    frames: Vec<SceneFrame>,
}

pub struct SceneBackend {
    labels: Vec<String>,
    map_size: (usize, usize),
    frame_size: (u32, u32),
    frames: Vec<SceneFrame>,
    cursor: usize,
}

impl SceneBackend {
    pub fn new(labels: Vec<String>, frames: Vec<SceneFrame>) -> Result<Self> {
        if labels.is_empty() {
            return Err(anyhow!("scene needs at least the background label"));
        }
        if frames.is_empty() {
            return Err(anyhow!("scene has no frames"));
        }
        // Channel 0 is background and never reaches the wire.
        for label in labels.iter().skip(1) {
            crate::validate_label(label)?;
        }
        let backend = Self {
            labels,
            map_size: (DEFAULT_MAP_SIZE, DEFAULT_MAP_SIZE),
            frame_size: (DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT),
            frames,
            cursor: 0,
        };
        backend.check_frames()?;
        Ok(backend)
    }

    pub fn with_map_size(mut self, width: usize, height: usize) -> Result<Self> {
        self.map_size = (width, height);
        self.check_frames()?;
        Ok(self)
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read scene file {}: {}", path.display(), e))?;
        let file: SceneFile = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid scene file {}: {}", path.display(), e))?;

        let scene = Self::new(file.labels, file.frames)?
            .with_map_size(
                file.map_width.unwrap_or(DEFAULT_MAP_SIZE),
                file.map_height.unwrap_or(DEFAULT_MAP_SIZE),
            )?
            .with_frame_size(
                file.frame_width.unwrap_or(DEFAULT_FRAME_WIDTH),
                file.frame_height.unwrap_or(DEFAULT_FRAME_HEIGHT),
            );
        log::info!(
            "loaded scene {} ({} frames, {} labels)",
            path.display(),
            scene.frames.len(),
            scene.labels.len()
        );
        Ok(scene)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn channel_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    fn check_frames(&self) -> Result<()> {
        let (mw, mh) = self.map_size;
        for (n, frame) in self.frames.iter().enumerate() {
            for spot in &frame.hot {
                if self.channel_of(&spot.label).is_none() {
                    return Err(anyhow!("frame {}: unknown label '{}'", n, spot.label));
                }
                let right = spot.x.checked_add(spot.w);
                let bottom = spot.y.checked_add(spot.h);
                let inside = matches!((right, bottom), (Some(r), Some(b)) if r <= mw && b <= mh);
                if !inside {
                    return Err(anyhow!(
                        "frame {}: hot spot for '{}' exceeds the {}x{} map",
                        n,
                        spot.label,
                        mw,
                        mh
                    ));
                }
            }
        }
        Ok(())
    }

    fn render(&self, frame: &SceneFrame) -> Result<ProbabilityMap> {
        let (w, h) = self.map_size;
        let mut map = ProbabilityMap::zeros(w, h, self.labels.len());
        for spot in &frame.hot {
            let channel = self
                .channel_of(&spot.label)
                .ok_or_else(|| anyhow!("unknown label '{}'", spot.label))?;
            for y in spot.y..spot.y + spot.h {
                for x in spot.x..spot.x + spot.w {
                    map.set(x, y, channel, spot.value)?;
                }
            }
        }
        Ok(map)
    }
}

impl DetectorBackend for SceneBackend {
    fn name(&self) -> &'static str {
        "scene"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    fn infer(&mut self) -> Result<ProbabilityMap> {
        let map = self.render(&self.frames[self.cursor])?;
        self.cursor = (self.cursor + 1) % self.frames.len();
        Ok(map)
    }
}
