use anyhow::Result;

use super::heatmap::ProbabilityMap;

/// Source of per-frame model output.
///
/// A backend owns capture and inference and hands back the raw probability
/// map. Blob extraction, suppression and consolidation happen downstream so
/// that the session confidence can change between frames.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class labels indexed by output channel. Channel 0 is background.
    fn labels(&self) -> &[String];

    /// Size of the captured frame the map is scaled to, `(width, height)`.
    fn frame_size(&self) -> (u32, u32);

    /// Capture one frame and run inference on it.
    fn infer(&mut self) -> Result<ProbabilityMap>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
