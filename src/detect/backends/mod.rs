pub mod scene;
pub mod stub;

pub use scene::{HotSpot, SceneBackend, SceneFrame};
pub use stub::StubBackend;
