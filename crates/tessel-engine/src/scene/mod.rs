//! Per-draw scene state: camera matrices, lights, blend mode, depth test.

mod light;
mod state;

pub use light::{Falloff, Light, LightKind};
pub use state::{SceneState, MAX_LIGHTS};
pub(crate) use state::SceneUniform;
