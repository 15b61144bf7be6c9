use crate::atlas::AtlasConfig;
use crate::coords::Viewport;
use crate::device::GpuInit;
use crate::paint::Color;
use crate::render::AntiAlias;

/// Everything needed to bring up a [`Graphics`](crate::Graphics).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Presentable target size in pixels.
    pub width: u32,
    pub height: u32,

    pub antialias: AntiAlias,
    pub atlas: AtlasConfig,
    pub gpu: GpuInit,

    /// Color the frame buffer starts with.
    pub clear_color: Color,

    /// Name of the render thread, as shown in logs and debuggers.
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            antialias: AntiAlias::Multisample(4),
            atlas: AtlasConfig::default(),
            gpu: GpuInit::default(),
            clear_color: Color::gray(204),
            thread_name: "tessel-render".to_owned(),
        }
    }
}

impl EngineConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, ..Self::default() }
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }
}
