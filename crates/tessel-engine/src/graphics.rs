//! Application-side handle to the engine.
//!
//! `Graphics` lives on the application thread. It accumulates immediate-mode
//! geometry into a transient batch and forwards everything GPU-related to the
//! render thread as queued tasks.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use glam::Mat4;

use crate::atlas::TextureAtlasManager;
use crate::batch::{Batch, CompiledBatch};
use crate::config::EngineConfig;
use crate::coords::Viewport;
use crate::image::{PixelBuffer, TextureRef};
use crate::paint::Color;
use crate::render::{
    next_resource_id, GpuBatch, GpuContext, GpuImage, QueueError, RenderQueue, ResourceRegistry,
    TaskSender,
};
use crate::scene::SceneState;
use crate::shape::ShapeNode;

/// Presentable color target plus its size, handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct Presentable {
    pub texture: wgpu::Texture,
    pub width: u32,
    pub height: u32,
}

pub struct Graphics {
    queue: Option<RenderQueue<GpuContext>>,
    sender: TaskSender<GpuContext>,
    registry: Arc<ResourceRegistry<GpuContext>>,
    atlas: TextureAtlasManager,
    scene: SceneState,
    /// Immediate-mode geometry not yet handed to the render thread.
    pending: Batch,
    viewport: Viewport,
}

impl Graphics {
    /// Starts the render thread and creates the GPU context on it.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let viewport = config.viewport();
        let atlas = TextureAtlasManager::new(config.atlas);
        let clear = config.clear_color;
        let thread_name = config.thread_name.clone();

        let queue = RenderQueue::spawn(&thread_name, move || GpuContext::new(&config))
            .context("failed to start the render thread")?;
        let sender = queue.sender().clone();
        sender.submit(move |ctx| ctx.clear(clear))?;

        log::info!(
            "graphics: {}x{} on render thread '{thread_name}'",
            viewport.width,
            viewport.height
        );

        Ok(Self {
            queue: Some(queue),
            sender,
            registry: Arc::new(ResourceRegistry::new()),
            atlas,
            scene: SceneState::ortho2d(viewport.width, viewport.height),
            pending: Batch::new(),
            viewport,
        })
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    /// Scene state for the draws that follow. Geometry drawn so far keeps the
    /// state it was drawn with.
    pub fn scene_mut(&mut self) -> &mut SceneState {
        self.flush();
        &mut self.scene
    }

    /// Live GPU-backed handles (compiled batches, standalone images).
    pub fn live_resources(&self) -> usize {
        self.registry.live_count()
    }

    /// Clears the frame buffer. Geometry not yet flushed is discarded.
    pub fn background(&mut self, color: Color) {
        self.pending.clear();
        self.enqueue(move |ctx| ctx.clear(color));
    }

    /// Draws a shape tree. Retained groups go through their compiled batch;
    /// everything else is flattened into the frame's transient batch.
    pub fn draw(&mut self, node: &ShapeNode) {
        if node.is_retained() {
            if let Some(compiled) = node.compile() {
                self.draw_compiled(&compiled, Mat4::IDENTITY);
            }
            return;
        }
        self.pending.flatten(node, Mat4::IDENTITY, false);
    }

    /// Draws a compiled batch placed by `transform`. The batch is uploaded on
    /// its first draw and stays resident while any handle to it lives.
    pub fn draw_compiled(&mut self, compiled: &CompiledBatch, transform: Mat4) {
        self.flush();

        let gpu = compiled.gpu_or_upload(|| {
            let id = compiled.id();
            let handle = Arc::new(GpuBatch::new(id, self.sender.clone()));
            self.registry.register(&handle);
            let groups = compiled.batch().groups().to_vec();
            self.enqueue(move |ctx| ctx.upload_batch(id, &groups));
            handle
        });

        let id = gpu.id();
        let uniform = self.scene.uniform(transform);
        let (blend, depth_test) = (self.scene.blend, self.scene.depth_test);
        self.enqueue(move |ctx| ctx.draw_uploaded(id, uniform, blend, depth_test));
    }

    /// Draws a batch accumulated elsewhere, e.g. by a presentation layer that
    /// flattens a whole frame itself.
    pub fn submit_batch(&mut self, batch: Batch) {
        self.flush();
        if batch.is_empty() {
            return;
        }
        let groups = batch.into_groups();
        let uniform = self.scene.uniform(Mat4::IDENTITY);
        let (blend, depth_test) = (self.scene.blend, self.scene.depth_test);
        self.enqueue(move |ctx| ctx.draw_transient(&groups, uniform, blend, depth_test));
    }

    /// Makes `pixels` available as a texture. Small images share the atlas;
    /// larger ones get a texture of their own, released with the last
    /// `TextureRef` clone.
    ///
    /// Panics if the atlas is exhausted or the image is empty.
    pub fn load_image(&mut self, pixels: &PixelBuffer) -> TextureRef {
        assert!(!pixels.is_empty(), "cannot load an empty image");
        let (width, height) = (pixels.width(), pixels.height());
        let data = pixels.clone();

        if self.atlas.config().routes_to_atlas(width, height) {
            let block = self.atlas.get_free_block(width, height);
            self.enqueue(move |ctx| ctx.upload_atlas_region(block, &data));
            return TextureRef::atlas(block.layer, block.uv_rect(), (width, height));
        }

        let id = next_resource_id();
        let image = Arc::new(GpuImage::new(id, (width, height), self.sender.clone()));
        self.registry.register(&image);
        self.enqueue(move |ctx| ctx.create_image(id, &data));
        TextureRef::image(image)
    }

    /// Ends the frame and returns the number of GPU draw calls issued since
    /// the previous commit.
    pub fn commit(&mut self) -> Result<usize, QueueError> {
        self.flush();
        self.sender.call(|ctx| ctx.commit())
    }

    /// Handle to the presentable target. Call after `commit`.
    pub fn presentable(&self) -> Result<Presentable, QueueError> {
        self.sender.call(|ctx| {
            let viewport = ctx.framebuffer().viewport();
            Presentable {
                texture: ctx.framebuffer().presentable().clone(),
                width: viewport.width,
                height: viewport.height,
            }
        })
    }

    /// Reads the frame buffer back as straight-alpha RGBA8. Waits for every
    /// draw submitted so far.
    pub fn load_pixels(&mut self) -> Result<PixelBuffer> {
        self.flush();
        self.sender.call(|ctx| ctx.read_pixels())?
    }

    /// Replaces the frame buffer contents. `pixels` must match the frame
    /// buffer size.
    pub fn update_pixels(&mut self, pixels: &PixelBuffer) -> Result<()> {
        self.flush();
        let pixels = pixels.clone();
        self.sender.call(move |ctx| ctx.write_pixels(&pixels))?
    }

    /// Barrier: returns once everything drawn so far has been executed.
    pub fn finish(&mut self) -> Result<(), QueueError> {
        self.flush();
        self.sender.call(|ctx| ctx.wait_idle())
    }

    /// Draws pending geometry, releases every live GPU resource and stops the
    /// render thread.
    pub fn shutdown(mut self) -> Result<(), QueueError> {
        self.stop()
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let groups = std::mem::take(&mut self.pending).into_groups();
        let uniform = self.scene.uniform(Mat4::IDENTITY);
        let (blend, depth_test) = (self.scene.blend, self.scene.depth_test);
        self.enqueue(move |ctx| ctx.draw_transient(&groups, uniform, blend, depth_test));
    }

    fn enqueue(&self, task: impl FnOnce(&mut GpuContext) + Send + 'static) {
        if let Err(e) = self.sender.submit(task) {
            log::error!("graphics: dropped render task: {e}");
        }
    }

    fn stop(&mut self) -> Result<(), QueueError> {
        let Some(queue) = self.queue.take() else { return Ok(()) };
        self.flush();

        let registry = Arc::clone(&self.registry);
        let swept = self.sender.call(move |ctx| {
            let released = registry.sweep(ctx);
            ctx.wait_idle();
            released
        });
        queue.shutdown();

        let released = swept?;
        log::info!("graphics: shut down, released {released} live GPU resources");
        Ok(())
    }
}

impl Drop for Graphics {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("graphics: shutdown failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasConfig;
    use crate::image::TextureId;
    use crate::render::AntiAlias;
    use crate::shape::Shape;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    /// Brings up a small engine, or `None` on machines without any adapter.
    fn graphics(antialias: AntiAlias) -> Option<Graphics> {
        graphics_with(EngineConfig { antialias, ..EngineConfig::new(64, 48) })
    }

    fn graphics_with(config: EngineConfig) -> Option<Graphics> {
        crate::logging::init_logging(crate::logging::LoggingConfig::default());
        let config = EngineConfig {
            clear_color: Color::from_rgba8(0, 0, 255, 255),
            thread_name: "tessel-test-render".to_owned(),
            ..config
        };
        match Graphics::new(config) {
            Ok(g) => Some(g),
            Err(e) => {
                eprintln!("skipping GPU test: {e:#}");
                None
            }
        }
    }

    fn red_rect(x: f32, y: f32, w: f32, h: f32) -> ShapeNode {
        let mut s = Shape::rect(x, y, w, h);
        s.set_fill_all(Color::from_rgba8(255, 0, 0, 255));
        s.no_stroke();
        ShapeNode::from(s)
    }

    fn textured_rect(x: f32, y: f32, w: f32, h: f32, texture: TextureRef) -> ShapeNode {
        let mut s = Shape::rect(x, y, w, h);
        s.no_stroke();
        s.texture(Some(texture));
        ShapeNode::from(s)
    }

    fn assert_near(got: Option<[u8; 4]>, want: [u8; 4]) {
        let got = got.expect("pixel in range");
        let close = got.iter().zip(want).all(|(&g, w)| g.abs_diff(w) <= 2);
        assert!(close, "got {got:?}, want {want:?}");
    }

    // ── frame ─────────────────────────────────────────────────────────────

    #[test]
    fn clear_color_reaches_the_readback() {
        let Some(mut g) = graphics(AntiAlias::Multisample(4)) else { return };
        let pixels = g.load_pixels().unwrap();
        assert_eq!((pixels.width(), pixels.height()), (64, 48));
        assert!(pixels.as_bytes().chunks_exact(4).all(|p| p == BLUE));
        g.shutdown().unwrap();
    }

    #[test]
    fn filled_rect_covers_its_pixels() {
        for aa in [AntiAlias::None, AntiAlias::Supersample(2), AntiAlias::Multisample(4)] {
            let Some(mut g) = graphics(aa) else { return };
            g.draw(&red_rect(10.0, 10.0, 20.0, 20.0));
            let pixels = g.load_pixels().unwrap();
            assert_eq!(pixels.get(20, 20), Some(RED), "{aa:?}");
            assert_eq!(pixels.get(2, 2), Some(BLUE), "{aa:?}");
            assert_eq!(pixels.get(40, 40), Some(BLUE), "{aa:?}");
            g.shutdown().unwrap();
        }
    }

    #[test]
    fn commit_counts_draws_and_the_blit() {
        let Some(mut g) = graphics(AntiAlias::Supersample(2)) else { return };
        g.draw(&red_rect(0.0, 0.0, 10.0, 10.0));
        g.draw(&red_rect(20.0, 0.0, 10.0, 10.0));
        // Both rects share one buffer group, plus the downsample.
        assert_eq!(g.commit().unwrap(), 2);
        assert_eq!(g.commit().unwrap(), 0);
        g.shutdown().unwrap();
    }

    #[test]
    fn update_pixels_round_trips() {
        let Some(mut g) = graphics(AntiAlias::Multisample(4)) else { return };
        let mut pixels = PixelBuffer::filled(64, 48, [0, 255, 0, 255]);
        pixels.set(5, 7, [10, 20, 30, 255]);
        g.update_pixels(&pixels).unwrap();
        assert_eq!(g.load_pixels().unwrap(), pixels);
        g.shutdown().unwrap();
    }

    #[test]
    fn update_pixels_rejects_a_size_mismatch() {
        let Some(mut g) = graphics(AntiAlias::None) else { return };
        assert!(g.update_pixels(&PixelBuffer::new(3, 3)).is_err());
        g.shutdown().unwrap();
    }

    #[test]
    fn background_discards_unflushed_geometry() {
        let Some(mut g) = graphics(AntiAlias::None) else { return };
        g.draw(&red_rect(0.0, 0.0, 64.0, 48.0));
        g.background(Color::from_rgba8(0, 255, 0, 255));
        let pixels = g.load_pixels().unwrap();
        assert!(pixels.as_bytes().chunks_exact(4).all(|p| p == [0, 255, 0, 255]));
        g.shutdown().unwrap();
    }

    #[test]
    fn external_batches_use_the_current_scene() {
        let Some(mut g) = graphics(AntiAlias::None) else { return };
        let mut batch = Batch::new();
        batch.flatten(&red_rect(0.0, 0.0, 10.0, 10.0), Mat4::IDENTITY, false);

        g.scene_mut().view = Mat4::from_translation(glam::Vec3::new(20.0, 0.0, 0.0));
        g.submit_batch(batch);

        let pixels = g.load_pixels().unwrap();
        assert_eq!(pixels.get(25, 5), Some(RED));
        assert_eq!(pixels.get(5, 5), Some(BLUE));
        g.shutdown().unwrap();
    }

    // ── resources ─────────────────────────────────────────────────────────

    #[test]
    fn retained_group_uploads_once() {
        let Some(mut g) = graphics(AntiAlias::None) else { return };
        let group = ShapeNode::group();
        group.add_child(red_rect(10.0, 10.0, 20.0, 20.0));
        group.edit_group(|grp| grp.set_retained(true));

        g.draw(&group);
        let compiled = group.cached_compiled().unwrap();
        assert!(compiled.is_uploaded());
        g.draw(&group);
        assert!(group.cached_compiled().unwrap().ptr_eq(&compiled));
        assert_eq!(g.live_resources(), 1);

        assert_eq!(g.commit().unwrap(), 2);
        assert_eq!(g.load_pixels().unwrap().get(20, 20), Some(RED));
        assert_eq!(g.sender.call(|ctx| ctx.resident_counts()).unwrap(), (0, 1));

        drop(compiled);
        drop(group);
        assert_eq!(g.live_resources(), 0);
        assert_eq!(g.sender.call(|ctx| ctx.resident_counts()).unwrap(), (0, 0));
        g.shutdown().unwrap();
    }

    #[test]
    fn images_route_by_size() {
        let Some(mut g) = graphics(AntiAlias::None) else { return };
        let small = g.load_image(&PixelBuffer::filled(8, 8, RED));
        assert!(matches!(small.id, TextureId::AtlasLayer(_)));
        assert_eq!(g.live_resources(), 0);

        let large = g.load_image(&PixelBuffer::filled(300, 300, RED));
        assert!(matches!(large.id, TextureId::Image(_)));
        assert_eq!(g.live_resources(), 1);
        drop(large);
        assert_eq!(g.live_resources(), 0);
        g.shutdown().unwrap();
    }

    #[test]
    fn textured_rects_sample_their_image() {
        let Some(mut g) = graphics(AntiAlias::None) else { return };
        let small = g.load_image(&PixelBuffer::filled(8, 8, RED));
        let large = g.load_image(&PixelBuffer::filled(300, 300, RED));

        for (texture, x) in [(small, 0.0), (large, 32.0)] {
            g.draw(&textured_rect(x, 0.0, 32.0, 32.0, texture));
        }

        let pixels = g.load_pixels().unwrap();
        assert_eq!(pixels.get(16, 16), Some(RED));
        assert_eq!(pixels.get(48, 16), Some(RED));
        assert_eq!(pixels.get(16, 40), Some(BLUE));
        g.shutdown().unwrap();
    }

    #[test]
    fn translucent_texels_blend_once() {
        let Some(mut g) = graphics(AntiAlias::None) else { return };
        // Straight-alpha half red: over blue it lands halfway between.
        let small = g.load_image(&PixelBuffer::filled(8, 8, [255, 0, 0, 128]));
        let large = g.load_image(&PixelBuffer::filled(300, 300, [255, 0, 0, 128]));
        g.draw(&textured_rect(0.0, 0.0, 32.0, 32.0, small));
        g.draw(&textured_rect(32.0, 0.0, 32.0, 32.0, large));

        let pixels = g.load_pixels().unwrap();
        assert_near(pixels.get(16, 16), [128, 0, 127, 255]);
        assert_near(pixels.get(48, 16), [128, 0, 127, 255]);
        assert_eq!(pixels.get(16, 40), Some(BLUE));
        g.shutdown().unwrap();
    }

    #[test]
    fn images_on_later_atlas_layers_draw() {
        let atlas = AtlasConfig { layer_size: 16, layer_count: 2, max_image_size: 16 };
        let config =
            EngineConfig { antialias: AntiAlias::None, atlas, ..EngineConfig::new(64, 48) };
        let Some(mut g) = graphics_with(config) else { return };

        // The white texel on layer 0 leaves no room for a full layer.
        let green = g.load_image(&PixelBuffer::filled(16, 16, [0, 255, 0, 255]));
        assert_eq!(green.id, TextureId::AtlasLayer(1));

        g.draw(&textured_rect(0.0, 0.0, 32.0, 32.0, green));
        g.draw(&red_rect(32.0, 0.0, 32.0, 32.0));

        let pixels = g.load_pixels().unwrap();
        assert_eq!(pixels.get(16, 16), Some([0, 255, 0, 255]));
        assert_eq!(pixels.get(48, 16), Some(RED));
        g.shutdown().unwrap();
    }
}
