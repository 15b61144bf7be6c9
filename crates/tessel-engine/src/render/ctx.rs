use std::collections::HashMap;

use anyhow::{Context as _, Result};
use wgpu::util::DeviceExt;

use crate::atlas::{AtlasBlock, AtlasConfig};
use crate::batch::{BufferGroup, MAX_TEXTURES};
use crate::config::EngineConfig;
use crate::device::Gpu;
use crate::image::{premultiply, unpremultiply, PixelBuffer, TextureId};
use crate::paint::{BlendMode, Color};
use crate::render::framebuffer::{padded_bytes_per_row, FrameBuffer, COLOR_FORMAT};
use crate::render::pipeline::ShapePipelines;
use crate::render::upload::GpuBufferGroup;
use crate::scene::SceneUniform;

/// A sampled texture: a standalone image or one atlas layer.
struct Image {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Everything GPU-side. Lives on the render thread and is only reached
/// through queued tasks.
pub struct GpuContext {
    gpu: Gpu,
    framebuffer: FrameBuffer,
    pipelines: ShapePipelines,

    /// One plain 2D texture per atlas layer. Per-layer views of an array
    /// texture can't be bound as `texture_2d` on every backend.
    atlas: Vec<Image>,
    images: HashMap<u64, Image>,
    batches: HashMap<u64, Vec<GpuBufferGroup>>,
    sampler: wgpu::Sampler,

    scene_ubo: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,

    /// Draws recorded since the last commit.
    draw_calls: usize,
    /// Clear color for the next pass, if one is pending.
    clear: Option<Color>,
}

impl GpuContext {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let viewport = config.viewport();
        anyhow::ensure!(
            viewport.is_valid(),
            "frame buffer size must be non-zero, got {}x{}",
            viewport.width,
            viewport.height
        );

        let gpu = Gpu::new_blocking(config.gpu.clone()).context("failed to create GPU device")?;
        let device = gpu.device();

        let framebuffer = FrameBuffer::new(device, viewport, config.antialias);
        let pipelines = ShapePipelines::new(device, COLOR_FORMAT, config.antialias.sample_count());

        let atlas = create_atlas(device, &config.atlas);
        // Texel (0,0) of layer 0 stays white: untextured geometry samples it.
        gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &atlas[0].texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tessel sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let scene_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tessel scene ubo"),
            size: std::mem::size_of::<SceneUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tessel scene bind group"),
            layout: &pipelines.scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_ubo.as_entire_binding(),
            }],
        });

        Ok(Self {
            gpu,
            framebuffer,
            pipelines,
            atlas,
            images: HashMap::new(),
            batches: HashMap::new(),
            sampler,
            scene_ubo,
            scene_bind_group,
            draw_calls: 0,
            clear: None,
        })
    }

    #[inline]
    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    #[inline]
    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    /// Images and compiled batches currently resident.
    pub fn resident_counts(&self) -> (usize, usize) {
        (self.images.len(), self.batches.len())
    }

    // ── textures ──────────────────────────────────────────────────────────

    pub fn upload_atlas_region(&self, block: AtlasBlock, pixels: &PixelBuffer) {
        let Some(layer) = self.atlas.get(block.layer as usize) else {
            log::error!("atlas layer {} does not exist, image dropped", block.layer);
            return;
        };
        let mut data = pixels.as_bytes().to_vec();
        premultiply(&mut data);
        self.gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &layer.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: block.left, y: block.top, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(pixels.bytes_per_row()),
                rows_per_image: Some(pixels.height()),
            },
            wgpu::Extent3d {
                width: pixels.width(),
                height: pixels.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn create_image(&mut self, id: u64, pixels: &PixelBuffer) {
        let mut data = pixels.as_bytes().to_vec();
        premultiply(&mut data);
        let texture = self.gpu.device().create_texture_with_data(
            self.gpu.queue(),
            &wgpu::TextureDescriptor {
                label: Some("tessel image"),
                size: wgpu::Extent3d {
                    width: pixels.width(),
                    height: pixels.height(),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: COLOR_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &data,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("image {id}: {}x{} standalone texture", pixels.width(), pixels.height());
        self.images.insert(id, Image { texture, view });
    }

    pub fn release_image(&mut self, id: u64) {
        if self.images.remove(&id).is_some() {
            log::trace!("image {id} released");
        }
    }

    fn view_for(&self, id: TextureId) -> &wgpu::TextureView {
        let white = &self.atlas[0].view;
        match id {
            TextureId::AtlasLayer(layer) => {
                self.atlas.get(layer as usize).map(|l| &l.view).unwrap_or(white)
            }
            TextureId::Image(id) => self.images.get(&id).map(|i| &i.view).unwrap_or_else(|| {
                log::warn!("image {id} is not resident, sampling white");
                white
            }),
        }
    }

    // ── batches ───────────────────────────────────────────────────────────

    fn upload_groups(&self, groups: &[BufferGroup]) -> Vec<GpuBufferGroup> {
        groups
            .iter()
            .filter_map(|group| {
                let mut views = [&self.atlas[0].view; MAX_TEXTURES];
                for (slot, texture) in views.iter_mut().zip(group.textures()) {
                    *slot = self.view_for(texture.id);
                }
                GpuBufferGroup::upload(
                    self.gpu.device(),
                    &self.pipelines.group_layout,
                    &self.sampler,
                    group,
                    &views,
                )
            })
            .collect()
    }

    /// Uploads a compiled batch under `id` for repeated drawing.
    pub fn upload_batch(&mut self, id: u64, groups: &[BufferGroup]) {
        let uploaded = self.upload_groups(groups);
        log::debug!("batch {id}: {} buffer groups resident", uploaded.len());
        self.batches.insert(id, uploaded);
    }

    pub fn release_batch(&mut self, id: u64) {
        if self.batches.remove(&id).is_some() {
            log::trace!("batch {id} released");
        }
    }

    /// Uploads and draws `groups` once.
    pub(crate) fn draw_transient(
        &mut self,
        groups: &[BufferGroup],
        scene: SceneUniform,
        blend: BlendMode,
        depth_test: bool,
    ) {
        let uploaded = self.upload_groups(groups);
        self.record(&uploaded, Some(&scene), blend, depth_test);
    }

    /// Draws a resident batch. Unknown ids are skipped.
    pub(crate) fn draw_uploaded(
        &mut self,
        id: u64,
        scene: SceneUniform,
        blend: BlendMode,
        depth_test: bool,
    ) {
        let Some(groups) = self.batches.remove(&id) else {
            log::warn!("batch {id} is not resident, skipping draw");
            return;
        };
        self.record(&groups, Some(&scene), blend, depth_test);
        self.batches.insert(id, groups);
    }

    /// Sets the clear color applied by the next pass.
    pub fn clear(&mut self, color: Color) {
        self.clear = Some(color);
    }

    /// Runs a pending clear that no draw has consumed yet.
    fn flush_clear(&mut self) {
        if self.clear.is_some() {
            self.record(&[], None, BlendMode::default(), false);
        }
    }

    fn record(
        &mut self,
        groups: &[GpuBufferGroup],
        scene: Option<&SceneUniform>,
        blend: BlendMode,
        depth_test: bool,
    ) {
        let clear = self.clear.take();
        if groups.is_empty() && clear.is_none() {
            return;
        }

        if let Some(scene) = scene {
            self.gpu.queue().write_buffer(&self.scene_ubo, 0, bytemuck::bytes_of(scene));
        }

        let (color_load, depth_load) = match clear {
            Some(c) => (wgpu::LoadOp::Clear(c.to_wgpu()), wgpu::LoadOp::Clear(1.0)),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let device = self.gpu.device();
        let pipeline = self.pipelines.get(device, blend, depth_test);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tessel draw encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tessel draw pass"),
                color_attachments: &[Some(self.framebuffer.color_attachment(color_load))],
                depth_stencil_attachment: Some(self.framebuffer.depth_attachment(depth_load)),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &self.scene_bind_group, &[]);
            for group in groups {
                group.draw(&mut rpass);
            }
        }
        self.gpu.queue().submit(Some(encoder.finish()));

        self.draw_calls += groups.len();
        self.framebuffer.mark_drawn();
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Ends the frame: applies a pending clear, resolves the internal target
    /// into the presentable one and returns the draw calls issued since the
    /// last commit (blits included).
    pub fn commit(&mut self) -> usize {
        self.flush_clear();
        let mut encoder = self.encoder("tessel commit encoder");
        self.draw_calls += self.framebuffer.blit(&mut encoder);
        self.gpu.queue().submit(Some(encoder.finish()));
        std::mem::take(&mut self.draw_calls)
    }

    /// Copies the presentable target back to the CPU as straight-alpha RGBA8.
    pub fn read_pixels(&mut self) -> Result<PixelBuffer> {
        self.flush_clear();

        let viewport = self.framebuffer.viewport();
        let (width, height) = (viewport.width, viewport.height);
        let padded = padded_bytes_per_row(width);

        let readback = self.gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("tessel readback"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.encoder("tessel readback encoder");
        self.draw_calls += self.framebuffer.blit(&mut encoder);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: self.framebuffer.presentable(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            viewport.extent(),
        );
        self.gpu.queue().submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.gpu
            .device()
            .poll(wgpu::PollType::wait_indefinitely())
            .context("device poll failed during readback")?;
        rx.recv()
            .context("readback callback was dropped")?
            .context("failed to map readback buffer")?;

        let row = (width * 4) as usize;
        let mut data = Vec::with_capacity(row * height as usize);
        {
            let mapped = slice.get_mapped_range();
            for chunk in mapped.chunks_exact(padded as usize) {
                data.extend_from_slice(&chunk[..row]);
            }
        }
        readback.unmap();

        unpremultiply(&mut data);
        Ok(PixelBuffer::from_rgba8(width, height, data))
    }

    /// Replaces the presentable target with `pixels` (straight-alpha RGBA8)
    /// and pushes it into the internal target.
    pub fn write_pixels(&mut self, pixels: &PixelBuffer) -> Result<()> {
        let viewport = self.framebuffer.viewport();
        anyhow::ensure!(
            pixels.width() == viewport.width && pixels.height() == viewport.height,
            "pixel buffer is {}x{}, frame buffer is {}x{}",
            pixels.width(),
            pixels.height(),
            viewport.width,
            viewport.height
        );
        // Pending draws would land on top of the new pixels otherwise.
        self.clear = None;

        let mut data = pixels.as_bytes().to_vec();
        premultiply(&mut data);
        self.gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: self.framebuffer.presentable(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(pixels.bytes_per_row()),
                rows_per_image: Some(pixels.height()),
            },
            viewport.extent(),
        );

        let mut encoder = self.encoder("tessel upsample encoder");
        self.draw_calls += self.framebuffer.upsample(&mut encoder);
        self.gpu.queue().submit(Some(encoder.finish()));
        Ok(())
    }

    /// Blocks until the GPU has finished all submitted work.
    pub fn wait_idle(&self) {
        self.gpu.wait_idle();
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }
}

fn create_atlas(device: &wgpu::Device, config: &AtlasConfig) -> Vec<Image> {
    (0..config.layer_count.max(1))
        .map(|_| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("tessel atlas layer"),
                size: wgpu::Extent3d {
                    width: config.layer_size,
                    height: config.layer_size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: COLOR_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            Image { texture, view }
        })
        .collect()
}
