use crate::coords::Viewport;
use crate::render::pipeline::DEPTH_FORMAT;

/// Format of every color target.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Anti-aliasing strategy of the internal render target.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum AntiAlias {
    #[default]
    None,
    /// Render at `factor`x resolution (clamped to 1..=4), box-filter on blit.
    Supersample(u32),
    /// Hardware multisampling. Any count above 1 uses 4 samples, the count
    /// every backend supports.
    Multisample(u32),
}

impl AntiAlias {
    #[inline]
    pub fn scale(self) -> u32 {
        match self {
            AntiAlias::Supersample(f) => f.clamp(1, 4),
            _ => 1,
        }
    }

    #[inline]
    pub fn sample_count(self) -> u32 {
        match self {
            AntiAlias::Multisample(n) if n > 1 => 4,
            _ => 1,
        }
    }

    #[inline]
    pub fn internal_viewport(self, presentable: Viewport) -> Viewport {
        presentable.scaled(self.scale())
    }

    /// True if drawing goes to a target other than the presentable one.
    #[inline]
    pub fn has_internal_target(self) -> bool {
        self.scale() > 1 || self.sample_count() > 1
    }
}

/// Row pitch for texture-to-buffer copies.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl Target {
    fn new(
        device: &wgpu::Device,
        label: &str,
        size: Viewport,
        format: wgpu::TextureFormat,
        samples: u32,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: size.extent(),
            mip_level_count: 1,
            sample_count: samples,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Full-screen transfer pass between the two color targets.
struct BlitPass {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    _params: wgpu::Buffer,
}

/// Internal render target plus the 1x presentable target.
///
/// - `None`: draws go straight to the presentable target.
/// - `Supersample(f)`: draws go to an `f`x target; `blit` box-filters it down.
/// - `Multisample(n)`: draws go to a multisampled target that every pass
///   resolves into the presentable one, so `blit` has nothing to do.
pub struct FrameBuffer {
    viewport: Viewport,
    antialias: AntiAlias,
    presentable: Target,
    internal: Option<Target>,
    depth: Target,
    down: Option<BlitPass>,
    up: Option<BlitPass>,
    /// The internal target holds draws not yet blitted.
    dirty: bool,
}

impl FrameBuffer {
    pub fn new(device: &wgpu::Device, viewport: Viewport, antialias: AntiAlias) -> Self {
        let internal_size = antialias.internal_viewport(viewport);
        let samples = antialias.sample_count();

        let presentable = Target::new(
            device,
            "tessel presentable target",
            viewport,
            COLOR_FORMAT,
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        );

        let internal = antialias.has_internal_target().then(|| {
            let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
            if samples == 1 {
                usage |= wgpu::TextureUsages::TEXTURE_BINDING;
            }
            let label = "tessel internal target";
            Target::new(device, label, internal_size, COLOR_FORMAT, samples, usage)
        });

        let depth = Target::new(
            device,
            "tessel depth target",
            internal_size,
            DEPTH_FORMAT,
            samples,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let down = match (&internal, antialias.scale() > 1) {
            (Some(src), true) => {
                Some(BlitPass::new(device, &src.view, antialias.scale(), 1, "fs_down"))
            }
            _ => None,
        };
        let up = internal
            .as_ref()
            .map(|_| BlitPass::new(device, &presentable.view, antialias.scale(), samples, "fs_up"));

        log::debug!(
            "framebuffer: {}x{} presentable, {}x{} internal, {samples} sample(s)",
            viewport.width,
            viewport.height,
            internal_size.width,
            internal_size.height
        );

        Self {
            viewport,
            antialias,
            presentable,
            internal,
            depth,
            down,
            up,
            dirty: false,
        }
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    pub fn antialias(&self) -> AntiAlias {
        self.antialias
    }

    #[inline]
    pub fn internal_viewport(&self) -> Viewport {
        self.antialias.internal_viewport(self.viewport)
    }

    #[inline]
    pub fn presentable(&self) -> &wgpu::Texture {
        &self.presentable.texture
    }

    /// Color attachment for a drawing pass.
    pub(crate) fn color_attachment(
        &self,
        load: wgpu::LoadOp<wgpu::Color>,
    ) -> wgpu::RenderPassColorAttachment<'_> {
        let (view, resolve_target) = match &self.internal {
            Some(t) if self.antialias.sample_count() > 1 => (&t.view, Some(&self.presentable.view)),
            Some(t) => (&t.view, None),
            None => (&self.presentable.view, None),
        };
        wgpu::RenderPassColorAttachment {
            view,
            resolve_target,
            ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
            depth_slice: None,
        }
    }

    pub(crate) fn depth_attachment(
        &self,
        load: wgpu::LoadOp<f32>,
    ) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth.view,
            depth_ops: Some(wgpu::Operations { load, store: wgpu::StoreOp::Store }),
            stencil_ops: None,
        }
    }

    /// Records that a drawing pass touched the internal target.
    pub(crate) fn mark_drawn(&mut self) {
        if self.down.is_some() {
            self.dirty = true;
        }
    }

    /// Downsamples pending supersampled content into the presentable target.
    /// Returns the number of draws recorded (0 or 1).
    pub fn blit(&mut self, encoder: &mut wgpu::CommandEncoder) -> usize {
        let Some(down) = self.down.as_ref() else { return 0 };
        if !self.dirty {
            return 0;
        }
        down.run(encoder, &self.presentable.view, "tessel blit down");
        self.dirty = false;
        1
    }

    /// Pushes the presentable target back into the internal one, after its
    /// pixels were replaced from the CPU. Returns the number of draws recorded.
    pub(crate) fn upsample(&mut self, encoder: &mut wgpu::CommandEncoder) -> usize {
        let (Some(up), Some(internal)) = (self.up.as_ref(), self.internal.as_ref()) else {
            return 0;
        };
        up.run(encoder, &internal.view, "tessel blit up");
        self.dirty = false;
        1
    }
}

impl BlitPass {
    fn new(
        device: &wgpu::Device,
        src: &wgpu::TextureView,
        factor: u32,
        samples: u32,
        entry: &str,
    ) -> Self {
        use wgpu::util::DeviceExt;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tessel blit shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tessel blit bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tessel blit params"),
            contents: bytemuck::cast_slice(&[factor.max(1), 0, 0, 0]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tessel blit bind group"),
            layout: &bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(src),
                },
                wgpu::BindGroupEntry { binding: 1, resource: params.as_entire_binding() },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tessel blit pipeline layout"),
            bind_group_layouts: &[&bgl],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tessel blit pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: samples,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview_mask: None,
            cache: None,
        });

        Self { pipeline, bind_group, _params: params }
    }

    fn run(&self, encoder: &mut wgpu::CommandEncoder, dst: &wgpu::TextureView, label: &str) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: dst,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
}
