use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::batch::MAX_TEXTURES;
use crate::paint::BlendMode;
use crate::scene::SceneUniform;
use crate::shape::Vertex;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Size of the per-group transform slot table (16 column-major mat4).
pub(crate) const TRANSFORMS_SIZE: u64 = (16 * 16 * 4) as u64;

/// Shape render pipelines, one per (blend mode, depth test) pair.
///
/// The shader module and layouts are created once; pipelines are created on
/// first use and cached.
pub(crate) struct ShapePipelines {
    shader: wgpu::ShaderModule,
    pub(crate) scene_layout: wgpu::BindGroupLayout,
    pub(crate) group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    sample_count: u32,
    cache: HashMap<(BlendMode, bool), wgpu::RenderPipeline>,
}

impl ShapePipelines {
    pub(crate) fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tessel shape shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shape.wgsl").into()),
        });

        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tessel scene bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<SceneUniform>() as u64),
                },
                count: None,
            }],
        });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(TRANSFORMS_SIZE),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        entries.extend((0..MAX_TEXTURES as u32).map(|i| wgpu::BindGroupLayoutEntry {
            binding: 2 + i,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }));

        let group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tessel buffer group bgl"),
            entries: &entries,
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tessel shape pipeline layout"),
            bind_group_layouts: &[&scene_layout, &group_layout],
            immediate_size: 0,
        });

        Self {
            shader,
            scene_layout,
            group_layout,
            layout,
            format,
            sample_count,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn get(
        &mut self,
        device: &wgpu::Device,
        blend: BlendMode,
        depth_test: bool,
    ) -> &wgpu::RenderPipeline {
        let Self { shader, layout, format, sample_count, cache, .. } = self;
        cache.entry((blend, depth_test)).or_insert_with(|| {
            create_pipeline(device, shader, layout, *format, *sample_count, blend, depth_test)
        })
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    sample_count: u32,
    blend: BlendMode,
    depth_test: bool,
) -> wgpu::RenderPipeline {
    log::debug!("pipeline: creating shape pipeline ({blend:?}, depth test {depth_test})");

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("tessel shape pipeline"),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::layout()],
        },

        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: blend.blend_state(),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Both windings occur: y-down projections flip them.
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        // A depth attachment is always bound; without depth test it is ignored.
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_test,
            depth_compare: if depth_test {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },

        multiview_mask: None,
        cache: None,
    })
}
