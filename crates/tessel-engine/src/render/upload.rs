use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::batch::{BufferGroup, MAX_TEXTURES, MAX_TRANSFORMS};

/// GPU copy of one buffer group: one indexed draw.
pub(crate) struct GpuBufferGroup {
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
    index_count: u32,
    _transforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GpuBufferGroup {
    /// Uploads `group`. `views[i]` is bound as texture slot `i`; slots past
    /// the group's own textures must still be valid views.
    ///
    /// Returns `None` for a group without indices.
    pub(crate) fn upload(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        group: &BufferGroup,
        views: &[&wgpu::TextureView; MAX_TEXTURES],
    ) -> Option<Self> {
        if group.is_empty() {
            return None;
        }

        let vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tessel group vbo"),
            contents: bytemuck::cast_slice(group.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Copy sizes must be 4-byte aligned; pad odd u16 counts.
        let mut indices = group.indices().to_vec();
        let index_count = indices.len() as u32;
        if indices.len() % 2 == 1 {
            indices.push(0);
        }
        let ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tessel group ibo"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let mut slots = [Mat4::IDENTITY.to_cols_array_2d(); MAX_TRANSFORMS];
        for (slot, m) in slots.iter_mut().zip(group.transforms()) {
            *slot = m.to_cols_array_2d();
        }
        let transforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tessel group transforms"),
            contents: bytemuck::cast_slice(&slots),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries = vec![
            wgpu::BindGroupEntry { binding: 0, resource: transforms.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
        ];
        entries.extend(views.iter().enumerate().map(|(i, view)| wgpu::BindGroupEntry {
            binding: 2 + i as u32,
            resource: wgpu::BindingResource::TextureView(view),
        }));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tessel group bind group"),
            layout,
            entries: &entries,
        });

        Some(Self {
            vbo,
            ibo,
            index_count,
            _transforms: transforms,
            bind_group,
        })
    }

    /// Records the draw. The pipeline and scene bind group must be set.
    pub(crate) fn draw(&self, rpass: &mut wgpu::RenderPass<'_>) {
        rpass.set_bind_group(1, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vbo.slice(..));
        rpass.set_index_buffer(self.ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}
