use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::paint::Color;

/// GPU vertex (56 bytes).
///
///  offset  0  position         [f32; 3]  loc 0
///  offset 12  normal           [f32; 3]  loc 1
///  offset 24  uv               [f32; 2]  loc 2
///  offset 32  color            [f32; 4]  loc 3  (premultiplied)
///  offset 48  texture_unit     u32       loc 4
///  offset 52  transform_index  u32       loc 5
///
/// `texture_unit` and `transform_index` are slots in the owning buffer
/// group, assigned when the vertex is batched. Inside a shape both are 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
    pub texture_unit: u32,
    pub transform_index: u32,
}

impl Vertex {
    const ATTRS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x3, // normal
        2 => Float32x2, // uv
        3 => Float32x4, // color
        4 => Uint32,    // texture_unit
        5 => Uint32     // transform_index
    ];

    #[inline]
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2, color: Color) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
            color: color.to_array(),
            texture_unit: 0,
            transform_index: 0,
        }
    }

    #[inline]
    pub fn pos(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    pub fn pos2(&self) -> Vec2 {
        Vec2::new(self.position[0], self.position[1])
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Per-vertex stroke attributes, parallel to a shape's vertex array.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StrokeExtra {
    pub color: Color,
    pub weight: f32,
}

impl StrokeExtra {
    #[inline]
    pub const fn new(color: Color, weight: f32) -> Self {
        Self { color, weight }
    }

    #[inline]
    pub fn half_weight(&self) -> f32 {
        self.weight.max(0.0) * 0.5
    }
}
