use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::light::{GpuLight, Light};
use crate::paint::BlendMode;

/// Lights beyond this count are dropped.
pub const MAX_LIGHTS: usize = 8;

/// Camera, lights, and compositing state bound with every draw.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneState {
    pub projection: Mat4,
    pub view: Mat4,
    pub blend: BlendMode,
    pub depth_test: bool,
    lights: Vec<Light>,
}

impl SceneState {
    /// Pixel-space 2D camera: origin top-left, +Y down, one unit per pixel.
    pub fn ortho2d(width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        Self {
            projection: Mat4::orthographic_rh(0.0, w, h, 0.0, -1000.0, 1000.0),
            view: Mat4::IDENTITY,
            blend: BlendMode::default(),
            depth_test: false,
            lights: Vec::new(),
        }
    }

    /// 60° perspective camera placed so the `z = 0` plane maps one unit to
    /// one pixel, origin top-left, +Y down.
    pub fn perspective2d(width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        let fov = std::f32::consts::FRAC_PI_3;
        let eye_z = (h * 0.5) / (fov * 0.5).tan();
        let center = Vec3::new(w * 0.5, h * 0.5, 0.0);
        // Flip Y after projection so +Y points down the screen.
        let flip = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
        Self {
            projection: flip * Mat4::perspective_rh(fov, w / h, eye_z / 10.0, eye_z * 10.0),
            view: Mat4::look_at_rh(center + Vec3::Z * eye_z, center, Vec3::Y),
            blend: BlendMode::default(),
            depth_test: true,
            lights: Vec::new(),
        }
    }

    pub fn set_camera(&mut self, eye: Vec3, center: Vec3, up: Vec3) {
        self.view = Mat4::look_at_rh(eye, center, up);
    }

    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Mat4::perspective_rh(fov_y, aspect, near, far);
    }

    pub fn set_ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.projection = Mat4::orthographic_rh(left, right, bottom, top, near, far);
    }

    /// Adds a light. Returns `false` (and drops it) once `MAX_LIGHTS` are set.
    pub fn add_light(&mut self, light: Light) -> bool {
        if self.lights.len() >= MAX_LIGHTS {
            log::warn!("scene: light limit ({MAX_LIGHTS}) reached; {:?} light ignored", light.kind);
            return false;
        }
        self.lights.push(light);
        true
    }

    /// Mid-gray ambient plus a white-ish key light along the view axis.
    pub fn default_lights(&mut self) {
        self.lights.clear();
        self.add_light(Light::ambient(Vec3::splat(0.5)));
        self.add_light(Light::directional(Vec3::splat(0.5), Vec3::NEG_Z));
    }

    pub fn no_lights(&mut self) {
        self.lights.clear();
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub(crate) fn uniform(&self, model: Mat4) -> SceneUniform {
        let mut lights = [GpuLight::default(); MAX_LIGHTS];
        for (slot, light) in lights.iter_mut().zip(&self.lights) {
            *slot = light.to_gpu();
        }
        SceneUniform {
            projection: self.projection.to_cols_array_2d(),
            view: self.view.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            lights,
            counts: [self.lights.len() as u32, 0, 0, 0],
        }
    }
}

/// Uniform block at group 0, binding 0 of the shape shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct SceneUniform {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub lights: [GpuLight; MAX_LIGHTS],
    /// x = light count
    pub counts: [u32; 4],
}
