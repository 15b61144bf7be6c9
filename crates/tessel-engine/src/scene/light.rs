use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Light categories understood by the shape shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
    Spot,
}

impl LightKind {
    fn code(self) -> f32 {
        match self {
            LightKind::Ambient => 0.0,
            LightKind::Directional => 1.0,
            LightKind::Point => 2.0,
            LightKind::Spot => 3.0,
        }
    }
}

/// Attenuation `1 / (constant + linear * d + quadratic * d²)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Falloff {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Falloff {
    fn default() -> Self {
        Self { constant: 1.0, linear: 0.0, quadratic: 0.0 }
    }
}

/// A world-space light.
///
/// `position` is used by point and spot lights, `direction` by directional
/// and spot lights.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub position: Vec3,
    pub direction: Vec3,
    pub falloff: Falloff,
    /// Half-angle of the spot cone, radians.
    pub spot_angle: f32,
    /// Exponent applied to the cosine inside the cone.
    pub spot_concentration: f32,
}

impl Light {
    fn new(kind: LightKind, color: Vec3) -> Self {
        Self {
            kind,
            color,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            falloff: Falloff::default(),
            spot_angle: std::f32::consts::FRAC_PI_2,
            spot_concentration: 1.0,
        }
    }

    pub fn ambient(color: Vec3) -> Self {
        Self::new(LightKind::Ambient, color)
    }

    pub fn directional(color: Vec3, direction: Vec3) -> Self {
        Self {
            direction: direction.normalize_or(Vec3::NEG_Z),
            ..Self::new(LightKind::Directional, color)
        }
    }

    pub fn point(color: Vec3, position: Vec3) -> Self {
        Self { position, ..Self::new(LightKind::Point, color) }
    }

    pub fn spot(
        color: Vec3,
        position: Vec3,
        direction: Vec3,
        angle: f32,
        concentration: f32,
    ) -> Self {
        Self {
            position,
            direction: direction.normalize_or(Vec3::NEG_Z),
            spot_angle: angle,
            spot_concentration: concentration,
            ..Self::new(LightKind::Spot, color)
        }
    }

    pub fn with_falloff(mut self, constant: f32, linear: f32, quadratic: f32) -> Self {
        self.falloff = Falloff { constant, linear, quadratic };
        self
    }

    pub(crate) fn to_gpu(self) -> GpuLight {
        GpuLight {
            position: self.position.extend(self.kind.code()).to_array(),
            direction: self.direction.extend(self.spot_angle.cos()).to_array(),
            color: self.color.extend(self.spot_concentration).to_array(),
            falloff: [self.falloff.constant, self.falloff.linear, self.falloff.quadratic, 0.0],
        }
    }
}

/// std140 light record.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub(crate) struct GpuLight {
    /// xyz = position, w = kind code
    pub position: [f32; 4],
    /// xyz = direction, w = cos(spot angle)
    pub direction: [f32; 4],
    /// xyz = color, w = spot concentration
    pub color: [f32; 4],
    /// xyz = constant, linear, quadratic
    pub falloff: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_record_packs_kind_and_cone() {
        let (pos, dir) = (Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, -2.0));
        let l = Light::spot(Vec3::ONE, pos, dir, 0.0, 8.0);
        let g = l.to_gpu();
        assert_eq!(g.position, [1.0, 2.0, 3.0, 3.0]);
        assert_eq!(g.direction, [0.0, 0.0, -1.0, 1.0]);
        assert_eq!(g.color[3], 8.0);
        assert_eq!(std::mem::size_of::<GpuLight>(), 64);
    }

    #[test]
    fn default_falloff_is_constant() {
        let g = Light::point(Vec3::X, Vec3::ZERO).to_gpu();
        assert_eq!(g.falloff, [1.0, 0.0, 0.0, 0.0]);
    }
}
