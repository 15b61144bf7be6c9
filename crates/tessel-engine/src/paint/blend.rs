/// Compositing mode applied to every draw until changed.
///
/// All modes assume premultiplied source colors.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BlendMode {
    /// Source-over.
    #[default]
    Blend,
    Add,
    /// `dst - src`.
    Subtract,
    Lightest,
    Darkest,
    /// No fixed-function equivalent; drawn with blending disabled.
    Difference,
    Exclusion,
    Multiply,
    Screen,
    /// Overwrites the destination.
    Replace,
}

impl BlendMode {
    /// Fixed-function blend state, or `None` when blending is disabled.
    pub fn blend_state(self) -> Option<wgpu::BlendState> {
        use wgpu::{BlendFactor as F, BlendOperation as Op};

        let (src, dst, op) = match self {
            BlendMode::Blend => (F::One, F::OneMinusSrcAlpha, Op::Add),
            BlendMode::Add => (F::One, F::One, Op::Add),
            BlendMode::Subtract => (F::One, F::One, Op::ReverseSubtract),
            BlendMode::Lightest => (F::One, F::One, Op::Max),
            BlendMode::Darkest => (F::One, F::One, Op::Min),
            BlendMode::Exclusion => (F::OneMinusDst, F::OneMinusSrc, Op::Add),
            BlendMode::Multiply => (F::Dst, F::Zero, Op::Add),
            BlendMode::Screen => (F::One, F::OneMinusSrc, Op::Add),
            BlendMode::Difference | BlendMode::Replace => return None,
        };

        // Min/Max ignore the factors, wgpu requires them to be One.
        let (src, dst) = match op {
            Op::Min | Op::Max => (F::One, F::One),
            _ => (src, dst),
        };

        let color = wgpu::BlendComponent { src_factor: src, dst_factor: dst, operation: op };
        let alpha = match op {
            Op::Min | Op::Max => color,
            _ => wgpu::BlendComponent {
                src_factor: F::One,
                dst_factor: F::OneMinusSrcAlpha,
                operation: Op::Add,
            },
        };

        Some(wgpu::BlendState { color, alpha })
    }
}
