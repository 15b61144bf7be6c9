//! GPU rendering subsystem.
//!
//! A single render thread owns the [`GpuContext`]; every other thread talks to
//! it through the FIFO [`RenderQueue`]. Cross-thread handles to GPU objects
//! ([`GpuBatch`], [`GpuImage`]) release their GPU side through the same queue.
//!
//! Convention:
//! - Vertex positions are in world units; the scene projection maps them to
//!   clip space (top-left origin, +Y down for the default 2D projection).
//! - Colors are premultiplied everywhere on the GPU side.

mod ctx;
mod framebuffer;
mod pipeline;
mod queue;
mod registry;
mod resources;
mod upload;

pub use ctx::GpuContext;
pub use framebuffer::{AntiAlias, FrameBuffer, COLOR_FORMAT};
pub use queue::{QueueError, RenderQueue, Task, TaskSender};
pub use registry::{Releasable, ResourceRegistry};
pub use resources::{GpuBatch, GpuImage};

pub(crate) use resources::next_resource_id;
