//! Batching: packing tessellated shapes into capacity-bounded buffer groups.
//!
//! Design:
//! - A [`BufferGroup`] is one GPU draw: u16 indices, at most 65536 vertices,
//!   16 transform slots and 16 texture slots.
//! - [`Batch`] appends shapes in tree order and opens a new group whenever
//!   the current one cannot take a whole shape. Shapes are never split.
//! - [`CompiledBatch`] is an immutable, shareable batch cached on a group node.

mod accumulator;
mod compiled;
mod group;

pub use accumulator::Batch;
pub use compiled::CompiledBatch;
pub use group::{BufferGroup, MAX_TEXTURES, MAX_TRANSFORMS, MAX_VERTICES};
