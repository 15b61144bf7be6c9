//! Tessel engine crate.
//!
//! Retained-mode 2D/3D shape rendering: shapes are tessellated into triangles,
//! merged into capacity-bounded buffer groups and drawn by a single render
//! thread that owns the GPU context. Static subtrees can be compiled once and
//! redrawn without re-tessellation.

pub mod atlas;
pub mod batch;
pub mod config;
pub mod coords;
pub mod device;
pub mod geom;
pub mod graphics;
pub mod image;
pub mod logging;
pub mod paint;
pub mod render;
pub mod scene;
pub mod shape;

pub use config::EngineConfig;
pub use graphics::{Graphics, Presentable};
