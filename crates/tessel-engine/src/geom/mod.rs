//! Tessellation: polygon triangulation and stroke synthesis.
//!
//! Everything here is pure CPU math over `glam` vectors. Shapes call into this
//! module at `end()` (fill indices) and at flatten time (stroke geometry).

mod mesh;
pub mod stroke;
pub mod triangulate;

pub use mesh::Mesh;
pub use stroke::MITER_LIMIT;
pub use triangulate::{is_clockwise, project_to_plane, signed_area, triangulate, Triangulation};
