//! The retained shape tree.
//!
//! - [`Shape`]: a leaf built with `begin` / `vertex` / `end`.
//! - [`ShapeNode`]: shared handle to a leaf or a [`Group`] of child handles.
//! - Every mutation takes a stamp from one process-wide counter; a group's
//!   compiled batch is valid while no stamp in its subtree is newer.

mod kind;
mod leaf;
mod node;
mod vertex;

pub use kind::{EndMode, ShapeKind, StrokeCap};
pub use node::{Group, Node, ShapeNode};
pub use leaf::{Shape, Style};
pub use vertex::{StrokeExtra, Vertex};
