/// Primitive style of a leaf shape, chosen at `begin`.
///
/// Each arm carries only what its tessellation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeKind {
    /// Each vertex is drawn as a dot of stroke-weight diameter.
    Points,
    /// Vertex pairs are independent segments.
    Lines,
    /// General polygon. `contours` holds the start offsets of every contour
    /// after the first; those contours are holes.
    Polygon { contours: Vec<usize> },
    ConvexPolygon,
    TriangleFan,
    Triangles,
    TriangleStrip,
    Quads,
    QuadStrip,
}

impl ShapeKind {
    /// Plain polygon without holes.
    #[inline]
    pub fn polygon() -> Self {
        ShapeKind::Polygon { contours: Vec::new() }
    }

    /// True if the kind produces filled triangles.
    #[inline]
    pub fn has_fill(&self) -> bool {
        !matches!(self, ShapeKind::Points | ShapeKind::Lines)
    }
}

/// How `end` finishes the outline of a shape.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum EndMode {
    #[default]
    Open,
    Close,
}

/// End treatment for open strokes.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum StrokeCap {
    /// Half-circle past each end point.
    #[default]
    Round,
    /// Rectangle extended by half the weight past each end point.
    Project,
    /// Rectangle ending exactly at the end points.
    Square,
}
