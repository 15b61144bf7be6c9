/// A rectangle of one atlas layer, in texels. `right` and `bottom` are
/// exclusive.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AtlasBlock {
    pub layer: u32,
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub sheet_width: u32,
    pub sheet_height: u32,
}

impl AtlasBlock {
    /// Whole layer.
    pub const fn sheet(layer: u32, width: u32, height: u32) -> Self {
        Self {
            layer,
            left: 0,
            top: 0,
            right: width,
            bottom: height,
            sheet_width: width,
            sheet_height: height,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    #[inline]
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width() >= width && self.height() >= height
    }

    /// Normalized `[u0, v0, u1, v1]` against the owning sheet.
    pub fn uv_rect(&self) -> [f32; 4] {
        let (sw, sh) = (self.sheet_width as f32, self.sheet_height as f32);
        [
            self.left as f32 / sw,
            self.top as f32 / sh,
            self.right as f32 / sw,
            self.bottom as f32 / sh,
        ]
    }

    pub fn overlaps(&self, other: &AtlasBlock) -> bool {
        self.layer == other.layer
            && self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Splits off a `width x height` rectangle at the top-left corner.
    ///
    /// Returns the carved block plus the remainder to its right (same height
    /// as the carved block) and the remainder below (full width).
    pub(crate) fn carve(&self, width: u32, height: u32) -> (AtlasBlock, AtlasBlock, AtlasBlock) {
        let used = AtlasBlock { right: self.left + width, bottom: self.top + height, ..*self };
        let right = AtlasBlock { left: used.right, bottom: used.bottom, ..*self };
        let below = AtlasBlock { top: used.bottom, ..*self };
        (used, right, below)
    }
}
