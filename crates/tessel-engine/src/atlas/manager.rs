use thiserror::Error;

use super::AtlasBlock;

/// Atlas geometry and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Width and height of each layer, in texels.
    pub layer_size: u32,
    /// Number of atlas layers, each its own texture.
    pub layer_count: u32,
    /// Images larger than this on either side get their own texture.
    pub max_image_size: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            layer_size: 1024,
            layer_count: 4,
            max_image_size: 256,
        }
    }
}

impl AtlasConfig {
    /// True if an image of this size should live in the atlas.
    #[inline]
    pub fn routes_to_atlas(&self, width: u32, height: u32) -> bool {
        let max = self.max_image_size.min(self.layer_size);
        width <= max && height <= max
    }
}

/// Texels left empty between neighbouring blocks.
pub const GUTTER: u32 = 1;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AtlasError {
    #[error("atlas block request {width}x{height} is empty")]
    EmptyRequest { width: u32, height: u32 },
    #[error("atlas block request {width}x{height} exceeds the {layer_size}x{layer_size} layer")]
    TooLarge { width: u32, height: u32, layer_size: u32 },
    #[error("atlas exhausted: no free block fits {width}x{height}")]
    Exhausted { width: u32, height: u32 },
}

/// First-fit allocator over the free blocks of every layer.
///
/// Free blocks are kept sorted by ascending area, so the first fit is also
/// the smallest free block that fits. Each allocation also claims a
/// [`GUTTER`] texel strip to its right and below, unless it reaches the
/// layer edge, so linear filtering never reads a neighbouring image.
#[derive(Debug, Clone)]
pub struct TextureAtlasManager {
    config: AtlasConfig,
    free: Vec<AtlasBlock>,
    allocated: usize,
}

impl TextureAtlasManager {
    pub fn new(config: AtlasConfig) -> Self {
        let mut atlas = Self { config, free: Vec::new(), allocated: 0 };
        for layer in 0..config.layer_count {
            atlas.insert_free(AtlasBlock::sheet(layer, config.layer_size, config.layer_size));
        }
        if let Err(e) = atlas.try_get_free_block(1, 1) {
            log::warn!("atlas: could not reserve the white texel: {e}");
        }
        atlas
    }

    #[inline]
    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Blocks handed out so far, including the reserved white texel.
    #[inline]
    pub fn allocated_count(&self) -> usize {
        self.allocated
    }

    #[inline]
    pub fn free_blocks(&self) -> &[AtlasBlock] {
        &self.free
    }

    pub fn free_area(&self) -> u64 {
        self.free.iter().map(AtlasBlock::area).sum()
    }

    /// Allocates a `width x height` block.
    pub fn try_get_free_block(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<AtlasBlock, AtlasError> {
        if width == 0 || height == 0 {
            return Err(AtlasError::EmptyRequest { width, height });
        }
        let layer_size = self.config.layer_size;
        if width > layer_size || height > layer_size {
            return Err(AtlasError::TooLarge { width, height, layer_size });
        }

        let padded_w = (width + GUTTER).min(layer_size);
        let padded_h = (height + GUTTER).min(layer_size);
        let i = self
            .free
            .iter()
            .position(|b| b.fits(padded_w, padded_h))
            .ok_or(AtlasError::Exhausted { width, height })?;

        let (claimed, right, below) = self.free.remove(i).carve(padded_w, padded_h);
        for rest in [right, below] {
            if !rest.is_empty() {
                self.insert_free(rest);
            }
        }
        self.allocated += 1;
        Ok(AtlasBlock { right: claimed.left + width, bottom: claimed.top + height, ..claimed })
    }

    /// Allocates a `width x height` block.
    ///
    /// Panics if the request cannot be satisfied; the atlas never grows.
    pub fn get_free_block(&mut self, width: u32, height: u32) -> AtlasBlock {
        match self.try_get_free_block(width, height) {
            Ok(block) => block,
            Err(e) => {
                log::error!("atlas: {e}");
                panic!("{e}");
            }
        }
    }

    fn insert_free(&mut self, block: AtlasBlock) {
        let area = block.area();
        let at = self.free.partition_point(|b| b.area() <= area);
        self.free.insert(at, block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(layers: u32) -> TextureAtlasManager {
        let config = AtlasConfig { layer_size: 64, layer_count: layers, max_image_size: 32 };
        TextureAtlasManager::new(config)
    }

    fn inside(b: &AtlasBlock) -> bool {
        b.right <= b.sheet_width && b.bottom <= b.sheet_height && !b.is_empty()
    }

    fn white() -> AtlasBlock {
        AtlasBlock::sheet(0, 64, 64).carve(1, 1).0
    }

    /// `b` plus the strip its bilinear footprint can reach.
    fn grown(b: &AtlasBlock) -> AtlasBlock {
        AtlasBlock {
            left: b.left.saturating_sub(GUTTER),
            top: b.top.saturating_sub(GUTTER),
            right: b.right + GUTTER,
            bottom: b.bottom + GUTTER,
            ..*b
        }
    }

    // ── allocation ────────────────────────────────────────────────────────

    #[test]
    fn white_texel_is_reserved_on_layer_zero() {
        let atlas = small(1);
        assert_eq!(atlas.allocated_count(), 1);
        // The texel plus its gutter.
        assert_eq!(atlas.free_area(), 64 * 64 - 4);
        assert!(atlas.free_blocks().iter().all(|b| !b.overlaps(&white())));
    }

    #[test]
    fn two_blocks_do_not_overlap() {
        let mut atlas = small(1);
        let a = atlas.get_free_block(10, 10);
        let b = atlas.get_free_block(5, 20);
        assert_eq!((a.width(), a.height()), (10, 10));
        assert_eq!((b.width(), b.height()), (5, 20));
        assert!(inside(&a) && inside(&b));
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn many_blocks_stay_disjoint() {
        let mut atlas = small(2);
        let mut blocks = Vec::new();
        for i in 0..40u32 {
            blocks.push(atlas.get_free_block(3 + i % 7, 2 + i % 5));
        }
        for (i, a) in blocks.iter().enumerate() {
            assert!(inside(a));
            assert!(!(a.layer == 0 && a.left == 0 && a.top == 0), "white texel handed out");
            for b in &blocks[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn free_list_stays_sorted_by_area() {
        let mut atlas = small(2);
        atlas.get_free_block(30, 7);
        atlas.get_free_block(12, 40);
        let areas: Vec<u64> = atlas.free_blocks().iter().map(AtlasBlock::area).collect();
        assert!(areas.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn free_area_accounts_for_every_allocation() {
        let mut atlas = small(1);
        atlas.get_free_block(8, 8);
        atlas.get_free_block(16, 4);
        assert_eq!(atlas.free_area(), 64 * 64 - 4 - 9 * 9 - 17 * 5);
    }

    #[test]
    fn neighbouring_blocks_keep_a_gutter() {
        let mut atlas = small(1);
        let mut blocks = vec![white()];
        for i in 0..30u32 {
            blocks.push(atlas.get_free_block(2 + i % 5, 3 + i % 4));
        }
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                assert!(!grown(a).overlaps(b), "{a:?} touches {b:?}");
            }
        }
    }

    #[test]
    fn full_width_blocks_need_no_gutter_at_the_layer_edge() {
        let mut atlas = small(2);
        let b = atlas.get_free_block(64, 64);
        assert_eq!((b.layer, b.width(), b.height()), (1, 64, 64));
    }

    // ── failures ──────────────────────────────────────────────────────────

    #[test]
    fn oversized_and_empty_requests_are_rejected() {
        let mut atlas = small(1);
        assert_eq!(
            atlas.try_get_free_block(65, 1),
            Err(AtlasError::TooLarge { width: 65, height: 1, layer_size: 64 })
        );
        assert_eq!(
            atlas.try_get_free_block(0, 4),
            Err(AtlasError::EmptyRequest { width: 0, height: 4 })
        );
    }

    #[test]
    fn exhaustion_is_reported() {
        let mut atlas = small(1);
        atlas.get_free_block(64, 61);
        assert_eq!(
            atlas.try_get_free_block(2, 2),
            Err(AtlasError::Exhausted { width: 2, height: 2 })
        );
    }

    #[test]
    #[should_panic(expected = "atlas exhausted")]
    fn get_free_block_panics_when_exhausted() {
        let mut atlas = small(1);
        atlas.get_free_block(64, 61);
        atlas.get_free_block(64, 61);
    }

    #[test]
    fn routing_threshold() {
        let cfg = AtlasConfig { layer_size: 64, layer_count: 1, max_image_size: 32 };
        assert!(cfg.routes_to_atlas(32, 32));
        assert!(!cfg.routes_to_atlas(33, 8));
    }
}
