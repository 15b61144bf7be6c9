//! Cross-thread handles to GPU objects owned by the render thread.
//!
//! A handle holds only an id and a queue sender. Dropping the last clone of
//! its `Arc` enqueues the release of the GPU side.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{GpuContext, Releasable, TaskSender};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_resource_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Uploaded buffer groups of a compiled batch.
pub struct GpuBatch {
    id: u64,
    sender: TaskSender<GpuContext>,
}

impl GpuBatch {
    pub(crate) fn new(id: u64, sender: TaskSender<GpuContext>) -> Self {
        Self { id, sender }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Releasable<GpuContext> for GpuBatch {
    fn release(&self, ctx: &mut GpuContext) {
        ctx.release_batch(self.id);
    }
}

impl Drop for GpuBatch {
    fn drop(&mut self) {
        let id = self.id;
        // Fails only after shutdown, when the context is already gone.
        let _ = self.sender.submit(move |ctx| ctx.release_batch(id));
    }
}

/// A standalone texture, used for images too large for the atlas.
pub struct GpuImage {
    id: u64,
    size: (u32, u32),
    sender: TaskSender<GpuContext>,
}

impl GpuImage {
    pub(crate) fn new(id: u64, size: (u32, u32), sender: TaskSender<GpuContext>) -> Self {
        Self { id, size, sender }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl Releasable<GpuContext> for GpuImage {
    fn release(&self, ctx: &mut GpuContext) {
        ctx.release_image(self.id);
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        let id = self.id;
        let _ = self.sender.submit(move |ctx| ctx.release_image(id));
    }
}
