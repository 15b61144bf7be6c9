use std::fmt;
use std::sync::{Arc, OnceLock};

use super::Batch;
use crate::render::{next_resource_id, GpuBatch};

/// Immutable batch cached for a group subtree.
///
/// Clones share the same data. The GPU copy is created on first draw and
/// released once the last clone is dropped.
#[derive(Clone)]
pub struct CompiledBatch(Arc<Inner>);

struct Inner {
    id: u64,
    revision: u64,
    batch: Batch,
    gpu: OnceLock<Arc<GpuBatch>>,
}

impl CompiledBatch {
    pub(crate) fn new(batch: Batch, revision: u64) -> Self {
        Self(Arc::new(Inner {
            id: next_resource_id(),
            revision,
            batch,
            gpu: OnceLock::new(),
        }))
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Subtree revision this batch was built from.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.0.revision
    }

    #[inline]
    pub fn batch(&self) -> &Batch {
        &self.0.batch
    }

    #[inline]
    pub fn ptr_eq(&self, other: &CompiledBatch) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[inline]
    pub fn is_uploaded(&self) -> bool {
        self.0.gpu.get().is_some()
    }

    /// GPU handle, created by `upload` the first time it is asked for.
    pub(crate) fn gpu_or_upload(&self, upload: impl FnOnce() -> Arc<GpuBatch>) -> &Arc<GpuBatch> {
        self.0.gpu.get_or_init(upload)
    }
}

impl fmt::Debug for CompiledBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledBatch")
            .field("id", &self.0.id)
            .field("revision", &self.0.revision)
            .field("groups", &self.0.batch.group_count())
            .field("uploaded", &self.is_uploaded())
            .finish()
    }
}
