//! GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - selecting the adapter according to [`GpuInit`]

mod gpu;
mod init;

pub use gpu::Gpu;
pub use init::GpuInit;
