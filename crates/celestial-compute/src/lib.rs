//! Compute dispatch for height and shading evaluation.
//!
//! [`ComputeBackend`] is a synchronous upload / dispatch / readback / release
//! interface. Two backends implement it: [`GpuBackend`] runs WGSL kernels
//! through wgpu, [`HostBackend`] runs registered host closures on the CPU.
//! [`DispatchScope`] wraps a backend and releases every buffer it created
//! when dropped, whatever the exit path.

mod backend;
mod error;
mod gpu;
mod host;
mod kernel;
mod params;
mod scope;

pub use backend::{BufferHandle, ComputeBackend, Element, KernelId};
pub use error::ComputeError;
pub use gpu::{GpuBackend, WORKGROUP_SIZE};
pub use host::{HostBackend, HostBuffer, HostInvocation, HostKernel};
pub use kernel::{KERNEL_PARAMS_WGSL, KernelLibrary};
pub use params::{KernelParams, KernelUniform, MAX_KERNEL_PARAMS};
pub use scope::DispatchScope;
