//! Compute error types.

use crate::{BufferHandle, Element, KernelId};

/// Errors raised by compute backends and dispatch scopes.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// The backend cannot run kernels in the current context (e.g. device lost).
    #[error("compute backend is not usable")]
    Unusable,

    /// Dispatch of a kernel that was never registered.
    #[error("kernel '{0}' is not registered")]
    UnknownKernel(KernelId),

    /// Use of a buffer that does not exist or was already released.
    #[error("buffer {0} does not exist or was released")]
    UnknownBuffer(BufferHandle),

    /// Wrong number of buffers bound for a kernel.
    #[error("kernel '{kernel}' expects {expected} storage bindings, got {actual}")]
    BindingCount {
        kernel: KernelId,
        expected: usize,
        actual: usize,
    },

    /// Upload data is not a whole number of elements.
    #[error("{len} floats is not a whole number of {element:?} elements")]
    LengthMismatch { element: Element, len: usize },

    /// A buffer was read back as the wrong element type.
    #[error("buffer {buffer} holds {actual:?} elements, expected {expected:?}")]
    ElementMismatch {
        buffer: BufferHandle,
        expected: Element,
        actual: Element,
    },

    /// More named parameters than the uniform block can hold.
    #[error("kernel parameter block holds at most {max} values, got {actual}")]
    TooManyParams { max: usize, actual: usize },

    /// A host kernel reported a failure.
    #[error("kernel '{kernel}' failed: {message}")]
    KernelFailed { kernel: KernelId, message: String },

    /// Mapping a readback buffer failed.
    #[error("failed to map readback buffer: {0}")]
    BufferMap(String),

    /// Waiting on the device failed.
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
}
