//! The compute dispatch interface shared by every backend.

use std::fmt;

use crate::{ComputeError, KernelParams};

/// Opaque identifier of a buffer owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u64);

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element layout of a buffer. Components are tightly packed `f32` words.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    /// One float per element (heights).
    Scalar,
    /// Three floats per element (positions).
    Vec3,
    /// Four floats per element (shading payload).
    Vec4,
}

impl Element {
    /// Number of `f32` components per element.
    pub const fn width(self) -> usize {
        match self {
            Element::Scalar => 1,
            Element::Vec3 => 3,
            Element::Vec4 => 4,
        }
    }

    /// Number of elements in `floats` packed words, if it divides evenly.
    pub fn count(self, floats: usize) -> Option<usize> {
        (floats % self.width() == 0).then(|| floats / self.width())
    }
}

/// Name of a compute kernel, e.g. `"height"` or `"shading"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelId(String);

impl KernelId {
    /// Create a kernel id from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The kernel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KernelId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Synchronous request/response access to a compute device.
///
/// Every call blocks until its effect is complete: after `dispatch` returns,
/// the kernel has finished and `readback` observes its writes. Buffers live
/// until `release`; releasing an unknown or already-released handle is a
/// no-op.
pub trait ComputeBackend {
    /// Whether kernels can run in the current context.
    fn is_usable(&self) -> bool;

    /// Whether `kernel` has been registered with this backend.
    fn has_kernel(&self, kernel: &KernelId) -> bool;

    /// Create a buffer holding `data`, interpreted as packed `element`s.
    fn upload(&mut self, element: Element, data: &[f32]) -> Result<BufferHandle, ComputeError>;

    /// Create a zero-filled buffer of `len` elements.
    fn create_buffer(&mut self, element: Element, len: usize)
    -> Result<BufferHandle, ComputeError>;

    /// Run `kernel` over `bindings` (in binding order) with `params`.
    fn dispatch(
        &mut self,
        kernel: &KernelId,
        bindings: &[BufferHandle],
        params: &KernelParams,
    ) -> Result<(), ComputeError>;

    /// Copy a buffer's contents back to the host.
    fn readback(&mut self, buffer: BufferHandle) -> Result<Vec<f32>, ComputeError>;

    /// Element layout and length of a live buffer.
    fn buffer_info(&self, buffer: BufferHandle) -> Option<(Element, usize)>;

    /// Free a buffer. No-op for unknown handles.
    fn release(&mut self, buffer: BufferHandle);

    /// Number of buffers currently alive.
    fn live_buffers(&self) -> usize;
}
