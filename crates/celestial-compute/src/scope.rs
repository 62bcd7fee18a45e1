//! Scoped buffer acquisition with guaranteed release.

use glam::{Vec3, Vec4};

use crate::{BufferHandle, ComputeBackend, ComputeError, Element, KernelId, KernelParams};

/// A dispatch group over a borrowed backend.
///
/// Every buffer created through the scope is released when the scope is
/// dropped, including when a pass bails out early with `?` or panics.
pub struct DispatchScope<'a> {
    backend: &'a mut dyn ComputeBackend,
    owned: Vec<BufferHandle>,
}

impl<'a> DispatchScope<'a> {
    /// Open a scope over `backend`.
    pub fn new(backend: &'a mut dyn ComputeBackend) -> Self {
        Self {
            backend,
            owned: Vec::new(),
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &dyn ComputeBackend {
        &*self.backend
    }

    /// Whether kernels can run on the underlying backend.
    pub fn is_usable(&self) -> bool {
        self.backend.is_usable()
    }

    /// Whether `kernel` is registered with the underlying backend.
    pub fn has_kernel(&self, kernel: &KernelId) -> bool {
        self.backend.has_kernel(kernel)
    }

    /// Upload raw packed data.
    pub fn upload(&mut self, element: Element, data: &[f32]) -> Result<BufferHandle, ComputeError> {
        let handle = self.backend.upload(element, data)?;
        self.owned.push(handle);
        Ok(handle)
    }

    /// Upload vertex positions.
    pub fn upload_positions(&mut self, positions: &[Vec3]) -> Result<BufferHandle, ComputeError> {
        let data: Vec<f32> = positions.iter().flat_map(|p| p.to_array()).collect();
        self.upload(Element::Vec3, &data)
    }

    /// Create a zero-filled output buffer.
    pub fn create_buffer(
        &mut self,
        element: Element,
        len: usize,
    ) -> Result<BufferHandle, ComputeError> {
        let handle = self.backend.create_buffer(element, len)?;
        self.owned.push(handle);
        Ok(handle)
    }

    /// Run a kernel and wait for it to finish.
    pub fn dispatch(
        &mut self,
        kernel: &KernelId,
        bindings: &[BufferHandle],
        params: &KernelParams,
    ) -> Result<(), ComputeError> {
        self.backend.dispatch(kernel, bindings, params)
    }

    /// Read a [`Element::Vec3`] buffer back as positions.
    pub fn read_positions(&mut self, buffer: BufferHandle) -> Result<Vec<Vec3>, ComputeError> {
        let data = self.read_checked(buffer, Element::Vec3)?;
        Ok(data
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect())
    }

    /// Read a [`Element::Scalar`] buffer back.
    pub fn read_scalars(&mut self, buffer: BufferHandle) -> Result<Vec<f32>, ComputeError> {
        self.read_checked(buffer, Element::Scalar)
    }

    /// Read a [`Element::Vec4`] buffer back.
    pub fn read_vec4(&mut self, buffer: BufferHandle) -> Result<Vec<Vec4>, ComputeError> {
        let data = self.read_checked(buffer, Element::Vec4)?;
        Ok(data.chunks_exact(4).map(Vec4::from_slice).collect())
    }

    fn read_checked(
        &mut self,
        buffer: BufferHandle,
        expected: Element,
    ) -> Result<Vec<f32>, ComputeError> {
        let (actual, _) = self
            .backend
            .buffer_info(buffer)
            .ok_or(ComputeError::UnknownBuffer(buffer))?;
        if actual != expected {
            return Err(ComputeError::ElementMismatch {
                buffer,
                expected,
                actual,
            });
        }
        self.backend.readback(buffer)
    }

    /// Number of buffers this scope will release on drop.
    pub fn owned_buffers(&self) -> usize {
        self.owned.len()
    }

    /// Release every buffer created so far. Safe to call repeatedly.
    pub fn release_all(&mut self) {
        for handle in self.owned.drain(..) {
            self.backend.release(handle);
        }
    }
}

impl Drop for DispatchScope<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}
