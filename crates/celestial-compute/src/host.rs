//! CPU compute backend running registered host kernels.
//!
//! Used when no GPU adapter is available and as the compute backend in
//! tests. It keeps per-kernel dispatch counts and buffer release counters so
//! callers can assert on what a generation pass actually did.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Vec3, Vec4};

use crate::{BufferHandle, ComputeBackend, ComputeError, Element, KernelId, KernelParams};

/// A host kernel: reads and writes the bound buffers in place.
pub type HostKernel = Arc<dyn Fn(&mut HostInvocation<'_>) -> Result<(), ComputeError> + Send + Sync>;

/// CPU-side buffer contents.
#[derive(Clone, Debug, PartialEq)]
pub struct HostBuffer {
    /// Element layout.
    pub element: Element,
    /// Packed `f32` words.
    pub data: Vec<f32>,
}

impl HostBuffer {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len() / self.element.width()
    }

    /// Returns true if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// View of one dispatch handed to a host kernel.
pub struct HostInvocation<'a> {
    kernel: &'a KernelId,
    params: &'a KernelParams,
    buffers: Vec<&'a mut HostBuffer>,
}

impl HostInvocation<'_> {
    /// Dispatch parameters.
    pub fn params(&self) -> &KernelParams {
        self.params
    }

    /// Look up a named parameter.
    pub fn param(&self, name: &str) -> Option<f32> {
        self.params.get(name)
    }

    /// Number of elements the dispatch covers.
    pub fn num_elements(&self) -> usize {
        self.params.num_elements() as usize
    }

    /// Number of bound buffers.
    pub fn binding_count(&self) -> usize {
        self.buffers.len()
    }

    /// Borrow the buffer at binding `index`.
    pub fn binding(&self, index: usize) -> Result<&HostBuffer, ComputeError> {
        let count = self.buffers.len();
        self.buffers
            .get(index)
            .map(|b| &**b)
            .ok_or_else(|| self.missing_binding(index, count))
    }

    /// Raw words of the buffer at binding `index`.
    pub fn data(&self, index: usize) -> Result<&[f32], ComputeError> {
        Ok(&self.binding(index)?.data)
    }

    /// Mutable raw words of the buffer at binding `index`.
    pub fn data_mut(&mut self, index: usize) -> Result<&mut [f32], ComputeError> {
        let count = self.buffers.len();
        if index >= count {
            return Err(self.missing_binding(index, count));
        }
        Ok(self.buffers[index].data.as_mut_slice())
    }

    /// Positions stored at binding `index`.
    pub fn positions(&self, index: usize) -> Result<Vec<Vec3>, ComputeError> {
        let buffer = self.binding(index)?;
        self.expect_element(buffer, Element::Vec3)?;
        Ok(buffer
            .data
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect())
    }

    /// Overwrite the positions stored at binding `index`.
    pub fn write_positions(&mut self, index: usize, positions: &[Vec3]) -> Result<(), ComputeError> {
        self.write(index, Element::Vec3, positions.iter().flat_map(|p| p.to_array()))
    }

    /// Overwrite the scalars stored at binding `index`.
    pub fn write_scalars(&mut self, index: usize, values: &[f32]) -> Result<(), ComputeError> {
        self.write(index, Element::Scalar, values.iter().copied())
    }

    /// Overwrite the 4-vectors stored at binding `index`.
    pub fn write_vec4(&mut self, index: usize, values: &[Vec4]) -> Result<(), ComputeError> {
        self.write(index, Element::Vec4, values.iter().flat_map(|v| v.to_array()))
    }

    fn write(
        &mut self,
        index: usize,
        element: Element,
        words: impl Iterator<Item = f32>,
    ) -> Result<(), ComputeError> {
        self.expect_element(self.binding(index)?, element)?;
        let kernel = self.kernel.clone();
        let data = self.data_mut(index)?;
        let mut written = 0;
        for (slot, value) in data.iter_mut().zip(words) {
            *slot = value;
            written += 1;
        }
        if written != data.len() {
            return Err(ComputeError::KernelFailed {
                kernel,
                message: format!(
                    "binding {index} holds {} words, kernel wrote {written}",
                    data.len()
                ),
            });
        }
        Ok(())
    }

    fn expect_element(&self, buffer: &HostBuffer, expected: Element) -> Result<(), ComputeError> {
        if buffer.element == expected {
            Ok(())
        } else {
            Err(ComputeError::KernelFailed {
                kernel: self.kernel.clone(),
                message: format!("expected {expected:?} binding, found {:?}", buffer.element),
            })
        }
    }

    fn missing_binding(&self, index: usize, count: usize) -> ComputeError {
        ComputeError::BindingCount {
            kernel: self.kernel.clone(),
            expected: index + 1,
            actual: count,
        }
    }
}

/// Compute backend that evaluates kernels on the calling thread.
pub struct HostBackend {
    kernels: HashMap<KernelId, HostKernel>,
    buffers: HashMap<BufferHandle, HostBuffer>,
    next_handle: u64,
    usable: bool,
    dispatches: HashMap<KernelId, usize>,
    uploads: usize,
    release_calls: usize,
    releases: usize,
}

impl HostBackend {
    /// Create a backend with no kernels.
    pub fn new() -> Self {
        Self {
            kernels: HashMap::new(),
            buffers: HashMap::new(),
            next_handle: 1,
            usable: true,
            dispatches: HashMap::new(),
            uploads: 0,
            release_calls: 0,
            releases: 0,
        }
    }

    /// Register (or replace) a host kernel.
    pub fn register_kernel<F>(&mut self, kernel: impl Into<KernelId>, f: F)
    where
        F: Fn(&mut HostInvocation<'_>) -> Result<(), ComputeError> + Send + Sync + 'static,
    {
        self.kernels.insert(kernel.into(), Arc::new(f));
    }

    /// Mark the backend usable or unusable.
    pub fn set_usable(&mut self, usable: bool) {
        self.usable = usable;
    }

    /// Number of times `kernel` was dispatched.
    pub fn dispatch_count(&self, kernel: &str) -> usize {
        self.dispatches
            .get(&KernelId::from(kernel))
            .copied()
            .unwrap_or(0)
    }

    /// Total dispatches across all kernels.
    pub fn total_dispatches(&self) -> usize {
        self.dispatches.values().sum()
    }

    /// Number of buffers created by `upload`.
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    /// Number of `release` calls, including no-op ones.
    pub fn release_calls(&self) -> usize {
        self.release_calls
    }

    /// Number of `release` calls that freed a live buffer.
    pub fn releases(&self) -> usize {
        self.releases
    }

    fn insert(&mut self, buffer: HostBuffer) -> BufferHandle {
        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        self.buffers.insert(handle, buffer);
        handle
    }

    fn restore(&mut self, taken: Vec<(BufferHandle, HostBuffer)>) {
        self.buffers.extend(taken);
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for HostBackend {
    fn is_usable(&self) -> bool {
        self.usable
    }

    fn has_kernel(&self, kernel: &KernelId) -> bool {
        self.kernels.contains_key(kernel)
    }

    fn upload(&mut self, element: Element, data: &[f32]) -> Result<BufferHandle, ComputeError> {
        if element.count(data.len()).is_none() {
            return Err(ComputeError::LengthMismatch {
                element,
                len: data.len(),
            });
        }
        self.uploads += 1;
        Ok(self.insert(HostBuffer {
            element,
            data: data.to_vec(),
        }))
    }

    fn create_buffer(
        &mut self,
        element: Element,
        len: usize,
    ) -> Result<BufferHandle, ComputeError> {
        Ok(self.insert(HostBuffer {
            element,
            data: vec![0.0; len * element.width()],
        }))
    }

    fn dispatch(
        &mut self,
        kernel: &KernelId,
        bindings: &[BufferHandle],
        params: &KernelParams,
    ) -> Result<(), ComputeError> {
        if !self.usable {
            return Err(ComputeError::Unusable);
        }
        let f = self
            .kernels
            .get(kernel)
            .cloned()
            .ok_or_else(|| ComputeError::UnknownKernel(kernel.clone()))?;

        let mut taken = Vec::with_capacity(bindings.len());
        for &handle in bindings {
            match self.buffers.remove(&handle) {
                Some(buffer) => taken.push((handle, buffer)),
                None => {
                    self.restore(taken);
                    return Err(ComputeError::UnknownBuffer(handle));
                }
            }
        }

        let result = {
            let mut invocation = HostInvocation {
                kernel,
                params,
                buffers: taken.iter_mut().map(|(_, b)| b).collect(),
            };
            f(&mut invocation)
        };

        self.restore(taken);
        *self.dispatches.entry(kernel.clone()).or_default() += 1;
        result
    }

    fn readback(&mut self, buffer: BufferHandle) -> Result<Vec<f32>, ComputeError> {
        self.buffers
            .get(&buffer)
            .map(|b| b.data.clone())
            .ok_or(ComputeError::UnknownBuffer(buffer))
    }

    fn buffer_info(&self, buffer: BufferHandle) -> Option<(Element, usize)> {
        self.buffers.get(&buffer).map(|b| (b.element, b.len()))
    }

    fn release(&mut self, buffer: BufferHandle) {
        self.release_calls += 1;
        if self.buffers.remove(&buffer).is_some() {
            self.releases += 1;
        }
    }

    fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}
