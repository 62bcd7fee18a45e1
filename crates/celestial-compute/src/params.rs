//! Kernel parameters and their GPU uniform layout.

use bytemuck::{Pod, Zeroable};

use crate::ComputeError;

/// Maximum number of named scalar parameters per dispatch.
pub const MAX_KERNEL_PARAMS: usize = 16;

/// Parameters passed to a kernel dispatch.
///
/// Named values are kept in insertion order. GPU kernels see them
/// positionally in [`KernelUniform::values`]; host kernels look them up by
/// name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KernelParams {
    num_elements: u32,
    values: Vec<(String, f32)>,
}

impl KernelParams {
    /// Parameters for a dispatch over `num_elements` elements.
    pub fn new(num_elements: usize) -> Self {
        Self {
            num_elements: u32::try_from(num_elements).unwrap_or(u32::MAX),
            values: Vec::new(),
        }
    }

    /// Set a named value, replacing an earlier value with the same name.
    pub fn with(mut self, name: impl Into<String>, value: f32) -> Self {
        self.set(name, value);
        self
    }

    /// Set a named value in place.
    pub fn set(&mut self, name: impl Into<String>, value: f32) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Look up a value by name.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.values
            .iter()
            .find_map(|(n, v)| (n == name).then_some(*v))
    }

    /// Number of elements the dispatch covers.
    pub fn num_elements(&self) -> u32 {
        self.num_elements
    }

    /// Named values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Number of named values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no named values are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Uniform block bound after a kernel's storage buffers.
///
/// Matches [`crate::KERNEL_PARAMS_WGSL`]: a `u32` element count padded to 16
/// bytes, then sixteen floats viewed as four `vec4<f32>`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct KernelUniform {
    /// Number of elements to process.
    pub num_elements: u32,
    /// Padding to 16-byte alignment.
    pub _padding: [u32; 3],
    /// Named parameter values in insertion order, zero-filled.
    pub values: [f32; MAX_KERNEL_PARAMS],
}

impl KernelUniform {
    /// Pack `params` into the uniform layout.
    pub fn from_params(params: &KernelParams) -> Result<Self, ComputeError> {
        if params.len() > MAX_KERNEL_PARAMS {
            return Err(ComputeError::TooManyParams {
                max: MAX_KERNEL_PARAMS,
                actual: params.len(),
            });
        }

        let mut uniform = Self::zeroed();
        uniform.num_elements = params.num_elements();
        for (slot, (_, value)) in uniform.values.iter_mut().zip(params.values()) {
            *slot = value;
        }
        Ok(uniform)
    }
}
