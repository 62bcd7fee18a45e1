//! Compute kernel compilation and caching.

use std::collections::HashMap;
use std::num::NonZeroU64;

use log::{debug, info};
use wgpu::{ShaderModuleDescriptor, ShaderSource};

use crate::{KernelId, KernelUniform};

/// WGSL declarations shared by every kernel.
///
/// Kernels bind their storage buffers at `0..n` and declare the parameter
/// uniform at binding `n`. Named values land in `params.values` in the order
/// the caller set them on [`crate::KernelParams`]: the first is
/// `params.values[0].x`, the fifth `params.values[1].x`.
pub const KERNEL_PARAMS_WGSL: &str = r#"
struct KernelParams {
    num_elements: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
    values: array<vec4<f32>, 4>,
}

// Flattens the 2D dispatch used for more than 65535 workgroups.
fn element_index(gid: vec3<u32>) -> u32 {
    return gid.x + gid.y * 4194240u;
}
"#;

/// A compiled kernel and the layout its bindings must follow.
pub struct LoadedKernel {
    pub(crate) pipeline: wgpu::ComputePipeline,
    pub(crate) layout: wgpu::BindGroupLayout,
    pub(crate) storage_bindings: usize,
}

impl LoadedKernel {
    /// Number of storage buffers the kernel binds before its parameter block.
    pub fn storage_bindings(&self) -> usize {
        self.storage_bindings
    }
}

/// Registry of compiled compute kernels keyed by [`KernelId`].
#[derive(Default)]
pub struct KernelLibrary {
    kernels: HashMap<KernelId, LoadedKernel>,
}

impl KernelLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source` (entry point `main`) and register it under `id`.
    ///
    /// [`KERNEL_PARAMS_WGSL`] is prepended to the source.
    pub fn load_from_source(
        &mut self,
        device: &wgpu::Device,
        id: impl Into<KernelId>,
        source: &str,
        storage_bindings: usize,
    ) {
        let id = id.into();
        debug!("Compiling kernel '{}' ({} storage bindings)", id, storage_bindings);

        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(id.as_str()),
            source: ShaderSource::Wgsl(format!("{KERNEL_PARAMS_WGSL}\n{source}").into()),
        });

        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..storage_bindings)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: storage_bindings as u32,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<KernelUniform>() as u64),
            },
            count: None,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(id.as_str()),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(id.as_str()),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(id.as_str()),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let kernel = LoadedKernel {
            pipeline,
            layout,
            storage_bindings,
        };
        if self.kernels.insert(id.clone(), kernel).is_some() {
            info!("Replaced kernel '{}'", id);
        } else {
            info!("Loaded kernel '{}'", id);
        }
    }

    /// Look up a compiled kernel.
    pub fn get(&self, id: &KernelId) -> Option<&LoadedKernel> {
        self.kernels.get(id)
    }

    /// Whether `id` has been compiled.
    pub fn contains(&self, id: &KernelId) -> bool {
        self.kernels.contains_key(id)
    }

    /// Number of compiled kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Check if the library is empty.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}
