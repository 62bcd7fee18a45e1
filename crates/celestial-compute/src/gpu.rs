//! wgpu compute backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use wgpu::util::DeviceExt;

use crate::{
    BufferHandle, ComputeBackend, ComputeError, Element, KernelId, KernelLibrary, KernelParams,
    KernelUniform,
};

/// Invocations per workgroup. Kernels must declare `@workgroup_size(64)`.
pub const WORKGROUP_SIZE: u32 = 64;

const MAX_GROUPS_PER_DIM: u32 = 65_535;

struct GpuBuffer {
    buffer: wgpu::Buffer,
    element: Element,
    len: usize,
}

/// Compute backend running WGSL kernels on a wgpu device.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    kernels: KernelLibrary,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    next_handle: u64,
    lost: Arc<AtomicBool>,
}

impl GpuBackend {
    /// Request a headless adapter and device.
    pub async fn new(high_performance: bool) -> Result<Self, ComputeError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power_preference = if high_performance {
            wgpu::PowerPreference::HighPerformance
        } else {
            wgpu::PowerPreference::LowPower
        };
        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(_) => return Err(ComputeError::NoAdapter),
        };

        let info = adapter.get_info();
        log::info!(
            "Selected compute adapter: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("celestial-compute-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self::from_device(device, queue))
    }

    /// Blocking wrapper around [`GpuBackend::new`].
    pub fn new_blocking(high_performance: bool) -> Result<Self, ComputeError> {
        pollster::block_on(Self::new(high_performance))
    }

    /// Wrap an existing device and queue.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("Compute device lost ({reason:?}): {message}");
            flag.store(true, Ordering::Release);
        });

        Self {
            device,
            queue,
            kernels: KernelLibrary::new(),
            buffers: HashMap::new(),
            next_handle: 1,
            lost,
        }
    }

    /// Compile and register a WGSL kernel.
    pub fn load_kernel(&mut self, id: impl Into<KernelId>, source: &str, storage_bindings: usize) {
        self.kernels
            .load_from_source(&self.device, id, source, storage_bindings);
    }

    /// The compiled kernel registry.
    pub fn kernels(&self) -> &KernelLibrary {
        &self.kernels
    }

    fn insert(&mut self, buffer: wgpu::Buffer, element: Element, len: usize) -> BufferHandle {
        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        self.buffers.insert(
            handle,
            GpuBuffer {
                buffer,
                element,
                len,
            },
        );
        handle
    }

    fn storage_usage() -> wgpu::BufferUsages {
        wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST
    }
}

/// Split `groups` workgroups across x and y so neither exceeds the per-dimension limit.
fn workgroup_grid(groups: u32) -> (u32, u32) {
    if groups <= MAX_GROUPS_PER_DIM {
        (groups.max(1), 1)
    } else {
        (MAX_GROUPS_PER_DIM, groups.div_ceil(MAX_GROUPS_PER_DIM))
    }
}

impl ComputeBackend for GpuBackend {
    fn is_usable(&self) -> bool {
        !self.lost.load(Ordering::Acquire)
    }

    fn has_kernel(&self, kernel: &KernelId) -> bool {
        self.kernels.contains(kernel)
    }

    fn upload(&mut self, element: Element, data: &[f32]) -> Result<BufferHandle, ComputeError> {
        let len = element.count(data.len()).ok_or(ComputeError::LengthMismatch {
            element,
            len: data.len(),
        })?;

        // Zero-sized storage bindings are invalid; pad to one vec4.
        let mut contents: Vec<f32> = data.to_vec();
        contents.resize(contents.len().max(4), 0.0);

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("celestial-compute-upload"),
                contents: bytemuck::cast_slice(&contents),
                usage: Self::storage_usage(),
            });
        Ok(self.insert(buffer, element, len))
    }

    fn create_buffer(
        &mut self,
        element: Element,
        len: usize,
    ) -> Result<BufferHandle, ComputeError> {
        let size = ((len * element.width() * std::mem::size_of::<f32>()) as u64).max(16);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("celestial-compute-output"),
            size,
            usage: Self::storage_usage(),
            mapped_at_creation: false,
        });
        Ok(self.insert(buffer, element, len))
    }

    fn dispatch(
        &mut self,
        kernel: &KernelId,
        bindings: &[BufferHandle],
        params: &KernelParams,
    ) -> Result<(), ComputeError> {
        if !self.is_usable() {
            return Err(ComputeError::Unusable);
        }
        let loaded = self
            .kernels
            .get(kernel)
            .ok_or_else(|| ComputeError::UnknownKernel(kernel.clone()))?;
        if loaded.storage_bindings() != bindings.len() {
            return Err(ComputeError::BindingCount {
                kernel: kernel.clone(),
                expected: loaded.storage_bindings(),
                actual: bindings.len(),
            });
        }

        let uniform = KernelUniform::from_params(params)?;
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("celestial-kernel-params"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut entries = Vec::with_capacity(bindings.len() + 1);
        for (binding, handle) in bindings.iter().enumerate() {
            let buffer = self
                .buffers
                .get(handle)
                .ok_or(ComputeError::UnknownBuffer(*handle))?;
            entries.push(wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.buffer.as_entire_binding(),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: bindings.len() as u32,
            resource: params_buffer.as_entire_binding(),
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.as_str()),
            layout: &loaded.layout,
            entries: &entries,
        });

        let groups = params.num_elements().div_ceil(WORKGROUP_SIZE);
        let (x, y) = workgroup_grid(groups);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("celestial-compute-dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.as_str()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&loaded.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(x, y, 1);
        }
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: None,
        })?;
        Ok(())
    }

    fn readback(&mut self, buffer: BufferHandle) -> Result<Vec<f32>, ComputeError> {
        let source = self
            .buffers
            .get(&buffer)
            .ok_or(ComputeError::UnknownBuffer(buffer))?;
        let words = source.len * source.element.width();
        if words == 0 {
            return Ok(Vec::new());
        }
        let size = (words * std::mem::size_of::<f32>()) as u64;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("celestial-compute-readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("celestial-compute-readback"),
            });
        encoder.copy_buffer_to_buffer(&source.buffer, 0, &staging, 0, size);
        let index = self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: None,
        })?;

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ComputeError::BufferMap(e.to_string())),
            Err(e) => return Err(ComputeError::BufferMap(e.to_string())),
        }

        let data = {
            let mapped = slice.get_mapped_range();
            bytemuck::pod_collect_to_vec::<u8, f32>(&mapped[..])
        };
        staging.unmap();
        Ok(data)
    }

    fn buffer_info(&self, buffer: BufferHandle) -> Option<(Element, usize)> {
        self.buffers.get(&buffer).map(|b| (b.element, b.len))
    }

    fn release(&mut self, buffer: BufferHandle) {
        if let Some(gpu_buffer) = self.buffers.remove(&buffer) {
            gpu_buffer.buffer.destroy();
        }
    }

    fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}
