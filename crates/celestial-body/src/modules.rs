//! Shape and shading evaluators.
//!
//! A shape module turns unit-sphere positions into radial heights; a shading
//! module turns final positions into a per-vertex payload. Both evaluate
//! their fields through compute kernels and expose a revision token that is
//! bumped on every setting change, which the generator polls each tick.

use celestial_compute::{
    BufferHandle, ComputeBackend, DispatchScope, Element, KernelId, KernelParams,
};
use celestial_config::BodyConfig;
use celestial_mesh::HeightRange;
use glam::Vec4;

use crate::{GenerationError, TerrainMaterial};

/// Vertex perturbation requested by a shape module.
#[derive(Clone, Debug, PartialEq)]
pub struct Perturbation {
    /// Kernel that displaces positions in place.
    pub kernel: KernelId,
    /// Displacement cap as a fraction of half an edge length.
    pub strength: f32,
}

/// Height evaluator contract.
pub trait ShapeModule {
    /// Kernel computing one height per position, if bound.
    fn height_kernel(&self) -> Option<&KernelId>;

    /// Evaluate heights for the `count` positions stored in `positions`.
    fn calculate_heights(
        &self,
        scope: &mut DispatchScope<'_>,
        positions: BufferHandle,
        count: usize,
    ) -> Result<Vec<f32>, GenerationError>;

    /// Perturbation to apply before heights are evaluated, if enabled and bound.
    fn perturbation(&self) -> Option<Perturbation> {
        None
    }

    /// Named values the shading module may reuse.
    fn params(&self) -> &[(String, f32)] {
        &[]
    }

    /// Change token, bumped on every setting mutation.
    fn revision(&self) -> u64;

    /// Release buffers the module keeps between dispatches.
    fn release_buffers(&mut self, _backend: &mut dyn ComputeBackend) {}
}

/// Shading evaluator contract.
pub trait ShadingModule {
    /// Kernel computing one payload per position, if bound.
    fn shading_kernel(&self) -> Option<&KernelId>;

    /// Bind parameters derived from the shape before use.
    fn initialize(&mut self, shape: &dyn ShapeModule);

    /// Evaluate the payload for the `count` final positions in `positions`.
    fn generate_shading_data(
        &self,
        scope: &mut DispatchScope<'_>,
        positions: BufferHandle,
        count: usize,
    ) -> Result<Vec<Vec4>, GenerationError>;

    /// Ocean level in [0, 1].
    fn ocean_level(&self) -> f32;

    fn has_ocean(&self) -> bool;

    /// Material uniforms for the given height extrema and body scale.
    fn terrain_material(&self, range: HeightRange, body_scale: f32) -> TerrainMaterial {
        TerrainMaterial::new(range, body_scale, self.ocean_level(), self.has_ocean())
    }

    fn revision(&self) -> u64;

    fn release_buffers(&mut self, _backend: &mut dyn ComputeBackend) {}
}

fn set_named(values: &mut Vec<(String, f32)>, name: String, value: f32) {
    match values.iter_mut().find(|(n, _)| *n == name) {
        Some(slot) => slot.1 = value,
        None => values.push((name, value)),
    }
}

/// Shape module dispatching a height kernel over `[positions, heights]`.
#[derive(Clone, Debug, Default)]
pub struct KernelShape {
    height_kernel: Option<KernelId>,
    perturb_kernel: Option<KernelId>,
    perturb_vertices: bool,
    perturb_strength: f32,
    params: Vec<(String, f32)>,
    revision: u64,
}

impl KernelShape {
    pub fn new(height_kernel: impl Into<KernelId>) -> Self {
        Self {
            height_kernel: Some(height_kernel.into()),
            ..Self::default()
        }
    }

    /// A shape module with no height kernel bound.
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Take perturbation settings from the body configuration.
    pub fn with_body_config(mut self, body: &BodyConfig) -> Self {
        self.perturb_vertices = body.perturb_vertices;
        self.perturb_strength = body.perturb_strength;
        self
    }

    pub fn with_perturb_kernel(mut self, kernel: impl Into<KernelId>) -> Self {
        self.perturb_kernel = Some(kernel.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        set_named(&mut self.params, name.into(), value);
        self
    }

    /// Set a named kernel parameter.
    pub fn set_param(&mut self, name: impl Into<String>, value: f32) {
        set_named(&mut self.params, name.into(), value);
        self.revision += 1;
    }

    pub fn set_height_kernel(&mut self, kernel: Option<KernelId>) {
        self.height_kernel = kernel;
        self.revision += 1;
    }

    pub fn set_perturb(&mut self, enabled: bool, strength: f32) {
        self.perturb_vertices = enabled;
        self.perturb_strength = strength;
        self.revision += 1;
    }

    fn kernel_params(&self, count: usize) -> KernelParams {
        self.params
            .iter()
            .fold(KernelParams::new(count), |p, (n, v)| p.with(n.clone(), *v))
    }
}

impl ShapeModule for KernelShape {
    fn height_kernel(&self) -> Option<&KernelId> {
        self.height_kernel.as_ref()
    }

    fn calculate_heights(
        &self,
        scope: &mut DispatchScope<'_>,
        positions: BufferHandle,
        count: usize,
    ) -> Result<Vec<f32>, GenerationError> {
        let kernel = self
            .height_kernel
            .as_ref()
            .ok_or(GenerationError::MissingKernel("height"))?;
        let heights = scope.create_buffer(Element::Scalar, count)?;
        scope.dispatch(kernel, &[positions, heights], &self.kernel_params(count))?;
        Ok(scope.read_scalars(heights)?)
    }

    fn perturbation(&self) -> Option<Perturbation> {
        match (&self.perturb_kernel, self.perturb_vertices) {
            (Some(kernel), true) => Some(Perturbation {
                kernel: kernel.clone(),
                strength: self.perturb_strength,
            }),
            _ => None,
        }
    }

    fn params(&self) -> &[(String, f32)] {
        &self.params
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

/// Shading module dispatching a kernel over `[positions, payload]`.
#[derive(Clone, Debug)]
pub struct KernelShading {
    kernel: Option<KernelId>,
    params: Vec<(String, f32)>,
    shape_params: Vec<(String, f32)>,
    ocean_level: f32,
    has_ocean: bool,
    initializations: usize,
    revision: u64,
}

impl KernelShading {
    pub fn new(kernel: impl Into<KernelId>) -> Self {
        Self {
            kernel: Some(kernel.into()),
            ..Self::unbound()
        }
    }

    /// A shading module with no kernel; its payload is all zeros.
    pub fn unbound() -> Self {
        Self {
            kernel: None,
            params: Vec::new(),
            shape_params: Vec::new(),
            ocean_level: 0.5,
            has_ocean: true,
            initializations: 0,
            revision: 0,
        }
    }

    pub fn with_body_config(mut self, body: &BodyConfig) -> Self {
        self.ocean_level = body.ocean_level;
        self.has_ocean = body.has_ocean;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        set_named(&mut self.params, name.into(), value);
        self
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: f32) {
        set_named(&mut self.params, name.into(), value);
        self.revision += 1;
    }

    pub fn set_ocean(&mut self, ocean_level: f32, has_ocean: bool) {
        self.ocean_level = ocean_level;
        self.has_ocean = has_ocean;
        self.revision += 1;
    }

    /// Number of times [`ShadingModule::initialize`] ran.
    pub fn initializations(&self) -> usize {
        self.initializations
    }

    fn kernel_params(&self, count: usize) -> KernelParams {
        let mut params = KernelParams::new(count);
        for (name, value) in self.shape_params.iter().chain(&self.params) {
            params.set(name.clone(), *value);
        }
        params
    }
}

impl ShadingModule for KernelShading {
    fn shading_kernel(&self) -> Option<&KernelId> {
        self.kernel.as_ref()
    }

    fn initialize(&mut self, shape: &dyn ShapeModule) {
        self.shape_params = shape.params().to_vec();
        self.initializations += 1;
    }

    fn generate_shading_data(
        &self,
        scope: &mut DispatchScope<'_>,
        positions: BufferHandle,
        count: usize,
    ) -> Result<Vec<Vec4>, GenerationError> {
        let Some(kernel) = &self.kernel else {
            tracing::debug!("No shading kernel bound, using zero payload");
            return Ok(vec![Vec4::ZERO; count]);
        };
        let payload = scope.create_buffer(Element::Vec4, count)?;
        scope.dispatch(kernel, &[positions, payload], &self.kernel_params(count))?;
        Ok(scope.read_vec4(payload)?)
    }

    fn ocean_level(&self) -> f32 {
        self.ocean_level
    }

    fn has_ocean(&self) -> bool {
        self.has_ocean
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}
