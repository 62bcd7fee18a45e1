//! Demo body kernels, as WGSL for the GPU backend and closures for the host
//! backend. Both variants compute the same values.

use celestial_compute::{ComputeError, GpuBackend, HostBackend, HostInvocation};
use glam::{Vec3, Vec4};

pub const HEIGHT: &str = "height";
pub const SHADING: &str = "shading";
pub const PERTURB: &str = "perturb";

const HASH_WGSL: &str = r#"
fn pcg(v: u32) -> u32 {
    let state = v * 747796405u + 2891336453u;
    let word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

fn signed_unit(v: u32) -> f32 {
    return f32(pcg(v)) / 4294967295.0 * 2.0 - 1.0;
}

fn load_position(i: u32) -> vec3<f32> {
    return vec3<f32>(positions[i * 3u], positions[i * 3u + 1u], positions[i * 3u + 2u]);
}
"#;

// values[0].x = amplitude, values[0].y = frequency
const HEIGHT_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read_write> positions: array<f32>;
@group(0) @binding(1) var<storage, read_write> heights: array<f32>;
@group(0) @binding(2) var<uniform> params: KernelParams;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = element_index(gid);
    if (i >= params.num_elements) {
        return;
    }
    let p = load_position(i);
    let f = params.values[0].y;
    let ridge = sin(f * p.x) * cos(f * p.y) * sin(f * p.z);
    heights[i] = 1.0 + params.values[0].x * ridge;
}
"#;

// Shape params come first: values[0].z = seed.
const SHADING_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read_write> positions: array<f32>;
@group(0) @binding(1) var<storage, read_write> payload: array<vec4<f32>>;
@group(0) @binding(2) var<uniform> params: KernelParams;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = element_index(gid);
    if (i >= params.num_elements) {
        return;
    }
    let p = load_position(i);
    let r = length(p);
    let latitude = abs(p.y) / max(r, 1e-6);
    let seed = params.values[0].z;
    let noise = fract(sin(dot(p, vec3<f32>(12.9898, 78.233, 37.719)) + seed) * 43758.5453);
    payload[i] = vec4<f32>(r, latitude, noise, 0.0);
}
"#;

// values[0].x = numPoints, values[0].y = maxStrength. Offsets are capped at
// maxStrength and points stay on the unit sphere.
const PERTURB_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read_write> positions: array<f32>;
@group(0) @binding(1) var<uniform> params: KernelParams;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = element_index(gid);
    if (i >= params.num_elements) {
        return;
    }
    let s = params.values[0].y;
    var offset = vec3<f32>(signed_unit(i * 3u), signed_unit(i * 3u + 1u), signed_unit(i * 3u + 2u));
    let len = length(offset);
    if (len > 1.0) {
        offset = offset / len;
    }
    let moved = normalize(load_position(i) + offset * s);
    positions[i * 3u] = moved.x;
    positions[i * 3u + 1u] = moved.y;
    positions[i * 3u + 2u] = moved.z;
}
"#;

/// Compile the demo kernels into `backend`.
pub fn load_gpu_kernels(backend: &mut GpuBackend) {
    backend.load_kernel(HEIGHT, &format!("{HEIGHT_WGSL}\n{HASH_WGSL}"), 2);
    backend.load_kernel(SHADING, &format!("{SHADING_WGSL}\n{HASH_WGSL}"), 2);
    backend.load_kernel(PERTURB, &format!("{PERTURB_WGSL}\n{HASH_WGSL}"), 1);
}

fn pcg(v: u32) -> u32 {
    let state = v.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

fn signed_unit(v: u32) -> f32 {
    pcg(v) as f32 / u32::MAX as f32 * 2.0 - 1.0
}

fn height(inv: &mut HostInvocation<'_>) -> Result<(), ComputeError> {
    let amplitude = inv.param("amplitude").unwrap_or(0.0);
    let frequency = inv.param("frequency").unwrap_or(1.0);
    let heights: Vec<f32> = inv
        .positions(0)?
        .iter()
        .map(|p| {
            let ridge = (frequency * p.x).sin() * (frequency * p.y).cos() * (frequency * p.z).sin();
            1.0 + amplitude * ridge
        })
        .collect();
    inv.write_scalars(1, &heights)
}

fn shading(inv: &mut HostInvocation<'_>) -> Result<(), ComputeError> {
    let seed = inv.param("seed").unwrap_or(0.0);
    let payload: Vec<Vec4> = inv
        .positions(0)?
        .iter()
        .map(|p| {
            let r = p.length();
            let latitude = p.y.abs() / r.max(1e-6);
            let noise = ((p.dot(Vec3::new(12.9898, 78.233, 37.719)) + seed).sin() * 43_758.547)
                .rem_euclid(1.0);
            Vec4::new(r, latitude, noise, 0.0)
        })
        .collect();
    inv.write_vec4(1, &payload)
}

fn perturb(inv: &mut HostInvocation<'_>) -> Result<(), ComputeError> {
    let strength = inv.param("maxStrength").unwrap_or(0.0);
    let moved: Vec<Vec3> = inv
        .positions(0)?
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let i = i as u32 * 3;
            let offset = Vec3::new(signed_unit(i), signed_unit(i + 1), signed_unit(i + 2))
                .clamp_length_max(1.0);
            (*p + offset * strength).normalize()
        })
        .collect();
    inv.write_positions(0, &moved)
}

/// Host backend with the demo kernels registered.
pub fn host_backend() -> HostBackend {
    let mut backend = HostBackend::new();
    backend.register_kernel(HEIGHT, height);
    backend.register_kernel(SHADING, shading);
    backend.register_kernel(PERTURB, perturb);
    backend
}
