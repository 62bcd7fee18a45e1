//! Octahedron-based unit sphere tessellation.
//!
//! The sphere starts as an octahedron: six axis vertices joined by twelve
//! edges forming eight triangular faces. Each edge is split into
//! `resolution` interior points by spherical interpolation, and each face is
//! filled row by row with points interpolated between its two side edges.
//! Every vertex is therefore exactly on the unit sphere, and vertices on
//! shared edges are shared between faces.

use glam::Vec3;

/// Octahedron corners: up, left, back, right, forward, down.
const BASE_VERTICES: [Vec3; 6] = [
    Vec3::Y,
    Vec3::NEG_X,
    Vec3::NEG_Z,
    Vec3::X,
    Vec3::Z,
    Vec3::NEG_Y,
];

/// Pairs of base vertex indices forming the twelve octahedron edges.
const EDGE_VERTEX_PAIRS: [(usize, usize); 12] = [
    (0, 1),
    (0, 2),
    (0, 3),
    (0, 4),
    (1, 2),
    (2, 3),
    (3, 4),
    (4, 1),
    (5, 1),
    (5, 2),
    (5, 3),
    (5, 4),
];

/// Edges bounding each face: two sides sharing the apex, then the base.
const FACE_EDGES: [(usize, usize, usize); 8] = [
    (0, 1, 4),
    (1, 2, 5),
    (2, 3, 6),
    (3, 0, 7),
    (8, 9, 4),
    (9, 10, 5),
    (10, 11, 6),
    (11, 8, 7),
];

/// Faces from this index onward hang below the equator and are wound in
/// reverse so that every triangle faces outward.
const FIRST_LOWER_FACE: usize = 4;

/// Vertex and triangle data of a unit sphere at a given resolution.
///
/// `triangles` is a flat index list, three entries per triangle, wound so that
/// `(b - a).cross(c - a)` points away from the origin.
#[derive(Clone, Debug, PartialEq)]
pub struct TessellationTemplate {
    /// Resolution the template was built for.
    pub resolution: u32,
    /// Vertex positions, all of unit length.
    pub vertices: Vec<Vec3>,
    /// Triangle vertex indices.
    pub triangles: Vec<u32>,
}

/// Number of vertices and triangles a template of `resolution` contains.
pub fn template_counts(resolution: u32) -> (usize, usize) {
    let divisions = resolution as usize;
    let verts_per_face = vertices_per_face(divisions);
    let vertices = verts_per_face * 8 - (divisions + 2) * 12 + 6;
    let triangles = (divisions + 1) * (divisions + 1) * 8;
    (vertices, triangles)
}

fn vertices_per_face(divisions: usize) -> usize {
    let n = divisions + 3;
    (n * n - n) / 2
}

impl TessellationTemplate {
    /// Build the template for `resolution` interior points per octahedron edge.
    pub fn build(resolution: u32) -> Self {
        let divisions = resolution as usize;
        let (vertex_count, triangle_count) = template_counts(resolution);

        let mut builder = Builder {
            divisions,
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count * 3),
        };
        builder.vertices.extend_from_slice(&BASE_VERTICES);

        let edges: Vec<Vec<u32>> = EDGE_VERTEX_PAIRS
            .iter()
            .map(|&(start, end)| builder.split_edge(start, end))
            .collect();

        for (face, &(side_a, side_b, bottom)) in FACE_EDGES.iter().enumerate() {
            builder.fill_face(
                &edges[side_a],
                &edges[side_b],
                &edges[bottom],
                face >= FIRST_LOWER_FACE,
            );
        }

        debug_assert_eq!(builder.vertices.len(), vertex_count);
        debug_assert_eq!(builder.triangles.len(), triangle_count * 3);

        Self {
            resolution,
            vertices: builder.vertices,
            triangles: builder.triangles,
        }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    /// Length of the first edge of the first triangle.
    ///
    /// Used as a cheap, deterministic stand-in for the mean edge length.
    pub fn first_edge_length(&self) -> f32 {
        match self.triangles.as_slice() {
            [a, b, ..] => (self.vertices[*a as usize] - self.vertices[*b as usize]).length(),
            _ => 0.0,
        }
    }
}

struct Builder {
    divisions: usize,
    vertices: Vec<Vec3>,
    triangles: Vec<u32>,
}

impl Builder {
    fn push(&mut self, vertex: Vec3) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        index
    }

    /// Returns the vertex indices along an edge, endpoints included.
    fn split_edge(&mut self, start: usize, end: usize) -> Vec<u32> {
        let from = self.vertices[start];
        let to = self.vertices[end];

        let mut indices = Vec::with_capacity(self.divisions + 2);
        indices.push(start as u32);
        for i in 0..self.divisions {
            let t = (i as f32 + 1.0) / (self.divisions as f32 + 1.0);
            indices.push(self.push(slerp(from, to, t)));
        }
        indices.push(end as u32);
        indices
    }

    fn fill_face(&mut self, side_a: &[u32], side_b: &[u32], bottom: &[u32], reverse: bool) {
        let points_per_edge = side_a.len();
        let mut vertex_map = Vec::with_capacity(vertices_per_face(self.divisions));

        vertex_map.push(side_a[0]);
        for i in 1..points_per_edge - 1 {
            vertex_map.push(side_a[i]);

            let a = self.vertices[side_a[i] as usize];
            let b = self.vertices[side_b[i] as usize];
            let inner = i - 1;
            for j in 0..inner {
                let t = (j as f32 + 1.0) / (inner as f32 + 1.0);
                let index = self.push(slerp(a, b, t));
                vertex_map.push(index);
            }

            vertex_map.push(side_b[i]);
        }
        vertex_map.extend_from_slice(bottom);

        // Row starts along the left side follow the triangular numbers 0, 1, 3, 6, ...
        for row in 0..=self.divisions {
            let mut top = row * (row + 1) / 2;
            let mut below = (row + 1) * (row + 2) / 2;

            for column in 0..(1 + 2 * row) {
                let (v0, v1, v2) = if column % 2 == 0 {
                    let tri = (top, below + 1, below);
                    top += 1;
                    below += 1;
                    tri
                } else {
                    (top, below, top - 1)
                };

                let (first, last) = if reverse { (v2, v0) } else { (v0, v2) };
                self.triangles.push(vertex_map[first]);
                self.triangles.push(vertex_map[v1]);
                self.triangles.push(vertex_map[last]);
            }
        }
    }
}

/// Spherical interpolation between two unit vectors.
fn slerp(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    let dot = from.dot(to).clamp(-1.0, 1.0);
    let theta = dot.acos() * t;
    let relative = (to - from * dot).normalize_or_zero();
    (from * theta.cos() + relative * theta.sin()).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_resolution_zero_is_octahedron() {
        let template = TessellationTemplate::build(0);
        assert_eq!(template.vertex_count(), 6);
        assert_eq!(template.triangle_count(), 8);
        assert_eq!(&template.vertices[..], &BASE_VERTICES[..]);
    }

    #[test]
    fn test_counts_match_formula() {
        for resolution in [0, 1, 2, 5, 16, 42] {
            let template = TessellationTemplate::build(resolution);
            let (vertices, triangles) = template_counts(resolution);
            assert_eq!(template.vertex_count(), vertices, "resolution {resolution}");
            assert_eq!(template.triangle_count(), triangles, "resolution {resolution}");
        }
    }

    #[test]
    fn test_known_vertex_counts() {
        assert_eq!(template_counts(42).0, 7398);
        assert_eq!(template_counts(300).0, 362_406);
    }

    #[test]
    fn test_vertices_on_unit_sphere() {
        let template = TessellationTemplate::build(12);
        for v in &template.vertices {
            assert!((v.length() - 1.0).abs() < 1e-5, "vertex {v} off the sphere");
        }
    }

    #[test]
    fn test_indices_in_bounds_and_every_vertex_used() {
        let template = TessellationTemplate::build(7);
        let n = template.vertex_count() as u32;
        let used: HashSet<u32> = template.triangles.iter().copied().collect();
        assert!(template.triangles.iter().all(|&i| i < n));
        assert_eq!(used.len(), template.vertex_count());
    }

    #[test]
    fn test_triangles_face_outward() {
        let template = TessellationTemplate::build(6);
        for tri in template.triangles.chunks_exact(3) {
            let a = template.vertices[tri[0] as usize];
            let b = template.vertices[tri[1] as usize];
            let c = template.vertices[tri[2] as usize];
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "inward triangle {tri:?}");
        }
    }

    #[test]
    fn test_no_degenerate_triangles() {
        let template = TessellationTemplate::build(9);
        for tri in template.triangles.chunks_exact(3) {
            assert!(tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2]);
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(TessellationTemplate::build(11), TessellationTemplate::build(11));
    }

    #[test]
    fn test_first_edge_length_shrinks_with_resolution() {
        let coarse = TessellationTemplate::build(2).first_edge_length();
        let fine = TessellationTemplate::build(20).first_edge_length();
        assert!(coarse > fine && fine > 0.0);
    }
}
