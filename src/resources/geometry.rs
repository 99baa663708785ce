//! Procedural primitives.
//!
//! Vertex order, winding and uv layout follow the usual box/sphere/cylinder
//! generators of web 3D libraries, so textures authored for those wrap the same
//! way here. Uvs are generated with v pointing up and flipped once on insertion
//! into wgpu's top-left texture space.

use std::f32::consts::{PI, TAU};

use cgmath::{InnerSpace, Vector3};

use crate::{data_structures::model::ModelVertex, resources::mesh::compute_tangents};

/// CPU-side geometry ready to be uploaded with [`crate::resources::mesh::upload_mesh`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    fn push_vertex(&mut self, position: Vector3<f32>, normal: Vector3<f32>, uv: [f32; 2]) -> u32 {
        self.vertices.push(ModelVertex {
            position: position.into(),
            tex_coords: [uv[0], 1.0 - uv[1]],
            normal: normal.into(),
            tangent: [0.0; 3],
            bitangent: [0.0; 3],
        });
        self.vertices.len() as u32 - 1
    }

    fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    fn finish(mut self) -> Self {
        compute_tangents(&mut self.vertices, &self.indices);
        self
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
    Z,
}

fn set(v: &mut Vector3<f32>, axis: Axis, value: f32) {
    match axis {
        Axis::X => v.x = value,
        Axis::Y => v.y = value,
        Axis::Z => v.z = value,
    }
}

/// An axis-aligned box centred on the origin, one quad (4 vertices) per face.
pub fn box_geometry(width: f32, height: f32, depth: f32) -> MeshData {
    let mut data = MeshData::default();
    // +x, -x, +y, -y, +z, -z
    box_face(&mut data, (Axis::Z, Axis::Y, Axis::X), (-1.0, -1.0), (depth, height, width));
    box_face(&mut data, (Axis::Z, Axis::Y, Axis::X), (1.0, -1.0), (depth, height, -width));
    box_face(&mut data, (Axis::X, Axis::Z, Axis::Y), (1.0, 1.0), (width, depth, height));
    box_face(&mut data, (Axis::X, Axis::Z, Axis::Y), (1.0, -1.0), (width, depth, -height));
    box_face(&mut data, (Axis::X, Axis::Y, Axis::Z), (1.0, -1.0), (width, height, depth));
    box_face(&mut data, (Axis::X, Axis::Y, Axis::Z), (-1.0, -1.0), (width, height, -depth));
    data.finish()
}

fn box_face(
    data: &mut MeshData,
    (u, v, w): (Axis, Axis, Axis),
    (udir, vdir): (f32, f32),
    (width, height, depth): (f32, f32, f32),
) {
    let first = data.vertices.len() as u32;
    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    set(&mut normal, w, depth.signum());

    for iy in 0..2 {
        let y = iy as f32 * height - height / 2.0;
        for ix in 0..2 {
            let x = ix as f32 * width - width / 2.0;
            let mut position = Vector3::new(0.0, 0.0, 0.0);
            set(&mut position, u, x * udir);
            set(&mut position, v, y * vdir);
            set(&mut position, w, depth / 2.0);
            data.push_vertex(position, normal, [ix as f32, 1.0 - iy as f32]);
        }
    }

    let (a, b, c, d) = (first, first + 2, first + 3, first + 1);
    data.push_triangle(a, b, d);
    data.push_triangle(b, c, d);
}

/// A uv sphere. Rows at the poles collapse to a point, so their degenerate
/// triangles are skipped.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut data = MeshData::default();
    let mut grid = Vec::with_capacity(height_segments as usize + 1);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        // Centre pole uvs between their neighbours
        let u_offset = if iy == 0 {
            0.5 / width_segments as f32
        } else if iy == height_segments {
            -0.5 / width_segments as f32
        } else {
            0.0
        };

        let mut row = Vec::with_capacity(width_segments as usize + 1);
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let (phi, theta) = (u * TAU, v * PI);
            let position = Vector3::new(
                -radius * phi.cos() * theta.sin(),
                radius * theta.cos(),
                radius * phi.sin() * theta.sin(),
            );
            let normal = if position.magnitude2() > 0.0 {
                position.normalize()
            } else {
                Vector3::unit_y()
            };
            row.push(data.push_vertex(position, normal, [u + u_offset, 1.0 - v]));
        }
        grid.push(row);
    }

    for iy in 0..height_segments as usize {
        for ix in 0..width_segments as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];
            if iy != 0 {
                data.push_triangle(a, b, d);
            }
            if iy != height_segments as usize - 1 {
                data.push_triangle(b, c, d);
            }
        }
    }
    data.finish()
}

/// A capped cylinder (or truncated cone) centred on the origin along Y.
pub fn cylinder(
    radius_top: f32,
    radius_bottom: f32,
    height: f32,
    radial_segments: u32,
    height_segments: u32,
) -> MeshData {
    let radial_segments = radial_segments.max(3);
    let height_segments = height_segments.max(1);
    let half_height = height / 2.0;
    let mut data = MeshData::default();

    // Torso
    let slope = if height != 0.0 {
        (radius_bottom - radius_top) / height
    } else {
        0.0
    };
    let mut grid = Vec::with_capacity(height_segments as usize + 1);
    for y in 0..=height_segments {
        let v = y as f32 / height_segments as f32;
        let radius = v * (radius_bottom - radius_top) + radius_top;
        let mut row = Vec::with_capacity(radial_segments as usize + 1);
        for x in 0..=radial_segments {
            let u = x as f32 / radial_segments as f32;
            let (sin, cos) = (u * TAU).sin_cos();
            let position = Vector3::new(radius * sin, -v * height + half_height, radius * cos);
            let normal = Vector3::new(sin, slope, cos).normalize();
            row.push(data.push_vertex(position, normal, [u, 1.0 - v]));
        }
        grid.push(row);
    }
    for x in 0..radial_segments as usize {
        for y in 0..height_segments as usize {
            let a = grid[y][x];
            let b = grid[y + 1][x];
            let c = grid[y + 1][x + 1];
            let d = grid[y][x + 1];
            data.push_triangle(a, b, d);
            data.push_triangle(b, c, d);
        }
    }

    cylinder_cap(&mut data, radius_top, half_height, radial_segments, true);
    cylinder_cap(&mut data, radius_bottom, half_height, radial_segments, false);
    data.finish()
}

fn cylinder_cap(data: &mut MeshData, radius: f32, half_height: f32, segments: u32, top: bool) {
    let sign = if top { 1.0 } else { -1.0 };
    let normal = Vector3::new(0.0, sign, 0.0);

    // One centre vertex per segment so each wedge gets its own uv
    let centre_start = data.vertices.len() as u32;
    for _ in 0..segments {
        data.push_vertex(Vector3::new(0.0, half_height * sign, 0.0), normal, [0.5, 0.5]);
    }
    let rim_start = data.vertices.len() as u32;
    for x in 0..=segments {
        let (sin, cos) = (x as f32 / segments as f32 * TAU).sin_cos();
        data.push_vertex(
            Vector3::new(radius * sin, half_height * sign, radius * cos),
            normal,
            [cos * 0.5 + 0.5, sin * 0.5 * sign + 0.5],
        );
    }

    for x in 0..segments {
        let c = centre_start + x;
        let i = rim_start + x;
        if top {
            data.push_triangle(i, i + 1, c);
        } else {
            data.push_triangle(i + 1, i, c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(data: &MeshData) {
        assert_eq!(data.indices.len() % 3, 0);
        assert!(
            data.indices
                .iter()
                .all(|&i| (i as usize) < data.vertices.len())
        );
        for v in &data.vertices {
            let n = Vector3::from(v.normal);
            assert!((n.magnitude() - 1.0).abs() < 1e-4, "normal {:?}", v.normal);
        }
    }

    #[test]
    fn unit_box_has_a_quad_per_face() {
        let data = box_geometry(1.0, 1.0, 1.0);
        assert_eq!(data.vertices.len(), 24);
        assert_eq!(data.indices.len(), 36);
        assert_well_formed(&data);
        assert!(
            data.vertices
                .iter()
                .flat_map(|v| v.position)
                .all(|c| c.abs() == 0.5)
        );
    }

    #[test]
    fn box_faces_wind_counter_clockwise_outwards() {
        let data = box_geometry(1.0, 1.0, 1.0);
        for tri in data.indices.chunks(3) {
            let p: Vec<Vector3<f32>> = tri
                .iter()
                .map(|&i| data.vertices[i as usize].position.into())
                .collect();
            let face_normal = (p[1] - p[0]).cross(p[2] - p[0]);
            let normal = Vector3::from(data.vertices[tri[0] as usize].normal);
            assert!(face_normal.dot(normal) > 0.0);
        }
    }

    #[test]
    fn sphere_skips_pole_triangles() {
        let data = sphere(5.0, 10, 10);
        assert_eq!(data.vertices.len(), 121);
        assert_eq!(data.indices.len(), 540);
        assert_well_formed(&data);
        for v in &data.vertices {
            assert!((Vector3::from(v.position).magnitude() - 5.0).abs() < 1e-4);
        }
    }

    #[test]
    fn capped_cylinder_counts() {
        let data = cylinder(4.0, 4.0, 1.0, 32, 1);
        assert_eq!(data.vertices.len(), 196);
        assert_eq!(data.indices.len(), 384);
        assert_well_formed(&data);
        assert!(
            data.vertices
                .iter()
                .all(|v| v.position[1].abs() <= 0.5 + 1e-6)
        );
    }

    #[test]
    fn uvs_are_flipped_into_wgpu_space() {
        let data = cylinder(1.0, 1.0, 2.0, 8, 1);
        // First torso vertex sits on the top rim, which is v = 1 before the flip
        assert_eq!(data.vertices[0].tex_coords, [0.0, 0.0]);
        assert_eq!(data.vertices[0].position[1], 1.0);
    }
}
