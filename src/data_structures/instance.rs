//! Instance transformation data for GPU rendering.
//!
//! Per-instance data like position, rotation, and scale is stored as
//! GPU buffers and passed to shaders. Rotations are kept as Euler angles so
//! that animation code can address single axes (`rotation.y += 0.01`).

use cgmath::{Rad, SquareMatrix};

use crate::data_structures::model;

/// Euler angles in radians, applied in `X * Y * Z` order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Euler {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Euler {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_quaternion(&self) -> cgmath::Quaternion<f32> {
        cgmath::Quaternion::from(cgmath::Euler::new(Rad(self.x), Rad(self.y), Rad(self.z)))
    }
}

/// Per-instance transformation: position, rotation (as Euler angles), and scale.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: Euler,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Create a new instance with identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: Euler::default(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(x: f32, y: f32, z: f32) -> Self {
        cgmath::Vector3::new(x, y, z).into()
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation.to_quaternion())
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let world_matrix = self.to_matrix();
        let handedness = world_matrix.determinant().signum();
        InstanceRaw {
            model: world_matrix.into(),
            normal: cgmath::Matrix3::from(self.rotation.to_quaternion()).into(),
            handedness,
        }
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(dead_code)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    handedness: f32,
}

/**
 * As we store vertex data directly in the GPU memory we need to tell what the bytes refer to:
 *
 * offset: zero as we want to use the full space.
 * stride: length of a vertex
 *
 * Stride layout here: the world matrix as four vec4s, the rotation as 3x3 normal matrix
 * and the sign of the world matrix' determinant.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance once per instance rather than once per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // A mat4 takes up 4 vertex slots as it is technically 4 vec4s.
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Rotation3, Vector3};

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-5
    }

    #[test]
    fn identity_instance_keeps_points() {
        let m = Instance::new().to_matrix();
        let p = m * cgmath::Vector4::new(1.0, 2.0, 3.0, 1.0);
        assert!(close(p.truncate(), Vector3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn quarter_turn_about_y_maps_x_to_minus_z() {
        let rot = Euler::new(0.0, std::f32::consts::FRAC_PI_2, 0.0).to_quaternion();
        assert!(close(rot * Vector3::unit_x(), -Vector3::unit_z()));
    }

    #[test]
    fn euler_order_is_x_then_y_then_z() {
        let e = Euler::new(0.3, 0.5, 0.7);
        let expected = cgmath::Quaternion::from_angle_x(Rad(0.3))
            * cgmath::Quaternion::from_angle_y(Rad(0.5))
            * cgmath::Quaternion::from_angle_z(Rad(0.7));
        let v = Vector3::new(0.2, -1.0, 4.0);
        assert!(close(e.to_quaternion() * v, expected * v));
    }

    #[test]
    fn scale_then_rotate_then_translate() {
        let instance = Instance {
            position: Vector3::new(0.0, 0.0, -5.0),
            rotation: Euler::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            scale: Vector3::new(10.0, 10.0, 10.0),
        };
        let p = instance.to_matrix() * cgmath::Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!(close(p.truncate(), Vector3::new(0.0, 0.0, -15.0)));
        assert_eq!(instance.to_raw().handedness, 1.0);
    }
}
