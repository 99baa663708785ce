//! Camera, perspective projection and orbit controls.
//!
//! The [`Camera`] looks from `position` at `target`. The [`OrbitController`]
//! turns mouse input into spherical movements around that target: left drag
//! orbits, right drag pans and the wheel zooms. The GPU side lives in
//! [`CameraResources`], which owns the uniform buffer the shaders read.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector2, Vector3, perspective};
use wgpu::util::DeviceExt;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

// Keeps the camera off the poles where `look_at` degenerates.
const POLAR_EPSILON: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

/// Orbits a [`Camera`] around its target.
///
/// Input is accumulated between frames and applied once in [`OrbitController::update`].
#[derive(Debug)]
pub struct OrbitController {
    rotate_speed: f32,
    pan_speed: f32,
    zoom_speed: f32,
    min_distance: f32,
    max_distance: f32,
    drag: Drag,
    cursor: Option<PhysicalPosition<f64>>,
    rotate_delta: Vector2<f32>,
    pan_delta: Vector2<f32>,
    zoom_delta: f32,
}

impl OrbitController {
    /// `rotate_speed` is in radians per dragged pixel, `zoom_speed` scales the
    /// distance per wheel step.
    pub fn new(rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_speed,
            pan_speed: 0.002,
            zoom_speed,
            min_distance: 1.0,
            max_distance: 90.0,
            drag: Drag::None,
            cursor: None,
            rotate_delta: Vector2::new(0.0, 0.0),
            pan_delta: Vector2::new(0.0, 0.0),
            zoom_delta: 0.0,
        }
    }

    pub fn with_distance_limits(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (button, state) {
                    (MouseButton::Left, ElementState::Pressed) => Drag::Rotate,
                    (MouseButton::Right, ElementState::Pressed) => Drag::Pan,
                    (_, ElementState::Released) => Drag::None,
                    _ => self.drag,
                };
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(last) = self.cursor {
                    let dx = (position.x - last.x) as f32;
                    let dy = (position.y - last.y) as f32;
                    match self.drag {
                        Drag::Rotate => self.rotate(dx, dy),
                        Drag::Pan => self.pan(dx, dy),
                        Drag::None => (),
                    }
                }
                self.cursor = Some(*position);
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = Drag::None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.zoom(steps);
            }
            _ => (),
        }
    }

    /// Queue an orbit by a mouse delta in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.rotate_delta += Vector2::new(dx, dy) * self.rotate_speed;
    }

    /// Queue a pan by a mouse delta in pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pan_delta += Vector2::new(dx, dy);
    }

    /// Queue a zoom. Positive steps move towards the target.
    pub fn zoom(&mut self, steps: f32) {
        self.zoom_delta += steps;
    }

    pub fn update(&mut self, camera: &mut Camera) {
        let offset = camera.position - camera.target;
        let mut radius = offset.magnitude();
        if radius == 0.0 {
            self.reset();
            return;
        }
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta -= self.rotate_delta.x;
        phi = (phi - self.rotate_delta.y).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);

        radius *= (1.0 - self.zoom_speed).powf(self.zoom_delta);
        radius = radius.clamp(self.min_distance, self.max_distance);

        if self.pan_delta != Vector2::new(0.0, 0.0) {
            let forward = -offset.normalize();
            let right = forward.cross(Vector3::unit_y()).normalize();
            let up = right.cross(forward);
            let scale = self.pan_speed * radius;
            camera.target += (-right * self.pan_delta.x + up * self.pan_delta.y) * scale;
        }

        let offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.position = camera.target + offset;
        self.reset();
    }

    fn reset(&mut self) {
        self.rotate_delta = Vector2::new(0.0, 0.0);
        self.pan_delta = Vector2::new(0.0, 0.0);
        self.zoom_delta = 0.0;
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera state plus the GPU resources that expose it to the shaders.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(
        device: &wgpu::Device,
        camera: Camera,
        projection: &Projection,
        controller: OrbitController,
    ) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Applies pending orbit input and uploads the new view-projection.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.controller.update(&mut self.camera);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point3<f32>, b: Point3<f32>) -> bool {
        (a - b).magnitude() < 1e-4
    }

    fn scene_camera() -> Camera {
        Camera::new((0.0, 15.0, 20.0), (0.0, 5.0, 0.0))
    }

    #[test]
    fn update_without_input_keeps_the_camera() {
        let mut camera = scene_camera();
        let mut controller = OrbitController::new(0.005, 0.05);
        controller.update(&mut camera);
        assert!(close(camera.position, Point3::new(0.0, 15.0, 20.0)));
        assert_eq!(camera.target, Point3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn orbiting_keeps_the_distance_to_the_target() {
        let mut camera = scene_camera();
        let before = camera.distance();
        let mut controller = OrbitController::new(0.005, 0.05);
        controller.rotate(120.0, -40.0);
        controller.update(&mut camera);
        assert!((camera.distance() - before).abs() < 1e-4);
        assert!(!close(camera.position, Point3::new(0.0, 15.0, 20.0)));
    }

    #[test]
    fn polar_angle_never_reaches_the_pole() {
        let mut camera = scene_camera();
        let mut controller = OrbitController::new(0.01, 0.05);
        controller.rotate(0.0, 10_000.0);
        controller.update(&mut camera);
        let offset = camera.position - camera.target;
        assert!(offset.x.abs() + offset.z.abs() > 0.0);
        assert!(offset.y > 0.0);
    }

    #[test]
    fn zoom_is_clamped_to_the_distance_limits() {
        let mut camera = scene_camera();
        let mut controller = OrbitController::new(0.005, 0.1).with_distance_limits(2.0, 30.0);
        controller.zoom(500.0);
        controller.update(&mut camera);
        assert!((camera.distance() - 2.0).abs() < 1e-4);
        controller.zoom(-500.0);
        controller.update(&mut camera);
        assert!((camera.distance() - 30.0).abs() < 1e-3);
    }

    #[test]
    fn panning_moves_target_and_camera_together() {
        let mut camera = scene_camera();
        let offset_before = camera.position - camera.target;
        let mut controller = OrbitController::new(0.005, 0.05);
        controller.pan(50.0, 0.0);
        controller.update(&mut camera);
        assert_ne!(camera.target, Point3::new(0.0, 5.0, 0.0));
        let offset_after = camera.position - camera.target;
        assert!((offset_after - offset_before).magnitude() < 1e-4);
    }

    #[test]
    fn left_drag_orbits_and_release_stops() {
        let mut camera = scene_camera();
        let mut controller = OrbitController::new(0.005, 0.05);
        controller.drag = Drag::Rotate;
        controller.cursor = Some(PhysicalPosition::new(10.0, 10.0));
        controller.rotate(30.0, 0.0);
        controller.update(&mut camera);
        let moved = camera.position;
        controller.drag = Drag::None;
        controller.update(&mut camera);
        assert!(close(camera.position, moved));
    }

    #[test]
    fn projection_tracks_aspect() {
        let mut projection = Projection::new(300, 150, cgmath::Deg(45.0), 0.1, 100.0);
        assert_eq!(projection.aspect(), 2.0);
        projection.set_aspect(800.0 / 600.0);
        assert!((projection.aspect() - 800.0 / 600.0).abs() < 1e-6);
    }
}
