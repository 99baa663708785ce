use wgpu::util::DeviceExt;

use crate::data_structures::scene_graph::DirectionalLight;

/// Upper bound of directional lights the shader iterates over.
pub const MAX_LIGHTS: usize = 4;

pub struct LightResources {
    pub uniform: LightsUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl std::fmt::Debug for LightResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightResources")
            .field("uniform", &self.uniform)
            .finish_non_exhaustive()
    }
}

impl LightResources {
    pub fn new(device: &wgpu::Device, lights: &[DirectionalLight]) -> Self {
        let uniform = LightsUniform::from_lights(lights);
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Replaces the uploaded lights. Lights beyond [`MAX_LIGHTS`] are dropped.
    pub fn set_lights(&mut self, queue: &wgpu::Queue, lights: &[DirectionalLight]) {
        self.uniform = LightsUniform::from_lights(lights);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLightRaw {
    // Surface-to-light direction, normalised
    direction: [f32; 3],
    intensity: f32,
    color: [f32; 3],
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    _padding: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    lights: [DirectionalLightRaw; MAX_LIGHTS],
    count: u32,
    _padding: [u32; 3],
}

impl LightsUniform {
    pub fn from_lights(lights: &[DirectionalLight]) -> Self {
        if lights.len() > MAX_LIGHTS {
            log::warn!(
                "{} directional lights requested, only the first {} are rendered",
                lights.len(),
                MAX_LIGHTS
            );
        }
        let mut raw = [DirectionalLightRaw::default(); MAX_LIGHTS];
        let count = lights.len().min(MAX_LIGHTS);
        for (slot, light) in raw.iter_mut().zip(lights) {
            *slot = DirectionalLightRaw {
                direction: light.to_light().into(),
                intensity: light.intensity,
                color: light.color,
                _padding: 0,
            };
        }
        Self {
            lights: raw,
            count: count as u32,
            _padding: [0; 3],
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

pub fn mk_buffer(device: &wgpu::Device, uniform: LightsUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Uniform Buffer"),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    #[test]
    fn uniform_layout_matches_wgsl() {
        // array<DirectionalLight, 4> (32 bytes each) + u32 count padded to 16
        assert_eq!(std::mem::size_of::<DirectionalLightRaw>(), 32);
        assert_eq!(std::mem::size_of::<LightsUniform>(), 144);
    }

    #[test]
    fn lights_are_packed_in_order() {
        let lights = [
            DirectionalLight::new(0xffffff, 3.0, Point3::new(0.0, 5.0, 5.0)),
            DirectionalLight::new(0xffffff, 3.0, Point3::new(0.0, 5.0, -5.0)),
        ];
        let uniform = LightsUniform::from_lights(&lights);
        assert_eq!(uniform.count(), 2);
        assert_eq!(uniform.lights[0].intensity, 3.0);
        assert!(uniform.lights[0].direction[2] > 0.0);
        assert!(uniform.lights[1].direction[2] < 0.0);
        assert_eq!(uniform.lights[2], DirectionalLightRaw::default());
    }

    #[test]
    fn excess_lights_are_dropped() {
        let lights = vec![DirectionalLight::new(0xffffff, 1.0, Point3::new(1.0, 1.0, 1.0)); 6];
        assert_eq!(LightsUniform::from_lights(&lights).count() as usize, MAX_LIGHTS);
    }
}
