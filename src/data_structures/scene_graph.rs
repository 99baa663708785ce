//! Scene graph root: the owner of every light and mesh node in a scene.
//!
//! The graph is flat: each [`Node`] pairs a local transform with a renderable
//! payload `R`. The payload is generic so that the same scene can carry GPU
//! resources at runtime ([`MeshNode`]) and plain `()` markers in tests.

use cgmath::{InnerSpace, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    context::BufferWriter,
    data_structures::{instance::Instance, model::Model},
    render::{Instanced, Render},
};

/// Stable handle to a node. Nodes are never removed, so handles never dangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
pub struct Node<R> {
    pub name: String,
    pub transform: Instance,
    pub renderable: R,
}

/// A light with parallel rays travelling from `position` towards `target`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub color: [f32; 3],
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn new(color: u32, intensity: f32, position: Point3<f32>) -> Self {
        let [r, g, b, _] = crate::data_structures::model::hex_to_rgba(color);
        Self {
            position,
            target: Point3::new(0.0, 0.0, 0.0),
            color: [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0],
            intensity,
        }
    }

    /// Unit vector pointing from a lit surface towards the light.
    pub fn to_light(&self) -> Vector3<f32> {
        let dir = self.position - self.target;
        if dir.magnitude2() == 0.0 {
            Vector3::unit_y()
        } else {
            dir.normalize()
        }
    }
}

#[derive(Debug)]
pub struct Scene<R> {
    nodes: Vec<Node<R>>,
    lights: Vec<DirectionalLight>,
}

impl<R> Default for Scene<R> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            lights: Vec::new(),
        }
    }
}

impl<R> Scene<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, transform: Instance, renderable: R) -> NodeId {
        self.nodes.push(Node {
            name: name.to_string(),
            transform,
            renderable,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_light(&mut self, light: DirectionalLight) {
        self.lights.push(light);
    }

    pub fn lights(&self) -> &[DirectionalLight] {
        &self.lights
    }

    pub fn node(&self, id: NodeId) -> &Node<R> {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<R> {
        &mut self.nodes[id.0]
    }

    pub fn transform(&self, id: NodeId) -> &Instance {
        &self.node(id).transform
    }

    pub fn transform_mut(&mut self, id: NodeId) -> &mut Instance {
        &mut self.node_mut(id).transform
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node<R>> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// GPU payload of a node: the model to draw and the buffer holding its transform.
pub struct MeshNode {
    pub model: Model,
    instance_buffer: wgpu::Buffer,
}

impl MeshNode {
    pub fn new(device: &wgpu::Device, model: Model, transform: &Instance) -> Self {
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&[transform.to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            model,
            instance_buffer,
        }
    }
}

impl BufferWriter for Scene<MeshNode> {
    fn write_to_buffer(&mut self, ctx: &crate::context::Context) {
        for node in self.nodes() {
            ctx.queue.write_buffer(
                &node.renderable.instance_buffer,
                0,
                bytemuck::cast_slice(&[node.transform.to_raw()]),
            );
        }
    }
}

impl<'a> From<&'a Scene<MeshNode>> for Render<'a> {
    fn from(scene: &'a Scene<MeshNode>) -> Self {
        if scene.is_empty() {
            return Render::None;
        }
        Render::Defaults(
            scene
                .nodes()
                .map(|node| Instanced {
                    instance: &node.renderable.instance_buffer,
                    model: &node.renderable.model,
                    amount: 1,
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_address_the_node_they_were_issued_for() {
        let mut scene: Scene<()> = Scene::new();
        let a = scene.add("a", Instance::at(1.0, 0.0, 0.0), ());
        let b = scene.add("b", Instance::at(2.0, 0.0, 0.0), ());
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.node(a).name, "a");
        scene.transform_mut(b).position.y = 4.0;
        assert_eq!(scene.transform(b).position, Vector3::new(2.0, 4.0, 0.0));
        assert_eq!(scene.transform(a).position, Vector3::new(1.0, 0.0, 0.0));
        let names: Vec<_> = scene.nodes().map(|node| node.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn new_scene_is_empty() {
        let scene: Scene<()> = Scene::new();
        assert!(scene.is_empty());
        assert!(scene.lights().is_empty());
    }

    #[test]
    fn directional_light_points_from_target_to_position() {
        let light = DirectionalLight::new(0xffffff, 3.0, Point3::new(0.0, 5.0, 5.0));
        let dir = light.to_light();
        let expected = Vector3::new(0.0, 1.0, 1.0).normalize();
        assert!((dir - expected).magnitude() < 1e-6);
        assert_eq!(light.color, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn light_on_its_target_falls_back_to_overhead() {
        let mut light = DirectionalLight::new(0xffffff, 1.0, Point3::new(0.0, 0.0, 0.0));
        light.target = light.position;
        assert_eq!(light.to_light(), Vector3::unit_y());
    }
}
