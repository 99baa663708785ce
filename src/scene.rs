//! The demo scene's layout and animation.
//!
//! [`SceneState`] owns the [`Scene`] together with handles to the nodes that
//! move. It is generic over the renderable payload, so the animation runs the
//! same with GPU meshes as with `()` placeholders.

use instant::Duration;

use crate::{
    config::SceneConfig,
    data_structures::{
        instance::{Euler, Instance},
        scene_graph::{DirectionalLight, NodeId, Scene},
    },
};

/// The procedurally built props, handed to the payload factory of [`SceneState::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prop {
    Cube(usize),
    Sphere,
    Cylinder,
}

/// Angle in radians of cube `index` after `seconds`. Cubes further right spin faster.
pub fn cube_rotation(index: usize, seconds: f32) -> f32 {
    seconds * (1.0 + 0.1 * index as f32)
}

#[derive(Debug)]
pub struct SceneState<R> {
    pub scene: Scene<R>,
    pub cubes: [NodeId; 3],
    pub sphere: NodeId,
    pub cylinder: NodeId,
    /// Set once the external model has finished loading.
    pub lobster: Option<NodeId>,
    model_transform: Instance,
    model_spin: f32,
}

impl<R> SceneState<R> {
    /// Lays out lights and props. `make` builds the payload of each prop.
    pub fn new(config: &SceneConfig, mut make: impl FnMut(Prop, &Instance) -> R) -> Self {
        let mut scene = Scene::new();
        for light in &config.lights {
            scene.add_light(DirectionalLight::new(
                light.color,
                light.intensity,
                light.position,
            ));
        }

        let cubes = [0, 1, 2].map(|i| {
            let transform = Instance::from(config.cube_positions[i]);
            let renderable = make(Prop::Cube(i), &transform);
            scene.add(&format!("cube {i}"), transform, renderable)
        });

        let mut add = |name: &str, prop: Prop, transform: Instance| {
            let renderable = make(prop, &transform);
            scene.add(name, transform, renderable)
        };
        let sphere = add("sphere", Prop::Sphere, config.sphere_position.into());
        let cylinder = add("cylinder", Prop::Cylinder, config.cylinder_position.into());

        let model_transform = Instance {
            position: config.model_position,
            rotation: Euler::new(0.0, config.model_yaw, 0.0),
            scale: cgmath::Vector3::new(config.model_scale, config.model_scale, config.model_scale),
        };

        Self {
            scene,
            cubes,
            sphere,
            cylinder,
            lobster: None,
            model_transform,
            model_spin: config.model_spin,
        }
    }

    /// Where the external model is placed when it gets attached.
    pub fn model_transform(&self) -> &Instance {
        &self.model_transform
    }

    /// Adds the loaded external model to the scene. A second call swaps the
    /// payload of the existing node.
    pub fn attach_model(&mut self, renderable: R) -> NodeId {
        if let Some(id) = self.lobster {
            log::warn!("Model attached twice, replacing the first one");
            self.scene.node_mut(id).renderable = renderable;
            return id;
        }
        let id = self
            .scene
            .add("lobster", self.model_transform.clone(), renderable);
        self.lobster = Some(id);
        id
    }

    /// Advances the animation to `elapsed` since the first frame.
    ///
    /// Cube rotations are absolute functions of time, the model's spin is
    /// incremental and grows by a fixed step per call.
    pub fn animate(&mut self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f32();
        for (i, id) in self.cubes.iter().enumerate() {
            let rot = cube_rotation(i, seconds);
            let rotation = &mut self.scene.transform_mut(*id).rotation;
            rotation.x = rot;
            rotation.y = rot;
        }

        if let Some(lobster) = self.lobster {
            self.scene.transform_mut(lobster).rotation.y += self.model_spin;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn state() -> SceneState<()> {
        SceneState::new(&SceneConfig::default(), |_, _| ())
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn lays_out_props_and_lights() {
        let state = state();
        assert_eq!(state.scene.len(), 5);
        assert_eq!(state.scene.lights().len(), 2);
        assert_eq!(state.scene.transform(state.cubes[1]).position.x, -2.0);
        assert_eq!(state.scene.transform(state.cubes[2]).position.x, 2.0);
        assert_eq!(state.scene.transform(state.sphere).position.z, -15.0);
        assert_eq!(state.scene.transform(state.cylinder).position.y, -2.0);
        assert!(state.lobster.is_none());
    }

    #[test]
    fn payload_factory_sees_every_prop_once() {
        let mut seen = Vec::new();
        let _ = SceneState::new(&SceneConfig::default(), |prop, _| seen.push(prop));
        assert_eq!(
            seen,
            vec![
                Prop::Cube(0),
                Prop::Cube(1),
                Prop::Cube(2),
                Prop::Sphere,
                Prop::Cylinder
            ]
        );
    }

    #[test]
    fn cubes_rest_at_time_zero() {
        let mut state = state();
        state.animate(Duration::ZERO);
        for id in state.cubes {
            assert_eq!(state.scene.transform(id).rotation, Euler::new(0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn cube_rotation_is_a_function_of_time() {
        let mut state = state();
        state.animate(Duration::from_secs(5));
        state.animate(Duration::from_secs(2));
        for (id, expected) in state.cubes.into_iter().zip([2.0, 2.2, 2.4]) {
            let rotation = state.scene.transform(id).rotation;
            assert!(close(rotation.x, expected), "{} != {}", rotation.x, expected);
            assert_eq!(rotation.x, rotation.y);
            assert_eq!(rotation.z, 0.0);
        }
    }

    #[test]
    fn model_is_untouched_until_attached() {
        let mut state = state();
        state.animate(Duration::from_millis(16));
        assert!(state.lobster.is_none());
        assert_eq!(state.scene.len(), 5);

        let id = state.attach_model(());
        let transform = state.scene.transform(id);
        assert_eq!(transform.rotation.y, FRAC_PI_2);
        assert_eq!(transform.scale.x, 10.0);
        assert_eq!(transform.position.z, -5.0);
    }

    #[test]
    fn model_spin_accumulates_per_frame() {
        let mut state = state();
        let id = state.attach_model(());
        for frame in 0..100 {
            // Time jumping around must not reset the spin
            state.animate(Duration::from_millis(frame % 7 * 100));
        }
        let yaw = state.scene.transform(id).rotation.y;
        assert!((yaw - (FRAC_PI_2 + 1.0)).abs() < 1e-4, "{yaw}");
    }

    #[test]
    fn attaching_twice_keeps_one_node() {
        let mut state = state();
        let first = state.attach_model(());
        let second = state.attach_model(());
        assert_eq!(first, second);
        assert_eq!(state.scene.len(), 6);
    }
}
