//! Scene parameters.
//!
//! [`SceneConfig::default`] describes the demo scene. Native builds can point
//! the asset loaders somewhere else through the `LOBSTER_SCENE_ASSETS`
//! environment variable, see [`SceneConfig::from_env`].

use std::f32::consts::FRAC_PI_2;

use cgmath::{Deg, Point3, Vector3};

use crate::resources::{Assets, DEFAULT_ASSET_ROOT};

pub const ASSET_ROOT_VAR: &str = "LOBSTER_SCENE_ASSETS";

#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub position: Point3<f32>,
    /// The point the orbit controls circle around.
    pub target: Point3<f32>,
    /// Radians per dragged pixel.
    pub rotate_speed: f32,
    /// Fraction of the distance travelled per wheel step.
    pub zoom_speed: f32,
    /// How close and how far the orbit controls may zoom.
    pub min_distance: f32,
    pub max_distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightConfig {
    pub color: u32,
    pub intensity: f32,
    pub position: Point3<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub asset_root: String,
    pub sphere_texture: String,
    pub model_mtl: String,
    pub model_obj: String,
    pub camera: CameraConfig,
    pub lights: Vec<LightConfig>,
    pub clear_colour: wgpu::Color,
    pub cube_colors: [u32; 3],
    pub cube_positions: [Vector3<f32>; 3],
    pub sphere_radius: f32,
    pub sphere_position: Vector3<f32>,
    pub cylinder_radius: f32,
    pub cylinder_height: f32,
    pub cylinder_position: Vector3<f32>,
    pub model_position: Vector3<f32>,
    pub model_scale: f32,
    pub model_yaw: f32,
    /// Added to the model's Y rotation every frame, in radians.
    pub model_spin: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let light = |z: f32| LightConfig {
            color: 0xffffff,
            intensity: 3.0,
            position: Point3::new(0.0, 5.0, z),
        };
        Self {
            asset_root: DEFAULT_ASSET_ROOT.to_string(),
            sphere_texture: "images/disco2.jpg".to_string(),
            model_mtl: "models/lobster/lobster.mtl".to_string(),
            model_obj: "models/lobster/lobster.obj".to_string(),
            camera: CameraConfig {
                fovy: Deg(45.0),
                znear: 0.1,
                zfar: 100.0,
                position: Point3::new(0.0, 15.0, 20.0),
                target: Point3::new(0.0, 5.0, 0.0),
                rotate_speed: 0.005,
                zoom_speed: 0.05,
                min_distance: 1.0,
                max_distance: 90.0,
            },
            lights: vec![light(5.0), light(-5.0)],
            clear_colour: wgpu::Color::BLACK,
            cube_colors: [0x44aa88, 0x8844aa, 0xaa8844],
            cube_positions: [
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(-2.0, 0.0, 0.0),
                Vector3::new(2.0, 0.0, 0.0),
            ],
            sphere_radius: 5.0,
            sphere_position: Vector3::new(0.0, 5.0, -15.0),
            cylinder_radius: 4.0,
            cylinder_height: 1.0,
            cylinder_position: Vector3::new(0.0, -2.0, -5.0),
            model_position: Vector3::new(0.0, 0.0, -5.0),
            model_scale: 10.0,
            model_yaw: FRAC_PI_2,
            model_spin: 0.01,
        }
    }
}

impl SceneConfig {
    /// The default scene with the asset root taken from `LOBSTER_SCENE_ASSETS`
    /// when it is set. The web build always fetches from `<origin>/assets/`.
    pub fn from_env() -> Self {
        #[allow(unused_mut)]
        let mut config = Self::default();
        #[cfg(not(target_arch = "wasm32"))]
        if let Some(root) = std::env::var_os(ASSET_ROOT_VAR) {
            config.asset_root = root.to_string_lossy().into_owned();
        }
        config
    }

    pub fn assets(&self) -> Assets {
        Assets::new(self.asset_root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_files_share_a_directory_and_base_name() {
        let config = SceneConfig::default();
        let stem = |p: &str| p.rsplit_once('.').map(|(stem, _)| stem.to_string());
        assert_eq!(stem(&config.model_mtl), stem(&config.model_obj));
    }

    #[test]
    fn two_white_lights_face_each_other_across_the_origin() {
        let config = SceneConfig::default();
        assert_eq!(config.lights.len(), 2);
        assert!(config.lights.iter().all(|l| l.color == 0xffffff && l.intensity == 3.0));
        assert_eq!(config.lights[0].position.z, -config.lights[1].position.z);
    }

    #[test]
    fn assets_use_the_configured_root() {
        let config = SceneConfig {
            asset_root: "/srv/scene".to_string(),
            ..SceneConfig::default()
        };
        assert_eq!(config.assets().root(), "/srv/scene");
    }
}
