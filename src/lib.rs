//! lobster-scene
//!
//! A small cross-platform `wgpu` scene: three spinning cubes, a disco sphere, a
//! cylinder and a lobster loaded from OBJ + MTL, lit by two directional lights
//! and viewed through orbit controls. It runs in a native window or on a
//! `<canvas id="c">` through WebGL.
//!
//! High-level modules
//! - `camera`: camera, projection, orbit controller and uniforms for view/projection
//! - `config`: the scene's parameters and asset locations
//! - `context`: central GPU and window context that owns device/queue/pipeline
//! - `data_structures`: engine data models (meshes, instances, textures, scene graph)
//! - `driver`: the flow that builds the scene, loads its assets and animates it
//! - `flow`: high level flow control (event loop, update and render hooks)
//! - `pipelines`: the lit render pipeline and its light uniforms
//! - `resources`: helpers to load textures/models and build procedural geometry
//! - `render`: render composition for batching draws
//! - `scene`: scene layout and animation, independent of the GPU
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod driver;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

pub use config::SceneConfig;
pub use driver::{LoadReport, LoadStatus, SceneDriver, SceneEvent};
pub use scene::SceneState;

/// Runs the demo scene until its window is closed.
pub fn run() -> anyhow::Result<()> {
    flow::run(vec![SceneDriver::constructor(SceneConfig::from_env())])
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    run().map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{e:#}")))
}
