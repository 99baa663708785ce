//! Engine data structures: models, textures, scene graphs, and instances.
//!
//! - `model` contains mesh and material definitions, GPU resources for 3D models
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `instance` holds per-instance transformation and attribute data
//! - `scene_graph` owns the nodes and lights of a scene

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
