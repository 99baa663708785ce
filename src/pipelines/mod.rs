//! Render pipelines and the uniforms they bind.
//!
//! - `phong` builds the lit pipeline used for every mesh
//! - `light` packs the scene's directional lights into a uniform buffer

pub mod light;
pub mod phong;
