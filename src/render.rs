//! Render composition and batching.
//!
//! This module defines the [`Render`] enum, which flows return each frame to
//! describe what should be drawn. The engine flattens all renders into one batch
//! per pipeline before recording the render pass.
//!
//! # Key types
//!
//! - [`Render<'a>`] is the enum describing render operations
//! - [`Instanced<'a>`] contains data for instanced rendering (model + instance buffer)

use crate::data_structures::model::Model;

/// Data for instanced object rendering: a model and its instance buffer.
///
/// The instance buffer holds `amount` packed [`crate::data_structures::instance::InstanceRaw`]
/// transforms that are applied to every mesh of the model.
#[derive(Clone)]
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
}

/// Specifies how a flow's objects should be rendered.
///
/// # Variants
///
/// - `None` renders nothing
/// - `Default(Instanced)` renders a single opaque instanced object
/// - `Defaults(Vec<Instanced>)` renders a batch of opaque instanced objects
/// - `Composed(Vec<Render>)` recursively renders composition of multiple renders
pub enum Render<'a> {
    None,
    Default(Instanced<'a>),
    Defaults(Vec<Instanced<'a>>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    /// Flattens the render tree into the batch drawn by the lit pipeline.
    pub(crate) fn collect_into(self, basics: &mut Vec<Instanced<'a>>) {
        match self {
            Render::Default(instanced) => basics.push(instanced),
            Render::Defaults(mut vec) => basics.append(&mut vec),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.collect_into(basics)),
            Render::None => (),
        }
    }
}
