//! The flow that builds and animates the demo scene.
//!
//! [`SceneDriver`] creates the props on the GPU, configures camera and lights,
//! starts the asset loads and applies their results when they arrive as
//! [`SceneEvent`]s. What happened to each load is recorded in the shared
//! [`LoadReport`].

use std::fmt;

use instant::Duration;
use winit::event::WindowEvent;

use crate::{
    camera::{Camera, OrbitController, Projection},
    config::SceneConfig,
    context::{BufferWriter, Context, InitContext},
    data_structures::{
        model::{Material, Model},
        scene_graph::{MeshNode, NodeId},
        texture::Texture,
    },
    flow::{EventFuture, FlowConstructor, GraphicsFlow, Out},
    render::Render,
    resources::{
        Assets,
        error::{AssetError, AssetKind},
        geometry::{box_geometry, cylinder, sphere},
        mesh::upload_mesh,
        texture::diffuse_normal_layout,
    },
    scene::{Prop, SceneState},
};

/// Outcome of one asynchronous load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Pending,
    Loaded,
    Failed(String),
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Pending => f.write_str("pending"),
            LoadStatus::Loaded => f.write_str("loaded"),
            LoadStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// State shared between flows: how far the scene's asset loads got.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub texture: LoadStatus,
    pub model: LoadStatus,
}

impl LoadReport {
    pub fn status(&self, kind: AssetKind) -> &LoadStatus {
        match kind {
            AssetKind::Texture => &self.texture,
            AssetKind::Model => &self.model,
        }
    }

    /// Records and logs the result of loading `kind`.
    pub fn record<T>(&mut self, kind: AssetKind, result: &Result<T, AssetError>) {
        let status = match result {
            Ok(_) => {
                log::info!("Loaded {kind}");
                LoadStatus::Loaded
            }
            Err(e) => {
                let reason = e.report();
                log::error!("Failed to load {kind}: {reason}");
                LoadStatus::Failed(reason)
            }
        };
        match kind {
            AssetKind::Texture => self.texture = status,
            AssetKind::Model => self.model = status,
        }
    }

    /// No load is pending any more.
    pub fn is_settled(&self) -> bool {
        self.texture != LoadStatus::Pending && self.model != LoadStatus::Pending
    }
}

/// Attaches a loaded model or records why it is missing. The scene keeps
/// running either way.
pub fn settle_model<R>(
    state: &mut SceneState<R>,
    report: &mut LoadReport,
    result: Result<R, AssetError>,
) -> Option<NodeId> {
    report.record(AssetKind::Model, &result);
    result.ok().map(|renderable| state.attach_model(renderable))
}

pub enum SceneEvent {
    TextureLoaded(Result<Texture, AssetError>),
    ModelLoaded(Result<Model, AssetError>),
}

impl fmt::Debug for SceneEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneEvent::TextureLoaded(result) => {
                f.debug_tuple("TextureLoaded").field(&result.is_ok()).finish()
            }
            SceneEvent::ModelLoaded(result) => {
                f.debug_tuple("ModelLoaded").field(&result.is_ok()).finish()
            }
        }
    }
}

pub struct SceneDriver {
    config: SceneConfig,
    assets: Assets,
    state: SceneState<MeshNode>,
    elapsed: Duration,
}

impl SceneDriver {
    pub fn new(config: SceneConfig, ctx: InitContext) -> Self {
        let InitContext { device, queue } = ctx;
        let layout = diffuse_normal_layout(&device);

        // One box mesh shared by all cubes
        let cube_mesh = upload_mesh(&device, "cube", &box_geometry(1.0, 1.0, 1.0), 0);
        let sphere_mesh = upload_mesh(&device, "sphere", &sphere(config.sphere_radius, 10, 10), 0);
        let cylinder_mesh = upload_mesh(
            &device,
            "cylinder",
            &cylinder(
                config.cylinder_radius,
                config.cylinder_radius,
                config.cylinder_height,
                32,
                1,
            ),
            0,
        );

        let state = SceneState::new(&config, |prop, transform| {
            let (mesh, material) = match prop {
                Prop::Cube(i) => (
                    cube_mesh.clone(),
                    Material::from_color(
                        &device,
                        &queue,
                        &format!("cube {i}"),
                        config.cube_colors[i],
                        &layout,
                    ),
                ),
                // White until the texture arrives
                Prop::Sphere => (
                    sphere_mesh.clone(),
                    Material::from_color(&device, &queue, "sphere", 0xffffff, &layout),
                ),
                Prop::Cylinder => (
                    cylinder_mesh.clone(),
                    Material::from_color(&device, &queue, "cylinder", 0xffffff, &layout),
                ),
            };
            let model = Model {
                meshes: vec![mesh],
                materials: vec![material],
            };
            MeshNode::new(&device, model, transform)
        });
        log::info!("Built {} props", state.scene.len());

        Self {
            assets: config.assets(),
            config,
            state,
            elapsed: Duration::ZERO,
        }
    }

    pub fn constructor(config: SceneConfig) -> FlowConstructor<LoadReport, SceneEvent> {
        let constructor: FlowConstructor<LoadReport, SceneEvent> = Box::new(move |ctx| {
            Box::pin(async move {
                Box::new(SceneDriver::new(config, ctx)) as Box<dyn GraphicsFlow<_, _>>
            })
        });
        constructor
    }

    fn apply_texture(&mut self, ctx: &Context, texture: Texture) {
        let layout = diffuse_normal_layout(&ctx.device);
        let normal = Texture::create_default_normal_map(1, 1, &ctx.device, &ctx.queue);
        let material = Material::new(
            &ctx.device,
            &self.config.sphere_texture,
            texture,
            normal,
            &layout,
        );
        let sphere = self.state.sphere;
        self.state.scene.node_mut(sphere).renderable.model.materials = vec![material];
    }
}

impl GraphicsFlow<LoadReport, SceneEvent> for SceneDriver {
    fn on_init(&mut self, ctx: &mut Context, state: &mut LoadReport) -> Out<SceneEvent> {
        let camera = &self.config.camera;
        ctx.clear_colour = self.config.clear_colour;
        ctx.camera.camera = Camera::new(camera.position, camera.target);
        ctx.camera.controller = OrbitController::new(camera.rotate_speed, camera.zoom_speed)
            .with_distance_limits(camera.min_distance, camera.max_distance);
        ctx.projection = Projection::new(
            ctx.config.width,
            ctx.config.height,
            camera.fovy,
            camera.znear,
            camera.zfar,
        );
        ctx.set_lights(self.state.scene.lights());
        *state = LoadReport::default();

        let texture = {
            let assets = self.assets.clone();
            let path = self.config.sphere_texture.clone();
            let (device, queue) = (ctx.device.clone(), ctx.queue.clone());
            async move {
                SceneEvent::TextureLoaded(assets.load_texture(&path, false, &device, &queue).await)
            }
        };
        let model = {
            let assets = self.assets.clone();
            let (mtl, obj) = (self.config.model_mtl.clone(), self.config.model_obj.clone());
            let (device, queue) = (ctx.device.clone(), ctx.queue.clone());
            async move {
                SceneEvent::ModelLoaded(assets.load_model_obj(&mtl, &obj, &device, &queue).await)
            }
        };
        log::info!(
            "Loading {} and {} from {}",
            self.config.sphere_texture,
            self.config.model_obj,
            self.assets.root()
        );

        // Independent loads, each event is delivered as soon as its own future resolves
        Out::FutEvent(vec![
            Box::pin(texture) as EventFuture<_>,
            Box::pin(model) as EventFuture<_>,
        ])
    }

    fn on_update(&mut self, ctx: &Context, _: &mut LoadReport, dt: Duration) -> Out<SceneEvent> {
        self.elapsed += dt;
        self.state.animate(self.elapsed);
        self.state.scene.write_to_buffer(ctx);
        Out::Empty
    }

    fn on_window_events(
        &mut self,
        _: &Context,
        _: &mut LoadReport,
        _: &WindowEvent,
    ) -> Out<SceneEvent> {
        // Orbit input is consumed by the camera controller
        Out::Empty
    }

    fn on_custom_events(
        &mut self,
        ctx: &Context,
        state: &mut LoadReport,
        event: SceneEvent,
    ) -> Option<SceneEvent> {
        match event {
            SceneEvent::TextureLoaded(result) => {
                state.record(AssetKind::Texture, &result);
                if let Ok(texture) = result {
                    self.apply_texture(ctx, texture);
                }
            }
            SceneEvent::ModelLoaded(result) => {
                let transform = self.state.model_transform().clone();
                let result = result.map(|model| MeshNode::new(&ctx.device, model, &transform));
                settle_model(&mut self.state, state, result);
            }
        }
        if state.is_settled() {
            log::info!(
                "Asset loading finished: texture {}, model {}",
                state.status(AssetKind::Texture),
                state.status(AssetKind::Model)
            );
        }
        None
    }

    fn on_render(&self) -> Render<'_> {
        (&self.state.scene).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(path: &str) -> AssetError {
        AssetError::fetch(path, std::io::Error::from(std::io::ErrorKind::NotFound))
    }

    #[test]
    fn report_starts_pending() {
        let report = LoadReport::default();
        assert_eq!(report.status(AssetKind::Texture), &LoadStatus::Pending);
        assert_eq!(report.status(AssetKind::Model), &LoadStatus::Pending);
        assert!(!report.is_settled());
    }

    #[test]
    fn failed_model_leaves_the_slot_empty() {
        let mut state: SceneState<()> = SceneState::new(&SceneConfig::default(), |_, _| ());
        let mut report = LoadReport::default();

        let attached = settle_model(&mut state, &mut report, Err(missing("lobster.obj")));
        assert_eq!(attached, None);
        assert!(state.lobster.is_none());
        assert!(matches!(&report.model, LoadStatus::Failed(reason) if reason.contains("lobster.obj")));

        // The scene keeps animating without the model
        state.animate(Duration::from_secs(1));
        assert_eq!(state.scene.len(), 5);
    }

    #[test]
    fn loaded_model_is_attached() {
        let mut state: SceneState<()> = SceneState::new(&SceneConfig::default(), |_, _| ());
        let mut report = LoadReport::default();

        let attached = settle_model(&mut state, &mut report, Ok(()));
        assert_eq!(attached, state.lobster);
        assert!(attached.is_some());
        assert_eq!(report.model, LoadStatus::Loaded);

        report.record::<()>(AssetKind::Texture, &Err(missing("images/disco2.jpg")));
        assert!(report.is_settled());
        assert!(report.texture.to_string().starts_with("failed: could not fetch"));
    }
}
