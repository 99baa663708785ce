use std::sync::Arc;

use anyhow::Context as _;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    camera::{Camera, CameraResources, OrbitController, Projection},
    data_structures::{scene_graph::DirectionalLight, texture},
    pipelines::{light::LightResources, phong::mk_phong_pipeline},
};

/// Anything that mirrors CPU-side state into GPU buffers once per frame.
pub trait BufferWriter {
    fn write_to_buffer(&mut self, ctx: &Context);
}

/// A size in physical pixels, either of the surface's backing buffer or of the
/// area the window/canvas is displayed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimised windows and collapsed canvases report a zero dimension.
    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// The size a backing buffer of size `self` has to be reconfigured to, if
    /// the display shows it at `displayed`.
    pub fn resize_to(&self, displayed: Viewport) -> Option<Viewport> {
        (displayed.is_drawable() && displayed != *self).then_some(displayed)
    }
}

/// Decides the size the backing buffer has to take when the window is shown at
/// `displayed`, and points `projection` at the new aspect ratio.
///
/// `backing` is `None` while the surface has never been configured. Returns
/// `None` when nothing has to change.
pub fn fit(
    projection: &mut Projection,
    backing: Option<Viewport>,
    displayed: Viewport,
) -> Option<Viewport> {
    let target = match backing {
        Some(backing) => backing.resize_to(displayed),
        None => displayed.is_drawable().then_some(displayed),
    }?;
    projection.set_aspect(target.aspect());
    Some(target)
}

impl From<PhysicalSize<u32>> for Viewport {
    fn from(size: PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// The GPU context: surface, device, shared uniforms and the lit pipeline.
///
/// Flows may adjust it in `on_init`, e.g. to place the camera or set the lights.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub(crate) is_surface_configured: bool,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub pipeline: wgpu::RenderPipeline,
    pub clear_colour: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Could not create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No graphics adapter can present to the window")?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("Could not open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour and relies on an sRGB surface for the
        // transfer function, otherwise everything comes out darker.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("The surface supports no texture format")?;
        if !surface_format.is_srgb() {
            log::warn!("No sRGB surface available, colours will look darker");
        }
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        // Flows are expected to place the camera in `on_init`
        let projection =
            Projection::new(config.width, config.height, cgmath::Deg(45.0), 0.1, 100.0);
        let camera = CameraResources::new(
            &device,
            Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0)),
            &projection,
            OrbitController::new(0.005, 0.05),
        );
        let light = LightResources::new(&device, &[]);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );
        let pipeline = mk_phong_pipeline(
            &device,
            config.format,
            &camera.bind_group_layout,
            &light.bind_group_layout,
        );

        Ok(Self {
            window,
            depth_texture,
            is_surface_configured: false,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            pipeline,
            clear_colour: wgpu::Color::BLACK,
        })
    }

    /// Size of the surface's backing buffer.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.config.width, self.config.height)
    }

    pub fn set_lights(&mut self, lights: &[DirectionalLight]) {
        self.light.set_lights(&self.queue, lights);
    }

    /// Reconfigures the surface when the window is displayed at a size other
    /// than the backing buffer's. Returns whether anything changed.
    pub(crate) fn fit_to_window(&mut self) -> bool {
        let displayed = Viewport::from(self.window.inner_size());
        let backing = self.is_surface_configured.then(|| self.viewport());
        match fit(&mut self.projection, backing, displayed) {
            Some(size) => {
                self.resize(size);
                true
            }
            None => false,
        }
    }

    pub(crate) fn resize(&mut self, size: Viewport) {
        if !size.is_drawable() {
            return;
        }
        log::debug!("Resizing surface to {}x{}", size.width, size.height);
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
        self.is_surface_configured = true;
        self.depth_texture = texture::Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            "depth_texture",
        );
    }
}

/// The part of the [`Context`] that flow constructors get to see while the
/// engine is still starting up.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        // Device and Queue are reference counted internally
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection(width: u32, height: u32) -> Projection {
        Projection::new(width, height, cgmath::Deg(45.0), 0.1, 100.0)
    }

    #[test]
    fn fitting_to_a_larger_display_updates_the_camera_aspect() {
        let mut projection = projection(300, 150);
        let target = fit(
            &mut projection,
            Some(Viewport::new(300, 150)),
            Viewport::new(800, 600),
        );
        assert_eq!(target, Some(Viewport::new(800, 600)));
        assert!((projection.aspect() - 1.3333).abs() < 1e-4);
    }

    #[test]
    fn fitting_twice_changes_nothing_the_second_time() {
        let mut projection = projection(300, 150);
        let displayed = Viewport::new(800, 600);
        let backing = fit(&mut projection, Some(Viewport::new(300, 150)), displayed);
        let aspect = projection.aspect();
        assert_eq!(fit(&mut projection, backing, displayed), None);
        assert_eq!(projection.aspect(), aspect);
    }

    #[test]
    fn fitting_to_a_collapsed_display_keeps_the_aspect() {
        let mut projection = projection(800, 600);
        let backing = Some(Viewport::new(800, 600));
        assert_eq!(fit(&mut projection, backing, Viewport::new(0, 600)), None);
        assert_eq!(fit(&mut projection, None, Viewport::new(800, 0)), None);
        assert!((projection.aspect() - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn first_fit_configures_even_at_the_initial_size() {
        let mut projection = projection(1, 1);
        let target = fit(&mut projection, None, Viewport::new(640, 480));
        assert_eq!(target, Some(Viewport::new(640, 480)));
        assert!((projection.aspect() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn differing_display_size_triggers_resize() {
        let backing = Viewport::new(300, 150);
        let displayed = Viewport::new(800, 600);
        let target = backing.resize_to(displayed).unwrap();
        assert_eq!(target, displayed);
        assert!((target.aspect() - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn resize_is_idempotent() {
        let displayed = Viewport::new(800, 600);
        let backing = Viewport::new(300, 150).resize_to(displayed).unwrap();
        assert_eq!(backing.resize_to(displayed), None);
    }

    #[test]
    fn zero_sized_display_is_skipped() {
        let backing = Viewport::new(800, 600);
        assert_eq!(backing.resize_to(Viewport::new(0, 600)), None);
        assert_eq!(backing.resize_to(Viewport::new(800, 0)), None);
        assert_eq!(Viewport::new(0, 0).aspect(), 0.0);
    }
}
