//! Flow control and application event loop.
//!
//! A "flow" represents a scene that handles user input, updates its state and
//! provides renderable objects each frame. The engine owns the window, the GPU
//! [`Context`] and a list of flows, and drives them from winit's event loop.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<S, E>`] is the trait for scenes that handle events and rendering
//! - [`Out<E>`] is the output type for async work started by a flow
//! - [`FlowConstructor<S, E>`] builds a flow once the GPU is available
//!
//! # Lifecycle Flow
//!
//! Every redraw does, in order:
//! 1. Reconfigure the surface if the window is displayed at a different size
//! 2. Hand the events of futures that resolved since the last frame to `on_custom_events`
//! 3. Call `on_update` on all flows with the time since the previous frame
//! 4. Apply orbit input to the camera and upload it
//! 5. Collect `on_render` from all flows and draw them with the lit pipeline
//! 6. Present the frame and request the next one

use std::{iter, pin::Pin, sync::Arc};

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};
#[cfg(target_arch = "wasm32")]
use winit::event_loop::EventLoopProxy;

use crate::{
    context::{Context, InitContext},
    data_structures::model::DrawModel,
    render::{Instanced, Render},
};

/// `Send` on native targets, where flow futures run on the tokio thread pool.
/// The web build is single threaded and asks for nothing.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSend: Send {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send> MaybeSend for T {}
#[cfg(target_arch = "wasm32")]
pub trait MaybeSend {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSend for T {}

/// A future started by a flow that resolves to one of its events.
#[cfg(not(target_arch = "wasm32"))]
pub type EventFuture<E> = Pin<Box<dyn Future<Output = E> + Send>>;
#[cfg(target_arch = "wasm32")]
pub type EventFuture<E> = Pin<Box<dyn Future<Output = E>>>;

/// The output type of every lifecycle hook that may start asynchronous work.
///
/// `Out::FutEvent` starts futures of events. Every future runs on its own: on
/// native targets it is spawned onto the engine's tokio runtime, on the web
/// onto the browser's task queue. Neither blocks the event loop. As soon as
/// a future resolves its event is queued and handed to
/// [`GraphicsFlow::on_custom_events`] at the start of the next frame,
/// independently of the other futures.
///
/// `Empty` is the default output used when there is nothing to wait for.
pub enum Out<E> {
    FutEvent(Vec<EventFuture<E>>),
    Empty,
}

impl<E> Default for Out<E> {
    fn default() -> Self {
        Self::Empty
    }
}

/// Events of resolved flow futures, waiting to be dispatched.
pub(crate) struct EventQueue<E> {
    sender: UnboundedSender<E>,
    receiver: UnboundedReceiver<E>,
}

impl<E: MaybeSend + 'static> EventQueue<E> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Starts every future of `out` on its own task.
    pub(crate) fn spawn(
        &self,
        #[cfg(not(target_arch = "wasm32"))] async_runtime: &tokio::runtime::Runtime,
        out: Out<E>,
    ) {
        let Out::FutEvent(futures) = out else {
            return;
        };
        for future in futures {
            let sender = self.sender.clone();
            let task = async move {
                let event = future.await;
                if sender.unbounded_send(event).is_err() {
                    log::warn!("Event loop was closed before the event could be processed");
                }
            };
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime.spawn(task);
            #[cfg(target_arch = "wasm32")]
            wasm_bindgen_futures::spawn_local(task);
        }
    }

    /// The next event whose future has resolved, if any.
    pub(crate) fn try_next(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }
}

/// Trait for implementing a renderable scene.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once when the flow is created; configure the context (camera, lights, clear colour)
/// 2. `on_window_events()` is called for each winit window event
/// 3. `on_update()` is called every frame
/// 4. `on_custom_events()` is called for events produced by [`Out::FutEvent`]
/// 5. `on_render()` is called each frame and specifies how to render `self`
pub trait GraphicsFlow<S, E> {
    /// Initialize the flow and configure the context.
    ///
    /// This is the only place to modify the Context and configure things such as the
    /// background colour, the camera or the lights.
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out<E>;

    /// Update state every frame.
    ///
    /// `dt` is the time since the previous frame.
    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out<E>;

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, ctx: &Context, state: &mut S, event: &WindowEvent) -> Out<E>;

    /// Handle custom application events.
    ///
    /// Returns the event if it was not consumed, allowing it to be passed to
    /// the next flow. Returning `None` means the event was consumed.
    fn on_custom_events(&mut self, ctx: &Context, state: &mut S, event: E) -> Option<E>;

    /// Return renderable objects for this flow.
    fn on_render(&self) -> Render<'_>;
}

/// Type alias for a flow constructor (factory function).
///
/// A flow constructor takes an `InitContext` and asynchronously returns a
/// boxed `GraphicsFlow`. This allows GPU resources to be created before the
/// first frame.
pub type FlowConstructor<S, E> =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow<S, E>>>>>>;

/// Outcome of trying to draw one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Presented,
    /// Nothing to draw into yet, or the window is hidden.
    Skipped,
    /// The surface no longer matches the window and must be configured again.
    Outdated,
    Failed,
}

/// GPU context plus the state shared between flows.
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
}

impl<State> AppState<State> {
    fn render<Event>(
        &mut self,
        graphics_flows: &[Box<dyn GraphicsFlow<State, Event>>],
    ) -> Frame {
        // Rendering requires the surface to be configured
        if !self.ctx.is_surface_configured {
            return Frame::Skipped;
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(frame) => frame,
            // Still presentable, a changed size is caught by the next size check
            wgpu::CurrentSurfaceTexture::Suboptimal(frame) => frame,
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                return Frame::Skipped;
            }
            wgpu::CurrentSurfaceTexture::Outdated | wgpu::CurrentSurfaceTexture::Lost => {
                return Frame::Outdated;
            }
            wgpu::CurrentSurfaceTexture::Validation => return Frame::Failed,
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            let mut basics: Vec<Instanced> = Vec::new();
            graphics_flows
                .iter()
                .for_each(|flow| flow.on_render().collect_into(&mut basics));

            render_pass.set_pipeline(&self.ctx.pipeline);
            for instanced in basics {
                if instanced.amount == 0 || instanced.instance.size() == 0 {
                    log::warn!("you attemted to render something with zero instances");
                    continue;
                }
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.draw_model_instanced(
                    instanced.model,
                    0..instanced.amount as u32,
                    &self.ctx.camera.bind_group,
                    &self.ctx.light.bind_group,
                );
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Frame::Presented
    }
}

pub struct App<State: 'static, Event: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg(target_arch = "wasm32")]
    proxy: EventLoopProxy<FlowEvent<State, Event>>,
    events: EventQueue<Event>,
    state: Option<AppState<State>>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    // Taken on the first `resumed`
    constructors: Option<Vec<FlowConstructor<State, Event>>>,
    last_time: Instant,
}

impl<State, Event> App<State, Event>
where
    State: 'static,
    Event: MaybeSend + 'static,
{
    fn new(
        #[allow(unused_variables)] event_loop: &EventLoop<FlowEvent<State, Event>>,
        constructors: Vec<FlowConstructor<State, Event>>,
    ) -> anyhow::Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            #[cfg(target_arch = "wasm32")]
            proxy: event_loop.create_proxy(),
            events: EventQueue::new(),
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            last_time: Instant::now(),
        })
    }

    /// Hands the context to the flows and schedules the first frame.
    fn start(
        &mut self,
        mut app_state: AppState<State>,
        flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    ) {
        self.graphics_flows = flows;
        for flow in self.graphics_flows.iter_mut() {
            let out = flow.on_init(&mut app_state.ctx, &mut app_state.state);
            self.events.spawn(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                out,
            );
        }
        app_state.ctx.fit_to_window();
        app_state.ctx.window.request_redraw();
        self.last_time = Instant::now();
        self.state = Some(app_state);
    }
}

/// Hands every event to the flows in order until one consumes it.
fn dispatch<State, Event>(
    flows: &mut [Box<dyn GraphicsFlow<State, Event>>],
    app_state: &mut AppState<State>,
    event: Event,
) {
    let unconsumed = flows.iter_mut().fold(Some(event), |event, flow| {
        flow.on_custom_events(&app_state.ctx, &mut app_state.state, event?)
    });
    if unconsumed.is_some() {
        log::warn!("Custom event was not consumed by any flow");
    }
}

pub enum FlowEvent<State: 'static, Event: 'static> {
    // Only sent by the web build, where initialisation can't block
    #[allow(dead_code)]
    Initialized {
        state: AppState<State>,
        flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    },
}

impl<State: 'static + Default, Event: MaybeSend + 'static> ApplicationHandler<FlowEvent<State, Event>>
    for App<State, Event>
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructors) = self.constructors.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("lobster-scene");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "c";

            let canvas = wgpu::web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            match canvas {
                Some(canvas) => {
                    window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()))
                }
                None => log::warn!("No <canvas id=\"{CANVAS_ID}\"> found, appending a new one"),
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Could not create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        let init_future = async move {
            let ctx = Context::new(window).await?;
            let app_state = AppState {
                ctx,
                state: State::default(),
            };

            let flow_futures: Vec<_> = constructors
                .into_iter()
                // The clone in into() leverages the internal Arcs of Device and Queue and thus only clones the ref
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows: Vec<_> = futures::future::join_all(flow_futures).await;
            Ok::<_, anyhow::Error>((app_state, flows))
        };

        #[cfg(not(target_arch = "wasm32"))]
        match self.async_runtime.block_on(init_future) {
            Ok((app_state, flows)) => self.start(app_state, flows),
            Err(e) => {
                log::error!("App initialization failed: {e:#}");
                event_loop.exit();
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init_future.await {
                    Ok((state, flows)) => {
                        if proxy
                            .send_event(FlowEvent::Initialized { state, flows })
                            .is_err()
                        {
                            log::error!("The event loop closed during initialization");
                        }
                    }
                    Err(e) => log::error!("App initialization failed: {e:#}"),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent<State, Event>) {
        match event {
            FlowEvent::Initialized { state, flows } => {
                // This is the message from our wasm `spawn_local`
                self.start(state, flows);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.ctx.camera.controller.handle_window_events(&event);

        for flow in self.graphics_flows.iter_mut() {
            let out = flow.on_window_events(&state.ctx, &mut state.state, &event);
            self.events.spawn(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                out,
            );
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            // Picked up by the size check of the next frame
            WindowEvent::Resized(_) => state.ctx.window.request_redraw(),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                state.ctx.fit_to_window();

                while let Some(custom_event) = self.events.try_next() {
                    dispatch(&mut self.graphics_flows, state, custom_event);
                }

                for flow in self.graphics_flows.iter_mut() {
                    let out = flow.on_update(&state.ctx, &mut state.state, dt);
                    self.events.spawn(
                        #[cfg(not(target_arch = "wasm32"))]
                        &self.async_runtime,
                        out,
                    );
                }

                state
                    .ctx
                    .camera
                    .update(&state.ctx.queue, &state.ctx.projection);

                match state.render(&self.graphics_flows) {
                    Frame::Presented | Frame::Skipped => {}
                    // Reconfigure the surface if it's lost or outdated
                    Frame::Outdated => {
                        let size = state.ctx.viewport();
                        state.ctx.resize(size);
                    }
                    Frame::Failed => {
                        log::error!("Unable to render, acquiring the frame failed validation")
                    }
                }

                // The next frame is only scheduled once this one was submitted
                state.ctx.window.request_redraw();
            }
            _ => {}
        }
    }
}

/// Opens the window (or binds the canvas) and runs `constructors`' flows until
/// the window is closed.
pub fn run<State: 'static + Default, Event: MaybeSend + 'static>(
    constructors: Vec<FlowConstructor<State, Event>>,
) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            wgpu::web_sys::console::warn_1(&format!("Could not initialize logger: {e}").into());
        }
    }

    let event_loop: EventLoop<FlowEvent<State, Event>> = EventLoop::with_user_event().build()?;

    let mut app: App<State, Event> = App::new(&event_loop, constructors)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use futures::channel::oneshot;

    use super::*;

    fn next_event<E: MaybeSend + 'static>(queue: &mut EventQueue<E>) -> Option<E> {
        for _ in 0..500 {
            if let Some(event) = queue.try_next() {
                return Some(event);
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        None
    }

    #[test]
    fn fast_future_is_delivered_while_a_slow_one_is_pending() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut queue = EventQueue::new();
        let (finish_model, model_done) = oneshot::channel::<()>();

        let model = async move {
            let _ = model_done.await;
            "model"
        };
        let texture = async { "texture" };
        // Listed first, resolves last
        let out = Out::FutEvent(vec![
            Box::pin(model) as EventFuture<&'static str>,
            Box::pin(texture) as EventFuture<&'static str>,
        ]);
        queue.spawn(&runtime, out);

        assert_eq!(next_event(&mut queue), Some("texture"));
        assert_eq!(queue.try_next(), None);

        finish_model.send(()).unwrap();
        assert_eq!(next_event(&mut queue), Some("model"));
    }

    #[test]
    fn spawning_does_not_wait_for_the_futures() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut queue = EventQueue::new();
        let never = futures::future::pending::<u32>();
        let out = Out::FutEvent(vec![Box::pin(never) as EventFuture<u32>]);

        let started = std::time::Instant::now();
        queue.spawn(&runtime, out);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn empty_output_spawns_nothing() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut queue: EventQueue<u32> = EventQueue::new();
        queue.spawn(&runtime, Out::Empty);
        assert_eq!(queue.try_next(), None);
    }
}
