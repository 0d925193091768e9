//! Execution of [`Command`]s for one output
//!
//! [`Output`] pairs an [`OutputSession`] with the protocol side of the output,
//! an [`OutputBackend`], and turns the commands returned by the session into
//! requests. [`WaylandOutput`] is the backend talking to the compositor.

use std::fmt;

use tracing::{debug, trace, warn};
use wayland_client::{
    protocol::{
        wl_output::{self, WlOutput},
        wl_shm,
        wl_surface::WlSurface,
    },
    Connection, Dispatch, Proxy, QueueHandle,
};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::Layer,
    zwlr_layer_surface_v1::{self, Anchor, ZwlrLayerSurfaceV1},
};

use super::{Globals, SetrootState};
use crate::{
    pattern::PatternConfig,
    render::{render, Canvas},
    session::{Command, OutputSession, SessionEvent},
    shm::PixelBuffer,
    utils::{Physical, Serial, Size},
};

/// Namespace of the layer surfaces
const NAMESPACE: &str = "wallpaper";

/// Do not reserve space and do not get moved by other exclusive zones
const EXCLUSIVE_ZONE_DONT_CARE: i32 = -1;

/// Protocol objects of one output
///
/// Requests made without a surface are dropped, the session decides when a
/// surface exists.
pub(super) trait OutputBackend {
    /// Shared state some requests need
    type Context<'a>;
    /// Pixel memory the surface is presented with
    type Buffer: Canvas + fmt::Debug;

    /// Version of the bound `wl_output`
    fn version(&self) -> u32;
    /// Creates the surface and its background layer surface, then commits
    fn request_surface(&mut self, name: u32, ctx: &Self::Context<'_>);
    /// Destroys the layer surface, then the surface
    fn release_surface(&mut self);
    fn create_buffer(&mut self, size: Size<u32, Physical>, ctx: &Self::Context<'_>) -> Option<Self::Buffer>;
    fn destroy_buffer(&mut self, buffer: Self::Buffer);
    fn ack_configure(&mut self, serial: Serial);
    fn set_buffer_scale(&mut self, scale: i32);
    fn attach(&mut self, buffer: &Self::Buffer);
    /// Damages the whole buffer of `size` device pixels
    fn damage(&mut self, size: Size<u32, Physical>, scale: i32);
    fn commit(&mut self);
    fn release_output(&mut self);
}

/// An output along with everything created for it
#[derive(Debug)]
pub(super) struct Output<B: OutputBackend> {
    session: OutputSession,
    backend: B,
    buffer: Option<B::Buffer>,
}

impl<B: OutputBackend> Output<B> {
    pub(super) fn new(backend: B, name: u32) -> Output<B> {
        Output {
            session: OutputSession::new(name),
            backend,
            buffer: None,
        }
    }

    pub(super) fn name(&self) -> u32 {
        self.session.name()
    }

    pub(super) fn version(&self) -> u32 {
        self.backend.version()
    }

    #[cfg(test)]
    pub(super) fn session(&self) -> &OutputSession {
        &self.session
    }

    #[cfg(test)]
    pub(super) fn backend(&self) -> &B {
        &self.backend
    }

    pub(super) fn handle(&mut self, event: SessionEvent, config: &PatternConfig, ctx: &B::Context<'_>) {
        let commands = self.session.handle(event);
        self.execute(commands, config, ctx);
    }

    /// Releases everything, the output must not be used afterwards
    pub(super) fn teardown(&mut self, config: &PatternConfig, ctx: &B::Context<'_>) {
        let commands = self.session.teardown();
        self.execute(commands, config, ctx);
    }

    fn execute(&mut self, commands: Vec<Command>, config: &PatternConfig, ctx: &B::Context<'_>) {
        for command in commands {
            trace!(output = self.name(), ?command, "Executing");
            match command {
                Command::RequestSurface => self.backend.request_surface(self.session.name(), ctx),
                Command::ReleaseSurface => self.backend.release_surface(),
                Command::DestroyBuffer => {
                    if let Some(buffer) = self.buffer.take() {
                        self.backend.destroy_buffer(buffer);
                    }
                }
                Command::AllocateBuffer(size) => match self.backend.create_buffer(size, ctx) {
                    Some(buffer) => self.buffer = Some(buffer),
                    None => {
                        // nothing left to render into, the configure stays unacknowledged
                        self.session.allocation_failed();
                        return;
                    }
                },
                Command::Render => {
                    if let Some(buffer) = self.buffer.as_mut() {
                        render(buffer, config);
                    }
                }
                Command::Present { serial, scale } => self.present(serial, scale),
                Command::ReleaseOutput => self.backend.release_output(),
            }
        }
    }

    fn present(&mut self, serial: Serial, scale: i32) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let size = buffer.size();

        self.backend.ack_configure(serial);
        self.backend.set_buffer_scale(scale);
        self.backend.attach(buffer);
        self.backend.damage(size, scale);
        self.backend.commit();

        debug!(output = self.name(), %size, scale, "Presented wallpaper");
    }
}

/// What the Wayland requests of an output need besides the output itself
pub(super) struct ProtocolContext<'a> {
    pub(super) globals: &'a Globals,
    pub(super) qh: &'a QueueHandle<SetrootState>,
}

/// An output of the compositor
#[derive(Debug)]
pub(super) struct WaylandOutput {
    output: WlOutput,
    surface: Option<WlSurface>,
    layer_surface: Option<ZwlrLayerSurfaceV1>,
}

impl WaylandOutput {
    pub(super) fn new(output: WlOutput) -> WaylandOutput {
        WaylandOutput {
            output,
            surface: None,
            layer_surface: None,
        }
    }
}

impl OutputBackend for WaylandOutput {
    type Context<'a> = ProtocolContext<'a>;
    type Buffer = PixelBuffer;

    fn version(&self) -> u32 {
        self.output.version()
    }

    fn request_surface(&mut self, name: u32, ctx: &ProtocolContext<'_>) {
        let (Some(compositor), Some(layer_shell)) = (&ctx.globals.compositor, &ctx.globals.layer_shell) else {
            warn!(output = name, "Cannot create a layer surface before the globals are bound");
            return;
        };

        let surface = compositor.create_surface(ctx.qh, ());
        // an empty input region lets every click through to the surfaces above
        let region = compositor.create_region(ctx.qh, ());
        surface.set_input_region(Some(&region));
        region.destroy();

        let layer_surface = layer_shell.get_layer_surface(
            &surface,
            Some(&self.output),
            Layer::Background,
            NAMESPACE.to_owned(),
            ctx.qh,
            name,
        );
        layer_surface.set_size(0, 0);
        layer_surface.set_anchor(Anchor::Top | Anchor::Bottom | Anchor::Left | Anchor::Right);
        layer_surface.set_exclusive_zone(EXCLUSIVE_ZONE_DONT_CARE);
        surface.commit();

        debug!(output = name, "Requested background layer surface");
        self.surface = Some(surface);
        self.layer_surface = Some(layer_surface);
    }

    fn release_surface(&mut self) {
        if let Some(layer_surface) = self.layer_surface.take() {
            layer_surface.destroy();
        }
        if let Some(surface) = self.surface.take() {
            surface.destroy();
        }
    }

    fn create_buffer(&mut self, size: Size<u32, Physical>, ctx: &ProtocolContext<'_>) -> Option<PixelBuffer> {
        let Some(shm) = &ctx.globals.shm else {
            warn!(%size, "Cannot allocate a buffer without wl_shm");
            return None;
        };

        PixelBuffer::create(shm, ctx.qh, size, wl_shm::Format::Argb8888)
            .map_err(|err| warn!(%size, ?err, "Failed to allocate pixel buffer"))
            .ok()
    }

    fn destroy_buffer(&mut self, mut buffer: PixelBuffer) {
        buffer.destroy();
    }

    fn ack_configure(&mut self, serial: Serial) {
        if let Some(layer_surface) = &self.layer_surface {
            layer_surface.ack_configure(serial.into());
        }
    }

    fn set_buffer_scale(&mut self, scale: i32) {
        match &self.surface {
            Some(surface) if surface.version() >= 3 => surface.set_buffer_scale(scale),
            _ => {}
        }
    }

    fn attach(&mut self, buffer: &PixelBuffer) {
        if let (Some(surface), Some(wl_buffer)) = (&self.surface, buffer.wl_buffer()) {
            surface.attach(Some(wl_buffer), 0, 0);
        }
    }

    fn damage(&mut self, size: Size<u32, Physical>, scale: i32) {
        let Some(surface) = &self.surface else {
            return;
        };
        if surface.version() >= 4 {
            surface.damage_buffer(0, 0, size.w as i32, size.h as i32);
        } else {
            surface.damage(0, 0, size.w as i32 / scale, size.h as i32 / scale);
        }
    }

    fn commit(&mut self) {
        if let Some(surface) = &self.surface {
            surface.commit();
        }
    }

    fn release_output(&mut self) {
        if self.output.version() >= 3 {
            self.output.release();
        }
    }
}

impl Dispatch<WlOutput, u32> for SetrootState {
    fn event(
        state: &mut Self,
        _: &WlOutput,
        event: wl_output::Event,
        name: &u32,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let event = match event {
            wl_output::Event::Scale { factor } => SessionEvent::Scale(factor),
            wl_output::Event::Done => SessionEvent::Done,
            _ => return,
        };
        state.output_event(*name, event, qh);
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, u32> for SetrootState {
    fn event(
        state: &mut Self,
        _: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        name: &u32,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let event = match event {
            zwlr_layer_surface_v1::Event::Configure { serial, width, height } => SessionEvent::Configure {
                serial: serial.into(),
                size: (width, height).into(),
            },
            zwlr_layer_surface_v1::Event::Closed => SessionEvent::Closed,
            _ => return,
        };
        state.output_event(*name, event, qh);
    }
}
