//! Per-output lifecycle
//!
//! An [`OutputSession`] follows one `wl_output` from its advertisement to its
//! removal. It does not touch the connection itself: every event is fed into
//! [`OutputSession::handle`], which updates the state and returns the
//! [`Command`]s the caller has to issue, in order.
//!
//! ```text
//! Discovered -> DescriptionPending -> SurfaceRequested -> Configured -> Closed
//! ```

use tracing::{debug, trace, warn};

use crate::utils::{Logical, Physical, Serial, Size};

/// Where an output currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Advertised by the registry, not bound yet
    Discovered,
    /// Bound, waiting for the server to finish describing the output
    DescriptionPending,
    /// Layer surface requested, waiting for the first usable configure
    SurfaceRequested,
    /// The server picked a size for the layer surface
    Configured {
        /// Negotiated size in surface coordinates
        size: Size<u32, Logical>,
        /// Serial of the configure being answered
        serial: Serial,
    },
    /// The layer surface was closed by the server
    Closed,
}

/// Something the server told us about an output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The `wl_output` global was bound
    Bound,
    /// `wl_output.scale`
    Scale(i32),
    /// `wl_output.done`
    Done,
    /// `zwlr_layer_surface_v1.configure`
    Configure {
        /// Serial to acknowledge
        serial: Serial,
        /// Proposed size, may be zero on either axis
        size: Size<u32, Logical>,
    },
    /// `zwlr_layer_surface_v1.closed`
    Closed,
}

/// A side effect requested by an [`OutputSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Create the surface and background layer surface, then commit
    RequestSurface,
    /// Destroy the layer surface, then the surface
    ReleaseSurface,
    /// Destroy the current pixel buffer, if any
    DestroyBuffer,
    /// Allocate a pixel buffer of the given device size
    AllocateBuffer(Size<u32, Physical>),
    /// Paint the pattern into the current pixel buffer
    Render,
    /// Acknowledge `serial`, then attach, damage and commit the buffer at `scale`
    Present {
        /// Configure serial to acknowledge
        serial: Serial,
        /// Buffer scale of the surface
        scale: i32,
    },
    /// Release the `wl_output`
    ReleaseOutput,
}

/// State of one output, independent of the Wayland connection
#[derive(Debug)]
pub struct OutputSession {
    name: u32,
    scale: i32,
    state: SessionState,
    last_serial: Option<Serial>,
    buffer_size: Option<Size<u32, Physical>>,
}

impl OutputSession {
    /// Creates the session of the output advertised as global `name`
    pub fn new(name: u32) -> OutputSession {
        OutputSession {
            name,
            scale: 1,
            state: SessionState::Discovered,
            last_serial: None,
            buffer_size: None,
        }
    }

    /// Registry name of the output
    pub fn name(&self) -> u32 {
        self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Integer scale last advertised by the output
    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Serial of the most recent configure, acknowledged or not
    pub fn last_serial(&self) -> Option<Serial> {
        self.last_serial
    }

    /// Device size of the buffer the session believes to be allocated
    pub fn buffer_size(&self) -> Option<Size<u32, Physical>> {
        self.buffer_size
    }

    /// Whether a surface has been requested and not released since
    pub fn has_surface(&self) -> bool {
        matches!(
            self.state,
            SessionState::SurfaceRequested | SessionState::Configured { .. }
        )
    }

    /// Feeds one event into the state machine
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        trace!(output = self.name, ?event, state = ?self.state, "Output event");

        if self.state == SessionState::Closed {
            debug!(output = self.name, ?event, "Ignoring event for closed output");
            return Vec::new();
        }

        match event {
            SessionEvent::Bound => {
                if self.state == SessionState::Discovered {
                    self.state = SessionState::DescriptionPending;
                }
                Vec::new()
            }
            SessionEvent::Scale(factor) => {
                // takes effect on the next configure
                self.scale = factor.max(1);
                Vec::new()
            }
            SessionEvent::Done => {
                if self.state != SessionState::DescriptionPending {
                    return Vec::new();
                }
                debug!(output = self.name, scale = self.scale, "Output described, requesting layer surface");
                self.state = SessionState::SurfaceRequested;
                vec![Command::RequestSurface]
            }
            SessionEvent::Configure { serial, size } => self.configure(serial, size),
            SessionEvent::Closed => {
                debug!(output = self.name, "Layer surface closed");
                let commands = self.release_commands();
                self.state = SessionState::Closed;
                commands
            }
        }
    }

    fn configure(&mut self, serial: Serial, size: Size<u32, Logical>) -> Vec<Command> {
        if !self.has_surface() {
            warn!(output = self.name, "Configure without a layer surface");
            return Vec::new();
        }

        self.last_serial = Some(serial);
        if size.is_empty() {
            warn!(output = self.name, %size, "Compositor proposed an empty layer surface");
            return Vec::new();
        }

        self.state = SessionState::Configured { size, serial };
        let device_size = size.to_physical(self.scale as u32);
        debug!(output = self.name, %size, %device_size, "Layer surface configured");

        let mut commands = Vec::with_capacity(4);
        if self.buffer_size != Some(device_size) {
            if self.buffer_size.take().is_some() {
                commands.push(Command::DestroyBuffer);
            }
            commands.push(Command::AllocateBuffer(device_size));
            self.buffer_size = Some(device_size);
        }
        commands.push(Command::Render);
        commands.push(Command::Present {
            serial,
            scale: self.scale,
        });
        commands
    }

    /// Tells the session its last [`Command::AllocateBuffer`] failed
    ///
    /// The next configure will try to allocate again.
    pub fn allocation_failed(&mut self) {
        self.buffer_size = None;
    }

    /// Commands releasing everything the session owns, in destruction order
    pub fn teardown(&mut self) -> Vec<Command> {
        let mut commands = self.release_commands();
        if self.state != SessionState::Discovered {
            commands.push(Command::ReleaseOutput);
        }
        self.state = SessionState::Closed;
        commands
    }

    fn release_commands(&mut self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(3);
        if self.has_surface() {
            commands.push(Command::ReleaseSurface);
        }
        if self.buffer_size.take().is_some() {
            commands.push(Command::DestroyBuffer);
        }
        commands
    }
}
