//! Wayland client side
//!
//! [`run`] connects to the compositor, binds `wl_compositor`, `wl_shm` and
//! `zwlr_layer_shell_v1` once each, and follows every `wl_output` the registry
//! advertises. Each output gets a background layer surface showing the
//! configured pattern until the output goes away or the connection is lost.
//!
//! Two roundtrips happen before the steady loop: the first one binds the
//! globals, the second one lets the outputs that already exist describe
//! themselves.

use std::{
    env,
    ffi::OsString,
    io,
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
};

use tracing::{debug, error, info, instrument};
use wayland_client::{
    delegate_noop,
    protocol::{
        wl_buffer::WlBuffer,
        wl_compositor::WlCompositor,
        wl_output::WlOutput,
        wl_region::WlRegion,
        wl_registry::{self, WlRegistry},
        wl_shm::WlShm,
        wl_shm_pool::WlShmPool,
        wl_surface::WlSurface,
    },
    ConnectError, Connection, Dispatch, DispatchError, EventQueue, Proxy, QueueHandle,
};
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;

use crate::{pattern::PatternConfig, session::SessionEvent};

mod output;
mod registry;

use self::{
    output::{Output, ProtocolContext, WaylandOutput},
    registry::{bind_once, Outputs},
};

const COMPOSITOR_VERSION: u32 = 4;
const SHM_VERSION: u32 = 1;
const LAYER_SHELL_VERSION: u32 = 1;
const OUTPUT_VERSION: u32 = 4;

/// Errors that stop the wallpaper client
#[derive(Debug, thiserror::Error)]
pub enum SetrootError {
    /// No compositor could be reached through the environment
    #[error("failed to connect to the Wayland display")]
    Connect(#[from] ConnectError),
    /// A relative display name was given but `XDG_RUNTIME_DIR` is unset
    #[error("XDG_RUNTIME_DIR is not set, cannot locate display {0}")]
    NoRuntimeDir(String),
    /// The display socket could not be opened
    #[error("failed to open Wayland socket {}", .path.display())]
    Socket {
        /// Path of the socket
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// The compositor does not advertise a required global
    #[error("compositor does not support {0}")]
    MissingGlobal(&'static str),
    /// The connection failed before the outputs were set up
    #[error("Wayland protocol error")]
    Dispatch(#[from] DispatchError),
}

/// Globals shared by every output
#[derive(Debug, Default)]
struct Globals {
    compositor: Option<WlCompositor>,
    shm: Option<WlShm>,
    layer_shell: Option<ZwlrLayerShellV1>,
}

impl Globals {
    fn check(&self) -> Result<(), SetrootError> {
        if self.compositor.is_none() {
            return Err(SetrootError::MissingGlobal(WlCompositor::interface().name));
        }
        if self.shm.is_none() {
            return Err(SetrootError::MissingGlobal(WlShm::interface().name));
        }
        if self.layer_shell.is_none() {
            return Err(SetrootError::MissingGlobal(ZwlrLayerShellV1::interface().name));
        }
        Ok(())
    }
}

/// State of the event queue
#[derive(Debug)]
pub(crate) struct SetrootState {
    globals: Globals,
    outputs: Outputs<WaylandOutput>,
    config: PatternConfig,
    running: bool,
}

impl SetrootState {
    fn new(config: PatternConfig) -> SetrootState {
        SetrootState {
            globals: Globals::default(),
            outputs: Outputs::new(),
            config,
            running: true,
        }
    }

    fn output_event(&mut self, name: u32, event: SessionEvent, qh: &QueueHandle<Self>) {
        let ctx = ProtocolContext {
            globals: &self.globals,
            qh,
        };
        self.outputs.event(name, event, &self.config, &ctx);
    }

    fn global_added(&mut self, registry: &WlRegistry, name: u32, interface: &str, version: u32, qh: &QueueHandle<Self>) {
        if interface == WlCompositor::interface().name {
            bind_once(&mut self.globals.compositor, interface, name, || {
                bind(registry, name, version.min(COMPOSITOR_VERSION), qh)
            });
        } else if interface == WlShm::interface().name {
            bind_once(&mut self.globals.shm, interface, name, || {
                bind(registry, name, version.min(SHM_VERSION), qh)
            });
        } else if interface == ZwlrLayerShellV1::interface().name {
            bind_once(&mut self.globals.layer_shell, interface, name, || {
                bind(registry, name, version.min(LAYER_SHELL_VERSION), qh)
            });
        } else if interface == WlOutput::interface().name {
            let wl_output = registry.bind::<WlOutput, _, _>(name, version.min(OUTPUT_VERSION), qh, name);
            let ctx = ProtocolContext {
                globals: &self.globals,
                qh,
            };
            self.outputs
                .add(Output::new(WaylandOutput::new(wl_output), name), &self.config, &ctx);
        }
    }

    fn global_removed(&mut self, name: u32, qh: &QueueHandle<Self>) {
        let ctx = ProtocolContext {
            globals: &self.globals,
            qh,
        };
        self.outputs.remove(name, &self.config, &ctx);
    }

    /// Releases every output, then the shared globals
    fn teardown(&mut self, qh: &QueueHandle<Self>) {
        let ctx = ProtocolContext {
            globals: &self.globals,
            qh,
        };
        self.outputs.clear(&self.config, &ctx);

        if let Some(layer_shell) = self.globals.layer_shell.take() {
            if layer_shell.version() >= 3 {
                layer_shell.destroy();
            }
        }
        // neither wl_shm version 1 nor wl_compositor have a destructor
        self.globals.shm = None;
        self.globals.compositor = None;
    }
}

fn bind<I>(registry: &WlRegistry, name: u32, version: u32, qh: &QueueHandle<SetrootState>) -> I
where
    I: Proxy + 'static,
    SetrootState: Dispatch<I, ()>,
{
    let proxy = registry.bind::<I, _, _>(name, version, qh, ());
    debug!(interface = I::interface().name, version = proxy.version(), "Bound global");
    proxy
}

impl Dispatch<WlRegistry, ()> for SetrootState {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => state.global_added(registry, name, &interface, version, qh),
            wl_registry::Event::GlobalRemove { name } => state.global_removed(name, qh),
            _ => {}
        }
    }
}

delegate_noop!(SetrootState: WlCompositor);
delegate_noop!(SetrootState: WlRegion);
delegate_noop!(SetrootState: WlShmPool);
delegate_noop!(SetrootState: ZwlrLayerShellV1);
delegate_noop!(SetrootState: ignore WlShm);
delegate_noop!(SetrootState: ignore WlSurface);
delegate_noop!(SetrootState: ignore WlBuffer);

/// Resolves a display name the way libwayland does
///
/// Absolute names are used as is, anything else is relative to `runtime_dir`.
fn socket_path(display: &str, runtime_dir: Option<OsString>) -> Result<PathBuf, SetrootError> {
    if Path::new(display).is_absolute() {
        return Ok(PathBuf::from(display));
    }
    let runtime_dir = runtime_dir.ok_or_else(|| SetrootError::NoRuntimeDir(display.to_owned()))?;
    Ok(Path::new(&runtime_dir).join(display))
}

fn connect(display: Option<&str>) -> Result<Connection, SetrootError> {
    let Some(display) = display else {
        return Ok(Connection::connect_to_env()?);
    };

    let path = socket_path(display, env::var_os("XDG_RUNTIME_DIR"))?;
    let stream = UnixStream::connect(&path).map_err(|source| SetrootError::Socket {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "Connected to Wayland socket");
    Ok(Connection::from_socket(stream)?)
}

fn startup(state: &mut SetrootState, event_queue: &mut EventQueue<SetrootState>) -> Result<(), SetrootError> {
    event_queue.roundtrip(state)?;
    state.globals.check()?;
    event_queue.roundtrip(state)?;
    Ok(())
}

/// Shows `config` on every output of the compositor until the connection ends
///
/// `socket` overrides `$WAYLAND_DISPLAY`. Losing the connection once the
/// outputs are set up is a normal exit.
#[instrument(level = "debug", skip(config))]
pub fn run(config: PatternConfig, socket: Option<&str>) -> Result<(), SetrootError> {
    let connection = connect(socket)?;
    let mut event_queue = connection.new_event_queue::<SetrootState>();
    let qh = event_queue.handle();
    let _registry = connection.display().get_registry(&qh, ());

    let mut state = SetrootState::new(config);
    let result = startup(&mut state, &mut event_queue);

    if result.is_ok() {
        info!(outputs = state.outputs.len(), "Wallpaper client running");
        while state.running {
            if let Err(err) = event_queue.blocking_dispatch(&mut state) {
                error!(?err, "Connection to the compositor lost");
                break;
            }
        }
    }

    state.teardown(&qh);
    if let Err(err) = connection.flush() {
        debug!(?err, "Failed to flush teardown requests");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::{ffi::OsString, path::PathBuf};

    use super::{run, socket_path, Globals, SetrootError};
    use crate::pattern::PatternConfig;

    #[test]
    fn relative_display_is_under_runtime_dir() {
        let path = socket_path("wayland-1", Some(OsString::from("/run/user/1000"))).unwrap();
        assert_eq!(path, PathBuf::from("/run/user/1000/wayland-1"));
    }

    #[test]
    fn absolute_display_is_used_as_is() {
        let path = socket_path("/tmp/wayland-test", None).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/wayland-test"));
    }

    #[test]
    fn relative_display_needs_runtime_dir() {
        assert!(matches!(
            socket_path("wayland-0", None),
            Err(SetrootError::NoRuntimeDir(name)) if name == "wayland-0"
        ));
    }

    #[test]
    fn unreachable_socket_is_reported() {
        let socket = "/nonexistent/wlrsetroot-wayland-0";
        assert!(matches!(
            run(PatternConfig::default(), Some(socket)),
            Err(SetrootError::Socket { path, .. }) if path == PathBuf::from(socket)
        ));
    }

    #[test]
    fn missing_globals_are_named() {
        assert!(matches!(
            Globals::default().check(),
            Err(SetrootError::MissingGlobal("wl_compositor"))
        ));
    }
}
