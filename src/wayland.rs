//! Wayland backend for the overlay
//!
//! Runs on a private event queue of the host's connection. Surfaces and
//! buffers created here are dispatched only when the overlay pumps its
//! queue, so the host's own dispatching is never disturbed.

use std::os::unix::io::BorrowedFd;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};
use wayland_client::{
    delegate_noop, event_created_child,
    protocol::{
        wl_buffer, wl_compositor, wl_registry, wl_subcompositor, wl_subsurface, wl_surface,
    },
    Connection, Dispatch, EventQueue, Proxy, QueueHandle,
};
use wayland_protocols::wp::linux_dmabuf::zv1::client::{
    zwp_linux_buffer_params_v1, zwp_linux_dmabuf_v1,
};

use crate::backend::{BoundGlobals, CreateOutcome, OverlayBackend};
use crate::driver::{HwdecContext, OverlayDriver};
use crate::error::{OverlayError, Result};
use crate::formats::FormatTable;
use crate::params::BufferRequest;

/// Driver presenting DRM-PRIME frames through linux-dmabuf
pub type DrmPrimeWayland = OverlayDriver<WaylandBackend>;

/// Handles the host hands over for the overlay's lifetime
#[derive(Clone)]
pub struct WaylandInteropParams {
    pub connection: Connection,
    pub compositor: wl_compositor::WlCompositor,
    /// The host's main surface; the video subsurface is parented to it
    pub surface: wl_surface::WlSurface,
}

impl WaylandInteropParams {
    pub fn new(
        connection: Connection,
        compositor: wl_compositor::WlCompositor,
        surface: wl_surface::WlSurface,
    ) -> Self {
        Self {
            connection,
            compositor,
            surface,
        }
    }
}

/// Host context for Wayland embedders
///
/// `params` is `None` when the host is not running on Wayland, in which
/// case the driver refuses to initialize.
#[derive(Clone, Default)]
pub struct WaylandHost {
    params: Option<WaylandInteropParams>,
}

impl WaylandHost {
    pub fn new(params: Option<WaylandInteropParams>) -> Self {
        Self { params }
    }
}

impl HwdecContext for WaylandHost {
    type Backend = WaylandBackend;

    fn overlay_backend(&self) -> Option<WaylandBackend> {
        self.params.clone().map(WaylandBackend::new)
    }
}

type CompletionSlot = Arc<OnceLock<CreateOutcome<wl_buffer::WlBuffer>>>;

pub struct WaylandBackend {
    conn: Connection,
    queue: EventQueue<WaylandState>,
    qh: QueueHandle<WaylandState>,
    state: WaylandState,
    compositor: wl_compositor::WlCompositor,
    parent: wl_surface::WlSurface,
    _registry: Option<wl_registry::WlRegistry>,
}

struct WaylandState {
    subcompositor: Option<wl_subcompositor::WlSubcompositor>,
    dmabuf: Option<zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1>,
    formats: FormatTable,
    released: Vec<wl_buffer::WlBuffer>,
}

impl WaylandBackend {
    pub fn new(params: WaylandInteropParams) -> Self {
        let queue = params.connection.new_event_queue();
        let qh = queue.handle();

        Self {
            conn: params.connection,
            queue,
            qh,
            state: WaylandState {
                subcompositor: None,
                dmabuf: None,
                formats: FormatTable::new(),
                released: Vec::new(),
            },
            compositor: params.compositor,
            parent: params.surface,
            _registry: None,
        }
    }

    fn dmabuf(&self) -> Result<&zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1> {
        self.state
            .dmabuf
            .as_ref()
            .ok_or_else(|| OverlayError::Protocol("zwp_linux_dmabuf_v1 is not bound".to_string()))
    }
}

impl OverlayBackend for WaylandBackend {
    type Surface = wl_surface::WlSurface;
    type Subsurface = wl_subsurface::WlSubsurface;
    type Buffer = wl_buffer::WlBuffer;

    fn discover_globals(&mut self) -> Result<BoundGlobals> {
        let registry = self.conn.display().get_registry(&self.qh, ());
        self._registry = Some(registry);
        self.queue.roundtrip(&mut self.state)?;

        // Format events follow the bind
        if self.state.dmabuf.is_some() {
            self.queue.roundtrip(&mut self.state)?;
            info!("DMA-BUF supported ({} formats)", self.state.formats.len());
        }

        Ok(BoundGlobals {
            subcompositor: self.state.subcompositor.is_some(),
            dmabuf: self.state.dmabuf.is_some(),
        })
    }

    fn formats(&self) -> &FormatTable {
        &self.state.formats
    }

    fn create_surface(&mut self) -> Result<wl_surface::WlSurface> {
        let surface = self.compositor.create_surface(&self.qh, ());
        if !surface.is_alive() {
            return Err(OverlayError::Initialization(
                "failed to create video surface".to_string(),
            ));
        }
        Ok(surface)
    }

    fn create_subsurface(
        &mut self,
        surface: &wl_surface::WlSurface,
    ) -> Result<wl_subsurface::WlSubsurface> {
        let subcompositor = self.state.subcompositor.as_ref().ok_or_else(|| {
            OverlayError::Initialization("wl_subcompositor is not bound".to_string())
        })?;
        let subsurface = subcompositor.get_subsurface(surface, &self.parent, &self.qh, ());
        if !subsurface.is_alive() {
            return Err(OverlayError::Initialization(
                "failed to create video subsurface".to_string(),
            ));
        }
        Ok(subsurface)
    }

    fn place_below_parent(&mut self, subsurface: &wl_subsurface::WlSubsurface) {
        subsurface.place_below(&self.parent);
    }

    fn create_buffer(
        &mut self,
        request: &BufferRequest,
    ) -> Result<CreateOutcome<wl_buffer::WlBuffer>> {
        let slot: CompletionSlot = Arc::new(OnceLock::new());
        let params = self.dmabuf()?.create_params(&self.qh, Arc::clone(&slot));

        for plane in &request.planes {
            if plane.fd < 0 {
                continue;
            }
            // SAFETY: the fd is non-negative and belongs to the frame being
            // presented, which the caller holds for the whole request.
            let fd = unsafe { BorrowedFd::borrow_raw(plane.fd) };
            params.add(
                fd,
                plane.plane_idx,
                plane.offset,
                plane.stride,
                plane.modifier_hi,
                plane.modifier_lo,
            );
        }
        params.create(
            request.width,
            request.height,
            request.format,
            zwp_linux_buffer_params_v1::Flags::from_bits_truncate(request.flags),
        );

        loop {
            if let Some(outcome) = slot.get() {
                return Ok(outcome.clone());
            }
            self.queue.blocking_dispatch(&mut self.state)?;
        }
    }

    fn attach(&mut self, surface: &wl_surface::WlSurface, buffer: Option<&wl_buffer::WlBuffer>) {
        surface.attach(buffer, 0, 0);
        if buffer.is_some() {
            if surface.version() >= 4 {
                surface.damage_buffer(0, 0, i32::MAX, i32::MAX);
            } else {
                surface.damage(0, 0, i32::MAX, i32::MAX);
            }
        }
    }

    fn commit(&mut self, surface: &wl_surface::WlSurface) {
        surface.commit();
    }

    fn destroy_buffer(&mut self, buffer: wl_buffer::WlBuffer) {
        buffer.destroy();
    }

    fn destroy_subsurface(&mut self, subsurface: wl_subsurface::WlSubsurface) {
        subsurface.destroy();
    }

    fn destroy_surface(&mut self, surface: wl_surface::WlSurface) {
        surface.destroy();
    }

    fn release_globals(&mut self) {
        if let Some(subcompositor) = self.state.subcompositor.take() {
            subcompositor.destroy();
        }
        if let Some(dmabuf) = self.state.dmabuf.take() {
            dmabuf.destroy();
        }
    }

    fn roundtrip(&mut self) -> Result<()> {
        self.queue.roundtrip(&mut self.state)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.queue.flush()?;
        Ok(())
    }

    fn dispatch_pending(&mut self) -> Result<()> {
        self.queue.dispatch_pending(&mut self.state)?;
        self.queue.flush()?;
        Ok(())
    }

    fn take_released(&mut self) -> Vec<wl_buffer::WlBuffer> {
        std::mem::take(&mut self.state.released)
    }
}

// Wayland event handlers

impl Dispatch<wl_registry::WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_registry::Event::Global { name, interface, version } = event else {
            return;
        };

        // A compositor may advertise an interface more than once; the
        // first global stays bound.
        if interface == wl_subcompositor::WlSubcompositor::interface().name {
            if state.subcompositor.is_some() {
                debug!("Ignoring additional {} global {}", interface, name);
                return;
            }
            state.subcompositor = Some(registry.bind(name, 1, qh, ()));
            debug!("Registered for protocol {} v{}", interface, version);
        } else if interface == zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1::interface().name {
            if state.dmabuf.is_some() {
                debug!("Ignoring additional {} global {}", interface, name);
                return;
            }
            state.dmabuf = Some(registry.bind(name, version.min(3), qh, ()));
            debug!("Registered for protocol {} v{}", interface, version);
        }
    }
}

impl Dispatch<zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _: &zwp_linux_dmabuf_v1::ZwpLinuxDmabufV1,
        event: zwp_linux_dmabuf_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwp_linux_dmabuf_v1::Event::Format { format } => {
                state.formats.add_format(format);
            }
            zwp_linux_dmabuf_v1::Event::Modifier {
                format,
                modifier_hi,
                modifier_lo,
            } => {
                state.formats.add_modifier(format, modifier_hi, modifier_lo);
            }
            _ => {}
        }
    }
}

impl Dispatch<zwp_linux_buffer_params_v1::ZwpLinuxBufferParamsV1, CompletionSlot> for WaylandState {
    fn event(
        _: &mut Self,
        params: &zwp_linux_buffer_params_v1::ZwpLinuxBufferParamsV1,
        event: zwp_linux_buffer_params_v1::Event,
        slot: &CompletionSlot,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let outcome = match event {
            zwp_linux_buffer_params_v1::Event::Created { buffer } => CreateOutcome::Created(buffer),
            zwp_linux_buffer_params_v1::Event::Failed => CreateOutcome::Failed,
            _ => return,
        };
        let _ = slot.set(outcome);
        params.destroy();
    }

    event_created_child!(WaylandState, zwp_linux_buffer_params_v1::ZwpLinuxBufferParamsV1, [
        zwp_linux_buffer_params_v1::EVT_CREATED_OPCODE => (wl_buffer::WlBuffer, ())
    ]);
}

impl Dispatch<wl_buffer::WlBuffer, ()> for WaylandState {
    fn event(
        state: &mut Self,
        buffer: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            state.released.push(buffer.clone());
        }
    }
}

delegate_noop!(WaylandState: ignore wl_surface::WlSurface);
delegate_noop!(WaylandState: ignore wl_subsurface::WlSubsurface);
delegate_noop!(WaylandState: ignore wl_subcompositor::WlSubcompositor);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_without_interop_has_no_backend() {
        assert!(WaylandHost::default().overlay_backend().is_none());
        assert!(WaylandHost::new(None).overlay_backend().is_none());
    }
}
