//! Protocol seam between the overlay bridge and the display server

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::Result;
use crate::formats::FormatTable;
use crate::params::BufferRequest;

/// Server reply to a buffer creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome<B> {
    Created(B),
    Failed,
}

/// Which required globals the registry advertised
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundGlobals {
    pub subcompositor: bool,
    pub dmabuf: bool,
}

impl BoundGlobals {
    pub fn is_complete(&self) -> bool {
        self.subcompositor && self.dmabuf
    }

    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.subcompositor {
            missing.push("wl_subcompositor");
        }
        if !self.dmabuf {
            missing.push("zwp_linux_dmabuf_v1");
        }
        missing
    }
}

/// Requests the overlay issues against the display server.
///
/// Every method that pumps the event queue (`discover_globals`,
/// `create_buffer`, `roundtrip`, `dispatch_pending`) may collect buffer
/// releases; the bridge drains them with `take_released` afterwards.
pub trait OverlayBackend {
    type Surface: Debug;
    type Subsurface: Debug;
    type Buffer: Debug + Clone + Eq + Hash;

    /// One-shot registry discovery round-trip
    fn discover_globals(&mut self) -> Result<BoundGlobals>;

    /// Formats advertised by the dmabuf global
    fn formats(&self) -> &FormatTable;

    fn create_surface(&mut self) -> Result<Self::Surface>;

    /// Subsurface of `surface` parented to the host's main surface
    fn create_subsurface(&mut self, surface: &Self::Surface) -> Result<Self::Subsurface>;

    fn place_below_parent(&mut self, subsurface: &Self::Subsurface);

    /// Submit the request and block until the server answers
    fn create_buffer(&mut self, request: &BufferRequest) -> Result<CreateOutcome<Self::Buffer>>;

    fn attach(&mut self, surface: &Self::Surface, buffer: Option<&Self::Buffer>);

    fn commit(&mut self, surface: &Self::Surface);

    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    fn destroy_subsurface(&mut self, subsurface: Self::Subsurface);

    fn destroy_surface(&mut self, surface: Self::Surface);

    /// Destroy the proxies bound during discovery. Called once the video
    /// surfaces are gone; later calls do nothing.
    fn release_globals(&mut self);

    fn roundtrip(&mut self) -> Result<()>;

    /// Send queued requests without reading events
    fn flush(&mut self) -> Result<()>;

    /// Dispatch already queued events without blocking
    fn dispatch_pending(&mut self) -> Result<()>;

    /// Buffers the compositor released since the last call
    fn take_released(&mut self) -> Vec<Self::Buffer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_globals() {
        let globals = BoundGlobals::default();
        assert!(!globals.is_complete());
        assert_eq!(globals.missing(), vec!["wl_subcompositor", "zwp_linux_dmabuf_v1"]);

        let globals = BoundGlobals { subcompositor: true, dmabuf: false };
        assert_eq!(globals.missing(), vec!["zwp_linux_dmabuf_v1"]);

        let globals = BoundGlobals { subcompositor: true, dmabuf: true };
        assert!(globals.is_complete());
        assert!(globals.missing().is_empty());
    }
}
