//! DRM-PRIME overlay driver for Wayland
//!
//! Presents hardware-decoded frames on a dedicated subsurface placed below
//! the host player's main surface. Frames are shared with the compositor
//! through `zwp_linux_dmabuf_v1` without copying: every plane of the
//! decoder's DRM frame descriptor is handed over by file descriptor.
//!
//! Layers:
//! - [`bridge::OverlayBridge`]: buffer hand-off and lifetime tracking,
//!   generic over an [`backend::OverlayBackend`]
//! - [`wayland::WaylandBackend`]: the protocol backend used in production
//! - [`driver`]: the hwdec driver surface the host player registers

pub mod backend;
pub mod bridge;
pub mod config;
pub mod driver;
pub mod error;
pub mod formats;
pub mod frame;
pub mod params;
pub mod wayland;

#[cfg(test)]
mod tests;

pub use crate::bridge::{OverlayBridge, OverlayStats};
pub use crate::config::{ModifierPolicy, OverlayConfig};
pub use crate::driver::{
    DriverRegistry, HwdecContext, HwdecDriver, ImageFormat, OverlayDriver, DRIVER_NAME,
};
pub use crate::error::{status_code, OverlayError, Result};
pub use crate::frame::{DecodedFrame, DrmFrameDescriptor, DrmLayer, DrmObject, DrmPlane, FrameRef, Rect};
pub use crate::wayland::{DrmPrimeWayland, WaylandBackend, WaylandHost, WaylandInteropParams};
