//! Host-facing hwdec driver
//!
//! The host player keeps a table of drivers and picks one by the image
//! format its decoder produces. Errors are logged here; the host only
//! needs [`status_code`](crate::error::status_code) to decide whether to
//! fall back to another rendering path.

use tracing::{error, info, warn};

use crate::backend::OverlayBackend;
use crate::bridge::OverlayBridge;
use crate::config::OverlayConfig;
use crate::error::{OverlayError, Result};
use crate::frame::{FrameRef, Rect};

pub const DRIVER_NAME: &str = "drmprime-wayland";

/// Hardware image formats a decoder can output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    DrmPrime,
    Vaapi,
    Vdpau,
    Cuda,
}

/// Platform interop the host exposes to drivers
pub trait HwdecContext {
    type Backend: OverlayBackend + 'static;

    /// Protocol backend built from the host's interop parameters, or
    /// `None` when they are unavailable
    fn overlay_backend(&self) -> Option<Self::Backend>;
}

pub trait HwdecDriver<C: HwdecContext> {
    fn name(&self) -> &'static str;

    fn init(&mut self, ctx: &C) -> Result<()>;

    /// Present `frame` (or clear the overlay when `None`).
    ///
    /// `dst` and `new_frame` are part of the host interface; the overlay
    /// does not scale or reposition.
    fn overlay_frame(
        &mut self,
        frame: Option<&FrameRef>,
        src: &Rect,
        dst: &Rect,
        new_frame: bool,
    ) -> Result<()>;

    fn uninit(&mut self);
}

/// Overlay driver over any protocol backend
pub struct OverlayDriver<B: OverlayBackend> {
    config: OverlayConfig,
    bridge: Option<OverlayBridge<B>>,
}

impl<B: OverlayBackend> OverlayDriver<B> {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            config,
            bridge: None,
        }
    }

    pub fn bridge(&self) -> Option<&OverlayBridge<B>> {
        self.bridge.as_ref()
    }

    pub fn bridge_mut(&mut self) -> Option<&mut OverlayBridge<B>> {
        self.bridge.as_mut()
    }
}

impl<B: OverlayBackend> Default for OverlayDriver<B> {
    fn default() -> Self {
        Self::new(OverlayConfig::default())
    }
}

impl<B, C> HwdecDriver<C> for OverlayDriver<B>
where
    B: OverlayBackend,
    C: HwdecContext<Backend = B>,
{
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn init(&mut self, ctx: &C) -> Result<()> {
        if let Some(mut bridge) = self.bridge.take() {
            warn!("Driver initialized twice, tearing down the previous overlay");
            bridge.teardown();
        }

        let Some(backend) = ctx.overlay_backend() else {
            error!("Unable to get Wayland interop parameters");
            return Err(OverlayError::Initialization(
                "interop parameters unavailable".to_string(),
            ));
        };

        match OverlayBridge::initialize(backend, self.config.clone()) {
            Ok(bridge) => {
                info!("{} overlay initialized", DRIVER_NAME);
                self.bridge = Some(bridge);
                Ok(())
            }
            Err(err) => {
                error!("Failed to initialize {} overlay: {}", DRIVER_NAME, err);
                Err(err)
            }
        }
    }

    fn overlay_frame(
        &mut self,
        frame: Option<&FrameRef>,
        src: &Rect,
        _dst: &Rect,
        _new_frame: bool,
    ) -> Result<()> {
        let Some(bridge) = self.bridge.as_mut() else {
            return Err(OverlayError::Initialization(
                "driver is not initialized".to_string(),
            ));
        };

        bridge.hand_off(frame, src).inspect_err(|err| {
            if err.is_per_frame() {
                error!("Dropping frame: {}", err);
            } else {
                error!("Overlay failure: {}", err);
            }
        })
    }

    fn uninit(&mut self) {
        if let Some(mut bridge) = self.bridge.take() {
            let stats = bridge.stats();
            bridge.teardown();
            info!(
                "{} overlay closed: {} presented, {} failed, {} released",
                DRIVER_NAME, stats.frames_presented, stats.frames_failed, stats.buffers_released
            );
        }
    }
}

/// Registration record for one driver
pub struct DriverEntry<C: HwdecContext> {
    pub name: &'static str,
    pub image_formats: &'static [ImageFormat],
    create: fn() -> Box<dyn HwdecDriver<C>>,
}

impl<C: HwdecContext> DriverEntry<C> {
    pub fn new(
        name: &'static str,
        image_formats: &'static [ImageFormat],
        create: fn() -> Box<dyn HwdecDriver<C>>,
    ) -> Self {
        Self {
            name,
            image_formats,
            create,
        }
    }

    pub fn create(&self) -> Box<dyn HwdecDriver<C>> {
        (self.create)()
    }
}

fn create_overlay_driver<C: HwdecContext + 'static>() -> Box<dyn HwdecDriver<C>> {
    Box::new(OverlayDriver::<C::Backend>::default())
}

/// Entry for the DRM-PRIME overlay driver
pub fn overlay_entry<C: HwdecContext + 'static>() -> DriverEntry<C> {
    DriverEntry::new(DRIVER_NAME, &[ImageFormat::DrmPrime], create_overlay_driver::<C>)
}

/// Drivers known to the host, in probing order
pub struct DriverRegistry<C: HwdecContext> {
    entries: Vec<DriverEntry<C>>,
}

impl<C: HwdecContext + 'static> DriverRegistry<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry with the overlay driver already registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(overlay_entry());
        registry
    }

    pub fn register(&mut self, entry: DriverEntry<C>) {
        if self.find(entry.name).is_some() {
            warn!("Driver {} registered twice, keeping the first", entry.name);
            return;
        }
        self.entries.push(entry);
    }

    pub fn find(&self, name: &str) -> Option<&DriverEntry<C>> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// First driver able to present `format`
    pub fn negotiate(&self, format: ImageFormat) -> Option<&DriverEntry<C>> {
        self.entries
            .iter()
            .find(|entry| entry.image_formats.contains(&format))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }
}

impl<C: HwdecContext + 'static> Default for DriverRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
