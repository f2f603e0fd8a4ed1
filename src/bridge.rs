//! Overlay buffer bridge
//!
//! Turns decoded frames into compositor buffers and keeps each frame alive
//! until the compositor has released the buffer made from it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::backend::{CreateOutcome, OverlayBackend};
use crate::config::OverlayConfig;
use crate::error::{OverlayError, Result};
use crate::formats::{FormatTable, FourccName};
use crate::frame::{FrameRef, Rect};
use crate::params::BufferRequest;

/// Counters kept across the bridge's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayStats {
    pub frames_presented: u64,
    pub frames_failed: u64,
    pub buffers_released: u64,
}

pub struct OverlayBridge<B: OverlayBackend> {
    backend: B,
    config: OverlayConfig,
    surface: Option<B::Surface>,
    subsurface: Option<B::Subsurface>,
    attached: Option<B::Buffer>,
    /// Buffers handed to the compositor and not yet released, with the
    /// frame whose memory they alias
    retained: HashMap<B::Buffer, FrameRef>,
    stats: OverlayStats,
}

impl<B: OverlayBackend> OverlayBridge<B> {
    /// Bind the required globals and create the video subsurface.
    ///
    /// On failure everything created so far is torn down again.
    pub fn initialize(backend: B, config: OverlayConfig) -> Result<Self> {
        let mut bridge = Self {
            backend,
            config,
            surface: None,
            subsurface: None,
            attached: None,
            retained: HashMap::new(),
            stats: OverlayStats::default(),
        };

        if let Err(err) = bridge.setup() {
            bridge.teardown();
            return Err(err);
        }

        info!(
            "Video subsurface ready ({} dmabuf formats advertised)",
            bridge.backend.formats().len()
        );
        Ok(bridge)
    }

    fn setup(&mut self) -> Result<()> {
        let globals = self.backend.discover_globals()?;
        if !globals.is_complete() {
            return Err(OverlayError::Initialization(format!(
                "compositor does not advertise {}",
                globals.missing().join(", ")
            )));
        }

        let surface = self.surface.insert(self.backend.create_surface()?);
        let subsurface = self.backend.create_subsurface(surface)?;
        self.backend.place_below_parent(&subsurface);
        self.subsurface = Some(subsurface);
        Ok(())
    }

    /// Present `frame` on the video surface, or detach the current buffer
    /// when `frame` is `None`.
    ///
    /// Only the width and height of `src` are used. Blocks until the
    /// compositor has accepted or rejected the buffer.
    pub fn hand_off(&mut self, frame: Option<&FrameRef>, src: &Rect) -> Result<()> {
        if self.surface.is_none() {
            return Err(OverlayError::Initialization(
                "video surface is not available".to_string(),
            ));
        }

        let result = match frame {
            Some(frame) => self.present(frame, src),
            None => {
                self.detach();
                Ok(())
            }
        };

        if result.is_err() {
            self.stats.frames_failed += 1;
        }
        result
    }

    fn present(&mut self, frame: &FrameRef, src: &Rect) -> Result<()> {
        let request =
            BufferRequest::from_descriptor(frame.descriptor(), src, self.config.modifier_policy)?;

        if self.config.check_formats {
            let formats = self.backend.formats();
            if !formats.is_empty() && !formats.contains(request.format) {
                warn!(
                    "Format {} was not advertised by the compositor",
                    FourccName(request.format)
                );
            }
        }

        trace!(
            width = request.width,
            height = request.height,
            planes = request.planes.len(),
            "Creating dmabuf buffer in {}",
            FourccName(request.format)
        );

        let outcome = self.backend.create_buffer(&request);
        self.apply_releases();

        match outcome? {
            CreateOutcome::Created(buffer) => {
                self.retained.insert(buffer.clone(), Arc::clone(frame));
                if let Some(surface) = &self.surface {
                    self.backend.attach(surface, Some(&buffer));
                    self.backend.commit(surface);
                }
                self.attached = Some(buffer);
                self.stats.frames_presented += 1;
                Ok(())
            }
            CreateOutcome::Failed => Err(OverlayError::BufferCreation {
                format: request.format,
                width: request.width,
                height: request.height,
            }),
        }
    }

    fn detach(&mut self) {
        if let Some(surface) = &self.surface {
            self.backend.attach(surface, None);
            self.backend.commit(surface);
        }
        self.attached = None;
    }

    /// Apply buffer releases that are already queued, without presenting
    pub fn dispatch_pending(&mut self) -> Result<()> {
        let result = self.backend.dispatch_pending();
        self.apply_releases();
        result
    }

    fn apply_releases(&mut self) {
        for buffer in self.backend.take_released() {
            match self.retained.remove(&buffer) {
                Some(frame) => {
                    drop(frame);
                    if self.attached.as_ref() == Some(&buffer) {
                        self.attached = None;
                    }
                    self.backend.destroy_buffer(buffer);
                    self.stats.buffers_released += 1;
                }
                None => debug!(?buffer, "release for a buffer that is no longer tracked"),
            }
        }
    }

    /// Destroy the video surfaces and the bound globals, and flush the
    /// destruction to the server.
    ///
    /// Safe to call repeatedly and after a failed initialization.
    pub fn teardown(&mut self) {
        if let Some(subsurface) = self.subsurface.take() {
            self.backend.destroy_subsurface(subsurface);
        }
        if let Some(surface) = self.surface.take() {
            self.backend.destroy_surface(surface);
        }
        self.attached = None;
        self.backend.release_globals();

        if let Err(err) = self.backend.roundtrip() {
            warn!("Final roundtrip failed: {}", err);
        }
        self.apply_releases();

        // The surface is gone, nothing can still be reading these.
        if !self.retained.is_empty() {
            for (buffer, _frame) in self.retained.drain() {
                self.backend.destroy_buffer(buffer);
            }
            if let Err(err) = self.backend.flush() {
                warn!("Failed to flush buffer destruction: {}", err);
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some() && self.subsurface.is_some()
    }

    pub fn attached_buffer(&self) -> Option<&B::Buffer> {
        self.attached.as_ref()
    }

    /// Buffers the compositor has not released yet
    pub fn pending_release(&self) -> usize {
        self.retained.len()
    }

    pub fn stats(&self) -> OverlayStats {
        self.stats
    }

    pub fn formats(&self) -> &FormatTable {
        self.backend.formats()
    }

    pub fn supports_format(&self, format: u32) -> bool {
        self.backend.formats().contains(format)
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: OverlayBackend> Drop for OverlayBridge<B> {
    fn drop(&mut self) {
        if self.surface.is_some() || self.subsurface.is_some() || !self.retained.is_empty() {
            self.teardown();
        }
    }
}
