//! dmabuf buffer requests built from frame descriptors

use std::os::unix::io::RawFd;

use tracing::{debug, trace};

use crate::config::ModifierPolicy;
use crate::error::{OverlayError, Result};
use crate::frame::{DrmFrameDescriptor, DrmLayer, Rect, MAX_PLANES};

/// One `zwp_linux_buffer_params_v1.add` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneParams {
    pub fd: RawFd,
    pub plane_idx: u32,
    pub offset: u32,
    pub stride: u32,
    pub modifier_hi: u32,
    pub modifier_lo: u32,
}

impl PlaneParams {
    pub fn modifier(&self) -> u64 {
        ((self.modifier_hi as u64) << 32) | self.modifier_lo as u64
    }
}

/// Everything needed to create one `wl_buffer` from a frame layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferRequest {
    pub width: i32,
    pub height: i32,
    pub format: u32,
    pub flags: u32,
    pub planes: Vec<PlaneParams>,
}

/// Split a 64-bit modifier into the (hi, lo) halves the protocol sends
pub fn split_modifier(modifier: u64) -> (u32, u32) {
    ((modifier >> 32) as u32, (modifier & 0xffff_ffff) as u32)
}

impl BufferRequest {
    /// Collect the usable planes of one layer.
    ///
    /// A plane is skipped when its object is missing, its fd is not a
    /// valid descriptor (0 or negative) or its stride is 0. Size is taken
    /// from the source crop, not the layer; a crop without area is
    /// rejected here since the server treats it as a protocol error.
    pub fn from_layer(
        desc: &DrmFrameDescriptor,
        layer: &DrmLayer,
        crop: &Rect,
        policy: ModifierPolicy,
    ) -> Result<Self> {
        let Some((width, height)) = crop.size() else {
            return Err(OverlayError::BufferCreation {
                format: layer.format,
                width: crop.width(),
                height: crop.height(),
            });
        };

        let mut planes = Vec::new();
        planes
            .try_reserve_exact(layer.planes.len().min(MAX_PLANES))
            .map_err(|_| OverlayError::OutOfMemory)?;

        for (index, plane) in layer.planes.iter().take(MAX_PLANES).enumerate() {
            let Some(object) = desc.object_for(plane) else {
                trace!(index, object = plane.object_index, "plane references missing object");
                continue;
            };
            if object.fd <= 0 || plane.pitch == 0 {
                continue;
            }

            let modifier = match policy {
                ModifierPolicy::Linear => 0,
                ModifierPolicy::Descriptor => object.format_modifier,
            };
            let (modifier_hi, modifier_lo) = split_modifier(modifier);

            planes.push(PlaneParams {
                fd: object.fd,
                plane_idx: index as u32,
                offset: plane.offset,
                stride: plane.pitch,
                modifier_hi,
                modifier_lo,
            });
        }

        Ok(Self {
            width,
            height,
            format: layer.format,
            flags: 0,
            planes,
        })
    }

    /// Build the request for a whole frame.
    ///
    /// Only the first layer with at least one usable plane is submitted;
    /// a frame shows as exactly one buffer on the video surface.
    pub fn from_descriptor(
        desc: &DrmFrameDescriptor,
        crop: &Rect,
        policy: ModifierPolicy,
    ) -> Result<Self> {
        for (index, layer) in desc.layers.iter().enumerate() {
            let request = Self::from_layer(desc, layer, crop, policy)?;
            if request.is_empty() {
                debug!(layer = index, "skipping layer without usable planes");
                continue;
            }
            if index + 1 < desc.layers.len() {
                debug!(
                    layer = index,
                    ignored = desc.layers.len() - index - 1,
                    "frame has extra layers, presenting the first usable one"
                );
            }
            return Ok(request);
        }
        Err(OverlayError::EmptyFrame)
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}
