//! DRM-PRIME frame descriptors
//!
//! A decoded frame is described as a set of DMA-BUF objects and one or more
//! layers referencing them. The decoder owns the file descriptors; the
//! overlay only borrows them while a frame is retained.

use std::any::Any;
use std::fmt;
use std::os::unix::io::RawFd;
use std::sync::Arc;

use drm_fourcc::DrmFourcc;

/// Planes per layer the descriptor can carry
pub const MAX_PLANES: usize = 4;

/// One DMA-BUF backing some or all planes of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrmObject {
    pub fd: RawFd,
    pub size: usize,
    pub format_modifier: u64,
}

/// A memory region inside one of the frame's objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrmPlane {
    pub object_index: usize,
    pub offset: u32,
    pub pitch: u32,
}

/// One logical image of the frame in a single DRM fourcc format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmLayer {
    pub format: u32,
    pub planes: Vec<DrmPlane>,
}

impl DrmLayer {
    pub fn new(format: u32, planes: Vec<DrmPlane>) -> Self {
        Self { format, planes }
    }

    pub fn fourcc(&self) -> Option<DrmFourcc> {
        DrmFourcc::try_from(self.format).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrmFrameDescriptor {
    pub objects: Vec<DrmObject>,
    pub layers: Vec<DrmLayer>,
}

impl DrmFrameDescriptor {
    /// Object a plane points into, if its index is in range
    pub fn object_for(&self, plane: &DrmPlane) -> Option<&DrmObject> {
        self.objects.get(plane.object_index)
    }
}

/// Source or destination rectangle in video pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> i32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> i32 {
        self.y1.saturating_sub(self.y0)
    }

    /// Width and height, or `None` when the rectangle is empty, inverted
    /// or too large for `i32`
    pub fn size(&self) -> Option<(i32, i32)> {
        let width = self.x1.checked_sub(self.x0)?;
        let height = self.y1.checked_sub(self.y0)?;
        (width > 0 && height > 0).then_some((width, height))
    }
}

/// A decoded frame as handed over by the host
///
/// The keep-alive guard is whatever the host needs to hold so the
/// decoder does not recycle the frame's memory (a surface pool slot,
/// a reference-counted image, ...). It is dropped together with the
/// last [`FrameRef`].
pub struct DecodedFrame {
    descriptor: DrmFrameDescriptor,
    _keepalive: Option<Box<dyn Any + Send + Sync>>,
}

/// Shared handle the overlay retains while the compositor may read a frame
pub type FrameRef = Arc<DecodedFrame>;

impl DecodedFrame {
    pub fn new(descriptor: DrmFrameDescriptor) -> Self {
        Self {
            descriptor,
            _keepalive: None,
        }
    }

    pub fn with_keepalive<G>(descriptor: DrmFrameDescriptor, guard: G) -> Self
    where
        G: Any + Send + Sync,
    {
        Self {
            descriptor,
            _keepalive: Some(Box::new(guard)),
        }
    }

    pub fn descriptor(&self) -> &DrmFrameDescriptor {
        &self.descriptor
    }

    pub fn into_ref(self) -> FrameRef {
        Arc::new(self)
    }
}

impl fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedFrame")
            .field("descriptor", &self.descriptor)
            .field("keepalive", &self._keepalive.is_some())
            .finish()
    }
}
