mod test_driver;
mod test_wayland;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use drm_fourcc::DrmFourcc;

use crate::frame::{DecodedFrame, DrmFrameDescriptor, DrmLayer, DrmObject, DrmPlane, FrameRef, Rect};

/// 1920x1080 NV12 frame with both planes in one object
pub fn nv12_descriptor(fd: i32) -> DrmFrameDescriptor {
    DrmFrameDescriptor {
        objects: vec![DrmObject { fd, size: 3_110_400, format_modifier: 0 }],
        layers: vec![DrmLayer::new(
            DrmFourcc::Nv12 as u32,
            vec![
                DrmPlane { object_index: 0, offset: 0, pitch: 1920 },
                DrmPlane { object_index: 0, offset: 3_072_000, pitch: 960 },
            ],
        )],
    }
}

pub fn nv12_frame(fd: i32) -> FrameRef {
    DecodedFrame::new(nv12_descriptor(fd)).into_ref()
}

pub fn full_hd() -> Rect {
    Rect::new(0, 0, 1920, 1080)
}

/// Keep-alive guard that records when the decoder gets its frame back
pub struct Recycled(pub Arc<AtomicBool>);

impl Recycled {
    pub fn is_set(flag: &Arc<AtomicBool>) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

impl Drop for Recycled {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
