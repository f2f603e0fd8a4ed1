//! Error types for the overlay driver

use thiserror::Error;

pub type Result<T, E = OverlayError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("overlay initialization failed: {0}")]
    Initialization(String),

    #[error("out of memory while building dmabuf params")]
    OutOfMemory,

    #[error("compositor rejected dmabuf params ({width}x{height}, format {format:#010x})")]
    BufferCreation { format: u32, width: i32, height: i32 },

    #[error("frame descriptor has no usable planes")]
    EmptyFrame,

    #[error("wayland protocol error: {0}")]
    Protocol(String),
}

impl OverlayError {
    /// Whether the driver can keep presenting frames after this error.
    ///
    /// Per-frame failures drop only the frame that caused them.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            OverlayError::OutOfMemory
                | OverlayError::BufferCreation { .. }
                | OverlayError::EmptyFrame
        )
    }
}

impl From<wayland_client::DispatchError> for OverlayError {
    fn from(err: wayland_client::DispatchError) -> Self {
        OverlayError::Protocol(err.to_string())
    }
}

impl From<wayland_client::backend::WaylandError> for OverlayError {
    fn from(err: wayland_client::backend::WaylandError) -> Self {
        OverlayError::Protocol(err.to_string())
    }
}

/// Status code handed back across the host's driver table: `0` or `-1`.
pub fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => -1,
    }
}
