//! Overlay configuration

use clap::ValueEnum;

/// Which modifier is sent with each plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ModifierPolicy {
    /// Always send modifier 0 (linear)
    #[default]
    Linear,
    /// Send the modifier the decoder recorded for the plane's object
    Descriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    pub modifier_policy: ModifierPolicy,
    /// Warn when a frame's format was never advertised by the compositor
    pub check_formats: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            modifier_policy: ModifierPolicy::Linear,
            check_formats: true,
        }
    }
}
