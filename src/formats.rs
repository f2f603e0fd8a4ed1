//! Formats advertised by the compositor's linux-dmabuf global

use std::collections::BTreeMap;
use std::fmt;

use drm_fourcc::DrmFourcc;

/// Fourcc codes seen in `format` events, with any modifiers from
/// `modifier` events (protocol version 3)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatTable {
    formats: BTreeMap<u32, Vec<u64>>,
}

impl FormatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_format(&mut self, format: u32) {
        self.formats.entry(format).or_default();
    }

    pub fn add_modifier(&mut self, format: u32, modifier_hi: u32, modifier_lo: u32) {
        let modifier = ((modifier_hi as u64) << 32) | modifier_lo as u64;
        let modifiers = self.formats.entry(format).or_default();
        if !modifiers.contains(&modifier) {
            modifiers.push(modifier);
        }
    }

    pub fn contains(&self, format: u32) -> bool {
        self.formats.contains_key(&format)
    }

    pub fn modifiers(&self, format: u32) -> &[u64] {
        self.formats.get(&format).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.formats.keys().copied()
    }
}

/// Human-readable fourcc, falling back to hex for codes drm-fourcc doesn't know
pub struct FourccName(pub u32);

impl fmt::Display for FourccName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DrmFourcc::try_from(self.0) {
            Ok(fourcc) => write!(f, "{}", fourcc),
            Err(_) => write!(f, "{:#010x}", self.0),
        }
    }
}
