use std::fmt;
use std::path::PathBuf;

pub use string_cache::DefaultAtom as StimulusName;

/// Position of a stimulus inside the catalog's ordered asset list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StimulusIndex(pub usize);

impl StimulusIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for StimulusIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Describes how to produce the drawable for one catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub enum StimulusAsset {
    /// Bitmap on disk, drawn centred at `size_deg` visual degrees.
    Image { path: PathBuf, size_deg: f32 },
    /// Outlined circle used as an eye-tracking test target.
    Ring {
        offset_px: (f32, f32),
        diameter_px: f32,
        color: [u8; 4],
    },
}

impl StimulusAsset {
    pub fn image(path: impl Into<PathBuf>, size_deg: f32) -> Self {
        StimulusAsset::Image {
            path: path.into(),
            size_deg,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, StimulusAsset::Image { .. })
    }
}
