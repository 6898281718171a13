pub mod render;

pub use render::{render_text_pixmap, FrameStats, SkiaRenderer};
