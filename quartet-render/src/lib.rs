mod render;
mod text;

pub use render::{FrameStats, RenderSettings, SkiaRenderer};
pub use text::{TextCache, load_font, render_line};
