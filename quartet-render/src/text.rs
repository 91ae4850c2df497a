use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{Pixmap, PremultipliedColorU8};

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("invalid font {}", path.display()))
}

/// Rasterized lines keyed by their text. Message screens repeat, so each
/// line is laid out once per session.
pub struct TextCache {
    font: FontVec,
    size_px: f32,
    color: [u8; 4],
    map: HashMap<String, Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: FontVec, size_px: f32, color: [u8; 4]) -> Self {
        Self {
            font,
            size_px,
            color,
            map: HashMap::new(),
        }
    }

    pub fn line_height(&self) -> f32 {
        let sf = self.font.as_scaled(PxScale::from(self.size_px));
        sf.height() + sf.line_gap()
    }

    /// `None` for lines without visible glyphs.
    pub fn get_or_render(&mut self, line: &str) -> Option<Arc<Pixmap>> {
        if let Some(p) = self.map.get(line) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_line(line, self.size_px, &self.font, self.color)?);
        self.map.insert(line.to_string(), Arc::clone(&pm));
        Some(pm)
    }
}

/// One line of text on a transparent, premultiplied pixmap cropped to the
/// glyph bounds.
pub fn render_line(text: &str, font_size: f32, font: &FontVec, color: [u8; 4]) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    if outlines.is_empty() {
        return None;
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let src = [
                (color[0] as f32 * a) as u8,
                (color[1] as f32 * a) as u8,
                (color[2] as f32 * a) as u8,
                (a * 255.0) as u8,
            ];
            let bg = dst[i];
            // source over, premultiplied
            let inv = 1.0 - src[3] as f32 / 255.0;
            let blend = |s: u8, d: u8| s.saturating_add((d as f32 * inv) as u8);
            let r = blend(src[0], bg.red());
            let g = blend(src[1], bg.green());
            let bl = blend(src[2], bg.blue());
            let al = blend(src[3], bg.alpha());
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(al), g.min(al), bl.min(al), al) {
                dst[i] = px;
            }
        });
    }
    Some(pm)
}
