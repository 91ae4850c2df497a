use crate::text::TextCache;
use ab_glyph::FontVec;
use anyhow::{Context, Result, bail};
use quartet_core::{FixationColor, Message, QuartetFrame, Screen};
use quartet_timing::{CalibrationStats, Clock, FrameLog, HighPrecisionClock};
use std::time::Duration;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Transform};
use tracing::warn;

const WHITE: [u8; 4] = [255, 255, 255, 255];

/// Display geometry and colours. Sizes are in degrees of visual angle.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub pixels_per_degree: f32,
    pub square_size_deg: f32,
    pub fixation_radius_deg: f32,
    pub text_height_deg: f32,
    pub background_rgb: [u8; 3],
    pub square_rgb: [u8; 3],
}

impl RenderSettings {
    pub fn deg_to_px(&self, deg: f32) -> f32 {
        deg * self.pixels_per_degree
    }
}

pub struct FrameStats {
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
}

/// Draws [`Screen`]s onto an offscreen canvas and copies it into the
/// presented frame buffer. Stimulus shapes are rasterized once and blitted.
pub struct SkiaRenderer {
    settings: RenderSettings,
    center: (f32, f32),
    canvas: Pixmap,
    background: Color,
    square: Pixmap,
    dots: [Pixmap; 2],
    text: Option<TextCache>,
    timer: HighPrecisionClock,
    draw_log: FrameLog,
}

impl SkiaRenderer {
    /// Text screens are skipped when `font` is `None`.
    pub fn new(settings: RenderSettings, font: Option<FontVec>) -> Result<Self> {
        let canvas = Pixmap::new(settings.width, settings.height)
            .with_context(|| format!("invalid canvas size {}x{}", settings.width, settings.height))?;
        let [r, g, b] = settings.background_rgb;
        let square_px = settings.deg_to_px(settings.square_size_deg);
        let dot_px = settings.deg_to_px(settings.fixation_radius_deg);
        let square = square_pixmap(square_px, settings.square_rgb)?;
        let dots = [
            dot_pixmap(dot_px, FixationColor::Red)?,
            dot_pixmap(dot_px, FixationColor::Green)?,
        ];
        if font.is_none() {
            warn!("no font loaded; text screens will be blank");
        }
        let text = font.map(|f| TextCache::new(f, settings.deg_to_px(settings.text_height_deg), WHITE));
        Ok(Self {
            center: (settings.width as f32 / 2.0, settings.height as f32 / 2.0),
            settings,
            canvas,
            background: Color::from_rgba8(r, g, b, 255),
            square,
            dots,
            text,
            timer: HighPrecisionClock::new(),
            draw_log: FrameLog::default(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Pixmap::new(width, height)
            .with_context(|| format!("invalid canvas size {width}x{height}"))?;
        self.settings.width = width;
        self.settings.height = height;
        self.center = (width as f32 / 2.0, height as f32 / 2.0);
        Ok(())
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Draw-time statistics over the recent frames.
    pub fn draw_stats(&self) -> CalibrationStats {
        self.draw_log.stats()
    }

    /// Visual-angle position (x right, y up) to canvas pixels.
    pub fn to_canvas(&self, x_deg: f64, y_deg: f64) -> (f32, f32) {
        let ppd = self.settings.pixels_per_degree;
        (
            self.center.0 + x_deg as f32 * ppd,
            self.center.1 - y_deg as f32 * ppd,
        )
    }

    pub fn render_frame(&mut self, screen: &Screen, frame_buffer: &mut [u8]) -> Result<FrameStats> {
        if frame_buffer.len() != self.canvas.data().len() {
            bail!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.canvas.data().len()
            );
        }
        let t0 = self.timer.now();
        self.draw(screen);
        let draw = self.timer.elapsed(t0);

        let t1 = self.timer.now();
        frame_buffer.copy_from_slice(self.canvas.data());
        let copy = self.timer.elapsed(t1);

        self.draw_log.push(draw);
        Ok(FrameStats {
            draw,
            copy,
            total: draw + copy,
        })
    }

    pub fn draw(&mut self, screen: &Screen) {
        self.canvas.fill(self.background);
        match screen {
            Screen::Blank => {}
            Screen::Message(message) => self.draw_text(message.text(), self.center),
            Screen::Break { runs_left } => self.draw_text(&Screen::break_text(*runs_left), self.center),
            Screen::Quartet(frame) => self.draw_quartet(frame),
            Screen::ReportPrompt => self.draw_text("?", self.center),
            Screen::Fixation(color) => self.draw_dot(*color),
            Screen::Feedback {
                responded,
                practice,
            } => {
                if !responded {
                    self.draw_text(Message::NoResponse.text(), self.center);
                }
                if *responded || !practice {
                    self.draw_dot(FixationColor::Green);
                }
            }
        }
    }

    fn draw_quartet(&mut self, frame: &QuartetFrame) {
        for (x, y) in frame.pair.square_centres(frame.hori, frame.verti) {
            let pos = self.to_canvas(x, y);
            blit(&mut self.canvas, &self.square, pos);
        }
        self.draw_dot(frame.fixation);
    }

    fn draw_dot(&mut self, color: FixationColor) {
        let dot = match color {
            FixationColor::Red => &self.dots[0],
            FixationColor::Green => &self.dots[1],
        };
        blit(&mut self.canvas, dot, self.center);
    }

    /// Multi-line text centred as a block on `pos`.
    fn draw_text(&mut self, text: &str, pos: (f32, f32)) {
        let Some(cache) = self.text.as_mut() else {
            return;
        };
        let line_height = cache.line_height();
        let lines: Vec<&str> = text.lines().collect();
        let top = pos.1 - line_height * (lines.len() as f32 - 1.0) / 2.0;
        for (i, line) in lines.iter().enumerate() {
            if let Some(pm) = cache.get_or_render(line) {
                blit(&mut self.canvas, &pm, (pos.0, top + i as f32 * line_height));
            }
        }
    }
}

fn square_pixmap(size_px: f32, rgb: [u8; 3]) -> Result<Pixmap> {
    let side = size_px.round().max(1.0) as u32;
    let mut pm = Pixmap::new(side, side).context("square pixmap")?;
    pm.fill(Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255));
    Ok(pm)
}

fn dot_pixmap(radius_px: f32, color: FixationColor) -> Result<Pixmap> {
    let radius = radius_px.max(1.0);
    let side = (radius * 2.0).ceil() as u32 + 2;
    let mut pm = Pixmap::new(side, side).context("fixation pixmap")?;
    let [r, g, b, a] = color.rgba();
    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(Color::from_rgba8(r, g, b, a));
    let c = side as f32 / 2.0;
    let path = PathBuilder::from_circle(c, c, radius).context("fixation path")?;
    pm.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    Ok(pm)
}

/// Source-over blit of a premultiplied pixmap centred on `pos`, clipped to
/// the canvas. Opaque rows are copied directly.
fn blit(canvas: &mut Pixmap, src: &Pixmap, pos: (f32, f32)) {
    let (w, h) = (src.width() as i32, src.height() as i32);
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let x0 = (pos.0 - w as f32 * 0.5).round() as i32;
    let y0 = (pos.1 - h as f32 * 0.5).round() as i32;

    let dst_x = x0.max(0);
    let dst_y = y0.max(0);
    let end_x = (x0 + w).min(cw);
    let end_y = (y0 + h).min(ch);
    if end_x <= dst_x || end_y <= dst_y {
        return;
    }
    let (src_x, src_y) = (dst_x - x0, dst_y - y0);
    let copy_w = (end_x - dst_x) as usize;

    let src_data = src.data();
    let src_stride = w as usize * 4;
    let dst_stride = cw as usize * 4;
    let dst_data = canvas.data_mut();

    for row in 0..(end_y - dst_y) as usize {
        let s = (src_y as usize + row) * src_stride + src_x as usize * 4;
        let d = (dst_y as usize + row) * dst_stride + dst_x as usize * 4;
        let src_row = &src_data[s..s + copy_w * 4];
        let dst_row = &mut dst_data[d..d + copy_w * 4];
        if src_row.iter().skip(3).step_by(4).all(|&a| a == 255) {
            dst_row.copy_from_slice(src_row);
            continue;
        }
        for (sp, dp) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
            let inv = 255 - sp[3] as u32;
            for c in 0..4 {
                dp[c] = (sp[c] as u32 + (dp[c] as u32 * inv + 127) / 255).min(255) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartet_core::QuartetPair;

    fn settings() -> RenderSettings {
        RenderSettings {
            width: 200,
            height: 160,
            pixels_per_degree: 10.0,
            square_size_deg: 1.0,
            fixation_radius_deg: 0.3,
            text_height_deg: 0.5,
            background_rgb: [64, 64, 64],
            square_rgb: [191, 191, 191],
        }
    }

    fn rgb_at(r: &SkiaRenderer, (x, y): (f32, f32)) -> [u8; 3] {
        let px = r
            .canvas()
            .pixel(x.round() as u32, y.round() as u32)
            .unwrap();
        [px.red(), px.green(), px.blue()]
    }

    #[test]
    fn quartet_squares_land_on_mirrored_positions() {
        let mut r = SkiaRenderer::new(settings(), None).unwrap();
        // ratio 1 at radius 3 deg: offsets ~2.12 deg
        let frame = QuartetFrame::at_ratio(QuartetPair::LeftTilted, 1.0, 3.0);
        r.draw(&Screen::Quartet(frame));

        let upper_left = r.to_canvas(-frame.hori, frame.verti);
        let lower_right = r.to_canvas(frame.hori, -frame.verti);
        let upper_right = r.to_canvas(frame.hori, frame.verti);
        assert_eq!(rgb_at(&r, upper_left), [191, 191, 191]);
        assert_eq!(rgb_at(&r, lower_right), [191, 191, 191]);
        assert_eq!(rgb_at(&r, upper_right), [64, 64, 64]);
        assert!(upper_left.1 < r.center.1, "positive y is drawn above centre");
        assert_eq!(rgb_at(&r, r.center), [255, 0, 0]);
    }

    #[test]
    fn toggled_pair_uses_the_other_diagonal() {
        let mut r = SkiaRenderer::new(settings(), None).unwrap();
        let frame = QuartetFrame::at_ratio(QuartetPair::RightTilted, 2.0, 3.0);
        r.draw(&Screen::Quartet(frame));
        assert_eq!(rgb_at(&r, r.to_canvas(frame.hori, frame.verti)), [191, 191, 191]);
        assert_eq!(rgb_at(&r, r.to_canvas(-frame.hori, -frame.verti)), [191, 191, 191]);
        assert_eq!(rgb_at(&r, r.to_canvas(-frame.hori, frame.verti)), [64, 64, 64]);
    }

    #[test]
    fn feedback_dot_is_green() {
        let mut r = SkiaRenderer::new(settings(), None).unwrap();
        r.draw(&Screen::Feedback {
            responded: true,
            practice: false,
        });
        assert_eq!(rgb_at(&r, r.center), [0, 128, 0]);
        r.draw(&Screen::Feedback {
            responded: false,
            practice: false,
        });
        assert_eq!(rgb_at(&r, r.center), [0, 128, 0]);
        r.draw(&Screen::Fixation(FixationColor::Red));
        assert_eq!(rgb_at(&r, r.center), [255, 0, 0]);
    }

    #[test]
    fn practice_feedback_shows_dot_or_message() {
        let mut r = SkiaRenderer::new(settings(), None).unwrap();
        r.draw(&Screen::Feedback {
            responded: true,
            practice: true,
        });
        assert_eq!(rgb_at(&r, r.center), [0, 128, 0]);
        // missed practice trial: message only, no dot
        r.draw(&Screen::Feedback {
            responded: false,
            practice: true,
        });
        assert_eq!(rgb_at(&r, r.center), [64, 64, 64]);
    }

    #[test]
    fn text_screens_without_font_show_background() {
        let mut r = SkiaRenderer::new(settings(), None).unwrap();
        r.draw(&Screen::Message(Message::Trigger));
        assert_eq!(rgb_at(&r, r.center), [64, 64, 64]);
    }

    #[test]
    fn frame_is_copied_into_the_buffer() {
        let mut r = SkiaRenderer::new(settings(), None).unwrap();
        let mut fb = vec![0u8; 200 * 160 * 4];
        let stats = r.render_frame(&Screen::Blank, &mut fb).unwrap();
        assert_eq!(&fb[..4], &[64, 64, 64, 255]);
        assert!(stats.total >= stats.draw);
        assert_eq!(r.draw_stats().samples, 1);

        let mut short = vec![0u8; 16];
        assert!(r.render_frame(&Screen::Blank, &mut short).is_err());
    }

    #[test]
    fn blit_clips_at_the_canvas_edge() {
        let mut r = SkiaRenderer::new(settings(), None).unwrap();
        r.canvas.fill(Color::BLACK);
        let square = r.square.clone();
        blit(&mut r.canvas, &square, (0.0, 0.0));
        assert_eq!(rgb_at(&r, (1.0, 1.0)), [191, 191, 191]);
        assert_eq!(rgb_at(&r, (10.0, 10.0)), [0, 0, 0]);
    }
}
