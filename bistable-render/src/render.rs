use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use anyhow::{anyhow, Context, Result};
use bistable_core::{StimulusAsset, StimulusIndex};
use bistable_timing::{HighPrecisionTimer, Timer};
use bytemuck::{cast_slice, cast_slice_mut};
use image::imageops::FilterType;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use string_cache::DefaultAtom as Atom;
use tiny_skia::{
    Color, ColorU8, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Rect, Stroke, Transform,
};
use tracing::{debug, info, warn};

const TEXT_SIZE_PX: f32 = 32.0;
const LINE_SPACING: f32 = 1.4;
const RING_STROKE_PX: f32 = 4.0;

/// A pre-rendered stimulus and where its centre sits relative to the screen centre.
struct CachedStimulus {
    pixmap: Pixmap,
    offset: (f32, f32),
}

struct TextCache {
    font: FontArc,
    size_px: f32,
    map: HashMap<Atom, Arc<Pixmap>>,
}

impl TextCache {
    fn new(font: FontArc, size_px: f32) -> Self {
        Self {
            font,
            size_px,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, atom: Atom) -> Option<Arc<Pixmap>> {
        if let Some(p) = self.map.get(&atom) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(
            atom.as_ref(),
            self.size_px,
            &self.font,
            Color::from_rgba8(255, 255, 255, 255),
        )?);
        self.map.insert(atom, Arc::clone(&pm));
        Some(pm)
    }
}

/// Rasterises one line of text into a tight, transparent, premultiplied pixmap.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Color,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // layout with the baseline at the ascent
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

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
    }

    // blank lines still take up a line of height
    if min_x == f32::INFINITY {
        return Pixmap::new(1, sf.height().ceil().max(1.0) as u32);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;

    let stride = pm.width() as usize;
    let dst = pm.pixels_mut();
    let cu = [
        (color.red() * 255.0) as u8,
        (color.green() * 255.0) as u8,
        (color.blue() * 255.0) as u8,
        (color.alpha() * 255.0) as u8,
    ];

    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
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

                let a_lin = (cov * cu[3] as f32 / 255.0).clamp(0.0, 1.0);
                let sa = (a_lin * 255.0) as u8;
                let src = [
                    (cu[0] as f32 * a_lin) as u8,
                    (cu[1] as f32 * a_lin) as u8,
                    (cu[2] as f32 * a_lin) as u8,
                ];
                let bg = dst[i];

                // premultiplied source-over
                let inv = 1.0 - (sa as f32 / 255.0);
                let r = src[0].saturating_add((bg.red() as f32 * inv) as u8);
                let g = src[1].saturating_add((bg.green() as f32 * inv) as u8);
                let b = src[2].saturating_add((bg.blue() as f32 * inv) as u8);
                let a = sa.saturating_add((bg.alpha() as f32 * inv) as u8);
                if let Some(px) = PremultipliedColorU8::from_rgba(r.min(a), g.min(a), b.min(a), a) {
                    dst[i] = px;
                }
            });
        }
    }

    Some(pm)
}

/// Converts a decoded RGBA image into a premultiplied pixmap.
fn pixmap_from_rgba(img: &image::RgbaImage) -> Result<Pixmap> {
    let (w, h) = img.dimensions();
    let mut pm = Pixmap::new(w, h).ok_or_else(|| anyhow!("empty image {w}x{h}"))?;
    for (dst, src) in pm.pixels_mut().iter_mut().zip(img.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pm)
}

fn load_image(path: &Path, size_deg: f32, pixels_per_degree: Option<f32>) -> Result<Pixmap> {
    let mut img = image::open(path)
        .with_context(|| format!("failed to load stimulus {}", path.display()))?
        .to_rgba8();
    if let Some(ppd) = pixels_per_degree {
        let (w, h) = img.dimensions();
        let target_w = (size_deg * ppd).round().max(1.0) as u32;
        let target_h = ((h as f32 * target_w as f32 / w as f32).round()).max(1.0) as u32;
        if (target_w, target_h) != (w, h) {
            img = image::imageops::resize(&img, target_w, target_h, FilterType::Triangle);
        }
    }
    pixmap_from_rgba(&img)
}

fn ring_pixmap(diameter: f32, color: [u8; 4]) -> Result<Pixmap> {
    let size = (diameter + RING_STROKE_PX * 2.0).ceil() as u32;
    let mut pm = Pixmap::new(size, size).ok_or_else(|| anyhow!("ring of diameter {diameter}"))?;
    let c = size as f32 / 2.0;
    let path = PathBuilder::from_circle(c, c, diameter / 2.0)
        .ok_or_else(|| anyhow!("ring of diameter {diameter}"))?;
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(color[0], color[1], color[2], color[3]));
    let stroke = Stroke {
        width: RING_STROKE_PX,
        ..Stroke::default()
    };
    pm.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    Ok(pm)
}

pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

/// Software renderer drawing catalog stimuli and text onto an offscreen canvas,
/// then copying only the regions that changed into the window's frame buffer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),

    stimuli: Vec<CachedStimulus>,
    text_cache: Option<TextCache>,

    canvas: Pixmap,
    /// Regions drawn since the last `begin_frame`.
    dirty_regions: Vec<Rect>,
    /// Regions of the previous frame, already cleared on the canvas.
    stale_regions: Vec<Rect>,
    first_frame: bool,

    timer: HighPrecisionTimer,
    t_clear: Duration,
    t_draw: Duration,
    component_timers: HashMap<&'static str, RefCell<HighPrecisionTimer>>,
    clear_buffer: Vec<u8>,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let mut canvas =
            Pixmap::new(width, height).ok_or_else(|| anyhow!("invalid canvas {width}x{height}"))?;
        // opaque once, so every copy to the frame buffer is a plain memcpy
        canvas.fill(Color::from_rgba8(0, 0, 0, 255));

        Ok(SkiaRenderer {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            stimuli: Vec::new(),
            text_cache: None,
            canvas,
            dirty_regions: Vec::with_capacity(16),
            stale_regions: Vec::with_capacity(16),
            first_frame: true,
            timer: HighPrecisionTimer::new(),
            t_clear: Duration::ZERO,
            t_draw: Duration::ZERO,
            component_timers: ["draw", "clear", "copy"]
                .iter()
                .map(|&k| (k, RefCell::new(HighPrecisionTimer::new())))
                .collect(),
            clear_buffer: opaque_black(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn load_font(&mut self, path: &Path) -> Result<()> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("invalid font {}", path.display()))?;
        self.text_cache = Some(TextCache::new(font, TEXT_SIZE_PX));
        info!(path = %path.display(), "font loaded");
        Ok(())
    }

    /// Pre-renders every stimulus once, in catalog order, so the n-th asset is
    /// drawn by `StimulusIndex(n)`.
    pub fn load_stimuli<'a>(
        &mut self,
        assets: impl IntoIterator<Item = &'a StimulusAsset>,
        pixels_per_degree: Option<f32>,
    ) -> Result<usize> {
        self.stimuli.clear();
        for asset in assets {
            let cached = match asset {
                StimulusAsset::Image { path, size_deg } => CachedStimulus {
                    pixmap: load_image(path, *size_deg, pixels_per_degree)?,
                    offset: (0.0, 0.0),
                },
                StimulusAsset::Ring {
                    offset_px,
                    diameter_px,
                    color,
                } => CachedStimulus {
                    pixmap: ring_pixmap(*diameter_px, *color)?,
                    offset: *offset_px,
                },
            };
            self.stimuli.push(cached);
        }
        info!(stimuli = self.stimuli.len(), "stimuli loaded");
        Ok(self.stimuli.len())
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.width = new_width;
        self.height = new_height;
        self.center = (new_width as f32 / 2.0, new_height as f32 / 2.0);
        self.canvas = Pixmap::new(new_width, new_height)
            .ok_or_else(|| anyhow!("invalid canvas {new_width}x{new_height}"))?;
        self.canvas.fill(Color::from_rgba8(0, 0, 0, 255));
        self.clear_buffer = opaque_black(new_width, new_height);
        self.dirty_regions.clear();
        self.stale_regions.clear();
        self.first_frame = true;
        Ok(())
    }

    /// Clears what the previous frame drew. Call before drawing a new frame.
    pub fn begin_frame(&mut self) {
        let t = self.timer.now();
        let mut old = std::mem::take(&mut self.dirty_regions);
        self.clear_dirty(&old);
        self.stale_regions.append(&mut old);
        self.t_clear = self.timer.elapsed(t);
        self.t_draw = Duration::ZERO;
    }

    /// Blits stimulus `index` centred on the screen, shifted by its offset.
    pub fn draw_stimulus(&mut self, index: StimulusIndex) -> Result<()> {
        let t = self.timer.now();
        let cached = self
            .stimuli
            .get(index.get())
            .ok_or_else(|| anyhow!("stimulus {index} was never loaded"))?;
        let pos = (self.center.0 + cached.offset.0, self.center.1 + cached.offset.1);
        self.blit_cached_fast(index.get(), pos);
        self.t_draw += self.timer.elapsed(t);
        Ok(())
    }

    /// Draws centred, multi-line text. Without a font the call is a no-op.
    pub fn draw_text(&mut self, text: &str) -> Result<()> {
        let t = self.timer.now();
        let Some(cache) = self.text_cache.as_mut() else {
            debug!(text, "no font loaded, text not drawn");
            return Ok(());
        };
        let lines: Vec<Arc<Pixmap>> = text
            .lines()
            .map(|line| {
                cache
                    .get_or_render(Atom::from(line.trim()))
                    .ok_or_else(|| anyhow!("could not render text line {line:?}"))
            })
            .collect::<Result<_>>()?;
        let line_height = TEXT_SIZE_PX * LINE_SPACING;
        let top = self.center.1 - line_height * (lines.len() as f32 - 1.0) / 2.0;
        for (i, pm) in lines.iter().enumerate() {
            self.blit_pixmap(pm, (self.center.0, top + i as f32 * line_height));
        }
        self.t_draw += self.timer.elapsed(t);
        Ok(())
    }

    /// Copies everything that changed since the previous present into `frame_buffer`.
    pub fn present(&mut self, frame_buffer: &mut [u8]) -> Result<FrameStats> {
        if frame_buffer.len() != self.clear_buffer.len() {
            return Err(anyhow!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.clear_buffer.len()
            ));
        }
        if self.first_frame {
            self.first_frame = false;
            frame_buffer.copy_from_slice(&self.clear_buffer);
        }

        let mut present_rects = std::mem::take(&mut self.stale_regions);
        present_rects.extend_from_slice(&self.dirty_regions);
        coalesce_dirty(&mut present_rects);

        let t = self.timer.now();
        for rect in &present_rects {
            self.copy_dirty_region(*rect, frame_buffer);
        }
        let t_copy = self.timer.elapsed(t);

        self.component_timers["draw"]
            .borrow_mut()
            .record_frame(self.t_draw);
        self.component_timers["clear"]
            .borrow_mut()
            .record_frame(self.t_clear);
        self.component_timers["copy"].borrow_mut().record_frame(t_copy);

        let total = self.t_clear + self.t_draw + t_copy;
        self.timer.record_frame(total);
        Ok(FrameStats {
            clear: self.t_clear,
            draw: self.t_draw,
            copy: t_copy,
            total,
            dirty_count: present_rects.len(),
        })
    }

    /// Writes the current canvas as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.canvas
            .save_png(path)
            .with_context(|| format!("failed to save screenshot {}", path.display()))?;
        info!(path = %path.display(), "frame saved");
        Ok(())
    }

    /// Average cost of each drawing stage over the recorded frames.
    pub fn log_component_stats(&self) {
        for (name, timer) in &self.component_timers {
            let stats = timer.borrow().refresh_stats();
            if stats.average_frame_time_ns > 0.0 {
                debug!(
                    stage = *name,
                    avg_us = stats.average_frame_time_ns / 1e3,
                    max_us = stats.max_frame_time_ns / 1e3,
                    "render timing"
                );
            }
        }
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    fn clear_dirty(&mut self, dirty: &[Rect]) {
        let stride = self.width as usize * 4;
        let canvas_data = self.canvas.data_mut();
        for rect in dirty {
            let Some((x0, y0, x1, y1)) = clip(*rect, self.width, self.height) else {
                continue;
            };
            let row_len = (x1 - x0) * 4;
            for y in y0..y1 {
                let off = y * stride + x0 * 4;
                canvas_data[off..off + row_len]
                    .copy_from_slice(&self.clear_buffer[off..off + row_len]);
            }
        }
    }

    fn copy_dirty_region(&self, dirty: Rect, frame_buffer: &mut [u8]) {
        let Some((x0, y0, x1, y1)) = clip(dirty, self.width, self.height) else {
            return;
        };
        let bytes = (x1 - x0) * 4;
        let row_bytes = self.width as usize * 4;
        let canvas_data = self.canvas.data();
        for row in y0..y1 {
            let off = row * row_bytes + x0 * 4;
            frame_buffer[off..off + bytes].copy_from_slice(&canvas_data[off..off + bytes]);
        }
    }

    pub fn blit_cached_fast(&mut self, index: usize, pos: (f32, f32)) {
        let Some(cached) = self.stimuli.get(index) else {
            warn!(index, "blit of unknown stimulus");
            return;
        };
        if let Some(rect) = blit_premultiplied(&mut self.canvas, &cached.pixmap, pos) {
            self.dirty_regions.push(rect);
        }
    }

    fn blit_pixmap(&mut self, pm: &Pixmap, pos: (f32, f32)) {
        if let Some(rect) = blit_premultiplied(&mut self.canvas, pm, pos) {
            self.dirty_regions.push(rect);
        }
    }
}

fn opaque_black(width: u32, height: u32) -> Vec<u8> {
    [0u8, 0, 0, 255]
        .into_iter()
        .cycle()
        .take((width * height * 4) as usize)
        .collect()
}

/// Pixel bounds of `rect` inside a `width`x`height` canvas, or `None` when empty.
fn clip(rect: Rect, width: u32, height: u32) -> Option<(usize, usize, usize, usize)> {
    let x0 = rect.x().floor().max(0.0).min(width as f32) as usize;
    let y0 = rect.y().floor().max(0.0).min(height as f32) as usize;
    let x1 = (rect.x() + rect.width()).ceil().min(width as f32) as usize;
    let y1 = (rect.y() + rect.height()).ceil().min(height as f32) as usize;
    (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
}

fn coalesce_dirty(rects: &mut Vec<Rect>) {
    rects.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));
    let mut out: Vec<Rect> = Vec::with_capacity(rects.len());
    for r in rects.drain(..) {
        if let Some(last) = out.last_mut() {
            let same_row =
                (r.y() - last.y()).abs() < 1.0 && (r.height() - last.height()).abs() < 1.0;
            let touching = r.x() <= last.x() + last.width() + 1.0;
            if same_row && touching {
                let nx = last.x().min(r.x());
                let nx2 = (last.x() + last.width()).max(r.x() + r.width());
                if let Some(merged) = Rect::from_xywh(nx, last.y(), nx2 - nx, last.height()) {
                    *last = merged;
                    continue;
                }
            }
        }
        out.push(r);
    }
    *rects = out;
}

/// Draws `src` centred on `pos` with premultiplied source-over and returns the
/// touched rectangle. Fully opaque sources are copied row by row.
fn blit_premultiplied(canvas: &mut Pixmap, src: &Pixmap, pos: (f32, f32)) -> Option<Rect> {
    let (w, h) = (src.width() as i32, src.height() as i32);
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let x = (pos.0 - w as f32 * 0.5).floor() as i32;
    let y = (pos.1 - h as f32 * 0.5).floor() as i32;
    if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
        return None;
    }

    let dst_x = x.max(0) as usize;
    let dst_y = y.max(0) as usize;
    let src_x = (-x).max(0) as usize;
    let src_y = (-y).max(0) as usize;
    let copy_w = (w as usize - src_x).min(cw as usize - dst_x);
    let copy_h = (h as usize - src_y).min(ch as usize - dst_y);
    if copy_w == 0 || copy_h == 0 {
        return None;
    }

    let src_stride = src.width() as usize;
    let dst_stride = canvas.width() as usize;
    let src_u32: &[u32] = cast_slice(src.data());
    let dst_u32: &mut [u32] = cast_slice_mut(canvas.data_mut());

    let fully_opaque = (0..copy_h).all(|row| {
        let start = (src_y + row) * src_stride + src_x;
        src_u32[start..start + copy_w]
            .iter()
            .all(|&p| p.to_le_bytes()[3] == 255)
    });

    for row in 0..copy_h {
        let s0 = (src_y + row) * src_stride + src_x;
        let d0 = (dst_y + row) * dst_stride + dst_x;
        if fully_opaque {
            dst_u32[d0..d0 + copy_w].copy_from_slice(&src_u32[s0..s0 + copy_w]);
            continue;
        }
        for i in 0..copy_w {
            let s = src_u32[s0 + i].to_le_bytes();
            let d = dst_u32[d0 + i].to_le_bytes();
            let inv = 255 - s[3] as u32;
            let mut out = [0u8; 4];
            for c in 0..4 {
                out[c] = (s[c] as u32 + (d[c] as u32 * inv + 127) / 255).min(255) as u8;
            }
            dst_u32[d0 + i] = u32::from_le_bytes(out);
        }
    }

    Rect::from_xywh(dst_x as f32, dst_y as f32, copy_w as f32, copy_h as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(pm: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let p = pm.pixel(x, y).unwrap();
        [p.red(), p.green(), p.blue(), p.alpha()]
    }

    fn write_bmp(dir: &Path, name: &str, w: u32, h: u32, rgba: [u8; 4]) -> std::path::PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(w, h, image::Rgba(rgba))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn stimuli_are_drawn_centred_and_presented() {
        let dir = tempfile::tempdir().unwrap();
        let red = write_bmp(dir.path(), "red.bmp", 10, 10, [255, 0, 0, 255]);
        let mut r = SkiaRenderer::new(100, 80).unwrap();
        assert_eq!(r.load_stimuli([&StimulusAsset::image(red, 1.0)], None).unwrap(), 1);

        r.begin_frame();
        r.draw_stimulus(StimulusIndex(0)).unwrap();
        let mut frame = vec![0u8; 100 * 80 * 4];
        let stats = r.present(&mut frame).unwrap();
        assert_eq!(stats.dirty_count, 1);

        assert_eq!(pixel(r.canvas(), 50, 40), [255, 0, 0, 255]);
        assert_eq!(pixel(r.canvas(), 44, 40), [0, 0, 0, 255]);
        let at = |x: usize, y: usize| &frame[(y * 100 + x) * 4..(y * 100 + x) * 4 + 4];
        assert_eq!(at(45, 35), [255, 0, 0, 255]);
        assert_eq!(at(0, 0), [0, 0, 0, 255]);

        // the next frame clears the old stimulus region
        r.begin_frame();
        r.present(&mut frame).unwrap();
        let at = |x: usize, y: usize| &frame[(y * 100 + x) * 4..(y * 100 + x) * 4 + 4];
        assert_eq!(at(50, 40), [0, 0, 0, 255]);
    }

    #[test]
    fn images_scale_to_visual_degrees() {
        let dir = tempfile::tempdir().unwrap();
        let img = write_bmp(dir.path(), "face.bmp", 20, 10, [0, 0, 255, 255]);
        let pm = load_image(&img, 2.0, Some(30.0)).unwrap();
        assert_eq!((pm.width(), pm.height()), (60, 30));
        let native = load_image(&img, 2.0, None).unwrap();
        assert_eq!((native.width(), native.height()), (20, 10));
    }

    #[test]
    fn rings_sit_at_their_offset() {
        let mut r = SkiaRenderer::new(200, 200).unwrap();
        let ring = StimulusAsset::Ring {
            offset_px: (-50.0, 40.0),
            diameter_px: 20.0,
            color: [255, 0, 0, 255],
        };
        r.load_stimuli([&ring], None).unwrap();
        r.begin_frame();
        r.draw_stimulus(StimulusIndex(0)).unwrap();
        // ring centre stays empty, its rim is red
        assert_eq!(pixel(r.canvas(), 50, 140), [0, 0, 0, 255]);
        assert_eq!(pixel(r.canvas(), 60, 140)[0], 255);
    }

    #[test]
    fn unknown_stimulus_is_an_error() {
        let mut r = SkiaRenderer::new(10, 10).unwrap();
        assert!(r.draw_stimulus(StimulusIndex(3)).is_err());
    }

    #[test]
    fn missing_font_skips_text() {
        let mut r = SkiaRenderer::new(10, 10).unwrap();
        r.begin_frame();
        r.draw_text("End. \n Well done!:)").unwrap();
        let mut frame = vec![0u8; 10 * 10 * 4];
        assert_eq!(r.present(&mut frame).unwrap().dirty_count, 0);
    }

    #[test]
    fn adjacent_dirty_rects_merge() {
        let mut rects = vec![
            Rect::from_xywh(10.0, 0.0, 5.0, 5.0).unwrap(),
            Rect::from_xywh(0.0, 0.0, 10.0, 5.0).unwrap(),
            Rect::from_xywh(0.0, 20.0, 5.0, 5.0).unwrap(),
        ];
        coalesce_dirty(&mut rects);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0], Rect::from_xywh(0.0, 0.0, 15.0, 5.0).unwrap());
    }
}
