//! Overlays drawn onto output and preview frames: the debug text block, the progress bar and
//! the interpolated-frame marker.
//!
//! Every overlay is drawn only when the frame is large enough to hold it; small frames are
//! left untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::config::settings::TextType;
use crate::foundation::core::Dimensions;
use crate::foundation::error::ButterflowResult;
use crate::foundation::math::blend_u8;
use crate::media::frame::Frame;
use crate::sequence::subregion::Subregion;

const WHITE: [u8; 3] = [255, 255, 255];
const BLACK: [u8; 3] = [0, 0, 0];
const RED: [u8; 3] = [0, 0, 255];
const GRAY: [u8; 3] = [192, 192, 192];

const TXT_W_FITS: u32 = 768;
const TXT_H_FITS: u32 = 216;
const TXT_MIN_SCALE: f32 = 0.55;
const TXT_BASE_PX: f32 = 15.0;
const TXT_T_PAD: f32 = 30.0;
const TXT_SIDE_PAD: f32 = 20.0;
const TXT_LINE_GAP: f32 = 10.0;

const BAR_W_FITS: u32 = 420;
const BAR_H_FITS: u32 = 142;
const BAR_T_PAD: f32 = 0.7;
const BAR_S_PAD: f32 = 0.12;
const BAR_LN_THICK: i32 = 3;
const BAR_IN_PAD: i32 = 3;
const BAR_THICK: i32 = 15;

const MRK_W_FITS: u32 = 572;
const MRK_H_FITS: u32 = 142;
const MRK_PAD: i32 = 20;
const MRK_OUT_RADIUS: f32 = 6.0;
const MRK_IN_RADIUS: f32 = 4.0;

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation-mono/LiberationMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "/Library/Fonts/Courier New.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
    "C:\\Windows\\Fonts\\cour.ttf",
];

/// Scale at which an overlay designed for `w_fits x h_fits` fits in `dims`, or `None` when
/// it would fall below `min_scale`.
pub fn fit_scale(dims: Dimensions, w_fits: u32, h_fits: u32, min_scale: f32) -> Option<f32> {
    let scale = (dims.width as f32 / w_fits as f32).min(dims.height as f32 / h_fits as f32);
    (scale >= min_scale).then_some(scale)
}

/// What a work item is, as far as the overlays are concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Source,
    Interpolated,
}

/// Values shown by the debug text block.
#[derive(Clone, Debug)]
pub struct HudInfo<'a> {
    pub rate: f64,
    pub flow_summary: &'a str,
    /// Frames written so far across the whole render, this one included.
    pub frame_number: u64,
    pub pair_a: u64,
    pub pair_b: u64,
    /// Position between the pair: 1 for the source frame, 2.. for intermediates.
    pub btw_idx: usize,
    pub kind: FrameKind,
    pub is_dupe: bool,
    pub region: &'a Subregion,
    /// 1-based index of the region among those rendered.
    pub region_idx: usize,
    pub regions_to_render: usize,
    pub to_render: u64,
    pub written: u64,
    pub drp_every: f64,
    pub dup_every: f64,
    pub src_seen: u64,
    pub interpolated: u64,
    pub dropped: u64,
    pub duped: u64,
}

impl HudInfo<'_> {
    fn left_lines(&self, dims: Dimensions) -> Vec<String> {
        let yn = |b: bool| if b { "Y" } else { "N" };
        vec![
            format!("butterflow {} ({})", env!("CARGO_PKG_VERSION"), std::env::consts::OS),
            format!("Res: {dims}"),
            format!("Playback Rate: {:.2} fps", self.rate),
            self.flow_summary.to_string(),
            String::new(),
            format!("Frame: {}", self.frame_number),
            format!("Pair Index: {}, {}, {}", self.pair_a, self.pair_b, self.btw_idx),
            format!(
                "Type Src: {}, Int: {}, Dup: {}",
                yn(self.kind == FrameKind::Source),
                yn(self.kind == FrameKind::Interpolated),
                yn(self.is_dupe)
            ),
        ]
    }

    fn right_lines(&self) -> Vec<String> {
        let sub = self.region;
        let opt = |v: Option<f64>, scale: f64, unit: &str| {
            v.map(|v| format!("{:.2}{unit}", v / scale))
                .unwrap_or_else(|| "?".to_string())
        };
        let ratio = if self.to_render == 0 {
            0.0
        } else {
            self.written as f64 * 100.0 / self.to_render as f64
        };
        vec![
            format!(
                "Region {}/{}, F: [{}, {}], T: [{:.2}, {:.2}s]",
                self.region_idx,
                self.regions_to_render,
                sub.fa,
                sub.fb,
                sub.ta / 1000.0,
                sub.tb / 1000.0
            ),
            format!("Len F: {}, T: {:.2}s", sub.len_frames(), sub.duration_ms() / 1000.0),
            format!(
                "Target Spd: {} Dur: {} Fps: {}",
                opt(sub.target.spd(), 1.0, ""),
                opt(sub.target.dur_ms(), 1000.0, "s"),
                opt(sub.target.fps(), 1.0, "")
            ),
            format!(
                "Out Len F: {}, T: {:.2}s",
                self.to_render,
                self.to_render as f64 / self.rate
            ),
            format!("Drp every {:.1}, Dup every {:.1}", self.drp_every, self.dup_every),
            format!(
                "Src seen: {}, Int: {}, Drp: {}, Dup: {}",
                self.src_seen, self.interpolated, self.dropped, self.duped
            ),
            format!("Write Ratio: {}/{} ({ratio:.2}%)", self.written, self.to_render),
        ]
    }
}

struct Glyph {
    metrics: fontdue::Metrics,
    coverage: Vec<u8>,
}

/// Rasterizes HUD text with `fontdue`, caching glyphs per pixel size.
pub struct TextPainter {
    font: fontdue::Font,
    source: PathBuf,
    glyphs: HashMap<(char, u32), Glyph>,
}

impl TextPainter {
    pub fn from_file(path: &Path) -> ButterflowResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read HUD font '{}'", path.display()))?;
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| anyhow::anyhow!("failed to parse HUD font '{}': {e}", path.display()))?;
        Ok(Self {
            font,
            source: path.to_path_buf(),
            glyphs: HashMap::new(),
        })
    }

    /// The configured font, else the first usable system font.
    pub fn discover(configured: Option<&Path>) -> Option<Self> {
        if let Some(path) = configured {
            match Self::from_file(path) {
                Ok(p) => return Some(p),
                Err(e) => tracing::warn!("{e}; falling back to system fonts"),
            }
        }
        SYSTEM_FONTS
            .iter()
            .map(Path::new)
            .filter(|p| p.is_file())
            .find_map(|p| Self::from_file(p).ok())
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    fn glyph(&mut self, ch: char, px: f32) -> &Glyph {
        let font = &self.font;
        self.glyphs.entry((ch, px.to_bits())).or_insert_with(|| {
            let (metrics, coverage) = font.rasterize(ch, px);
            Glyph { metrics, coverage }
        })
    }

    pub fn line_width(&self, text: &str, px: f32) -> f32 {
        text.chars()
            .map(|c| self.font.metrics(c, px).advance_width)
            .sum()
    }

    fn ascent(&self, px: f32) -> f32 {
        self.font
            .horizontal_line_metrics(px)
            .map(|m| m.ascent)
            .unwrap_or(px)
    }

    /// Draw `text` with its top-left corner at `(x, top)`.
    pub fn draw_line(&mut self, frame: &mut Frame, x: f32, top: f32, px: f32, text: &str, color: [u8; 3]) {
        let baseline = top + self.ascent(px);
        let mut pen = x;
        for ch in text.chars() {
            let glyph = self.glyph(ch, px);
            let m = glyph.metrics;
            let gx = (pen + m.xmin as f32).round() as i32;
            let gy = (baseline - m.height as f32 - m.ymin as f32).round() as i32;
            for row in 0..m.height {
                for col in 0..m.width {
                    let a = glyph.coverage[row * m.width + col];
                    if a > 0 {
                        blend_pixel(frame, gx + col as i32, gy + row as i32, color, a);
                    }
                }
            }
            pen += m.advance_width;
        }
    }
}

/// Debug text overlay. Without a usable font the text is skipped after a single warning.
pub struct Hud {
    painter: Option<TextPainter>,
    text_type: TextType,
}

impl Hud {
    pub fn new(text_type: TextType, font: Option<&Path>) -> Self {
        let painter = TextPainter::discover(font);
        match &painter {
            Some(p) => tracing::debug!(font = %p.source().display(), "HUD font loaded"),
            None => tracing::warn!("no usable font found for the debug HUD; text will be skipped"),
        }
        Self { painter, text_type }
    }

    pub fn with_painter(text_type: TextType, painter: Option<TextPainter>) -> Self {
        Self { painter, text_type }
    }

    pub fn has_font(&self) -> bool {
        self.painter.is_some()
    }

    pub fn draw_info(&mut self, frame: &mut Frame, info: &HudInfo<'_>) {
        let dims = frame.dims();
        let Some(painter) = self.painter.as_mut() else {
            return;
        };
        let Some(scale) = fit_scale(dims, TXT_W_FITS, TXT_H_FITS, TXT_MIN_SCALE) else {
            return;
        };
        let scale = scale.min(1.0);
        let px = TXT_BASE_PX * scale;
        let step = px + TXT_LINE_GAP * scale;
        let color = match self.text_type {
            TextType::Dark => BLACK,
            TextType::Light | TextType::Stroke => WHITE,
        };
        let stroke = self.text_type == TextType::Stroke;

        let mut draw = |painter: &mut TextPainter, x: f32, y: f32, line: &str| {
            if stroke {
                for (dx, dy) in [(-1.0, 0.0), (1.0, 0.0), (0.0, -1.0), (0.0, 1.0)] {
                    painter.draw_line(frame, x + dx, y + dy, px, line, BLACK);
                }
            }
            painter.draw_line(frame, x, y, px, line, color);
        };

        for (i, line) in info.left_lines(dims).iter().enumerate() {
            draw(painter, TXT_SIDE_PAD, TXT_T_PAD + i as f32 * step, line);
        }
        for (i, line) in info.right_lines().iter().enumerate() {
            let w = painter.line_width(line, px);
            let x = dims.width as f32 - TXT_SIDE_PAD - w;
            draw(painter, x, TXT_T_PAD + i as f32 * step, line);
        }
    }
}

/// Circular marker in the bottom-right corner: red on interpolated frames, white otherwise.
pub fn draw_marker(frame: &mut Frame, kind: FrameKind) {
    if fit_scale(frame.dims(), MRK_W_FITS, MRK_H_FITS, 1.0).is_none() {
        return;
    }
    let cx = frame.width as f32 - (MRK_PAD as f32 + MRK_OUT_RADIUS);
    let cy = frame.height as f32 - (MRK_PAD as f32 + MRK_OUT_RADIUS);
    fill_circle(frame, cx, cy, MRK_OUT_RADIUS, WHITE);
    let fill = match kind {
        FrameKind::Interpolated => RED,
        FrameKind::Source => WHITE,
    };
    fill_circle(frame, cx, cy, MRK_IN_RADIUS, fill);
}

/// Progress bar across the lower part of the frame, `progress` in `[0, 1]`.
pub fn draw_progress_bar(frame: &mut Frame, progress: f64) {
    if fit_scale(frame.dims(), BAR_W_FITS, BAR_H_FITS, 1.0).is_none() {
        return;
    }
    let (w, h) = (frame.width as f32, frame.height as f32);
    let x0 = (w * BAR_S_PAD) as i32;
    let x1 = (w * (1.0 - BAR_S_PAD)) as i32;
    let y0 = (h * BAR_T_PAD) as i32;
    let y1 = y0 + 2 * BAR_LN_THICK + 2 * BAR_IN_PAD + BAR_THICK;

    fill_rect(frame, x0 - 1, y0 - 1, x1 + 1, y1 + 1, GRAY);
    fill_rect(frame, x0, y0, x1, y0 + BAR_LN_THICK, WHITE);
    fill_rect(frame, x0, y1 - BAR_LN_THICK, x1, y1, WHITE);
    fill_rect(frame, x0, y0, x0 + BAR_LN_THICK, y1, WHITE);
    fill_rect(frame, x1 - BAR_LN_THICK, y0, x1, y1, WHITE);
    // clear the inside so the stroke only shows around the outline
    let pad = BAR_LN_THICK;
    fill_rect(frame, x0 + pad, y0 + pad, x1 - pad, y1 - pad, BLACK);

    let pad = BAR_LN_THICK + BAR_IN_PAD;
    let (min_x, max_x) = (x0 + pad, x1 - pad);
    let p = progress.clamp(0.0, 1.0);
    if p > 0.0 {
        let end = min_x + ((max_x - min_x) as f64 * p).round() as i32;
        fill_rect(frame, min_x, y0 + pad, end.max(min_x + 1), y1 - pad, WHITE);
    }
}

fn blend_pixel(frame: &mut Frame, x: i32, y: i32, color: [u8; 3], a: u8) {
    if x < 0 || y < 0 || x >= frame.width as i32 || y >= frame.height as i32 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    let px = frame.pixel(x, y);
    frame.set_pixel(
        x,
        y,
        [
            blend_u8(px[0], color[0], a),
            blend_u8(px[1], color[1], a),
            blend_u8(px[2], color[2], a),
        ],
    );
}

/// Fill `[x0, x1) x [y0, y1)`, clipped to the frame.
fn fill_rect(frame: &mut Frame, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 3]) {
    let (w, h) = (frame.width as i32, frame.height as i32);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            frame.set_pixel(x as u32, y as u32, color);
        }
    }
}

/// Anti-aliased filled circle.
fn fill_circle(frame: &mut Frame, cx: f32, cy: f32, r: f32, color: [u8; 3]) {
    let reach = r.ceil() as i32 + 1;
    let (icx, icy) = (cx.round() as i32, cy.round() as i32);
    for y in icy - reach..=icy + reach {
        for x in icx - reach..=icx + reach {
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            let coverage = (r + 0.5 - d).clamp(0.0, 1.0);
            if coverage > 0.0 {
                blend_pixel(frame, x, y, color, (coverage * 255.0).round() as u8);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/hud.rs"]
mod tests;
