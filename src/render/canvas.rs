use crossterm::style::Color;

/// How canvas pixels are packed into terminal characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RenderMode {
    /// Unicode braille characters (2x4 per cell = highest resolution)
    Braille,
    /// Half-block characters ▀ (1x2 per cell, full color per pixel)
    HalfBlock,
}

/// Color output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    /// Monochrome
    Mono,
    /// ANSI 16 colors
    Ansi16,
    /// 256-color palette
    Ansi256,
    /// 24-bit true color (RGB)
    TrueColor,
}

/// An 8-bit RGB color as used by the drawing primitives.
pub type Rgb8 = (u8, u8, u8);

pub const WHITE: Rgb8 = (255, 255, 255);

/// A pixel-level surface that gets rendered to terminal characters.
///
/// Each pixel holds the composited color in 0.0..=1.0 per channel. Drawing
/// primitives take sub-pixel `f64` coordinates and composite "source over"
/// the existing color, the way a 2D canvas context would.
pub struct Canvas {
    /// Width in pixels (sub-cell)
    pub width: usize,
    /// Height in pixels (sub-cell)
    pub height: usize,
    px: Vec<[f32; 3]>,
    pub render_mode: RenderMode,
    pub color_mode: ColorMode,
    /// Color quantization step (0 = off, 4/8/16 = round RGB to nearest N).
    pub color_quant: u8,
    /// Translation applied to every primitive (screen shake)
    offset: (f64, f64),
}

impl Canvas {
    pub fn new(
        term_cols: usize,
        term_rows: usize,
        render_mode: RenderMode,
        color_mode: ColorMode,
    ) -> Self {
        let (px_w, px_h) = match render_mode {
            RenderMode::Braille => (term_cols * 2, term_rows * 4),
            RenderMode::HalfBlock => (term_cols, term_rows * 2),
        };
        Canvas {
            width: px_w,
            height: px_h,
            px: vec![[0.0; 3]; px_w * px_h],
            render_mode,
            color_mode,
            color_quant: 0,
            offset: (0.0, 0.0),
        }
    }

    /// Opaque black clear; also resets the translation.
    pub fn clear(&mut self) {
        self.px.fill([0.0; 3]);
        self.offset = (0.0, 0.0);
    }

    pub fn set_offset(&mut self, dx: f64, dy: f64) {
        self.offset = (dx, dy);
    }

    /// Brightness (max channel) and full-intensity color of a pixel.
    pub fn sample(&self, idx: usize) -> (f64, Rgb8) {
        let [r, g, b] = self.px[idx];
        let v = r.max(g).max(b);
        if v <= 0.0 {
            return (0.0, (0, 0, 0));
        }
        let scale = 255.0 / v;
        (
            v as f64,
            (
                (r * scale).round().min(255.0) as u8,
                (g * scale).round().min(255.0) as u8,
                (b * scale).round().min(255.0) as u8,
            ),
        )
    }

    /// Composite one pixel "source over". Out of bounds is ignored.
    #[inline]
    pub fn blend(&mut self, x: isize, y: isize, color: Rgb8, alpha: f64) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let a = alpha.clamp(0.0, 1.0) as f32;
        if a <= 0.0 {
            return;
        }
        let p = &mut self.px[y as usize * self.width + x as usize];
        let src = [color.0 as f32 / 255.0, color.1 as f32 / 255.0, color.2 as f32 / 255.0];
        for c in 0..3 {
            p[c] = p[c] * (1.0 - a) + src[c] * a;
        }
    }

    /// Additive compositing, used for glow halos.
    #[inline]
    pub fn add(&mut self, x: isize, y: isize, color: Rgb8, alpha: f64) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let a = alpha.clamp(0.0, 1.0) as f32;
        let p = &mut self.px[y as usize * self.width + x as usize];
        p[0] = (p[0] + color.0 as f32 / 255.0 * a).min(1.0);
        p[1] = (p[1] + color.1 as f32 / 255.0 * a).min(1.0);
        p[2] = (p[2] + color.2 as f32 / 255.0 * a).min(1.0);
    }

    /// Single pixel at sub-pixel coordinates (translated).
    pub fn plot(&mut self, x: f64, y: f64, color: Rgb8, alpha: f64) {
        let (x, y) = (x + self.offset.0, y + self.offset.1);
        self.blend(x.floor() as isize, y.floor() as isize, color, alpha);
    }

    /// Filled disc. Radii below half a pixel still cover the center pixel.
    pub fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Rgb8, alpha: f64) {
        self.disc(cx, cy, radius, color, alpha, false);
    }

    /// Filled disc with a soft halo standing in for a shadow blur of `blur` pixels.
    pub fn glow_circle(&mut self, cx: f64, cy: f64, radius: f64, blur: f64, color: Rgb8, alpha: f64) {
        if blur > 0.0 {
            self.disc(cx, cy, radius + blur / 4.0, color, alpha * 0.25, true);
        }
        self.disc(cx, cy, radius, color, alpha, false);
    }

    fn disc(&mut self, cx: f64, cy: f64, radius: f64, color: Rgb8, alpha: f64, additive: bool) {
        let (cx, cy) = (cx + self.offset.0, cy + self.offset.1);
        let r = radius.max(0.5);
        let x0 = (cx - r).floor() as isize;
        let x1 = (cx + r).ceil() as isize;
        let y0 = (cy - r).floor() as isize;
        let y1 = (cy + r).ceil() as isize;
        let mut hit = false;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                if dx * dx + dy * dy <= r * r {
                    hit = true;
                    if additive {
                        self.add(x, y, color, alpha);
                    } else {
                        self.blend(x, y, color, alpha);
                    }
                }
            }
        }
        if !hit {
            let (x, y) = (cx.floor() as isize, cy.floor() as isize);
            if additive {
                self.add(x, y, color, alpha);
            } else {
                self.blend(x, y, color, alpha);
            }
        }
    }

    /// Round-capped line segment; every covered pixel is blended exactly once.
    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), width: f64, color: Rgb8, alpha: f64) {
        let (ax, ay) = (from.0 + self.offset.0, from.1 + self.offset.1);
        let (bx, by) = (to.0 + self.offset.0, to.1 + self.offset.1);
        let half = (width / 2.0).max(0.5);
        let x0 = (ax.min(bx) - half).floor() as isize;
        let x1 = (ax.max(bx) + half).ceil() as isize;
        let y0 = (ay.min(by) - half).floor() as isize;
        let y1 = (ay.max(by) + half).ceil() as isize;
        let (vx, vy) = (bx - ax, by - ay);
        let len2 = vx * vx + vy * vy;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let px = x as f64 + 0.5;
                let py = y as f64 + 0.5;
                let t = if len2 > 0.0 {
                    (((px - ax) * vx + (py - ay) * vy) / len2).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let dx = px - (ax + vx * t);
                let dy = py - (ay + vy * t);
                if dx * dx + dy * dy <= half * half {
                    self.blend(x, y, color, alpha);
                }
            }
        }
    }

    /// Axis-aligned rectangle covering at least one pixel.
    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb8, alpha: f64) {
        let (x, y) = (x + self.offset.0, y + self.offset.1);
        let x0 = x.floor() as isize;
        let y0 = y.floor() as isize;
        let x1 = ((x + w).floor() as isize).max(x0 + 1);
        let y1 = ((y + h).floor() as isize).max(y0 + 1);
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color, alpha);
            }
        }
    }

    /// Rectangle filled with a top-to-bottom gradient of `(t, color, alpha)` stops.
    pub fn vertical_gradient(&mut self, x: f64, y: f64, w: f64, h: f64, stops: &[(f64, Rgb8, f64)]) {
        if stops.is_empty() || h <= 0.0 {
            return;
        }
        let rows = h.ceil().max(1.0) as usize;
        for row in 0..rows {
            let t = (row as f64 + 0.5) / rows as f64;
            let (color, alpha) = sample_stops(stops, t);
            self.fill_rect(x, y + row as f64, w, 1.0, color, alpha);
        }
    }

    /// Blend a uniform color over the whole surface (flash overlay).
    pub fn wash(&mut self, color: Rgb8, alpha: f64) {
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                self.blend(x, y, color, alpha);
            }
        }
    }

    /// Terminal dimensions needed for this canvas
    pub fn term_size(&self) -> (usize, usize) {
        match self.render_mode {
            RenderMode::Braille => (self.width / 2, self.height / 4),
            RenderMode::HalfBlock => (self.width, self.height / 2),
        }
    }

    /// Render the canvas to a string buffer for output
    pub fn render(&self) -> String {
        match self.render_mode {
            RenderMode::Braille => super::braille::render(self),
            RenderMode::HalfBlock => super::halfblock::render(self),
        }
    }

    pub fn map_color(&self, r: u8, g: u8, b: u8) -> Color {
        let (r, g, b) = if self.color_quant > 1 {
            let q = self.color_quant as u16;
            let quant = |c: u8| ((c as u16 + q / 2) / q * q).min(255) as u8;
            (quant(r), quant(g), quant(b))
        } else {
            (r, g, b)
        };
        match self.color_mode {
            ColorMode::Mono => Color::White,
            ColorMode::TrueColor => Color::Rgb { r, g, b },
            ColorMode::Ansi256 => {
                let idx = 16 + (36 * (r as u16 / 51)) + (6 * (g as u16 / 51)) + (b as u16 / 51);
                Color::AnsiValue(idx as u8)
            }
            ColorMode::Ansi16 => {
                let brightness = (r as u16 + g as u16 + b as u16) / 3;
                let bright = brightness > 180;
                if brightness < 64 {
                    Color::Black
                } else if r > g && r > b {
                    if bright { Color::Red } else { Color::DarkRed }
                } else if g > r && g > b {
                    if bright { Color::Yellow } else { Color::DarkYellow }
                } else if b > r && b > g {
                    if bright { Color::Blue } else { Color::DarkBlue }
                } else if bright {
                    Color::White
                } else {
                    Color::Grey
                }
            }
        }
    }
}

/// Linear interpolation across gradient stops sorted by `t`.
pub fn sample_stops(stops: &[(f64, Rgb8, f64)], t: f64) -> (Rgb8, f64) {
    let first = stops[0];
    if t <= first.0 {
        return (first.1, first.2);
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.0 {
            let span = (b.0 - a.0).max(f64::EPSILON);
            let f = (t - a.0) / span;
            let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * f).round() as u8;
            return (
                (mix(a.1.0, b.1.0), mix(a.1.1, b.1.1), mix(a.1.2, b.1.2)),
                a.2 + (b.2 - a.2) * f,
            );
        }
    }
    let last = stops[stops.len() - 1];
    (last.1, last.2)
}

pub fn color_to_fg(color: Color) -> String {
    match color {
        Color::Rgb { r, g, b } => format!("38;2;{};{};{}", r, g, b),
        Color::AnsiValue(v) => format!("38;5;{}", v),
        other => format!("{}", 30 + ansi16_index(other)),
    }
}

pub fn color_to_bg(color: Color) -> String {
    match color {
        Color::Rgb { r, g, b } => format!("48;2;{};{};{}", r, g, b),
        Color::AnsiValue(v) => format!("48;5;{}", v),
        other => format!("{}", 40 + ansi16_index(other)),
    }
}

/// Offset from the 30/40 SGR base; bright colors live at +60.
fn ansi16_index(color: Color) -> u16 {
    match color {
        Color::Black => 0,
        Color::DarkRed => 1,
        Color::DarkGreen => 2,
        Color::DarkYellow => 3,
        Color::DarkBlue => 4,
        Color::DarkMagenta => 5,
        Color::DarkCyan => 6,
        Color::Grey => 7,
        Color::DarkGrey => 60,
        Color::Red => 61,
        Color::Green => 62,
        Color::Yellow => 63,
        Color::Blue => 64,
        Color::Magenta => 65,
        Color::Cyan => 66,
        Color::White => 67,
        _ => 7,
    }
}
