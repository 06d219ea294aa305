//! Painting the engine state onto a canvas.
//!
//! Z-order: clear, stars, moon, lanterns, rockets, particles, text, horizon
//! glow and skyline (in front, so launches rise from behind the city), the
//! midnight countdown, then the finale flash.

use std::f64::consts::TAU;

use rand::RngExt;

use super::Engine;
use super::background::{MOON_BLUR, MOON_COLOR, MOON_RADIUS, WINDOW_SIZE, WINDOW_VISIBLE};
use super::celebration::{self, Celebration};
use super::entity::{Rgb, TextParticle, TextStyle};
use super::explosion::{LINE_SPACING, wrap_words};
use super::palette::{BRAND_GRADIENT, EMBER_ORANGE, GOLD};
use crate::render::canvas::{Canvas, Rgb8, WHITE, sample_stops};
use crate::render::font;

const PARTICLE_BLUR: f64 = 10.0;
const HORIZON_BAND: f64 = 150.0;
const HORIZON_STOPS: [(f64, Rgb8, f64); 3] = [
    (0.0, (60, 30, 10), 0.0),
    (0.5, (80, 35, 15), 0.15),
    (1.0, (100, 40, 20), 0.25),
];
const FLASH_ALPHA: f64 = 0.6;

const LANTERN_CORE: Rgb8 = (255, 255, 200);
/// Cap band above and below a lantern body (world px)
const LANTERN_CAP: f64 = 5.0;
const COUNTDOWN_SIZE: f64 = 200.0;
const COUNTDOWN_CAPTION_SIZE: f64 = 28.0;
const COUNTDOWN_CAPTION_WIDTH: usize = 36;

// Building shading, darkest to lightest.
const BUILDING_BACK: Rgb8 = (10, 10, 10);
const BUILDING_BODY: Rgb8 = (13, 13, 13);
const BUILDING_LEFT: Rgb8 = (17, 17, 17);
const BUILDING_RIGHT: Rgb8 = (6, 6, 6);
const BUILDING_TOP: Rgb8 = (16, 16, 16);

impl Engine {
    /// Paint one frame. Also steps the background's ambient animation.
    pub fn draw(&mut self, canvas: &mut Canvas) {
        let k = canvas.height as f64 / self.height;
        canvas.clear();
        if self.shake > 0.0 {
            let a = self.rng.random::<f64>() * TAU;
            canvas.set_offset(a.cos() * self.shake * k, a.sin() * self.shake * k);
        }

        self.draw_sky(canvas, k);
        self.draw_lanterns(canvas, k);
        self.draw_rockets(canvas, k);
        self.draw_particles(canvas, k);
        for t in &self.texts {
            draw_text(canvas, t, k);
        }
        self.draw_city(canvas, k);
        if let Some(c) = &self.celebration {
            draw_countdown(canvas, c, (self.width / 2.0, self.height / 2.0), k);
        }

        if self.flash > 0.0 {
            canvas.wash(WHITE, self.flash * FLASH_ALPHA);
        }
        self.background.animate(&mut self.rng);
    }

    fn draw_sky(&self, canvas: &mut Canvas, k: f64) {
        for star in &self.background.stars {
            canvas.fill_circle(star.x * k, star.y * k, star.size * k, WHITE, star.opacity);
        }
        let (mx, my) = self.background.moon;
        canvas.glow_circle(mx * k, my * k, MOON_RADIUS * k, MOON_BLUR * k, MOON_COLOR.rgb8(), 1.0);
    }

    fn draw_lanterns(&self, canvas: &mut Canvas, k: f64) {
        for l in &self.lanterns {
            let color = l.color.rgb8();
            let glow = l.glow();
            let (bw, bh) = (l.size * 0.6, l.size);
            let (left, top) = (l.x - bw / 2.0, l.y - bh / 2.0);
            let cap = (color.0.saturating_sub(50), color.1.saturating_sub(50), color.2.saturating_sub(50));

            canvas.glow_circle(l.x * k, l.y * k, bw / 2.0 * k, l.size * 1.5 * k, color, glow * 0.6 * l.alpha);
            canvas.fill_rect(left * k, top * k, bw * k, bh * k, color, 0.9 * l.alpha);
            for y in [top - LANTERN_CAP, top + bh] {
                canvas.fill_rect((left - 2.0) * k, y * k, (bw + 4.0) * k, LANTERN_CAP * k, cap, 0.9 * l.alpha);
            }
            canvas.fill_circle(l.x * k, l.y * k, bw / 2.0 * k, LANTERN_CORE, glow * 0.8 * l.alpha);
        }
    }

    fn draw_rockets(&mut self, canvas: &mut Canvas, k: f64) {
        for rocket in &self.rockets {
            let len = rocket.trail.len();
            let segments = rocket.trail.iter().zip(rocket.trail.iter().skip(1));
            for (i, (&(x0, y0), &(x1, y1))) in segments.enumerate() {
                let opacity = 1.0 - i as f64 / len as f64;
                let color = trail_color(&mut self.rng);
                canvas.line(
                    (x0 * k, y0 * k),
                    (x1 * k, y1 * k),
                    2.0 * rocket.scale * opacity * k,
                    color,
                    opacity * 0.7,
                );
            }
            if let Some(&(lx, ly)) = rocket.trail.front() {
                let color = trail_color(&mut self.rng);
                canvas.line((lx * k, ly * k), (rocket.x * k, rocket.y * k), 2.0 * rocket.scale * k, color, 0.9);
            }
        }
    }

    fn draw_particles(&self, canvas: &mut Canvas, k: f64) {
        for p in &self.particles {
            let color = p.color.rgb8();
            let len = p.trail.len() as f64;
            for (i, point) in p.trail.iter().enumerate() {
                let fade = point.life * (1.0 - i as f64 / len);
                canvas.fill_circle(point.x * k, point.y * k, p.size * 0.5 * k, color, fade * 0.6);
            }
            canvas.glow_circle(p.x * k, p.y * k, p.size * k, PARTICLE_BLUR * k, color, p.life);
        }
    }

    fn draw_city(&self, canvas: &mut Canvas, k: f64) {
        let (w, h) = (self.width, self.height);
        canvas.vertical_gradient(
            0.0,
            (h - HORIZON_BAND) * k,
            w * k,
            HORIZON_BAND * k,
            &HORIZON_STOPS,
        );

        for b in &self.background.buildings {
            let top = h - b.height;
            let rect = |x: f64, y: f64, rw: f64, rh: f64| (x * k, y * k, rw * k, rh * k);
            let layers = [
                (rect(b.x - 2.0, top - 2.0, b.width + 4.0, b.height + 2.0), BUILDING_BACK),
                (rect(b.x, top, b.width, b.height), BUILDING_BODY),
                (rect(b.x, top, 2.0, b.height), BUILDING_LEFT),
                (rect(b.x + b.width - 2.0, top, 2.0, b.height), BUILDING_RIGHT),
                (rect(b.x, top, b.width, 1.0), BUILDING_TOP),
            ];
            for ((x, y, rw, rh), color) in layers {
                canvas.fill_rect(x, y, rw, rh, color, 1.0);
            }

            for win in b.windows.iter().filter(|w| w.brightness > WINDOW_VISIBLE) {
                let (x, y, rw, rh) = rect(b.x + win.x, top + win.y, WINDOW_SIZE.0, WINDOW_SIZE.1);
                canvas.fill_rect(x, y, rw, rh, win.color().rgb8(), 1.0);
            }
        }
    }
}

fn trail_color(rng: &mut impl RngExt) -> Rgb8 {
    if rng.random::<f64>() < 0.3 { EMBER_ORANGE.rgb8() } else { WHITE }
}

/// Pixel classes of a rasterised label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ink {
    Blank,
    Fill,
    Stroke,
    Halo,
}

/// A label rasterised at integer glyph scale, padded for stroke and halo.
struct TextMask {
    width: usize,
    height: usize,
    ink: Vec<Ink>,
}

const MASK_PAD: usize = 2;

impl TextMask {
    fn new(text: &str, px: usize) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let pitch = ((font::GLYPH_H * px) as f64 * LINE_SPACING).round() as usize;
        let content_w = lines.iter().map(|l| font::line_width(l) * px).max().unwrap_or(0);
        let content_h = match lines.len() {
            0 => 0,
            n => (n - 1) * pitch + font::GLYPH_H * px,
        };
        let width = content_w + MASK_PAD * 2;
        let height = content_h + MASK_PAD * 2;
        let mut ink = vec![Ink::Blank; width * height];

        for (li, line) in lines.iter().enumerate() {
            let left = MASK_PAD + (content_w - font::line_width(line) * px) / 2;
            let top = MASK_PAD + li * pitch;
            for (col, row) in font::cells(line) {
                for dy in 0..px {
                    for dx in 0..px {
                        let x = left + col * px + dx;
                        let y = top + row * px + dy;
                        ink[y * width + x] = Ink::Fill;
                    }
                }
            }
        }

        let filled = ink.clone();
        let near = |x: usize, y: usize, r: isize| {
            (-r..=r).any(|dy| {
                (-r..=r).any(|dx| {
                    let (nx, ny) = (x as isize + dx, y as isize + dy);
                    nx >= 0
                        && ny >= 0
                        && (nx as usize) < width
                        && (ny as usize) < height
                        && filled[ny as usize * width + nx as usize] == Ink::Fill
                })
            })
        };
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                if ink[i] != Ink::Blank {
                    continue;
                }
                if near(x, y, 1) {
                    ink[i] = Ink::Stroke;
                } else if near(x, y, 2) {
                    ink[i] = Ink::Halo;
                }
            }
        }

        TextMask { width, height, ink }
    }
}

/// Seconds left in big gold digits with the next zone's countries beneath.
fn draw_countdown(canvas: &mut Canvas, celebration: &Celebration, (cx, cy): (f64, f64), k: f64) {
    let Some(cd) = celebration.countdown() else {
        return;
    };
    let digits = TextParticle {
        x: cx,
        y: cy,
        text: cd.seconds_left.to_string(),
        size: COUNTDOWN_SIZE * cd.pulse,
        color: GOLD,
        life: 1.0,
        scale: 1.0,
        style: TextStyle::Finale,
        ..TextParticle::default()
    };
    draw_text(canvas, &digits, k);

    let names = celebration::zone_names(cd.zone).join("  ");
    let caption = TextParticle {
        y: cy + COUNTDOWN_SIZE * 0.8,
        text: wrap_words(&names, COUNTDOWN_CAPTION_WIDTH).join("\n"),
        size: COUNTDOWN_CAPTION_SIZE,
        color: Rgb::WHITE,
        style: TextStyle::Plain,
        ..digits
    };
    draw_text(canvas, &caption, k);
}

/// Integer glyph scale for a label of `size` world px.
fn glyph_scale(size: f64) -> usize {
    ((size / font::GLYPH_H as f64).round() as usize).max(1)
}

fn draw_text(canvas: &mut Canvas, t: &TextParticle, k: f64) {
    if t.text.is_empty() || t.life <= 0.0 {
        return;
    }
    let mask = TextMask::new(&t.text, glyph_scale(t.size * t.scale * k));
    let left = (t.x * k - mask.width as f64 / 2.0).round();
    let top = (t.y * k - mask.height as f64 / 2.0).round();
    let alpha = t.life.min(1.0);
    let span = (mask.width.saturating_sub(MASK_PAD * 2)).max(1) as f64;
    let gradient = [
        (0.0, BRAND_GRADIENT[0].rgb8(), 1.0),
        (0.5, BRAND_GRADIENT[1].rgb8(), 1.0),
        (1.0, BRAND_GRADIENT[2].rgb8(), 1.0),
    ];

    // (fill, stroke, halo) colours; `None` fill means gradient.
    let (fill, stroke, halo): (Option<Rgb8>, Rgb8, Option<Rgb8>) = match t.style {
        TextStyle::Plain => (Some(WHITE), t.color.rgb8(), None),
        TextStyle::Country { glow } => (Some(WHITE), glow.rgb8(), Some(glow.rgb8())),
        TextStyle::Brand => (None, WHITE, Some(GOLD.rgb8())),
        TextStyle::Finale => (None, GOLD.rgb8(), Some(Rgb::WHITE.rgb8())),
    };

    for y in 0..mask.height {
        for x in 0..mask.width {
            let (px, py) = (left + x as f64, top + y as f64);
            match mask.ink[y * mask.width + x] {
                Ink::Blank => {}
                Ink::Fill => {
                    let color = fill.unwrap_or_else(|| {
                        let u = (x.saturating_sub(MASK_PAD)) as f64 / span;
                        sample_stops(&gradient, u).0
                    });
                    canvas.plot(px, py, color, alpha);
                }
                Ink::Stroke => canvas.plot(px, py, stroke, alpha),
                Ink::Halo => {
                    if let Some(c) = halo {
                        canvas.plot(px, py, c, alpha * 0.35);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{ColorMode, RenderMode};
    use crate::show::launch::SizeSpec;

    #[test]
    fn test_mask_strokes_surround_fill() {
        let mask = TextMask::new("-", 1);
        assert_eq!(mask.width, 5 + MASK_PAD * 2);
        assert_eq!(mask.height, 7 + MASK_PAD * 2);
        let at = |x: usize, y: usize| mask.ink[y * mask.width + x];
        // The bar of '-' is on glyph row 3
        assert_eq!(at(MASK_PAD, MASK_PAD + 3), Ink::Fill);
        assert_eq!(at(MASK_PAD, MASK_PAD + 2), Ink::Stroke);
        assert_eq!(at(MASK_PAD, MASK_PAD + 1), Ink::Halo);
        assert_eq!(at(0, 0), Ink::Blank);
    }

    #[test]
    fn test_multiline_mask_stacks_lines() {
        let one = TextMask::new("AB", 2);
        let two = TextMask::new("AB\nC", 2);
        assert_eq!(one.width, two.width);
        assert!(two.height > one.height * 2 - MASK_PAD * 4);
    }

    #[test]
    fn test_glyph_scale_never_zero() {
        assert_eq!(glyph_scale(0.0), 1);
        assert_eq!(glyph_scale(14.0), 2);
    }

    #[test]
    fn test_empty_sky_draws_moon_only_above_city() {
        let mut engine = Engine::with_seed(400.0, 200.0, 1);
        let mut canvas = Canvas::new(100, 50, RenderMode::Braille, ColorMode::TrueColor);
        engine.resize(canvas.width as f64 / canvas.height as f64 * 200.0, 200.0);
        engine.draw(&mut canvas);
        // Moon at (width - 120, 80) world
        let k = canvas.height as f64 / 200.0;
        let mx = ((engine.width() - 120.0) * k) as usize;
        let my = (80.0 * k) as usize;
        assert!(canvas.sample(my * canvas.width + mx).0 > 0.8);
    }

    #[test]
    fn test_burst_particles_are_visible() {
        let mut engine = Engine::with_seed(900.0, 900.0, 2);
        let mut canvas = Canvas::new(60, 30, RenderMode::HalfBlock, ColorMode::TrueColor);
        engine.resize(canvas.width as f64 / canvas.height as f64 * 900.0, 900.0);

        engine.launch(400.0, SizeSpec::Points(40));
        for _ in 0..300 {
            engine.advance(1.0 / 60.0);
            if !engine.particles.is_empty() {
                break;
            }
        }
        assert!(engine.rockets.is_empty());
        assert!(!engine.particles.is_empty());

        engine.draw(&mut canvas);
        let k = canvas.height as f64 / 900.0;
        let p = &engine.particles[0];
        let (px, py) = ((p.x * k) as usize, (p.y * k) as usize);
        let brightest = (py - 1..=py + 1)
            .flat_map(|y| (px - 1..=px + 1).map(move |x| (x, y)))
            .map(|(x, y)| canvas.sample(y * canvas.width + x).0)
            .fold(0.0, f64::max);
        assert!(brightest > 0.5);
    }

    fn brightest_near(canvas: &Canvas, (px, py): (usize, usize), r: usize) -> f64 {
        (py.saturating_sub(r)..=py + r)
            .flat_map(|y| (px.saturating_sub(r)..=px + r).map(move |x| (x, y)))
            .filter(|&(x, y)| x < canvas.width && y < canvas.height)
            .map(|(x, y)| canvas.sample(y * canvas.width + x).0)
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_lantern_glows_in_the_sky() {
        let mut engine = Engine::with_seed(900.0, 900.0, 4);
        let mut canvas = Canvas::new(60, 30, RenderMode::HalfBlock, ColorMode::TrueColor);
        engine.resize(canvas.width as f64 / canvas.height as f64 * 900.0, 900.0);
        assert!(engine.launch_lantern());
        engine.lanterns[0].x = 300.0;
        engine.lanterns[0].y = 300.0;
        engine.draw(&mut canvas);
        let k = canvas.height as f64 / 900.0;
        assert!(brightest_near(&canvas, ((300.0 * k) as usize, (300.0 * k) as usize), 1) > 0.5);
    }

    #[test]
    fn test_countdown_digits_fill_the_centre() {
        use crate::show::celebration::{DEFAULT_TIME_SCALE, WorldClock};
        let mut engine = Engine::with_seed(900.0, 900.0, 5);
        let mut canvas = Canvas::new(100, 50, RenderMode::Braille, ColorMode::TrueColor);
        engine.resize(canvas.width as f64 / canvas.height as f64 * 900.0, 900.0);
        engine.set_celebration(Some(Celebration::new(WorldClock::accelerated(2026, DEFAULT_TIME_SCALE), 2026)));
        for _ in 0..1000 {
            if engine.celebration().and_then(Celebration::countdown).is_some() {
                break;
            }
            engine.advance(1.0 / 30.0);
        }
        assert!(engine.celebration().and_then(Celebration::countdown).is_some());

        engine.draw(&mut canvas);
        let k = canvas.height as f64 / 900.0;
        let centre = ((engine.width() / 2.0 * k) as usize, (450.0 * k) as usize);
        assert!(brightest_near(&canvas, centre, 8) > 0.5);
    }

    #[test]
    fn test_flash_washes_the_frame() {
        let mut engine = Engine::with_seed(200.0, 100.0, 3);
        let mut canvas = Canvas::new(20, 10, RenderMode::HalfBlock, ColorMode::TrueColor);
        engine.flash = 1.0;
        engine.draw(&mut canvas);
        assert!(canvas.sample(0).0 >= FLASH_ALPHA - 1e-6);
    }

    #[test]
    fn test_text_draws_fill_and_stroke() {
        let mut canvas = Canvas::new(40, 10, RenderMode::HalfBlock, ColorMode::TrueColor);
        let t = TextParticle {
            x: 20.0,
            y: 10.0,
            text: "HI".into(),
            size: 7.0,
            color: Rgb::new(255, 0, 0),
            life: 1.0,
            scale: 1.0,
            ..Default::default()
        };
        draw_text(&mut canvas, &t, 1.0);
        let colors: Vec<Rgb8> = (0..canvas.width * canvas.height)
            .map(|i| canvas.sample(i))
            .filter(|(v, _)| *v > 0.9)
            .map(|(_, c)| c)
            .collect();
        assert!(colors.contains(&WHITE));
        assert!(colors.contains(&(255, 0, 0)));
    }
}
