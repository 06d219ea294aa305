//! Turning a spent rocket into particles and text.

use std::f64::consts::TAU;

use rand::RngExt;

use super::Engine;
use super::entity::{ClassicFinish, FinaleSpec, FireworkKind, Rgb, Rocket, Spark, TextStyle};
use super::palette::{self, EMBER_ORANGE, GOLD, GOLD_WHITE, SPARKLE};
use super::schedule::Deferred;

/// Delay before the extra white sparks of a large burst
const SECONDARY_DELAY: f64 = 0.2;
/// Gap between finale shockwave rings
const RING_INTERVAL: f64 = 0.1;
const RING_COUNT: u32 = 3;
const RING_PARTICLES: usize = 72;

const TEXT_RISE: f64 = -50.0;
const TEXT_DECAY: f64 = 0.008;
const TEXT_START_SCALE: f64 = 0.1;

const CROWN_SIZE: f64 = 90.0;
const MESSAGE_SIZE: f64 = 40.0;
const FINALE_TEXT_START_SCALE: f64 = 0.5;
const FINALE_TEXT_DECAY: f64 = 0.004;
/// Characters per line of a wrapped finale message
pub const MESSAGE_WRAP: usize = 18;
/// Line height as a multiple of the font size
pub const LINE_SPACING: f64 = 1.2;

const FINALE_FLASH: f64 = 1.0;
const FINALE_SHAKE: f64 = 12.0;

/// What one detonation produced synchronously.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Burst {
    /// Main body particles (rings and inner burst for finales)
    pub primary: usize,
    /// Overlay particles (gold sparkle, or the first shockwave ring)
    pub sparkles: usize,
    pub texts: usize,
    /// Effects queued for later advances
    pub deferred: usize,
}

/// Colour and physics family of a standard detonation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Profile {
    Gold,
    Country,
    Classic,
    Plain,
}

impl Profile {
    fn of(kind: &FireworkKind) -> Self {
        match kind {
            FireworkKind::Country { .. } => Profile::Country,
            _ if !kind.drip() => Profile::Plain,
            FireworkKind::Classic {
                finish: ClassicFinish::Gold,
                ..
            } => Profile::Gold,
            _ => Profile::Classic,
        }
    }

    fn base_count(self) -> f64 {
        match self {
            Profile::Gold => 150.0,
            Profile::Country => 120.0,
            Profile::Classic | Profile::Plain => 80.0,
        }
    }

    /// Colour, size, decay, gravity, and drip for one particle.
    fn spark(self, colors: &[Rgb; 4], scale: f64, angle: f64, speed: f64, rng: &mut impl RngExt) -> Spark {
        let mut u = || rng.random::<f64>();
        let (color, size, decay, gravity, drip) = match self {
            Profile::Country => {
                let slot = ((u() * 4.0) as usize).min(3);
                (colors[slot], (2.0 + u() * 3.0) * scale, 0.012 + u() * 0.008, 60.0 + u() * 60.0, false)
            }
            Profile::Gold => {
                let pick = u();
                let color = if pick < 0.4 {
                    colors[0]
                } else if pick < 0.7 {
                    colors[1]
                } else {
                    GOLD_WHITE
                };
                (color, (2.0 + u() * 4.0) * scale, 0.008 + u() * 0.005, 150.0 + u() * 100.0, true)
            }
            Profile::Classic => {
                let color = if u() < 0.5 { colors[0] } else { colors[1] };
                (color, (3.0 + u() * 3.0) * scale, 0.008 + u() * 0.005, 150.0 + u() * 100.0, true)
            }
            Profile::Plain => (colors[0], (2.0 + u() * 2.0) * scale, 0.015 + u() * 0.01, 50.0 + u() * 50.0, false),
        };
        Spark {
            angle,
            speed,
            color,
            size,
            decay,
            gravity,
            drip,
        }
    }
}

/// Greedy word wrap; words longer than `width` are split.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            lines.push(word.drain(..width).collect());
        }
        let line_len = line.chars().count();
        if line_len > 0 && line_len + 1 + word.len() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.extend(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

impl Engine {
    /// Burst a rocket. Particles go straight into the active list; deferred
    /// effects land in the schedule.
    pub(super) fn detonate(&mut self, rocket: &Rocket) -> Burst {
        if let FireworkKind::Finale(spec) = &rocket.kind {
            return self.detonate_finale(rocket, spec);
        }

        let origin = (rocket.x, rocket.y);
        let scale = rocket.scale;
        let profile = Profile::of(&rocket.kind);
        let count = (profile.base_count() * scale).floor() as usize
            + (self.rng.random::<f64>() * 60.0 * scale).floor() as usize;
        let mode = self.rng.random::<f64>();

        for i in 0..count {
            let u = self.rng.random::<f64>();
            let (angle, speed) = if mode < 0.3 {
                (TAU * i as f64 / count as f64, (150.0 + u * 100.0) * scale)
            } else if mode < 0.6 {
                (TAU * i as f64 / count as f64, (200.0 + u * 50.0) * scale)
            } else {
                (self.rng.random::<f64>() * TAU, (100.0 + u * 150.0) * scale)
            };
            let spark = profile.spark(&rocket.colors, scale, angle, speed, &mut self.rng);
            self.emit(origin, &spark);
        }

        let mut burst = Burst {
            primary: count,
            ..Burst::default()
        };

        if profile == Profile::Gold {
            burst.sparkles = (50.0 * scale).floor() as usize;
            for _ in 0..burst.sparkles {
                let spark = Spark {
                    angle: self.rng.random::<f64>() * TAU,
                    speed: (80.0 + self.rng.random::<f64>() * 120.0) * scale,
                    color: SPARKLE,
                    size: (1.0 + self.rng.random::<f64>() * 2.0) * scale,
                    decay: 0.012,
                    gravity: 200.0 + self.rng.random::<f64>() * 50.0,
                    drip: true,
                };
                self.emit(origin, &spark);
            }
        }

        let label = match rocket.kind.country_name() {
            Some(name) => Some((name.to_owned(), TextStyle::Country { glow: rocket.colors[0] })),
            None => rocket
                .word
                .clone()
                .or_else(|| self.random_word())
                .map(|w| (w, rocket.text_style)),
        };
        if let Some((text, style)) = label {
            let mut t = self.pool.texts.acquire();
            t.x = rocket.x;
            t.y = rocket.y;
            t.vy = TEXT_RISE * scale;
            t.text.push_str(&text);
            t.size = rocket.text_size;
            t.color = rocket.colors[0];
            t.life = 1.0;
            t.decay = TEXT_DECAY;
            t.scale = TEXT_START_SCALE;
            t.style = style;
            self.texts.push(t);
            burst.texts = 1;
        }

        if scale > 1.5 && self.rng.random::<f64>() < 0.5 {
            self.schedule.after(
                SECONDARY_DELAY,
                Deferred::SecondaryBurst {
                    x: rocket.x,
                    y: rocket.y,
                    scale,
                },
            );
            burst.deferred = 1;
        }

        log::debug!(
            "{} burst at ({:.0}, {:.0}) scale {:.2}: {} particles, {} sparkles",
            rocket.kind.label(),
            rocket.x,
            rocket.y,
            scale,
            burst.primary,
            burst.sparkles
        );
        burst
    }

    fn detonate_finale(&mut self, rocket: &Rocket, spec: &FinaleSpec) -> Burst {
        let origin = (rocket.x, rocket.y);
        let s = spec.scale.max(f64::EPSILON);
        let n = spec.particle_count as usize;
        let (outer, mid) = if spec.layered { (n * 4 / 10, n * 3 / 10) } else { (n, 0) };
        let inner = n - outer - mid;

        for i in 0..outer {
            let u = self.rng.random::<f64>();
            let color = match self.rng.random::<f64>() {
                c if c < 0.5 => GOLD,
                c if c < 0.8 => GOLD_WHITE,
                _ => Rgb::new(255, 180, 60),
            };
            let spark = Spark {
                angle: TAU * i as f64 / outer as f64,
                speed: (350.0 + u * 100.0) * s,
                color,
                size: (2.0 + self.rng.random::<f64>() * 3.0) * s,
                decay: 0.004 + self.rng.random::<f64>() * 0.003,
                gravity: 40.0 + self.rng.random::<f64>() * 30.0,
                drip: true,
            };
            self.emit(origin, &spark);
        }
        for i in 0..mid {
            let spark = Spark {
                angle: TAU * i as f64 / mid as f64,
                speed: (200.0 + self.rng.random::<f64>() * 100.0) * s,
                color: if self.rng.random::<f64>() < 0.5 { SPARKLE } else { EMBER_ORANGE },
                size: (2.0 + self.rng.random::<f64>() * 2.0) * s,
                decay: 0.008 + self.rng.random::<f64>() * 0.004,
                gravity: 80.0 + self.rng.random::<f64>() * 40.0,
                drip: false,
            };
            self.emit(origin, &spark);
        }
        for _ in 0..inner {
            let color = match palette::random_standard(&mut self.rng) {
                FireworkKind::Standard { color } => color,
                _ => Rgb::WHITE,
            };
            let spark = Spark {
                angle: self.rng.random::<f64>() * TAU,
                speed: self.rng.random::<f64>() * 200.0 * s,
                color,
                size: (1.5 + self.rng.random::<f64>() * 2.0) * s,
                decay: 0.012 + self.rng.random::<f64>() * 0.008,
                gravity: 100.0 + self.rng.random::<f64>() * 50.0,
                drip: false,
            };
            self.emit(origin, &spark);
        }

        // First ring goes out with the burst, the rest trail behind.
        let sparkles = self.shockwave_ring(rocket.x, rocket.y, s, 0, GOLD_WHITE);
        for index in 1..RING_COUNT {
            self.schedule.after(
                RING_INTERVAL * index as f64,
                Deferred::ShockwaveRing {
                    x: rocket.x,
                    y: rocket.y,
                    scale: s,
                    index,
                    color: if index % 2 == 0 { GOLD_WHITE } else { Rgb::WHITE },
                },
            );
        }

        self.flash = FINALE_FLASH;
        self.shake = FINALE_SHAKE;

        let texts = self.finale_text(rocket.x, rocket.y, s, spec.text.as_deref());
        log::debug!(
            "{} at ({:.0}, {:.0}): {} particles, message {:?}",
            rocket.kind.label(),
            rocket.x,
            rocket.y,
            n,
            spec.text
        );
        Burst {
            primary: n,
            sparkles,
            texts,
            deferred: (RING_COUNT - 1) as usize,
        }
    }

    /// Crown glyph, plus an optional wrapped message stacked underneath. The
    /// pair is centred vertically on `y` as one block.
    fn finale_text(&mut self, x: f64, y: f64, s: f64, message: Option<&str>) -> usize {
        let crown_h = CROWN_SIZE * s;
        let lines = message.map(|m| wrap_words(m, MESSAGE_WRAP)).unwrap_or_default();
        let message_h = if lines.is_empty() {
            0.0
        } else {
            lines.len() as f64 * MESSAGE_SIZE * s * LINE_SPACING
        };
        let gap = if lines.is_empty() { 0.0 } else { MESSAGE_SIZE * s * 0.5 };
        let top = y - (crown_h + gap + message_h) / 2.0;

        self.push_finale_text(x, top + crown_h / 2.0, &crate::render::font::CROWN.to_string(), CROWN_SIZE * s);
        if lines.is_empty() {
            return 1;
        }
        let center = top + crown_h + gap + message_h / 2.0;
        self.push_finale_text(x, center, &lines.join("\n"), MESSAGE_SIZE * s);
        2
    }

    fn push_finale_text(&mut self, x: f64, y: f64, text: &str, size: f64) {
        let mut t = self.pool.texts.acquire();
        t.x = x;
        t.y = y;
        t.vy = TEXT_RISE * 0.4;
        t.text.push_str(text);
        t.size = size;
        t.color = GOLD;
        t.life = 1.0;
        t.decay = FINALE_TEXT_DECAY;
        t.scale = FINALE_TEXT_START_SCALE;
        t.style = TextStyle::Finale;
        self.texts.push(t);
    }

    fn shockwave_ring(&mut self, x: f64, y: f64, s: f64, index: u32, color: Rgb) -> usize {
        let speed = (500.0 + 120.0 * index as f64) * s;
        for i in 0..RING_PARTICLES {
            let spark = Spark {
                angle: TAU * i as f64 / RING_PARTICLES as f64,
                speed,
                color,
                size: 1.5 * s,
                decay: 0.03,
                gravity: 0.0,
                drip: false,
            };
            self.emit((x, y), &spark);
        }
        RING_PARTICLES
    }

    /// Run a deferred effect that has come due.
    pub(super) fn fire(&mut self, event: Deferred) {
        match event {
            Deferred::SecondaryBurst { x, y, scale } => {
                let count = (30.0 * scale).floor() as usize;
                for _ in 0..count {
                    let spark = Spark {
                        angle: self.rng.random::<f64>() * TAU,
                        speed: (80.0 + self.rng.random::<f64>() * 80.0) * scale,
                        color: Rgb::WHITE,
                        size: 1.5 * scale,
                        decay: 0.02,
                        gravity: 100.0,
                        drip: false,
                    };
                    self.emit((x, y), &spark);
                }
            }
            Deferred::ShockwaveRing {
                x,
                y,
                scale,
                index,
                color,
            } => {
                self.shockwave_ring(x, y, scale, index, color);
            }
        }
    }

    pub(super) fn emit(&mut self, origin: (f64, f64), spark: &Spark) {
        let mut p = self.pool.particles.acquire();
        p.spawn(origin, spark);
        self.particles.push(p);
    }

    pub(super) fn random_word(&mut self) -> Option<String> {
        if self.words.is_empty() {
            return None;
        }
        let i = self.rng.random_range(0..self.words.len());
        Some(self.words[i].clone())
    }
}
