//! Simulation entities: rockets, particles, and floating text.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::pool::Recycle;
use crate::render::Rgb8;

/// Rocket trail samples kept (most recent first)
pub const ROCKET_TRAIL_LEN: usize = 20;
/// Particle trail samples kept for dripping particles
pub const DRIP_TRAIL_LEN: usize = 10;
/// Particle trail samples kept for everything else
pub const SPARK_TRAIL_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    #[inline]
    pub fn rgb8(self) -> Rgb8 {
        (self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassicFinish {
    Gold,
    White,
    Silver,
}

/// How a flag's stripes are laid out; carried along for text styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagLayout {
    Vertical,
    Horizontal,
    #[default]
    Gradient,
}

/// Parameters of a scripted crown finale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinaleSpec {
    pub particle_count: u32,
    pub scale: f64,
    #[serde(default)]
    pub text: Option<String>,
    /// Three velocity tiers instead of a single giant ring
    #[serde(default = "default_layered")]
    pub layered: bool,
}

fn default_layered() -> bool {
    true
}

impl FinaleSpec {
    /// The full-size finale fired by the top-ranked user.
    pub fn mega(text: Option<String>) -> Self {
        FinaleSpec {
            particle_count: 2000,
            scale: 1.6,
            text,
            layered: true,
        }
    }

    /// A smaller single-ring crown.
    pub fn big(text: Option<String>) -> Self {
        FinaleSpec {
            particle_count: 600,
            scale: 1.2,
            text,
            layered: false,
        }
    }
}

/// What a rocket bursts into. Serialized with a `type` tag so launch records
/// replay across the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FireworkKind {
    Standard {
        color: Rgb,
    },
    Classic {
        finish: ClassicFinish,
        primary: Rgb,
        secondary: Rgb,
        #[serde(default = "default_drip")]
        drip: bool,
    },
    Country {
        colors: [Rgb; 4],
        name: String,
        #[serde(default)]
        layout: FlagLayout,
    },
    Finale(FinaleSpec),
}

fn default_drip() -> bool {
    true
}

impl FireworkKind {
    /// Primary, secondary, tertiary, quaternary. Missing slots repeat the primary.
    pub fn colors(&self) -> [Rgb; 4] {
        match self {
            FireworkKind::Standard { color } => [*color; 4],
            FireworkKind::Classic {
                primary, secondary, ..
            } => [*primary, *secondary, *primary, *primary],
            FireworkKind::Country { colors, .. } => *colors,
            FireworkKind::Finale(_) => [super::palette::GOLD; 4],
        }
    }

    pub fn drip(&self) -> bool {
        matches!(self, FireworkKind::Classic { drip: true, .. })
    }

    pub fn country_name(&self) -> Option<&str> {
        match self {
            FireworkKind::Country { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Short label used in logs and the status bar.
    pub fn label(&self) -> &'static str {
        match self {
            FireworkKind::Standard { .. } => "standard",
            FireworkKind::Classic {
                finish: ClassicFinish::Gold,
                ..
            } => "classic-gold",
            FireworkKind::Classic {
                finish: ClassicFinish::White,
                ..
            } => "classic-white",
            FireworkKind::Classic {
                finish: ClassicFinish::Silver,
                ..
            } => "classic-silver",
            FireworkKind::Country { .. } => "country",
            FireworkKind::Finale(spec) if spec.layered => "mega-crown",
            FireworkKind::Finale(_) => "big-crown",
        }
    }
}

/// How a text particle is painted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TextStyle {
    /// Colored stroke under a white fill
    #[default]
    Plain,
    /// White fill with a stroke and glow in the flag's first color
    Country { glow: Rgb },
    /// Three-stop gradient fill over a white halo
    Brand,
    /// Giant multi-line crown text, gradient filled
    Finale,
}

/// An ascending projectile.
#[derive(Debug, Clone)]
pub struct Rocket {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub target_y: f64,
    /// Most recent first
    pub trail: VecDeque<(f64, f64)>,
    pub colors: [Rgb; 4],
    pub kind: FireworkKind,
    /// Display word chosen at launch time
    pub word: Option<String>,
    /// Text size in world pixels before growth scaling
    pub text_size: f64,
    pub text_style: TextStyle,
    pub scale: f64,
}

impl Rocket {
    pub fn new(x: f64, y: f64, vx: f64, vy: f64, target_y: f64, kind: FireworkKind, scale: f64) -> Self {
        Rocket {
            x,
            y,
            vx,
            vy,
            target_y,
            trail: VecDeque::with_capacity(ROCKET_TRAIL_LEN + 1),
            colors: kind.colors(),
            kind,
            word: None,
            text_size: 0.0,
            text_style: TextStyle::Plain,
            scale,
        }
    }

    /// Detonation trigger: apex reached, or already falling.
    #[inline]
    pub fn should_detonate(&self) -> bool {
        self.y <= self.target_y || self.vy > 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vx.is_finite() && self.vy.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrailPoint {
    pub x: f64,
    pub y: f64,
    pub life: f64,
}

/// A single explosion fragment.
#[derive(Debug, Clone, Default)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub color: Rgb,
    pub size: f64,
    pub life: f64,
    pub decay: f64,
    pub gravity: f64,
    /// Most recent first
    pub trail: VecDeque<TrailPoint>,
    pub drip: bool,
    /// Damped, gravity-free cursor spark
    pub flare: bool,
}

/// Launch parameters of one particle, relative to the burst origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spark {
    pub angle: f64,
    pub speed: f64,
    pub color: Rgb,
    pub size: f64,
    pub decay: f64,
    pub gravity: f64,
    pub drip: bool,
}

impl Particle {
    /// Overwrite every field a burst sets. Pooled particles arrive dirty.
    pub fn spawn(&mut self, (x, y): (f64, f64), spark: &Spark) {
        self.x = x;
        self.y = y;
        self.vx = spark.angle.cos() * spark.speed;
        self.vy = spark.angle.sin() * spark.speed;
        self.color = spark.color;
        self.size = spark.size;
        self.life = 1.0;
        self.decay = spark.decay;
        self.gravity = spark.gravity;
        self.trail.clear();
        self.drip = spark.drip;
        self.flare = false;
    }

    pub fn trail_cap(&self) -> usize {
        if self.drip { DRIP_TRAIL_LEN } else { SPARK_TRAIL_LEN }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vx.is_finite() && self.vy.is_finite()
    }
}

impl Recycle for Particle {
    fn recycle(&mut self) {
        self.trail.clear();
    }
}

/// A floating label that grows in and fades out.
#[derive(Debug, Clone, Default)]
pub struct TextParticle {
    pub x: f64,
    pub y: f64,
    pub vy: f64,
    /// May contain `\n` for stacked lines
    pub text: String,
    pub size: f64,
    pub color: Rgb,
    pub life: f64,
    pub decay: f64,
    /// Growth factor, ramps to 1.0
    pub scale: f64,
    pub style: TextStyle,
}

impl TextParticle {
    pub fn is_finite(&self) -> bool {
        self.y.is_finite() && self.vy.is_finite() && self.scale.is_finite()
    }
}

/// A paper sky lantern drifting up from the city.
#[derive(Debug, Clone, PartialEq)]
pub struct Lantern {
    pub x: f64,
    pub y: f64,
    pub vy: f64,
    /// Body height in world px
    pub size: f64,
    pub alpha: f64,
    pub color: Rgb,
    /// Sway phase (rad) and its rate (rad/s)
    pub sway: f64,
    pub sway_speed: f64,
    /// Seconds aloft, drives the glow pulse
    pub age: f64,
    /// Country the lantern was sent from
    pub from: String,
}

impl Lantern {
    /// Candle glow, pulsing between 0.4 and 1.0.
    pub fn glow(&self) -> f64 {
        (self.age * 5.0).sin() * 0.3 + 0.7
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.vy.is_finite() && self.sway.is_finite()
    }
}

impl Recycle for TextParticle {
    fn recycle(&mut self) {
        self.text.clear();
    }
}
