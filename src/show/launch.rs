//! Launch math: points curves, tier bundles, trajectories, and the
//! broadcast record used to replay a launch elsewhere.

use rand::RngExt;
use serde::{Deserialize, Serialize};

use super::entity::FireworkKind;
use super::palette::{self, FlagTheme};
use super::physics::ROCKET_GRAVITY;

pub const MIN_POINTS: u32 = 1;
pub const MAX_POINTS: u32 = 80;

/// Rockets start this far below the bottom edge.
pub const LAUNCH_DEPTH: f64 = 20.0;

/// Apex fraction band for points launches (fraction of height from the top)
const POINTS_APEX_LOW: f64 = 0.75;
const POINTS_APEX_HIGH: f64 = 0.15;
/// Tier launches may go higher and lower
const TIER_APEX_LOW: f64 = 0.79;
const TIER_APEX_HIGH: f64 = 0.05;
/// Total width of the apex jitter (±3%)
const APEX_JITTER: f64 = 0.06;

/// Base text size of tier launches, multiplied by the bundle's text factor
pub const TIER_TEXT_BASE: f64 = 60.0;

/// Accepted explosion scale of any launch record
pub const MIN_SCALE: f64 = 0.008;
pub const MAX_SCALE: f64 = 8.0;
/// Largest label size a record may ask for (world px)
pub const MAX_TEXT_SIZE: f64 = 400.0;
/// Particle budget of a single finale burst
pub const MAX_FINALE_PARTICLES: u32 = 2000;
/// Longest word or finale message carried by a record
pub const MAX_LABEL_CHARS: usize = 64;

/// Category weights of random launches
const COUNTRY_WEIGHT: f64 = 0.15;
const CLASSIC_CUTOFF: f64 = 0.40;

#[inline]
fn normalized(points: u32) -> f64 {
    let p = points.clamp(MIN_POINTS, MAX_POINTS);
    (p - MIN_POINTS) as f64 / (MAX_POINTS - MIN_POINTS) as f64
}

/// Explosion scale: 0.2 at 1 point, 1.5 at 80.
pub fn points_scale(points: u32) -> f64 {
    0.2 + normalized(points) * 1.3
}

/// Apex height as a fraction of the viewport from the top, before jitter.
pub fn apex_fraction(points: u32) -> f64 {
    POINTS_APEX_LOW - normalized(points) * (POINTS_APEX_LOW - POINTS_APEX_HIGH)
}

/// Text size in world pixels: 12 at 1 point, 120 at 80.
pub fn text_size_for_points(points: u32) -> f64 {
    12.0 + normalized(points) * 108.0
}

/// Size, height, and text multipliers resolved by the tier collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleBundle {
    /// Explosion scale
    pub size: f64,
    /// Apex fraction from the top of the viewport
    pub height: f64,
    /// Text size multiplier over `TIER_TEXT_BASE`
    pub text: f64,
    #[serde(default)]
    pub glowing_text: bool,
}

/// How a launch is sized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeSpec {
    Points(u32),
    Tier(ScaleBundle),
}

impl SizeSpec {
    pub fn scale(&self) -> f64 {
        match self {
            SizeSpec::Points(p) => points_scale(*p),
            SizeSpec::Tier(b) => b.size.max(f64::EPSILON),
        }
    }

    pub fn text_size(&self) -> f64 {
        match self {
            SizeSpec::Points(p) => text_size_for_points(*p),
            SizeSpec::Tier(b) => TIER_TEXT_BASE * b.text,
        }
    }

    pub fn points(&self) -> Option<u32> {
        match self {
            SizeSpec::Points(p) => Some((*p).clamp(MIN_POINTS, MAX_POINTS)),
            SizeSpec::Tier(_) => None,
        }
    }

    pub fn glowing_text(&self) -> bool {
        matches!(self, SizeSpec::Tier(b) if b.glowing_text)
    }

    /// Absolute apex Y for a viewport of `height`, with ±3% jitter.
    pub fn target_y(&self, height: f64, rng: &mut impl RngExt) -> f64 {
        let jitter = (rng.random::<f64>() - 0.5) * APEX_JITTER;
        let (base, low, high) = match self {
            SizeSpec::Points(p) => (apex_fraction(*p), POINTS_APEX_LOW, POINTS_APEX_HIGH),
            SizeSpec::Tier(b) => (b.height, TIER_APEX_LOW, TIER_APEX_HIGH),
        };
        height * (base + jitter).clamp(high, low)
    }
}

/// Fraction of the viewport the rocket climbs.
pub fn height_ratio(height: f64, target_y: f64) -> f64 {
    (height - target_y) / height
}

/// 0 for apexes in the lower half, ramping to 1 at the top edge.
pub fn arc_intensity(height_ratio: f64) -> f64 {
    if height_ratio > 0.5 { (height_ratio - 0.5) * 2.0 } else { 0.0 }
}

/// Initial vertical velocity; `u` is a uniform sample in [0, 1).
pub fn ascent_velocity(height_ratio: f64, scale: f64, u: f64) -> f64 {
    -(400.0 + height_ratio * 2000.0 + u * 400.0) * scale.sqrt()
}

/// Horizontal motion of a new rocket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aim {
    /// Random drift that grows with arc intensity
    Drift,
    /// Reach `to_x` at detonation time
    Toward { from_x: f64, to_x: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    pub vx: f64,
    pub vy: f64,
    pub height_ratio: f64,
    pub arc: f64,
}

/// Launch velocities for a rocket starting at `height + LAUNCH_DEPTH`.
pub fn trajectory(height: f64, target_y: f64, scale: f64, aim: Aim, rng: &mut impl RngExt) -> Trajectory {
    let ratio = height_ratio(height, target_y);
    let arc = arc_intensity(ratio);
    let vy = ascent_velocity(ratio, scale, rng.random::<f64>());
    let vx = match aim {
        Aim::Drift => (rng.random::<f64>() - 0.5) * (50.0 + arc * 250.0),
        Aim::Toward { from_x, to_x } => {
            let t = time_to_detonation(target_y - (height + LAUNCH_DEPTH), vy);
            if t > 0.0 { (to_x - from_x) / t } else { 0.0 }
        }
    };
    Trajectory {
        vx,
        vy,
        height_ratio: ratio,
        arc,
    }
}

/// Seconds until a rocket climbing `dy` (negative) with initial `vy`
/// reaches its apex or turns over, whichever comes first.
fn time_to_detonation(dy: f64, vy: f64) -> f64 {
    let g = ROCKET_GRAVITY;
    let disc = vy * vy + 2.0 * g * dy;
    if disc >= 0.0 {
        (-vy - disc.sqrt()) / g
    } else {
        -vy / g
    }
}

/// Weighted pick: 15% country (when known), 25% classic, 60% standard.
/// Without a country its share goes to classic.
pub fn random_kind(rng: &mut impl RngExt, country: Option<&FlagTheme>) -> FireworkKind {
    let r = rng.random::<f64>();
    match country {
        Some(flag) if r < COUNTRY_WEIGHT => flag.kind(),
        _ if r < CLASSIC_CUTOFF => palette::random_classic(rng),
        _ => palette::random_standard(rng),
    }
}

/// Everything needed to replay a launch on another screen. This is the
/// broadcast payload; horizontal drift is not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRecord {
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub target_y: f64,
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    pub firework_type: FireworkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    /// 0 means "derive from points, else the tier base"
    #[serde(default)]
    pub text_size: f64,
    /// Glowing brand text
    #[serde(default)]
    pub privileged: bool,
}

impl LaunchRecord {
    /// Text size to use when replaying.
    pub fn resolved_text_size(&self) -> f64 {
        if self.text_size > 0.0 {
            self.text_size
        } else if let Some(p) = self.points {
            text_size_for_points(p)
        } else {
            TIER_TEXT_BASE
        }
    }

    /// The record pulled inside the engine's limits for a viewport of
    /// `height`. Scale, apex, text size, labels and the finale particle
    /// budget are clamped. An apex may sit below the bottom edge down to the
    /// launch point. `None` when a coordinate or the scale is unusable.
    pub fn bounded(&self, height: f64) -> Option<LaunchRecord> {
        if !(self.x.is_finite() && self.target_y.is_finite() && self.scale.is_finite() && self.scale > 0.0) {
            return None;
        }
        let mut record = self.clone();
        record.scale = self.scale.clamp(MIN_SCALE, MAX_SCALE);
        record.target_y = self.target_y.clamp(0.0, height + LAUNCH_DEPTH);
        record.text_size = if self.text_size.is_finite() {
            self.text_size.clamp(0.0, MAX_TEXT_SIZE)
        } else {
            0.0
        };
        record.word = self.word.as_deref().map(clip_label);
        if let FireworkKind::Finale(spec) = &mut record.firework_type {
            spec.particle_count = spec.particle_count.min(MAX_FINALE_PARTICLES);
            spec.scale = if spec.scale.is_finite() {
                spec.scale.clamp(MIN_SCALE, MAX_SCALE)
            } else {
                record.scale
            };
            spec.text = spec.text.as_deref().map(clip_label);
        }
        Some(record)
    }
}

fn clip_label(label: &str) -> String {
    label.chars().take(MAX_LABEL_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::show::entity::Rgb;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_curve_endpoints() {
        assert!((points_scale(1) - 0.2).abs() < 1e-12);
        assert!((points_scale(80) - 1.5).abs() < 1e-12);
        assert!((apex_fraction(1) - 0.75).abs() < 1e-12);
        assert!((apex_fraction(80) - 0.15).abs() < 1e-12);
        assert!((text_size_for_points(1) - 12.0).abs() < 1e-12);
        assert!((text_size_for_points(80) - 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_points_clamp_outside_range() {
        assert_eq!(points_scale(0), points_scale(1));
        assert_eq!(points_scale(500), points_scale(80));
        assert_eq!(SizeSpec::Points(200).points(), Some(80));
    }

    #[test]
    fn test_points_target_stays_within_jitter() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let y = SizeSpec::Points(1).target_y(900.0, &mut rng);
            assert!((900.0 * 0.72..=900.0 * 0.75).contains(&y), "{y}");
            let y = SizeSpec::Points(80).target_y(900.0, &mut rng);
            assert!((900.0 * 0.15..=900.0 * 0.18).contains(&y), "{y}");
        }
    }

    #[test]
    fn test_tier_target_clamps() {
        let mut rng = StdRng::seed_from_u64(4);
        let bundle = ScaleBundle {
            size: 8.0,
            height: 0.0,
            text: 5.0,
            glowing_text: true,
        };
        for _ in 0..50 {
            let y = SizeSpec::Tier(bundle).target_y(1000.0, &mut rng);
            assert!((50.0..=790.0).contains(&y));
        }
        assert!((SizeSpec::Tier(bundle).text_size() - 300.0).abs() < 1e-9);
        assert!(SizeSpec::Tier(bundle).glowing_text());
    }

    #[test]
    fn test_arc_only_above_half() {
        assert_eq!(arc_intensity(0.3), 0.0);
        assert_eq!(arc_intensity(0.5), 0.0);
        assert!((arc_intensity(0.85) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_taller_shots_launch_faster() {
        let low = ascent_velocity(height_ratio(900.0, 675.0), 0.2, 0.5);
        let high = ascent_velocity(height_ratio(900.0, 135.0), 1.5, 0.5);
        assert!(high < low);
        assert!(low < 0.0);
    }

    #[test]
    fn test_aimed_launch_has_no_random_drift() {
        let mut rng = StdRng::seed_from_u64(5);
        let t = trajectory(900.0, 300.0, 1.0, Aim::Toward { from_x: 100.0, to_x: 100.0 }, &mut rng);
        assert_eq!(t.vx, 0.0);
        let t = trajectory(900.0, 300.0, 1.0, Aim::Toward { from_x: 100.0, to_x: 400.0 }, &mut rng);
        assert!(t.vx > 0.0);
    }

    #[test]
    fn test_drift_bounded_by_arc() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..200 {
            let t = trajectory(900.0, 800.0, 1.0, Aim::Drift, &mut rng);
            assert!(t.vx.abs() <= 25.0);
        }
    }

    #[test]
    fn test_random_kind_never_country_without_flag() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut classic = 0;
        for _ in 0..2000 {
            match random_kind(&mut rng, None) {
                FireworkKind::Country { .. } => panic!("country without flag"),
                FireworkKind::Classic { .. } => classic += 1,
                _ => {}
            }
        }
        // ~40% classic when the country share folds in
        assert!((600..1000).contains(&classic), "{classic}");
    }

    #[test]
    fn test_random_kind_uses_flag() {
        let mut rng = StdRng::seed_from_u64(9);
        let flag = palette::flag_for("JP").unwrap();
        let countries = (0..2000)
            .filter(|_| matches!(random_kind(&mut rng, Some(&flag)), FireworkKind::Country { .. }))
            .count();
        assert!((150..450).contains(&countries), "{countries}");
    }

    #[test]
    fn test_record_wire_shape() {
        let record = LaunchRecord {
            x: 500.0,
            y: 920.0,
            target_y: 300.0,
            scale: 1.0,
            points: Some(40),
            firework_type: FireworkKind::Standard {
                color: Rgb::new(50, 200, 255),
            },
            word: None,
            text_size: 66.0,
            privileged: false,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["targetY"], 300.0);
        assert_eq!(json["fireworkType"]["type"], "standard");
        assert_eq!(json["textSize"], 66.0);
        assert!(json.get("word").is_none());
    }

    #[test]
    fn test_record_ignores_unknown_and_defaults_missing() {
        let record: LaunchRecord = serde_json::from_str(
            r#"{"x":1,"targetY":2,"scale":0.5,"points":80,"sender":"abc",
                "fireworkType":{"type":"classic","finish":"silver",
                "primary":{"r":192,"g":192,"b":192},"secondary":{"r":255,"g":255,"b":255}}}"#,
        )
        .unwrap();
        assert!(!record.privileged);
        assert!(record.firework_type.drip());
        assert!((record.resolved_text_size() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounded_pulls_oversized_records_in() {
        let record: LaunchRecord = serde_json::from_str(
            r#"{"x":1,"targetY":-5000,"scale":5000,"textSize":1e9,
                "word":"WWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWW",
                "fireworkType":{"type":"finale","particleCount":4000000000,"scale":1e6,"text":null}}"#,
        )
        .unwrap();
        let b = record.bounded(900.0).unwrap();
        assert_eq!(b.scale, MAX_SCALE);
        assert_eq!(b.target_y, 0.0);
        assert_eq!(b.text_size, MAX_TEXT_SIZE);
        assert_eq!(b.word.as_ref().map(|w| w.chars().count()), Some(MAX_LABEL_CHARS));
        let FireworkKind::Finale(spec) = b.firework_type else {
            panic!("finale kind lost");
        };
        assert_eq!(spec.particle_count, MAX_FINALE_PARTICLES);
        assert_eq!(spec.scale, MAX_SCALE);
    }

    #[test]
    fn test_bounded_keeps_sane_records_and_rejects_broken_ones() {
        let record = LaunchRecord {
            x: 500.0,
            y: 920.0,
            target_y: 300.0,
            scale: 1.2,
            points: Some(60),
            firework_type: FireworkKind::Standard { color: Rgb::WHITE },
            word: Some("HI".into()),
            text_size: 0.0,
            privileged: false,
        };
        assert_eq!(record.bounded(900.0), Some(record.clone()));

        let tiny = LaunchRecord { scale: 1e-9, ..record.clone() };
        assert_eq!(tiny.bounded(900.0).map(|r| r.scale), Some(MIN_SCALE));
        let nan = LaunchRecord { text_size: f64::NAN, ..record.clone() };
        assert_eq!(nan.bounded(900.0).map(|r| r.text_size), Some(0.0));
        assert!(LaunchRecord { scale: 0.0, ..record.clone() }.bounded(900.0).is_none());
        assert!(LaunchRecord { x: f64::INFINITY, ..record }.bounded(900.0).is_none());
    }

    proptest! {
        #[test]
        fn prop_scale_non_decreasing(p in 1u32..80) {
            prop_assert!(points_scale(p + 1) >= points_scale(p));
        }

        #[test]
        fn prop_apex_non_increasing(p in 1u32..80) {
            prop_assert!(apex_fraction(p + 1) <= apex_fraction(p));
            prop_assert!((0.15..=0.75).contains(&apex_fraction(p)));
        }

        #[test]
        fn prop_detonation_time_positive(dy in -900.0f64..-1.0, vy in -2400.0f64..-50.0) {
            prop_assert!(time_to_detonation(dy, vy) > 0.0);
        }
    }
}
