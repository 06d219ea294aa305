pub mod background;
pub mod celebration;
pub mod draw;
pub mod entity;
pub mod explosion;
pub mod launch;
pub mod palette;
pub mod physics;
pub mod pool;
pub mod schedule;
pub mod tier;

use std::f64::consts::TAU;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use background::Background;
use celebration::Celebration;
use entity::{FinaleSpec, FireworkKind, Lantern, Particle, Rgb, Rocket, Spark, TextParticle, TextStyle};
use launch::{Aim, LAUNCH_DEPTH, LaunchRecord, SizeSpec};
use palette::FlagTheme;
use pool::{EntityPool, MAX_POOL_SIZE};
use schedule::Schedule;

/// Longest step a single advance will integrate (seconds)
pub const MAX_FRAME_STEP: f64 = 0.25;
/// Flash and shake retained per advance
const EFFECT_DECAY: f64 = 0.9;
const EFFECT_FLOOR: f64 = 0.01;

/// Finale apex as a fraction of the viewport from the top
const FINALE_APEX: f64 = 0.3;

const FLARES_PER_MOVE: usize = 2;

/// Lanterns aloft at once
pub const MAX_LANTERNS: usize = 48;
/// Lantern climb speed at release (world px/s)
const LANTERN_RISE: f64 = 90.0;
/// Hover radius around a lantern, in body heights
const LANTERN_REACH: f64 = 2.0;

/// Snapshot of collection sizes for the status bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub rockets: usize,
    pub particles: usize,
    pub texts: usize,
    pub lanterns: usize,
    pub pooled: usize,
    pub pending: usize,
}

/// Owns every live entity, the pool they recycle through, the deferred
/// effect queue, and the background scene.
pub struct Engine {
    width: f64,
    height: f64,
    rockets: Vec<Rocket>,
    particles: Vec<Particle>,
    texts: Vec<TextParticle>,
    lanterns: Vec<Lantern>,
    pool: EntityPool,
    schedule: Schedule,
    background: Background,
    words: Vec<String>,
    country: Option<FlagTheme>,
    celebration: Option<Celebration>,
    rng: StdRng,
    /// Full-screen white wash, 0..=1
    flash: f64,
    /// Scene offset magnitude in world units
    shake: f64,
}

impl Engine {
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_seed(width, height, rand::rng().random::<u64>())
    }

    /// Deterministic engine for replays and tests.
    pub fn with_seed(width: f64, height: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let background = Background::generate(width, height, &mut rng);
        Engine {
            width,
            height,
            rockets: Vec::new(),
            particles: Vec::new(),
            texts: Vec::new(),
            lanterns: Vec::new(),
            pool: EntityPool::new(MAX_POOL_SIZE),
            schedule: Schedule::new(),
            background,
            words: Vec::new(),
            country: None,
            celebration: None,
            rng,
            flash: 0.0,
            shake: 0.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// New viewport size. Regenerates the background; live entities keep
    /// their world coordinates.
    pub fn resize(&mut self, width: f64, height: f64) {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            log::warn!("ignoring resize to {width}x{height}");
            return;
        }
        self.width = width;
        self.height = height;
        self.background = Background::generate(width, height, &mut self.rng);
        log::info!("world resized to {width:.0}x{height:.0}");
    }

    pub fn set_words(&mut self, words: Vec<String>) {
        self.words = words;
    }

    /// Country theme for the random category pick; `None` folds its share
    /// into classic.
    pub fn set_country(&mut self, country: Option<FlagTheme>) {
        self.country = country;
    }

    pub fn country(&self) -> Option<&FlagTheme> {
        self.country.as_ref()
    }

    /// Launch a rocket from the bottom edge at `x` with random drift.
    pub fn launch(&mut self, x: f64, size: SizeSpec) -> LaunchRecord {
        self.launch_aimed(x, size, Aim::Drift)
    }

    /// Launch from `x` so the burst lands above `target_x`.
    pub fn launch_toward(&mut self, x: f64, target_x: f64, size: SizeSpec) -> LaunchRecord {
        self.launch_aimed(x, size, Aim::Toward { from_x: x, to_x: target_x })
    }

    fn launch_aimed(&mut self, x: f64, size: SizeSpec, aim: Aim) -> LaunchRecord {
        let target_y = size.target_y(self.height, &mut self.rng);
        let kind = launch::random_kind(&mut self.rng, self.country.as_ref());
        let word = if matches!(kind, FireworkKind::Country { .. }) { None } else { self.random_word() };
        let record = LaunchRecord {
            x,
            y: self.height + LAUNCH_DEPTH,
            target_y,
            scale: size.scale(),
            points: size.points(),
            firework_type: kind,
            word,
            text_size: size.text_size(),
            privileged: size.glowing_text(),
        };
        self.push_rocket(&record, aim);
        record
    }

    /// Replay a launch received from elsewhere. Type, apex, scale, and word
    /// come from the record, pulled inside [`LaunchRecord::bounded`]; drift
    /// is rolled locally. A finale must carry the privileged flag.
    pub fn launch_at(&mut self, record: &LaunchRecord) {
        if matches!(record.firework_type, FireworkKind::Finale(_)) && !record.privileged {
            log::warn!("ignoring unprivileged relayed finale at x={}", record.x);
            return;
        }
        self.push_rocket(record, Aim::Drift);
    }

    /// Privileged crown launch straight up from `x`.
    pub fn launch_finale(&mut self, x: f64, spec: FinaleSpec) -> LaunchRecord {
        let record = LaunchRecord {
            x,
            y: self.height + LAUNCH_DEPTH,
            target_y: self.height * FINALE_APEX,
            scale: spec.scale,
            points: None,
            word: spec.text.clone(),
            firework_type: FireworkKind::Finale(spec),
            text_size: 0.0,
            privileged: true,
        };
        self.push_rocket(&record, Aim::Toward { from_x: x, to_x: x });
        record
    }

    fn push_rocket(&mut self, record: &LaunchRecord, aim: Aim) {
        let Some(record) = record.bounded(self.height) else {
            log::warn!(
                "ignoring launch with x={} targetY={} scale={}",
                record.x,
                record.target_y,
                record.scale
            );
            return;
        };

        let t = launch::trajectory(self.height, record.target_y, record.scale, aim, &mut self.rng);
        let mut rocket = Rocket::new(
            record.x,
            self.height + LAUNCH_DEPTH,
            t.vx,
            t.vy,
            record.target_y,
            record.firework_type.clone(),
            record.scale,
        );
        rocket.word = record.word.clone();
        rocket.text_size = record.resolved_text_size();
        if record.privileged {
            rocket.text_style = TextStyle::Brand;
        }

        log::debug!(
            "launch {} at x={:.0} apex={:.0} scale={:.2} vy={:.0} arc={:.2}",
            rocket.kind.label(),
            record.x,
            record.target_y,
            record.scale,
            t.vy,
            t.arc
        );
        self.rockets.push(rocket);
    }

    /// Cursor sparkle: a couple of damped, weightless flare particles.
    pub fn emit_flare(&mut self, x: f64, y: f64) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        for _ in 0..FLARES_PER_MOVE {
            let spark = Spark {
                angle: self.rng.random::<f64>() * TAU,
                speed: 20.0 + self.rng.random::<f64>() * 40.0,
                color: palette::FLARE,
                size: 1.0 + self.rng.random::<f64>(),
                decay: 0.05,
                gravity: 0.0,
                drip: false,
            };
            self.emit((x, y), &spark);
            if let Some(p) = self.particles.last_mut() {
                p.flare = true;
            }
        }
    }

    /// Release a sky lantern from the lower city, sent from a random
    /// country. Refused at the cap, and while a celebration is under way or
    /// about to start.
    pub fn launch_lantern(&mut self) -> bool {
        if self.lanterns.len() >= MAX_LANTERNS || self.celebration.as_ref().is_some_and(|c| !c.lanterns_allowed()) {
            return false;
        }
        let code = celebration::random_country(&mut self.rng);
        let from = palette::flag_for(code).map_or_else(|| code.to_string(), |f| f.name);
        let lantern = Lantern {
            x: self.width * (0.2 + self.rng.random::<f64>() * 0.6),
            y: self.height,
            vy: -LANTERN_RISE,
            size: 20.0 + self.rng.random::<f64>() * 15.0,
            alpha: 1.0,
            color: Rgb::new(255, self.rng.random_range(140..200), self.rng.random_range(40..100)),
            sway: self.rng.random::<f64>() * TAU,
            sway_speed: 1.2 + self.rng.random::<f64>() * 1.2,
            age: 0.0,
            from,
        };
        log::debug!("lantern from {} at x={:.0}", lantern.from, lantern.x);
        self.lanterns.push(lantern);
        true
    }

    /// Sender of the lantern under `(x, y)`, if any.
    pub fn lantern_at(&self, x: f64, y: f64) -> Option<&str> {
        self.lanterns
            .iter()
            .rev()
            .find(|l| (l.x - x).hypot(l.y - y) < l.size * LANTERN_REACH)
            .map(|l| l.from.as_str())
    }

    /// One simulation step. Due deferred effects fire first, then rockets
    /// move (detonating ones burst and leave in the same pass), then
    /// particles and text. `dt` is clamped to [`MAX_FRAME_STEP`].
    pub fn advance(&mut self, dt: f64) {
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_FRAME_STEP) } else { 0.0 };

        for event in self.schedule.advance(dt) {
            self.fire(event);
        }
        let cues = match self.celebration.as_mut() {
            Some(c) => c.advance(dt, &mut self.rng),
            None => Vec::new(),
        };
        for cue in cues {
            self.cue(cue);
        }

        for i in (0..self.rockets.len()).rev() {
            let rocket = &mut self.rockets[i];
            physics::step_rocket(rocket, dt);
            if !rocket.is_finite() {
                log::warn!("dropping non-finite rocket at ({}, {})", rocket.x, rocket.y);
                self.rockets.swap_remove(i);
            } else if rocket.should_detonate() {
                let rocket = self.rockets.swap_remove(i);
                self.detonate(&rocket);
            }
        }

        physics::advance_particles(&mut self.particles, &mut self.pool.particles, dt);
        physics::advance_texts(&mut self.texts, &mut self.pool.texts, dt);
        physics::advance_lanterns(&mut self.lanterns, dt, self.height);

        self.flash = decay_effect(self.flash);
        self.shake = decay_effect(self.shake);
    }

    /// Drop every live entity and orphan pending deferred effects.
    pub fn reset(&mut self) {
        self.rockets.clear();
        self.lanterns.clear();
        for p in self.particles.drain(..) {
            self.pool.particles.release(p);
        }
        for t in self.texts.drain(..) {
            self.pool.texts.release(t);
        }
        self.schedule.cancel_all();
        self.flash = 0.0;
        self.shake = 0.0;
        log::info!("show reset");
    }

    pub fn stats(&self) -> Stats {
        Stats {
            rockets: self.rockets.len(),
            particles: self.particles.len(),
            texts: self.texts.len(),
            lanterns: self.lanterns.len(),
            pooled: self.pool.particles.idle() + self.pool.texts.idle(),
            pending: self.schedule.len(),
        }
    }
}

fn decay_effect(v: f64) -> f64 {
    let v = v * EFFECT_DECAY;
    if v < EFFECT_FLOOR { 0.0 } else { v }
}

/// Wall-clock frame timer.
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        FrameClock { last: Instant::now() }
    }

    /// Seconds since the previous tick, at most [`MAX_FRAME_STEP`].
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        dt.min(MAX_FRAME_STEP)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::show::entity::Rgb;
    use crate::show::launch::ascent_velocity;

    fn engine() -> Engine {
        Engine::with_seed(1600.0, 900.0, 7)
    }

    fn record(target_y: f64) -> LaunchRecord {
        LaunchRecord {
            x: 800.0,
            y: 920.0,
            target_y,
            scale: 1.0,
            points: None,
            firework_type: FireworkKind::Standard { color: Rgb::WHITE },
            word: Some("HI".into()),
            text_size: 30.0,
            privileged: false,
        }
    }

    #[test]
    fn test_detonation_removes_rocket_in_same_advance() {
        let mut e = engine();
        // Apex below the launch point: the first step crosses it
        e.launch_at(&record(950.0));
        assert_eq!(e.rockets.len(), 1);
        e.advance(1.0 / 60.0);
        assert!(e.rockets.is_empty());
        assert!(e.particles.len() >= 80);
        assert_eq!(e.texts.len(), 1);
        assert_eq!(e.texts[0].text, "HI");
        assert_eq!(e.texts[0].size, 30.0);
    }

    #[test]
    fn test_rocket_climbs_until_apex() {
        let mut e = engine();
        e.launch_at(&record(300.0));
        let mut frames = 0;
        while !e.rockets.is_empty() && frames < 600 {
            e.advance(1.0 / 60.0);
            frames += 1;
        }
        assert!(frames > 1 && frames < 600);
        assert!(!e.particles.is_empty());
    }

    #[test]
    fn test_points_scenarios() {
        let mut e = engine();
        let low = e.launch(500.0, SizeSpec::Points(1));
        assert!((low.scale - 0.2).abs() < 1e-12);
        assert!((0.72 * 900.0..=0.75 * 900.0).contains(&low.target_y));
        assert_eq!(low.points, Some(1));

        let high = e.launch(500.0, SizeSpec::Points(80));
        assert!((high.scale - 1.5).abs() < 1e-12);
        assert!((0.15 * 900.0..=0.18 * 900.0).contains(&high.target_y));
        assert!(e.rockets[1].vy < e.rockets[0].vy);
    }

    #[test]
    fn test_replay_matches_launch_formulas() {
        let mut a = engine();
        let rec = a.launch(600.0, SizeSpec::Points(40));
        let mut b = Engine::with_seed(1600.0, 900.0, 99);
        b.launch_at(&rec);

        let ratio = launch::height_ratio(900.0, rec.target_y);
        let fastest = ascent_velocity(ratio, rec.scale, 1.0);
        let slowest = ascent_velocity(ratio, rec.scale, 0.0);
        for r in [&a.rockets[0], &b.rockets[0]] {
            assert_eq!(r.target_y, rec.target_y);
            assert_eq!(r.scale, rec.scale);
            assert_eq!(r.kind, rec.firework_type);
            assert!((fastest..=slowest).contains(&r.vy));
            assert_eq!(r.y, 900.0 + LAUNCH_DEPTH);
        }
        assert_eq!(b.rockets[0].text_size, rec.resolved_text_size());
    }

    #[test]
    fn test_launch_preselects_word() {
        let mut e = engine();
        e.set_words(vec!["HELLO".into()]);
        let rec = e.launch(100.0, SizeSpec::Points(10));
        assert_eq!(rec.word.as_deref(), Some("HELLO"));
        assert_eq!(e.rockets[0].word.as_deref(), Some("HELLO"));
    }

    #[test]
    fn test_privileged_launch_uses_brand_text() {
        let mut e = engine();
        let mut rec = record(300.0);
        rec.privileged = true;
        e.launch_at(&rec);
        assert_eq!(e.rockets[0].text_style, TextStyle::Brand);
    }

    #[test]
    fn test_broken_records_are_ignored() {
        let mut e = engine();
        let mut rec = record(300.0);
        rec.x = f64::NAN;
        e.launch_at(&rec);
        let mut rec = record(300.0);
        rec.scale = 0.0;
        e.launch_at(&rec);
        assert!(e.rockets.is_empty());
    }

    #[test]
    fn test_oversized_relayed_launch_stays_within_budget() {
        let mut e = engine();
        let mut rec = record(950.0);
        rec.scale = 5000.0;
        rec.text_size = 1e9;
        e.launch_at(&rec);
        assert_eq!(e.rockets[0].scale, launch::MAX_SCALE);
        assert_eq!(e.rockets[0].text_size, launch::MAX_TEXT_SIZE);
        e.advance(1.0 / 60.0);
        assert!(e.rockets.is_empty());
        // The largest profile at the largest scale, plus secondary bursts
        assert!(e.particles.len() < 5000, "{} particles", e.particles.len());
    }

    #[test]
    fn test_relayed_finale_needs_privilege_and_budget() {
        let mut e = engine();
        let mut rec = record(300.0);
        rec.firework_type = FireworkKind::Finale(FinaleSpec {
            particle_count: u32::MAX,
            scale: 1.0,
            text: None,
            layered: false,
        });
        e.launch_at(&rec);
        assert!(e.rockets.is_empty());

        rec.privileged = true;
        e.launch_at(&rec);
        let FireworkKind::Finale(spec) = &e.rockets[0].kind else {
            panic!("finale kind lost");
        };
        assert_eq!(spec.particle_count, launch::MAX_FINALE_PARTICLES);
    }

    #[test]
    fn test_lanterns_rise_and_can_be_identified() {
        let mut e = engine();
        assert!(e.launch_lantern());
        let (x, y) = (e.lanterns[0].x, e.lanterns[0].y);
        assert!((320.0..=1280.0).contains(&x));
        assert!(e.lantern_at(x, y - 5.0).is_some());
        assert!(e.lantern_at(x, 0.0).is_none());
        e.advance(0.1);
        assert!(e.lanterns[0].y < y);
        assert_eq!(e.stats().lanterns, 1);
        e.reset();
        assert!(e.lanterns.is_empty());
    }

    #[test]
    fn test_lantern_cap() {
        let mut e = engine();
        for _ in 0..MAX_LANTERNS {
            assert!(e.launch_lantern());
        }
        assert!(!e.launch_lantern());
    }

    #[test]
    fn test_aimed_launch_has_no_drift_when_straight_up() {
        let mut e = engine();
        e.launch_toward(400.0, 400.0, SizeSpec::Points(20));
        assert_eq!(e.rockets[0].vx, 0.0);
        e.launch_toward(400.0, 700.0, SizeSpec::Points(20));
        assert!(e.rockets[1].vx > 0.0);
    }

    #[test]
    fn test_reset_cancels_pending_rings() {
        let mut e = engine();
        e.launch_finale(800.0, FinaleSpec::mega(Some("GG".into())));
        let mut frames = 0;
        while !e.rockets.is_empty() && frames < 600 {
            e.advance(1.0 / 60.0);
            frames += 1;
        }
        assert!(e.rockets.is_empty());
        assert!(!e.schedule.is_empty());
        assert!(e.flash > 0.0);

        e.reset();
        assert_eq!(e.stats().particles, 0);
        assert_eq!(e.stats().pending, 0);
        assert!(e.stats().pooled > 0);
        e.advance(1.0);
        assert!(e.particles.is_empty());
    }

    #[test]
    fn test_flash_and_shake_fade_out() {
        let mut e = engine();
        e.flash = 1.0;
        e.shake = 12.0;
        e.advance(0.016);
        assert!((e.flash - 0.9).abs() < 1e-12);
        for _ in 0..100 {
            e.advance(0.016);
        }
        assert_eq!(e.flash, 0.0);
        assert_eq!(e.shake, 0.0);
    }

    #[test]
    fn test_flares_are_weightless() {
        let mut e = engine();
        e.emit_flare(100.0, 100.0);
        assert_eq!(e.particles.len(), 2);
        for p in &e.particles {
            assert!(p.flare);
            assert_eq!(p.gravity, 0.0);
            let speed = p.vx.hypot(p.vy);
            assert!((20.0..=60.0).contains(&speed));
        }
    }

    #[test]
    fn test_oversized_dt_is_clamped() {
        let mut e = engine();
        e.emit_flare(100.0, 100.0);
        let before = e.particles[0].clone();
        e.advance(10.0);
        let p = &e.particles[0];
        let expected = before.x + before.vx * physics::FLARE_DAMPING_PER_FRAME * MAX_FRAME_STEP;
        assert!((p.x - expected).abs() < 1e-9);
    }

    #[test]
    fn test_resize_rejects_nonsense() {
        let mut e = engine();
        e.resize(0.0, 900.0);
        e.resize(f64::NAN, 900.0);
        assert_eq!(e.width(), 1600.0);
        e.resize(800.0, 450.0);
        assert_eq!((e.width(), e.height()), (800.0, 450.0));
    }

    #[test]
    fn test_frame_clock_caps_step() {
        let mut clock = FrameClock::new();
        assert!(clock.tick() <= MAX_FRAME_STEP);
    }
}
