//! Per-advance integration of rockets, particles, and text.
//!
//! Damping, trail length, and life decay are applied once per call rather
//! than per unit of time, so their feel follows the frame rate. Gravity and
//! velocity integrate against `dt`.

use super::entity::{Lantern, Particle, ROCKET_TRAIL_LEN, Rocket, TextParticle, TrailPoint};
use super::pool::Pool;

/// Downward acceleration on rockets (world px/s²)
pub const ROCKET_GRAVITY: f64 = 200.0;
/// Text rise velocity retained per advance
pub const FRICTION_PER_FRAME: f64 = 0.95;
/// Flare velocity retained per advance
pub const FLARE_DAMPING_PER_FRAME: f64 = 0.95;
/// Text growth rate toward full size
pub const TEXT_GROWTH_PER_SECOND: f64 = 3.0;
/// Lantern climb speed retained per advance
pub const LANTERN_LIFT_PER_FRAME: f64 = 0.998;
/// Lantern opacity lost per advance above the fade line
pub const LANTERN_FADE_PER_FRAME: f64 = 0.025;
/// Fade line as a fraction of the viewport from the top
pub const LANTERN_FADE_LINE: f64 = 0.4;
/// Horizontal sway speed (world px/s)
const LANTERN_SWAY: f64 = 18.0;
/// Lanterns this far above the top edge are gone
const LANTERN_EXIT: f64 = 100.0;

pub fn step_rocket(rocket: &mut Rocket, dt: f64) {
    rocket.vy += ROCKET_GRAVITY * dt;
    rocket.x += rocket.vx * dt;
    rocket.y += rocket.vy * dt;
    rocket.trail.push_front((rocket.x, rocket.y));
    rocket.trail.truncate(ROCKET_TRAIL_LEN);
}

pub fn step_particle(p: &mut Particle, dt: f64) {
    if p.flare {
        p.vx *= FLARE_DAMPING_PER_FRAME;
        p.vy *= FLARE_DAMPING_PER_FRAME;
    }
    p.vy += p.gravity * dt;
    p.x += p.vx * dt;
    p.y += p.vy * dt;
    p.trail.push_front(TrailPoint {
        x: p.x,
        y: p.y,
        life: p.life,
    });
    p.trail.truncate(p.trail_cap());
    p.life -= p.decay;
}

pub fn step_lantern(l: &mut Lantern, dt: f64, height: f64) {
    l.sway += l.sway_speed * dt;
    l.x += l.sway.sin() * LANTERN_SWAY * dt;
    l.y += l.vy * dt;
    l.vy *= LANTERN_LIFT_PER_FRAME;
    l.age += dt;
    if l.y < height * LANTERN_FADE_LINE {
        l.alpha -= LANTERN_FADE_PER_FRAME;
    }
}

/// Lanterns are few and unpooled.
pub fn advance_lanterns(lanterns: &mut Vec<Lantern>, dt: f64, height: f64) {
    for i in (0..lanterns.len()).rev() {
        let l = &mut lanterns[i];
        step_lantern(l, dt, height);
        if !l.is_finite() {
            log::warn!("dropping non-finite lantern at ({}, {})", l.x, l.y);
            lanterns.swap_remove(i);
        } else if l.alpha <= 0.0 || l.y < -LANTERN_EXIT {
            lanterns.swap_remove(i);
        }
    }
}

pub fn step_text(t: &mut TextParticle, dt: f64) {
    t.y += t.vy * dt;
    t.vy *= FRICTION_PER_FRAME;
    if t.scale < 1.0 {
        t.scale = (t.scale + TEXT_GROWTH_PER_SECOND * dt).min(1.0);
    }
    t.life -= t.decay;
}

/// Advance every particle, returning dead and non-finite ones to the pool.
/// Iterates back to front; survivor order is not preserved.
pub fn advance_particles(particles: &mut Vec<Particle>, pool: &mut Pool<Particle>, dt: f64) {
    for i in (0..particles.len()).rev() {
        let p = &mut particles[i];
        step_particle(p, dt);
        if !p.is_finite() {
            log::warn!("dropping non-finite particle at ({}, {})", p.x, p.y);
            pool.release(particles.swap_remove(i));
        } else if p.life <= 0.0 {
            pool.release(particles.swap_remove(i));
        }
    }
}

pub fn advance_texts(texts: &mut Vec<TextParticle>, pool: &mut Pool<TextParticle>, dt: f64) {
    for i in (0..texts.len()).rev() {
        let t = &mut texts[i];
        step_text(t, dt);
        if !t.is_finite() {
            log::warn!("dropping non-finite text particle {:?}", t.text);
            pool.release(texts.swap_remove(i));
        } else if t.life <= 0.0 {
            pool.release(texts.swap_remove(i));
        }
    }
}
