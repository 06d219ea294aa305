//! Virtual-time queue for effects that fire after a detonation returns.
//!
//! Events are tagged with the generation current when they were queued;
//! bumping the generation orphans everything pending.

use super::entity::Rgb;

/// Deferred effect payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Deferred {
    /// Extra white sparks after a large detonation
    SecondaryBurst { x: f64, y: f64, scale: f64 },
    /// One expanding finale ring; `index` selects its speed band
    ShockwaveRing {
        x: f64,
        y: f64,
        scale: f64,
        index: u32,
        color: Rgb,
    },
}

#[derive(Debug, Clone)]
struct Scheduled {
    fire_at: f64,
    generation: u64,
    event: Deferred,
}

#[derive(Debug, Default)]
pub struct Schedule {
    /// Virtual seconds since the engine started
    now: f64,
    generation: u64,
    pending: Vec<Scheduled>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `event` to fire `delay` seconds from now.
    pub fn after(&mut self, delay: f64, event: Deferred) {
        self.pending.push(Scheduled {
            fire_at: self.now + delay.max(0.0),
            generation: self.generation,
            event,
        });
    }

    /// Move virtual time forward by `dt` and return the events now due, in
    /// fire-time order.
    pub fn advance(&mut self, dt: f64) -> Vec<Deferred> {
        if dt.is_finite() && dt > 0.0 {
            self.now += dt;
        }
        let now = self.now;
        let generation = self.generation;
        self.pending.retain(|s| s.generation == generation);

        let mut due: Vec<Scheduled> = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].fire_at <= now {
                due.push(self.pending.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| a.fire_at.total_cmp(&b.fire_at));
        due.into_iter().map(|s| s.event).collect()
    }

    /// Orphan every pending event.
    pub fn cancel_all(&mut self) {
        self.generation += 1;
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
