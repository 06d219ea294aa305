//! Capacity-bounded free lists for particles and text particles.
//!
//! The pool hands out containers, not zeroed state: callers overwrite every
//! field they use. Only collection fields are reset on release.

use super::entity::{Particle, TextParticle};

/// Idle objects kept per free list
pub const MAX_POOL_SIZE: usize = 5000;

/// Objects that can sit in a free list.
pub trait Recycle: Default {
    /// Reset collection fields before the object goes idle.
    fn recycle(&mut self);
}

pub struct Pool<T> {
    free: Vec<T>,
    bound: usize,
}

impl<T: Recycle> Pool<T> {
    pub fn new(bound: usize) -> Self {
        Pool {
            free: Vec::new(),
            bound,
        }
    }

    /// Pop an idle object, or allocate a fresh one when the list is empty.
    pub fn acquire(&mut self) -> T {
        self.free.pop().unwrap_or_default()
    }

    /// Return an object. Dropped instead when the list is already full.
    pub fn release(&mut self, mut obj: T) {
        if self.free.len() < self.bound {
            obj.recycle();
            self.free.push(obj);
        }
    }

    /// Number of idle objects.
    pub fn idle(&self) -> usize {
        self.free.len()
    }
}

/// The two free lists the engine allocates from.
pub struct EntityPool {
    pub particles: Pool<Particle>,
    pub texts: Pool<TextParticle>,
}

impl EntityPool {
    pub fn new(bound: usize) -> Self {
        EntityPool {
            particles: Pool::new(bound),
            texts: Pool::new(bound),
        }
    }
}

impl Default for EntityPool {
    fn default() -> Self {
        Self::new(MAX_POOL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::show::entity::TrailPoint;
    use proptest::prelude::*;

    #[test]
    fn test_acquire_from_empty_allocates() {
        let mut pool: Pool<Particle> = Pool::new(4);
        let p = pool.acquire();
        assert!(p.trail.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_released_particle_comes_back_with_empty_trail() {
        let mut pool: Pool<Particle> = Pool::new(4);
        let mut p = pool.acquire();
        p.life = 0.5;
        p.trail.push_front(TrailPoint::default());
        p.trail.push_front(TrailPoint::default());
        pool.release(p);
        assert_eq!(pool.idle(), 1);

        let again = pool.acquire();
        assert!(again.trail.is_empty());
        // Scalar fields are left dirty for the caller to overwrite.
        assert_eq!(again.life, 0.5);
    }

    #[test]
    fn test_released_text_has_empty_string() {
        let mut pool: Pool<TextParticle> = Pool::new(1);
        let mut t = pool.acquire();
        t.text.push_str("HELLO");
        pool.release(t);
        assert!(pool.acquire().text.is_empty());
    }

    #[test]
    fn test_release_beyond_bound_drops() {
        let mut pool: Pool<Particle> = Pool::new(2);
        for _ in 0..5 {
            pool.release(Particle::default());
        }
        assert_eq!(pool.idle(), 2);
    }

    proptest! {
        #[test]
        fn prop_idle_never_exceeds_bound(
            bound in 0usize..64,
            ops in proptest::collection::vec(any::<bool>(), 0..400),
        ) {
            let mut pool: Pool<Particle> = Pool::new(bound);
            let mut live = Vec::new();
            for release in ops {
                if release {
                    pool.release(live.pop().unwrap_or_default());
                } else {
                    live.push(pool.acquire());
                }
                prop_assert!(pool.idle() <= bound);
            }
        }
    }
}
