//! Rank to tier mapping and the activity-scaled fire gate.
//!
//! The engine never consults this module; the binary resolves a
//! [`ScaleBundle`] here and hands it to `Engine::launch`.

use super::launch::ScaleBundle;

/// Sliding window for activity measurement (seconds)
const ACTIVITY_WINDOW: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierName {
    KingOfTheHill,
    Apex,
    Inferno,
    Blaze,
    Flame,
    Spark,
}

impl TierName {
    pub fn as_str(self) -> &'static str {
        match self {
            TierName::KingOfTheHill => "King of the Hill",
            TierName::Apex => "Apex",
            TierName::Inferno => "Inferno",
            TierName::Blaze => "Blaze",
            TierName::Flame => "Flame",
            TierName::Spark => "Spark",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub name: TierName,
    pub rank: u32,
    pub percentile: f64,
    /// Normalised 0..=1 standing
    pub scale: f64,
    /// Base cooldown in seconds before activity scaling
    pub cooldown: f64,
    pub bundle: ScaleBundle,
}

impl Tier {
    /// Only the top rank may fire the crown finale.
    pub fn can_fire_finale(&self) -> bool {
        self.name == TierName::KingOfTheHill
    }
}

/// Resolve `rank` out of `total` (both clamped to at least 1).
pub fn calculate(rank: u32, total: u32) -> Tier {
    let total = total.max(1);
    let rank = rank.clamp(1, total);
    let percentile = (rank - 1) as f64 / (total.saturating_sub(1)).max(1) as f64 * 100.0;

    let rank_score = 1.0 - (rank as f64 + 9.0).log10() / 2.0;
    let percentile_score = 1.0 - percentile / 100.0;
    let scale = (0.7 * rank_score + 0.3 * percentile_score).clamp(0.0, 1.0);

    let (name, cooldown) = if rank == 1 {
        (TierName::KingOfTheHill, 0.0)
    } else if rank <= 5 {
        (TierName::Apex, 0.0)
    } else if percentile <= 10.0 {
        (TierName::Inferno, 3.0)
    } else if percentile <= 20.0 {
        (TierName::Blaze, 5.0)
    } else if percentile <= 50.0 {
        (TierName::Flame, 10.0)
    } else {
        (TierName::Spark, 0.0)
    };

    Tier {
        name,
        rank,
        percentile,
        scale,
        cooldown,
        bundle: ScaleBundle {
            size: 0.44 + scale * 7.56,
            height: 0.05 + (1.0 - scale) * 0.74,
            text: 0.44 + scale * 4.56,
            glowing_text: matches!(name, TierName::KingOfTheHill | TierName::Apex),
        },
    }
}

/// Step `rank` by `direction`, wrapping inside `1..=total`.
pub fn cycle_rank(rank: u32, total: u32, direction: i32) -> u32 {
    let total = total.max(1) as i64;
    let next = rank as i64 + direction as i64;
    if next < 1 {
        total as u32
    } else if next > total {
        1
    } else {
        next as u32
    }
}

/// Rate limiter whose cooldown stretches with recent activity. Times are
/// caller-supplied seconds on any monotonic clock.
#[derive(Debug, Default)]
pub struct FireGate {
    recent: Vec<f64>,
    last_fire: Option<f64>,
}

impl FireGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(&mut self, now: f64) {
        self.recent.retain(|&t| now - t < ACTIVITY_WINDOW);
    }

    /// Fires per second over the activity window.
    pub fn activity(&mut self, now: f64) -> f64 {
        self.prune(now);
        self.recent.len() as f64 / ACTIVITY_WINDOW
    }

    pub fn multiplier(&mut self, now: f64) -> f64 {
        let level = self.activity(now);
        if level > 10.0 {
            3.0
        } else if level > 5.0 {
            2.0
        } else if level > 2.0 {
            1.5
        } else {
            1.0
        }
    }

    /// Effective cooldown for `base` seconds at the current activity.
    pub fn cooldown(&mut self, base: f64, now: f64) -> f64 {
        base * self.multiplier(now)
    }

    pub fn can_fire(&mut self, tier: &Tier, now: f64) -> bool {
        if tier.cooldown <= 0.0 {
            return true;
        }
        match self.last_fire {
            None => true,
            Some(last) => now - last >= self.cooldown(tier.cooldown, now),
        }
    }

    pub fn record_fire(&mut self, now: f64) {
        self.recent.push(now);
        self.last_fire = Some(now);
        self.prune(now);
    }

    /// Seconds left before `tier` may fire again.
    pub fn remaining(&mut self, tier: &Tier, now: f64) -> f64 {
        match self.last_fire {
            Some(last) if tier.cooldown > 0.0 => (self.cooldown(tier.cooldown, now) - (now - last)).max(0.0),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(calculate(1, 100).name, TierName::KingOfTheHill);
        assert_eq!(calculate(5, 100).name, TierName::Apex);
        assert_eq!(calculate(6, 100).name, TierName::Inferno);
        assert_eq!(calculate(10, 100).name, TierName::Inferno);
        assert_eq!(calculate(11, 100).name, TierName::Blaze);
        assert_eq!(calculate(20, 100).name, TierName::Blaze);
        assert_eq!(calculate(50, 100).name, TierName::Flame);
        assert_eq!(calculate(60, 100).name, TierName::Spark);
    }

    #[test]
    fn test_king_bundle() {
        let t = calculate(1, 100);
        // 0.7 * (1 - 0.5) + 0.3 * 1.0
        assert!((t.scale - 0.65).abs() < 1e-12);
        assert!((t.bundle.size - (0.44 + 0.65 * 7.56)).abs() < 1e-12);
        assert!((t.bundle.height - (0.05 + 0.35 * 0.74)).abs() < 1e-12);
        assert!(t.bundle.glowing_text);
        assert!(t.can_fire_finale());
        assert!(!calculate(2, 100).can_fire_finale());
        assert!(!calculate(10, 100).bundle.glowing_text);
    }

    #[test]
    fn test_single_user_is_king() {
        let t = calculate(1, 1);
        assert_eq!(t.percentile, 0.0);
        assert_eq!(t.name, TierName::KingOfTheHill);
        assert_eq!(calculate(0, 0).rank, 1);
    }

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(cycle_rank(1, 10, -1), 10);
        assert_eq!(cycle_rank(10, 10, 1), 1);
        assert_eq!(cycle_rank(4, 10, 1), 5);
    }

    #[test]
    fn test_gate_respects_cooldown() {
        let tier = calculate(6, 100);
        let mut gate = FireGate::new();
        assert!(gate.can_fire(&tier, 0.0));
        gate.record_fire(0.0);
        assert!(!gate.can_fire(&tier, 2.9));
        assert!(gate.can_fire(&tier, 3.0));
        assert!((gate.remaining(&tier, 1.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_busy_sky_stretches_cooldown() {
        let mut gate = FireGate::new();
        for i in 0..30 {
            gate.record_fire(i as f64 * 0.1);
        }
        // 30 fires in the window: 3/s
        assert_eq!(gate.multiplier(3.0), 1.5);
        for i in 0..80 {
            gate.record_fire(3.0 + i as f64 * 0.01);
        }
        assert_eq!(gate.multiplier(4.0), 3.0);
        // Everything ages out
        assert_eq!(gate.multiplier(20.0), 1.0);
    }

    #[test]
    fn test_zero_cooldown_tiers_always_fire() {
        let mut gate = FireGate::new();
        let apex = calculate(3, 100);
        for i in 0..200 {
            assert!(gate.can_fire(&apex, i as f64 * 0.001));
            gate.record_fire(i as f64 * 0.001);
        }
    }

    proptest! {
        #[test]
        fn prop_better_rank_never_smaller(rank in 1u32..999, total in 1000u32..5000) {
            let hi = calculate(rank, total);
            let lo = calculate(rank + 1, total);
            prop_assert!(hi.scale >= lo.scale);
            prop_assert!(hi.bundle.height <= lo.bundle.height);
            prop_assert!((0.0..=1.0).contains(&hi.scale));
        }
    }
}
