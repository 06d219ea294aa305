//! New Year around the world. As each UTC offset reaches midnight its
//! countries' flags burst over the city for two minutes, closing with one
//! centred finale rocket per country. A countdown runs through the last
//! seconds before every midnight.
//!
//! The world clock is either live (system time) or accelerated: parked an
//! hour before the earliest midnight and fast-forwarded between zones,
//! dropping to real time near each midnight and while a zone celebrates.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngExt;

use super::Engine;
use super::launch::{Aim, LAUNCH_DEPTH, LaunchRecord};
use super::palette;

/// Length of one zone's celebration (s)
pub const CELEBRATION_SECS: f64 = 120.0;
/// The finale is called this long before a celebration ends
const FINALE_LEAD: f64 = 10.0;
/// Finale rockets wait for the sky to clear, then go up one by one
const FINALE_DELAY: f64 = 3.0;
const FINALE_STAGGER: f64 = 1.2;
/// Opening salvo: 5 to 10 rockets, 0.2 s apart
const SALVO_MIN: usize = 5;
const SALVO_EXTRA: usize = 6;
const SALVO_STAGGER: f64 = 0.2;
/// Country rockets per second while a zone celebrates
const LAUNCHES_PER_SECOND: f64 = 0.9;
/// Accelerated clocks run at real speed this close to a midnight
const SLOWDOWN_WINDOW: f64 = 10.0;
/// Accelerated clocks start this long before the earliest midnight
const LEAD_IN: f64 = 3600.0;
/// Fast-forward rate of an accelerated clock unless configured
pub const DEFAULT_TIME_SCALE: f64 = 1000.0;
const COUNTDOWN_LIVE: f64 = 10.0;
const COUNTDOWN_ACCELERATED: f64 = 5.0;
/// No lanterns during a celebration or this close to the next one
const LANTERN_QUIET: f64 = 30.0;

/// Apex band of celebration rockets, fractions of the viewport from the top
const ROCKET_APEX_HIGH: f64 = 0.1;
const ROCKET_APEX_SPAN: f64 = 0.2;
const ROCKET_SCALE: f64 = 1.0;
const FINALE_ROCKET_APEX: f64 = 0.15;
const FINALE_ROCKET_SCALE: f64 = 2.0;

const SECS_PER_DAY: f64 = 86_400.0;

/// A UTC offset and the countries in it with a flag theme.
#[derive(Debug)]
pub struct Zone {
    pub offset_minutes: i32,
    pub countries: &'static [&'static str],
}

/// Earliest midnight first.
pub const ZONES: &[Zone] = &[
    Zone { offset_minutes: 13 * 60, countries: &["NZ"] },
    Zone { offset_minutes: 10 * 60, countries: &["AU"] },
    Zone { offset_minutes: 9 * 60, countries: &["JP", "KR"] },
    Zone { offset_minutes: 8 * 60, countries: &["CN", "SG", "PH", "MY"] },
    Zone { offset_minutes: 7 * 60, countries: &["TH", "VN", "ID"] },
    Zone { offset_minutes: 5 * 60 + 30, countries: &["IN"] },
    Zone { offset_minutes: 4 * 60, countries: &["AE"] },
    Zone { offset_minutes: 3 * 60, countries: &["SA", "KE", "RU", "TR"] },
    Zone { offset_minutes: 2 * 60, countries: &["ZA", "EG", "IL", "GR", "FI", "RO", "UA"] },
    Zone {
        offset_minutes: 60,
        countries: &["DE", "FR", "IT", "ES", "PL", "NL", "BE", "SE", "NO", "DK", "AT", "CH", "CZ", "HU", "NG"],
    },
    Zone { offset_minutes: 0, countries: &["GB", "IE", "PT"] },
    Zone { offset_minutes: -3 * 60, countries: &["BR", "AR"] },
    Zone { offset_minutes: -4 * 60, countries: &["CL"] },
    Zone { offset_minutes: -5 * 60, countries: &["US", "CA", "CO", "PE"] },
    Zone { offset_minutes: -6 * 60, countries: &["MX"] },
    Zone { offset_minutes: -8 * 60, countries: &["US", "CA"] },
];

impl Zone {
    /// `UTC+5:30` style label.
    pub fn label(&self) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let m = self.offset_minutes.unsigned_abs();
        if m % 60 == 0 {
            format!("UTC{sign}{}", m / 60)
        } else {
            format!("UTC{sign}{}:{:02}", m / 60, m % 60)
        }
    }

    /// Unix time at which this zone enters `year`.
    pub fn midnight(&self, year: i32) -> f64 {
        new_year_utc(year) - f64::from(self.offset_minutes) * 60.0
    }
}

/// Display name of a zone country.
fn country_name(code: &str) -> String {
    palette::flag_for(code).map(|f| f.name).unwrap_or_else(|| code.to_string())
}

/// Any country from the zone table, for lantern senders.
pub fn random_country(rng: &mut impl RngExt) -> &'static str {
    let total: usize = ZONES.iter().map(|z| z.countries.len()).sum();
    let mut pick = rng.random_range(0..total);
    for zone in ZONES {
        if pick < zone.countries.len() {
            return zone.countries[pick];
        }
        pick -= zone.countries.len();
    }
    ZONES[0].countries[0]
}

/// Unix time of 1 January `year`, 00:00 UTC.
pub fn new_year_utc(year: i32) -> f64 {
    days_from_civil(i64::from(year), 1, 1) as f64 * SECS_PER_DAY
}

// Proleptic Gregorian day count from 1970-01-01.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Calendar year (UTC) of a Unix time.
pub fn year_of(utc: f64) -> i32 {
    let z = (utc / SECS_PER_DAY).floor() as i64 + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let y = yoe + era * 400 + i64::from(mp >= 10);
    y as i32
}

/// The New Year whose celebrations are still ahead of, or under way at, `utc`.
pub fn upcoming_year(utc: f64) -> i32 {
    let last = ZONES.iter().map(|z| z.offset_minutes).min().unwrap_or(0);
    let tail = -f64::from(last) * 60.0 + CELEBRATION_SECS;
    year_of(utc - tail) + 1
}

fn system_utc() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// `HH:MM:SS` of a non-negative span or time of day.
fn hms(secs: f64) -> String {
    let s = secs.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TimeMode {
    /// System time
    Live,
    /// Fast-forward through the night, slowing down for each midnight
    Accelerated,
}

/// Simulated UTC wall clock.
#[derive(Debug, Clone)]
pub struct WorldClock {
    utc: f64,
    mode: TimeMode,
    /// Fast-forward rate
    fast: f64,
    /// Rate applied by the last step
    rate: f64,
}

impl WorldClock {
    pub fn live() -> Self {
        WorldClock {
            utc: system_utc(),
            mode: TimeMode::Live,
            fast: 1.0,
            rate: 1.0,
        }
    }

    /// Clock parked an hour before the earliest midnight of `year`.
    pub fn accelerated(year: i32, time_scale: f64) -> Self {
        let fast = if time_scale.is_finite() { time_scale.max(1.0) } else { DEFAULT_TIME_SCALE };
        WorldClock {
            utc: ZONES[0].midnight(year) - LEAD_IN,
            mode: TimeMode::Accelerated,
            fast,
            rate: fast,
        }
    }

    pub fn now(&self) -> f64 {
        self.utc
    }

    pub fn mode(&self) -> TimeMode {
        self.mode
    }
}

/// Something the engine should launch now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Flag rocket at a random spot
    Rocket(&'static str),
    /// Big centred flag rocket
    Finale(&'static str),
}

/// Seconds to the next midnight, with that zone's countries.
#[derive(Debug, Clone, PartialEq)]
pub struct Countdown {
    pub seconds_left: u32,
    pub zone: usize,
    /// Size pulse around 1.0
    pub pulse: f64,
}

#[derive(Debug, Clone, Copy)]
struct Active {
    zone: usize,
    start: f64,
    finale: bool,
}

/// Per-zone celebration tracker.
#[derive(Debug, Clone)]
pub struct Celebration {
    clock: WorldClock,
    year: i32,
    active: Vec<Active>,
    done: Vec<bool>,
    /// Cues due at a real (unscaled) time
    queued: Vec<(f64, Cue)>,
    elapsed: f64,
}

impl Celebration {
    pub fn new(clock: WorldClock, year: i32) -> Self {
        log::info!("celebrating {year} on a {:?} clock", clock.mode());
        Celebration {
            clock,
            year,
            active: Vec::new(),
            done: vec![false; ZONES.len()],
            queued: Vec::new(),
            elapsed: 0.0,
        }
    }

    /// Celebration of the upcoming New Year on the given kind of clock.
    pub fn start(mode: TimeMode, time_scale: f64) -> Self {
        let year = upcoming_year(system_utc());
        let clock = match mode {
            TimeMode::Live => WorldClock::live(),
            TimeMode::Accelerated => WorldClock::accelerated(year, time_scale),
        };
        Self::new(clock, year)
    }

    /// Zones celebrating right now.
    pub fn active_zones(&self) -> impl Iterator<Item = &'static Zone> + '_ {
        self.active.iter().map(|a| &ZONES[a.zone])
    }

    /// Next zone to reach midnight and when.
    pub fn next_midnight(&self) -> Option<(usize, f64)> {
        let now = self.clock.now();
        ZONES
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.done[*i] && !self.active.iter().any(|a| a.zone == *i))
            .map(|(i, z)| (i, z.midnight(self.year)))
            .filter(|(_, at)| *at > now)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn countdown(&self) -> Option<Countdown> {
        let threshold = match self.clock.mode {
            TimeMode::Live => COUNTDOWN_LIVE,
            TimeMode::Accelerated => COUNTDOWN_ACCELERATED,
        };
        let (zone, at) = self.next_midnight()?;
        let gap = at - self.clock.now();
        (gap > 0.0 && gap <= threshold).then(|| Countdown {
            seconds_left: gap.ceil() as u32,
            zone,
            pulse: 0.9 + 0.1 * (gap * 10.0).sin(),
        })
    }

    /// Lanterns stay grounded while a zone celebrates or one is about to.
    pub fn lanterns_allowed(&self) -> bool {
        self.active.is_empty()
            && self
                .next_midnight()
                .is_none_or(|(_, at)| at - self.clock.now() > LANTERN_QUIET)
    }

    /// Advance by `dt` real seconds and return the launches due.
    pub fn advance(&mut self, dt: f64, rng: &mut impl RngExt) -> Vec<Cue> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.elapsed += dt;
        self.step_clock(dt);
        let now = self.clock.now();

        for (i, zone) in ZONES.iter().enumerate() {
            let start = zone.midnight(self.year);
            let running = self.active.iter().position(|a| a.zone == i);
            if now >= start + CELEBRATION_SECS {
                if let Some(at) = running {
                    self.active.swap_remove(at);
                    log::info!("{} celebration over", zone.label());
                }
                self.done[i] = true;
            } else if now >= start && running.is_none() && !self.done[i] {
                self.open(i, start, rng);
            }
        }

        let mut cues = Vec::new();
        for a in &mut self.active {
            let zone = &ZONES[a.zone];
            let remaining = a.start + CELEBRATION_SECS - now;
            if !a.finale && remaining <= FINALE_LEAD {
                a.finale = true;
                let mut codes = zone.countries.to_vec();
                codes.sort_by_key(|c| country_name(c));
                for (n, code) in codes.into_iter().enumerate() {
                    let due = self.elapsed + FINALE_DELAY + n as f64 * FINALE_STAGGER;
                    self.queued.push((due, Cue::Finale(code)));
                }
                log::info!("{} finale", zone.label());
            } else if rng.random::<f64>() < LAUNCHES_PER_SECOND * dt {
                cues.push(Cue::Rocket(pick(zone, rng)));
            }
        }

        let elapsed = self.elapsed;
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queued)
            .into_iter()
            .partition(|(due, _)| *due <= elapsed);
        self.queued = waiting;
        cues.extend(ready.into_iter().map(|(_, cue)| cue));
        cues
    }

    fn open(&mut self, zone: usize, start: f64, rng: &mut impl RngExt) {
        let z = &ZONES[zone];
        self.active.push(Active {
            zone,
            start,
            finale: false,
        });
        let names: Vec<String> = z.countries.iter().map(|c| country_name(c)).collect();
        log::info!("{} reached {}: {}", z.label(), self.year, names.join(", "));

        let salvo = SALVO_MIN + rng.random_range(0..SALVO_EXTRA);
        for n in 0..salvo {
            let due = self.elapsed + n as f64 * SALVO_STAGGER;
            self.queued.push((due, Cue::Rocket(pick(z, rng))));
        }
    }

    fn step_clock(&mut self, dt: f64) {
        match self.clock.mode {
            TimeMode::Live => self.clock.utc = system_utc(),
            TimeMode::Accelerated => {
                let now = self.clock.utc;
                let next = self.next_midnight().map(|(_, at)| at);
                let fast = self.active.is_empty() && next.is_none_or(|at| at - now > SLOWDOWN_WINDOW);
                if !fast {
                    self.clock.rate = 1.0;
                    self.clock.utc += dt;
                    return;
                }
                self.clock.rate = self.clock.fast;
                let step = dt * self.clock.fast;
                // Never jump past the slow-down point of the next midnight
                self.clock.utc = match next {
                    Some(at) if now + step >= at - SLOWDOWN_WINDOW => at - SLOWDOWN_WINDOW,
                    _ => now + step,
                };
            }
        }
    }

    /// One-line summary for the status bar.
    pub fn status(&self) -> String {
        let now = self.clock.now();
        let mut line = format!("UTC {}", hms(now.rem_euclid(SECS_PER_DAY)));
        if self.clock.rate > 1.0 {
            line.push_str(&format!(" x{:.0}", self.clock.rate));
        }
        if !self.active.is_empty() {
            let zones: Vec<String> = self.active_zones().map(Zone::label).collect();
            line.push_str(&format!(" | {} celebrating {}", zones.join(" "), self.year));
        } else if let Some((zone, at)) = self.next_midnight() {
            line.push_str(&format!(" | {} in {}", ZONES[zone].label(), hms(at - now)));
        } else {
            line.push_str(&format!(" | {} has reached everyone", self.year));
        }
        line
    }
}

fn pick(zone: &Zone, rng: &mut impl RngExt) -> &'static str {
    zone.countries[rng.random_range(0..zone.countries.len())]
}

/// Country names of a zone, for the countdown caption.
pub fn zone_names(zone: usize) -> Vec<String> {
    ZONES
        .get(zone)
        .map(|z| z.countries.iter().map(|c| country_name(c)).collect())
        .unwrap_or_default()
}

impl Engine {
    pub fn set_celebration(&mut self, celebration: Option<Celebration>) {
        self.celebration = celebration;
    }

    pub fn celebration(&self) -> Option<&Celebration> {
        self.celebration.as_ref()
    }

    /// Launch a flag rocket for a celebration cue.
    pub(super) fn cue(&mut self, cue: Cue) {
        let (code, finale) = match cue {
            Cue::Rocket(code) => (code, false),
            Cue::Finale(code) => (code, true),
        };
        let Some(theme) = palette::flag_for(code) else {
            log::warn!("no flag for celebration country {code}");
            return;
        };
        let (x, apex, scale, aim) = if finale {
            let x = self.width / 2.0;
            (x, FINALE_ROCKET_APEX, FINALE_ROCKET_SCALE, Aim::Toward { from_x: x, to_x: x })
        } else {
            let x = self.rng.random::<f64>() * self.width;
            let apex = ROCKET_APEX_HIGH + self.rng.random::<f64>() * ROCKET_APEX_SPAN;
            (x, apex, ROCKET_SCALE, Aim::Drift)
        };
        let record = LaunchRecord {
            x,
            y: self.height + LAUNCH_DEPTH,
            target_y: self.height * apex,
            scale,
            points: None,
            firework_type: theme.kind(),
            word: None,
            text_size: 0.0,
            privileged: false,
        };
        self.push_rocket(&record, aim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::show::entity::FireworkKind;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const STEP: f64 = 1.0 / 30.0;

    fn accelerated() -> Celebration {
        Celebration::new(WorldClock::accelerated(2026, DEFAULT_TIME_SCALE), 2026)
    }

    /// Step until `until` holds, at most `limit` frames. Returns all cues.
    fn run(c: &mut Celebration, rng: &mut StdRng, limit: usize, until: impl Fn(&Celebration) -> bool) -> Vec<Cue> {
        let mut cues = Vec::new();
        for _ in 0..limit {
            if until(c) {
                break;
            }
            cues.extend(c.advance(STEP, rng));
        }
        cues
    }

    #[test]
    fn test_calendar_math() {
        assert_eq!(new_year_utc(1970), 0.0);
        assert_eq!(new_year_utc(2026), 1_767_225_600.0);
        assert_eq!(year_of(1_767_225_600.0), 2026);
        assert_eq!(year_of(1_767_225_599.0), 2025);
        assert_eq!(year_of(new_year_utc(2000) + 59.0 * SECS_PER_DAY), 2000);
    }

    #[test]
    fn test_upcoming_year_waits_for_the_last_zone() {
        let ny = new_year_utc(2027);
        assert_eq!(upcoming_year(ny - 80.0 * SECS_PER_DAY), 2027);
        // UTC-8 has not reached midnight yet
        assert_eq!(upcoming_year(ny + 7.0 * 3600.0), 2027);
        assert_eq!(upcoming_year(ny + 9.0 * 3600.0), 2028);
    }

    #[test]
    fn test_zones_run_earliest_first() {
        assert!(ZONES.windows(2).all(|w| w[0].offset_minutes > w[1].offset_minutes));
        for zone in ZONES {
            for code in zone.countries {
                assert!(palette::flag_for(code).is_some(), "{code}");
            }
        }
        assert_eq!(ZONES[5].label(), "UTC+5:30");
        assert_eq!(ZONES[ZONES.len() - 1].label(), "UTC-8");
    }

    #[test]
    fn test_accelerated_clock_lands_before_midnight_at_real_speed() {
        let mut c = accelerated();
        let mut rng = StdRng::seed_from_u64(1);
        let midnight = ZONES[0].midnight(2026);
        assert_eq!(c.clock.now(), midnight - LEAD_IN);

        let cues = run(&mut c, &mut rng, 1000, |c| c.clock.rate == 1.0);
        assert!(cues.is_empty());
        let gap = midnight - c.clock.now();
        assert!(gap < SLOWDOWN_WINDOW && gap >= SLOWDOWN_WINDOW - STEP - 1e-6, "{gap}");

        // Real speed through the countdown
        run(&mut c, &mut rng, 400, |c| c.countdown().is_some());
        assert_eq!(c.clock.rate, 1.0);
        let cd = c.countdown().unwrap();
        assert_eq!(cd.zone, 0);
        assert_eq!(cd.seconds_left, 5);
    }

    #[test]
    fn test_midnight_opens_with_a_flag_salvo() {
        let mut c = accelerated();
        let mut rng = StdRng::seed_from_u64(2);
        let mut cues = run(&mut c, &mut rng, 2000, |c| c.active_zones().count() > 0);
        assert_eq!(c.active_zones().next().map(|z| z.offset_minutes), Some(13 * 60));
        assert!(!c.lanterns_allowed());

        cues.extend(run(&mut c, &mut rng, 60, |_| false));
        assert!(cues.iter().all(|c| *c == Cue::Rocket("NZ")), "{cues:?}");
        assert!(cues.len() >= SALVO_MIN, "{cues:?}");
    }

    #[test]
    fn test_finale_goes_alphabetically_then_zone_closes() {
        let mut c = accelerated();
        let mut rng = StdRng::seed_from_u64(3);
        // Skip ahead to the +9 zone
        let cues = run(&mut c, &mut rng, 200_000, |c| c.active_zones().any(|z| z.offset_minutes == 9 * 60));
        assert!(cues.contains(&Cue::Finale("NZ")));
        let cues = run(&mut c, &mut rng, 200_000, |c| c.done[2]);
        let finale: Vec<_> = cues.iter().filter(|c| matches!(c, Cue::Finale(_))).collect();
        assert_eq!(finale, [&Cue::Finale("JP"), &Cue::Finale("KR")]);
        assert!(cues.iter().all(|c| matches!(c, Cue::Rocket("JP" | "KR")) || matches!(c, Cue::Finale(_))));
        assert!(!c.active_zones().any(|z| z.offset_minutes == 9 * 60));
    }

    #[test]
    fn test_quiet_hours_allow_lanterns() {
        let c = accelerated();
        assert!(c.lanterns_allowed());
        assert!(c.countdown().is_none());
        assert!(c.status().contains("UTC+13 in 01:00:00"), "{}", c.status());
    }

    #[test]
    fn test_cue_launches_flag_rockets() {
        let mut e = Engine::with_seed(1600.0, 900.0, 5);
        e.cue(Cue::Rocket("JP"));
        e.cue(Cue::Finale("KR"));
        assert_eq!(e.rockets.len(), 2);
        assert_eq!(e.rockets[0].kind.country_name(), Some("JAPAN"));
        assert!(e.rockets[0].target_y <= 900.0 * (ROCKET_APEX_HIGH + ROCKET_APEX_SPAN));
        let finale = &e.rockets[1];
        assert!(matches!(finale.kind, FireworkKind::Country { .. }));
        assert_eq!(finale.x, 800.0);
        assert_eq!(finale.vx, 0.0);
        assert_eq!(finale.scale, FINALE_ROCKET_SCALE);
    }

    #[test]
    fn test_engine_drives_the_celebration() {
        let mut e = Engine::with_seed(1600.0, 900.0, 9);
        e.set_celebration(Some(accelerated()));
        for _ in 0..3000 {
            e.advance(STEP);
            if !e.rockets.is_empty() {
                break;
            }
        }
        assert!(e.rockets.iter().all(|r| r.kind.country_name() == Some("NEW ZEALAND")));
        assert!(!e.rockets.is_empty());
        assert!(!e.launch_lantern());
    }
}
