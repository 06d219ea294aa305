//! Night scene behind (and in front of) the show: stars, moon, and a city
//! skyline whose windows drift on and off.

use rand::RngExt;

use super::entity::Rgb;

const STAR_COUNT: usize = 100;
/// Stars only populate the top of the sky
const STAR_BAND: f64 = 0.4;
const TWINKLE_LOW: f64 = 0.3;
const TWINKLE_HIGH: f64 = 0.8;

pub const MOON_COLOR: Rgb = Rgb::new(244, 241, 222);
pub const MOON_RADIUS: f64 = 35.0;
pub const MOON_BLUR: f64 = 40.0;
const MOON_INSET: (f64, f64) = (120.0, 80.0);

/// Skyline height as a fraction of the viewport
const CITY_HEIGHT: f64 = 0.165;
const BUILDING_WIDTHS: [f64; 14] = [60.0, 80.0, 50.0, 90.0, 70.0, 85.0, 60.0, 75.0, 55.0, 80.0, 65.0, 90.0, 100.0, 45.0];
const WINDOW_SPACING: (f64, f64) = (8.0, 7.0);
const WINDOW_MARGIN: f64 = 6.0;
pub const WINDOW_SIZE: (f64, f64) = (3.0, 5.0);

/// Brightness change per animation step
const WINDOW_TRANSITION: f64 = 0.01;
/// Flicker clock increment per animation step
const FLICKER_STEP: f64 = 0.016;
const GLIMMER_LOW: f64 = 0.6;
const GLIMMER_HIGH: f64 = 0.9;
/// Windows dimmer than this are not drawn
pub const WINDOW_VISIBLE: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct Star {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub opacity: f64,
    twinkle: f64,
}

impl Star {
    fn twinkle(&mut self) {
        self.opacity += self.twinkle;
        if self.opacity > TWINKLE_HIGH || self.opacity < TWINKLE_LOW {
            self.twinkle = -self.twinkle;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Window {
    /// Offset from the building's top-left corner
    pub x: f64,
    pub y: f64,
    pub brightness: f64,
    target: f64,
    glimmer: f64,
    flicker_timer: f64,
    flicker_interval: f64,
    on: bool,
}

impl Window {
    fn animate(&mut self, rng: &mut impl RngExt) {
        if (self.brightness - self.target).abs() > WINDOW_TRANSITION {
            if self.brightness < self.target {
                self.brightness = (self.brightness + WINDOW_TRANSITION).min(self.target);
            } else {
                self.brightness = (self.brightness - WINDOW_TRANSITION).max(self.target);
            }
        }

        if self.on && self.brightness > 0.1 {
            self.target += self.glimmer;
            if self.target > GLIMMER_HIGH || self.target < GLIMMER_LOW {
                self.glimmer = -self.glimmer;
            }
        }

        self.flicker_timer += FLICKER_STEP;
        if self.flicker_timer >= self.flicker_interval {
            self.flicker_timer = 0.0;
            self.flicker_interval = 20.0 + rng.random::<f64>() * 40.0;
            self.on = !self.on;
            self.target = if self.on { 0.6 + rng.random::<f64>() * 0.3 } else { 0.0 };
        }
    }

    /// Warm sodium tone for the current brightness.
    pub fn color(&self) -> Rgb {
        let b = self.brightness.clamp(0.0, 1.0);
        Rgb::new((255.0 * b) as u8, (60.0 + b * 80.0) as u8, 0)
    }
}

#[derive(Debug, Clone)]
pub struct Building {
    pub x: f64,
    pub width: f64,
    pub height: f64,
    pub windows: Vec<Window>,
}

#[derive(Debug, Clone, Default)]
pub struct Background {
    pub stars: Vec<Star>,
    pub buildings: Vec<Building>,
    /// Moon centre
    pub moon: (f64, f64),
}

impl Background {
    /// Fresh scene for a `width` x `height` viewport.
    pub fn generate(width: f64, height: f64, rng: &mut impl RngExt) -> Self {
        let stars = (0..STAR_COUNT)
            .map(|_| Star {
                x: rng.random::<f64>() * width,
                y: rng.random::<f64>() * height * STAR_BAND,
                size: 0.5 + rng.random::<f64>() * 1.5,
                opacity: 0.3 + rng.random::<f64>() * 0.5,
                twinkle: 0.01 + rng.random::<f64>() * 0.02,
            })
            .collect();

        let city = height * CITY_HEIGHT;
        let mut buildings = Vec::new();
        let mut x = 0.0;
        for &w in BUILDING_WIDTHS.iter().cycle() {
            if x >= width {
                break;
            }
            let h = city * (0.4 + rng.random::<f64>() * 0.6);
            buildings.push(Building {
                x,
                width: w,
                height: h,
                windows: windows_for(w, h, rng),
            });
            x += w;
        }

        Background {
            stars,
            buildings,
            moon: (width - MOON_INSET.0, MOON_INSET.1),
        }
    }

    /// One step of ambient animation: star twinkle and window flicker.
    pub fn animate(&mut self, rng: &mut impl RngExt) {
        for star in &mut self.stars {
            star.twinkle();
        }
        for window in self.buildings.iter_mut().flat_map(|b| b.windows.iter_mut()) {
            window.animate(rng);
        }
    }
}

fn windows_for(width: f64, height: f64, rng: &mut impl RngExt) -> Vec<Window> {
    let cols = ((width - WINDOW_MARGIN * 2.0) / WINDOW_SPACING.0).floor().max(0.0) as usize;
    let rows = ((height - WINDOW_MARGIN * 2.0) / WINDOW_SPACING.1).floor().max(0.0) as usize;
    let mut windows = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            // Sparse: most of the grid stays dark wall
            if rng.random::<f64>() >= 0.3 {
                continue;
            }
            let lit = rng.random::<f64>() < 0.6;
            let brightness = if lit { 0.6 + rng.random::<f64>() * 0.4 } else { 0.0 };
            let target = if lit { 0.6 + rng.random::<f64>() * 0.4 } else { 0.0 };
            windows.push(Window {
                x: WINDOW_MARGIN + col as f64 * WINDOW_SPACING.0,
                y: WINDOW_MARGIN + row as f64 * WINDOW_SPACING.1,
                brightness,
                target,
                glimmer: 0.001 + rng.random::<f64>() * 0.003,
                flicker_timer: rng.random::<f64>() * 30.0,
                flicker_interval: 20.0 + rng.random::<f64>() * 40.0,
                on: lit,
            });
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scene() -> Background {
        Background::generate(1600.0, 900.0, &mut StdRng::seed_from_u64(42))
    }

    #[test]
    fn test_stars_stay_in_upper_sky() {
        let bg = scene();
        assert_eq!(bg.stars.len(), STAR_COUNT);
        assert!(bg.stars.iter().all(|s| s.y <= 360.0 && (0.0..1600.0).contains(&s.x)));
        assert!(bg.stars.iter().all(|s| (0.5..=2.0).contains(&s.size)));
    }

    #[test]
    fn test_city_spans_full_width() {
        let bg = scene();
        let last = bg.buildings.last().unwrap();
        assert!(last.x < 1600.0 && last.x + last.width >= 1600.0);
        assert_eq!(bg.buildings[0].width, 60.0);
        assert!(bg.buildings.iter().all(|b| b.height <= 900.0 * CITY_HEIGHT + 1e-9));
    }

    #[test]
    fn test_windows_fit_inside_buildings() {
        let bg = scene();
        for b in &bg.buildings {
            for w in &b.windows {
                assert!(w.x + WINDOW_SIZE.0 <= b.width);
                assert!(w.y + WINDOW_SIZE.1 <= b.height);
            }
        }
    }

    #[test]
    fn test_moon_position_tracks_width() {
        assert_eq!(scene().moon, (1480.0, 80.0));
    }

    #[test]
    fn test_twinkle_reverses_at_bounds() {
        let mut star = Star {
            x: 0.0,
            y: 0.0,
            size: 1.0,
            opacity: 0.79,
            twinkle: 0.02,
        };
        star.twinkle();
        assert!(star.twinkle < 0.0);
        for _ in 0..100 {
            star.twinkle();
            assert!((0.25..=0.85).contains(&star.opacity));
        }
    }

    #[test]
    fn test_window_toggles_when_timer_expires() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut w = Window {
            x: 0.0,
            y: 0.0,
            brightness: 0.0,
            target: 0.0,
            glimmer: 0.002,
            flicker_timer: 19.99,
            flicker_interval: 20.0,
            on: false,
        };
        w.animate(&mut rng);
        assert!(w.on);
        assert!((0.6..=0.9).contains(&w.target));
        assert_eq!(w.flicker_timer, 0.0);
        assert!((20.0..60.0).contains(&w.flicker_interval));
        w.animate(&mut rng);
        assert!((w.brightness - WINDOW_TRANSITION).abs() < 1e-12);
    }

    #[test]
    fn test_window_color_is_warm() {
        let w = Window {
            x: 0.0,
            y: 0.0,
            brightness: 1.0,
            target: 1.0,
            glimmer: 0.0,
            flicker_timer: 0.0,
            flicker_interval: 20.0,
            on: true,
        };
        assert_eq!(w.color(), Rgb::new(255, 140, 0));
    }
}
