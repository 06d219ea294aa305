mod config;
mod external;
mod render;
mod show;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::{
    cursor, execute, terminal,
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind},
};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use config::Config;
use external::{RelaySource, RelayWriter};
use render::{Canvas, ColorMode, RenderMode};
use show::celebration::{Celebration, DEFAULT_TIME_SCALE, TimeMode};
use show::entity::FinaleSpec;
use show::launch::{LaunchRecord, MAX_POINTS, MIN_POINTS, SizeSpec};
use show::tier::{self, FireGate, Tier};
use show::{Engine, FrameClock, palette};

#[derive(Parser)]
#[command(name = "skyburst", about = "Interactive terminal fireworks")]
struct Cli {
    /// Render mode
    #[arg(short, long, value_enum)]
    render: Option<RenderMode>,

    /// Color mode
    #[arg(short, long, value_enum)]
    color: Option<ColorMode>,

    /// Target FPS (1-120)
    #[arg(short, long)]
    fps: Option<u32>,

    /// Fixed launch size in points (1-80); random when omitted
    #[arg(short, long)]
    points: Option<u32>,

    /// Leaderboard rank; sizes launches by tier
    #[arg(long)]
    rank: Option<u32>,

    /// Leaderboard size used with --rank
    #[arg(long)]
    total: Option<u32>,

    /// ISO country code for flag-themed rockets
    #[arg(long)]
    country: Option<String>,

    /// Word shown on bursts (repeatable)
    #[arg(short, long = "word")]
    words: Vec<String>,

    /// Message under the crown finale
    #[arg(long)]
    crown_message: Option<String>,

    /// Replay launch records (JSON lines) from a file, or "-" for stdin
    #[arg(long)]
    relay_in: Option<PathBuf>,

    /// Append local launches as JSON lines
    #[arg(long)]
    relay_out: Option<PathBuf>,

    /// RNG seed for a reproducible show
    #[arg(long)]
    seed: Option<u64>,

    /// Hide the status bar
    #[arg(long)]
    clean: bool,

    /// Seconds between automatic launches (0 = off)
    #[arg(short, long)]
    auto: Option<f64>,

    /// Write logs to this file (level via RUST_LOG)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// World height in simulation units
    #[arg(long)]
    world_height: Option<f64>,

    /// Color quantization step (0 = off, 4/8/16 = coarser colors)
    #[arg(long)]
    color_quant: Option<u8>,

    /// Celebrate New Year as each timezone reaches midnight
    #[arg(long, value_enum)]
    celebrate: Option<TimeMode>,

    /// Fast-forward rate of the accelerated celebration clock
    #[arg(long)]
    time_scale: Option<f64>,

    /// Print the config file path and exit
    #[arg(long)]
    show_config: bool,

    /// Write a commented default config file and exit
    #[arg(long)]
    init_config: bool,
}

const DEFAULT_FPS: u32 = 30;
const DEFAULT_TOTAL: u32 = 100;
const DEFAULT_WORLD_HEIGHT: f64 = 900.0;
const MIN_WORLD_HEIGHT: f64 = 100.0;

/// CLI merged over the config file merged over defaults.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    render: RenderMode,
    color: ColorMode,
    fps: u32,
    points: Option<u32>,
    rank: Option<u32>,
    total: u32,
    country: Option<String>,
    words: Vec<String>,
    crown_message: Option<String>,
    relay_in: Option<PathBuf>,
    relay_out: Option<PathBuf>,
    seed: Option<u64>,
    clean: bool,
    auto_launch: f64,
    log_file: Option<PathBuf>,
    world_height: f64,
    color_quant: u8,
    celebrate: Option<TimeMode>,
    time_scale: f64,
}

impl Settings {
    fn resolve(cli: Cli, file: Config) -> Self {
        let words = if cli.words.is_empty() { file.words.unwrap_or_default() } else { cli.words };
        Settings {
            render: cli.render.or(file.render.map(Into::into)).unwrap_or(RenderMode::Braille),
            color: cli.color.or(file.color.map(Into::into)).unwrap_or(ColorMode::TrueColor),
            fps: cli.fps.or(file.fps).unwrap_or(DEFAULT_FPS).clamp(1, 120),
            points: cli.points.or(file.points).map(|p| p.clamp(MIN_POINTS, MAX_POINTS)),
            rank: cli.rank.or(file.rank),
            total: cli.total.or(file.total).unwrap_or(DEFAULT_TOTAL).max(1),
            country: cli.country.or(file.country),
            words: words.into_iter().map(|w| w.to_uppercase()).collect(),
            crown_message: cli.crown_message.or(file.crown_message),
            relay_in: cli.relay_in.or(file.relay_in),
            relay_out: cli.relay_out.or(file.relay_out),
            seed: cli.seed.or(file.seed),
            clean: cli.clean || file.clean.unwrap_or(false),
            auto_launch: cli.auto.or(file.auto_launch).filter(|s| s.is_finite()).unwrap_or(0.0).max(0.0),
            log_file: cli.log_file.or(file.log_file),
            world_height: cli
                .world_height
                .or(file.world_height)
                .filter(|h| h.is_finite())
                .unwrap_or(DEFAULT_WORLD_HEIGHT)
                .max(MIN_WORLD_HEIGHT),
            color_quant: cli.color_quant.or(file.color_quant).unwrap_or(0),
            celebrate: cli.celebrate.or(file.celebrate.map(Into::into)),
            time_scale: cli
                .time_scale
                .or(file.time_scale)
                .filter(|s| s.is_finite())
                .unwrap_or(DEFAULT_TIME_SCALE)
                .max(1.0),
        }
    }
}

/// Route `log` output to a file; the terminal itself is busy drawing.
fn init_logging(path: Option<&Path>) {
    let Some(path) = path else {
        return;
    };
    match File::create(path) {
        Ok(file) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
        }
        Err(e) => eprintln!("Warning: cannot open log file {}: {}", path.display(), e),
    }
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        match config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("No config directory on this platform"),
        }
        return Ok(());
    }
    if cli.init_config {
        match config::init_config() {
            Ok(path) => println!("Wrote {}", path.display()),
            Err(e) => eprintln!("{e}"),
        }
        return Ok(());
    }

    let file = config::load_config().unwrap_or_else(|e| {
        eprintln!("Warning: {e}");
        Config::default()
    });
    let settings = Settings::resolve(cli, file);
    init_logging(settings.log_file.as_deref());
    log::info!("starting with {settings:?}");

    let frame_dur = Duration::from_secs_f64(1.0 / settings.fps as f64);

    // Setup terminal
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide, EnableMouseCapture)?;

    let mut writer = BufWriter::with_capacity(256 * 1024, stdout);
    let result = run_loop(&mut writer, &settings, frame_dur);

    // Cleanup
    execute!(writer, DisableMouseCapture, cursor::Show, terminal::LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;

    result
}

const RENDER_MODES: [RenderMode; 2] = [RenderMode::Braille, RenderMode::HalfBlock];
const COLOR_MODES: [ColorMode; 4] = [ColorMode::TrueColor, ColorMode::Ansi256, ColorMode::Ansi16, ColorMode::Mono];

fn build_canvas(cols: u16, rows: u16, hide_status: bool, render: RenderMode, color: ColorMode, quant: u8) -> Canvas {
    let display_rows = if hide_status { rows as usize } else { (rows as usize).saturating_sub(1) };
    let mut canvas = Canvas::new(cols as usize, display_rows, render, color);
    canvas.color_quant = quant;
    canvas
}

/// World width for a canvas, keeping pixels square.
fn world_width(canvas: &Canvas, world_height: f64) -> f64 {
    world_height * canvas.width as f64 / canvas.height.max(1) as f64
}

/// Centre of a terminal cell in world coordinates.
fn cell_to_world(column: u16, row: u16, canvas: &Canvas, world_height: f64) -> (f64, f64) {
    let (cw, ch) = match canvas.render_mode {
        RenderMode::Braille => (2.0, 4.0),
        RenderMode::HalfBlock => (1.0, 2.0),
    };
    let k = canvas.height.max(1) as f64 / world_height;
    ((column as f64 + 0.5) * cw / k, (row as f64 + 0.5) * ch / k)
}

/// Launch sizing from the current rank, or points when no rank is set.
fn size_for(tier: Option<&Tier>, points: Option<u32>, rng: &mut impl RngExt) -> SizeSpec {
    match tier {
        Some(t) => SizeSpec::Tier(t.bundle),
        None => SizeSpec::Points(points.unwrap_or_else(|| rng.random_range(MIN_POINTS..=MAX_POINTS))),
    }
}

/// Local launches go out over the relay; write failures are logged only.
fn publish(relay: &mut Option<RelayWriter>, record: &LaunchRecord) {
    if let Some(w) = relay
        && let Err(e) = w.send(record)
    {
        log::warn!("relay write failed: {e}");
    }
}

fn run_loop(stdout: &mut BufWriter<io::Stdout>, settings: &Settings, frame_dur: Duration) -> io::Result<()> {
    let (mut cols, mut rows) = terminal::size()?;
    let mut render_mode = settings.render;
    let mut color_mode = settings.color;
    let mut hide_status = settings.clean;
    let mut canvas = build_canvas(cols, rows, hide_status, render_mode, color_mode, settings.color_quant);

    let world_height = settings.world_height;
    let mut engine = match settings.seed {
        Some(seed) => Engine::with_seed(world_width(&canvas, world_height), world_height, seed),
        None => Engine::new(world_width(&canvas, world_height), world_height),
    };
    engine.set_words(settings.words.clone());
    if let Some(code) = &settings.country {
        let flag = palette::flag_for(code);
        if flag.is_none() {
            log::warn!("unknown country code {code}");
        }
        engine.set_country(flag);
    }
    if let Some(mode) = settings.celebrate {
        engine.set_celebration(Some(Celebration::start(mode, settings.time_scale)));
    }
    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::seed_from_u64(rand::rng().random::<u64>()),
    };

    let inbound: Option<Receiver<LaunchRecord>> = settings
        .relay_in
        .clone()
        .map(|p| external::spawn_reader(RelaySource::from_path(p)));
    let mut outbound = settings.relay_out.as_deref().and_then(|p| {
        RelayWriter::open(p)
            .map_err(|e| log::warn!("relay output disabled: {e}"))
            .ok()
    });

    let mut rank = settings.rank;
    let mut tier = rank.map(|r| tier::calculate(r, settings.total));
    let mut gate = FireGate::new();

    let start = Instant::now();
    let mut clock = FrameClock::new();
    let mut last_auto = Instant::now();
    let mut frame_count: u64 = 0;
    let mut actual_fps: f64 = 0.0;
    let mut fps_update = Instant::now();
    let mut notice = String::new();
    let mut hovered: Option<String> = None;

    // Track if we need to rebuild canvas
    let mut rebuild_canvas = false;

    loop {
        // Handle input (non-blocking)
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Resize(w, h) => {
                    if w >= 10 && h >= 5 {
                        cols = w;
                        rows = h;
                        rebuild_canvas = true;
                    }
                }
                Event::Mouse(MouseEvent { kind, column, row, .. }) => {
                    let (x, y) = cell_to_world(column, row, &canvas, world_height);
                    match kind {
                        MouseEventKind::Down(MouseButton::Left) => {
                            let now = start.elapsed().as_secs_f64();
                            if let Some(t) = &tier
                                && !gate.can_fire(t, now)
                            {
                                notice = format!("cooldown {:.1}s", gate.remaining(t, now));
                                continue;
                            }
                            gate.record_fire(now);
                            let record = engine.launch(x, size_for(tier.as_ref(), settings.points, &mut rng));
                            publish(&mut outbound, &record);
                            notice.clear();
                        }
                        MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                            engine.emit_flare(x, y);
                            hovered = engine.lantern_at(x, y).map(str::to_owned);
                        }
                        _ => {}
                    }
                }
                Event::Key(KeyEvent { code, .. }) => match code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char(' ') => {
                        let x = rng.random::<f64>() * engine.width();
                        let record = engine.launch(x, size_for(tier.as_ref(), settings.points, &mut rng));
                        publish(&mut outbound, &record);
                    }
                    // Crown finale, top rank only
                    KeyCode::Char('k') => {
                        if tier.as_ref().is_some_and(Tier::can_fire_finale) {
                            let spec = FinaleSpec::mega(settings.crown_message.clone());
                            let record = engine.launch_finale(engine.width() / 2.0, spec);
                            publish(&mut outbound, &record);
                            notice.clear();
                        } else {
                            notice = "crown needs rank 1".to_string();
                        }
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Char('-') => {
                        let dir = if code == KeyCode::Char('-') { -1 } else { 1 };
                        let next = tier::cycle_rank(rank.unwrap_or(settings.total), settings.total, dir);
                        rank = Some(next);
                        tier = Some(tier::calculate(next, settings.total));
                        log::info!("rank now {next}/{}", settings.total);
                    }
                    KeyCode::Char('l') => {
                        if !engine.launch_lantern() {
                            notice = "lanterns grounded".to_string();
                        }
                    }
                    KeyCode::Char('x') => engine.reset(),
                    // Cycle render mode
                    KeyCode::Char('r') => {
                        let idx = RENDER_MODES.iter().position(|&m| m == render_mode).unwrap_or(0);
                        render_mode = RENDER_MODES[(idx + 1) % RENDER_MODES.len()];
                        rebuild_canvas = true;
                    }
                    // Cycle color mode
                    KeyCode::Char('c') => {
                        let idx = COLOR_MODES.iter().position(|&m| m == color_mode).unwrap_or(0);
                        color_mode = COLOR_MODES[(idx + 1) % COLOR_MODES.len()];
                        rebuild_canvas = true;
                    }
                    // Toggle status bar
                    KeyCode::Char('h') => {
                        hide_status = !hide_status;
                        rebuild_canvas = true;
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        // Rebuild canvas if mode changed or terminal resized
        if rebuild_canvas && cols >= 10 && rows >= 5 {
            // Re-read size to get the settled value
            let (settled_cols, settled_rows) = terminal::size()?;
            if settled_cols >= 10 && settled_rows >= 5 {
                cols = settled_cols;
                rows = settled_rows;
            }
            canvas = build_canvas(cols, rows, hide_status, render_mode, color_mode, settings.color_quant);
            engine.resize(world_width(&canvas, world_height), world_height);
            // Reset terminal state completely
            write!(stdout, "\x1b[2J\x1b[H")?;
            stdout.flush()?;
            rebuild_canvas = false;
        }

        // Remote launches
        if let Some(rx) = &inbound {
            for record in rx.try_iter() {
                engine.launch_at(&record);
            }
        }

        // Automatic shots lean toward the middle of the sky
        if settings.auto_launch > 0.0 && last_auto.elapsed().as_secs_f64() >= settings.auto_launch {
            let from = rng.random::<f64>() * engine.width();
            let to = engine.width() * (0.25 + rng.random::<f64>() * 0.5);
            let record = engine.launch_toward(from, to, size_for(tier.as_ref(), settings.points, &mut rng));
            publish(&mut outbound, &record);
            last_auto = Instant::now();
        }

        // Update & render
        let frame_start = Instant::now();
        engine.advance(clock.tick());
        engine.draw(&mut canvas);
        let frame = canvas.render();

        // Verify terminal size hasn't changed before writing
        // If it changed, skip this frame to avoid writing wrong-sized data
        let (check_cols, check_rows) = terminal::size()?;
        if check_cols != cols || check_rows != rows {
            cols = check_cols;
            rows = check_rows;
            rebuild_canvas = true;
            // Sleep briefly to let terminal settle
            std::thread::sleep(Duration::from_millis(50));
            continue;
        }

        // Build entire frame into buffer before flushing
        stdout.write_all(b"\x1b[H")?;
        stdout.write_all(frame.as_bytes())?;

        // Status bar
        frame_count += 1;
        if fps_update.elapsed() >= Duration::from_secs(1) {
            actual_fps = frame_count as f64 / fps_update.elapsed().as_secs_f64();
            frame_count = 0;
            fps_update = Instant::now();
        }
        if !hide_status {
            let stats = engine.stats();
            let sizing = match (&tier, settings.points) {
                (Some(t), _) => format!("#{} {}", t.rank, t.name.as_str()),
                (None, Some(p)) => format!("{p} pts"),
                (None, None) => "random pts".to_string(),
            };
            let theme = engine.country().map(|f| format!(" | {}", f.name)).unwrap_or_default();
            let world = engine.celebration().map(|c| format!(" | {}", c.status())).unwrap_or_default();
            let note = match &hovered {
                Some(from) => format!("lantern from {from}"),
                None => notice.clone(),
            };
            let status = format!(
                " skyburst | {}{}{} | {} rockets {} sparks {} text {} lanterns | {:?} | {:?} | {:.0} fps {}| [click] launch  [space] random  [l] lantern  [k] crown  [+/-] rank  [x] reset  [r] render  [c] color  [h] hide  [q] quit ",
                sizing,
                theme,
                world,
                stats.rockets,
                stats.particles,
                stats.texts,
                stats.lanterns,
                render_mode,
                color_mode,
                actual_fps,
                if note.is_empty() { String::new() } else { format!("| {note} ") },
            );
            let w = cols as usize;
            let truncated: String = status.chars().take(w).collect();
            let padded = format!("{:<width$}", truncated, width = w);
            write!(stdout, "\x1b[{};1H\x1b[7m{}\x1b[0m", rows, padded)?;
        }

        // Single flush per frame
        stdout.flush()?;

        // Sleep to target FPS
        let elapsed = frame_start.elapsed();
        if elapsed < frame_dur {
            std::thread::sleep(frame_dur - elapsed);
        }
    }
}
