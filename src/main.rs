mod window;

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use liquidclock::config::DEFAULT_CONFIG_PATH;
use liquidclock::control::{Command, Controller};
use liquidclock::display::{draw_text, GlyphFont, PixelBuffer};
use liquidclock::mqtt::MqttClient;
use liquidclock::util::FpsCounter;
use liquidclock::{Config, DisplayState, LocalClock, Result, SharedForcing, Simulation, Surface};
use sdl2::keyboard::Keycode;
use window::{Display, InputEvent, RenderTarget};

/// Simulated tilt (in g) while an arrow key is held
const KEY_TILT: f32 = 0.8;
const KEY_SHAKE: f32 = 12.0;

#[derive(Parser, Debug)]
#[command(name = "liquidclock")]
#[command(author, version, about = "Particle clock that flows when tilted", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Window width in logical pixels
    #[arg(short, long)]
    width: Option<u32>,

    /// Window height in logical pixels
    #[arg(long)]
    height: Option<u32>,

    /// Physical pixels per logical pixel
    #[arg(long)]
    pixel_ratio: Option<f32>,

    /// Disable VSync for uncapped framerate
    #[arg(long)]
    no_vsync: bool,

    /// TrueType font for clock and result glyphs
    #[arg(long)]
    font: Option<PathBuf>,

    /// MQTT broker host (enables MQTT control)
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT topic
    #[arg(long)]
    mqtt_topic: Option<String>,

    /// Particle RNG seed
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        if let Some(ratio) = self.pixel_ratio {
            config.window.pixel_ratio = ratio;
        }
        if self.no_vsync {
            config.window.vsync = false;
        }
        if let Some(font) = &self.font {
            config.sampling.font_path = Some(font.display().to_string());
        }
        if let Some(host) = &self.mqtt_host {
            config.control.mqtt_host = Some(host.clone());
        }
        if let Some(topic) = &self.mqtt_topic {
            config.control.mqtt_topic.clone_from(topic);
        }
    }
}

/// Arrow keys currently held, as a simulated accelerometer reading
#[derive(Debug, Default)]
struct KeyTilt {
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

impl KeyTilt {
    /// Track `key`; returns true if it is an arrow key
    fn set(&mut self, key: Keycode, held: bool) -> bool {
        match key {
            Keycode::Left => self.left = held,
            Keycode::Right => self.right = held,
            Keycode::Up => self.up = held,
            Keycode::Down => self.down = held,
            _ => return false,
        }
        true
    }

    fn axis(neg: bool, pos: bool) -> f32 {
        match (neg, pos) {
            (true, false) => -KEY_TILT,
            (false, true) => KEY_TILT,
            _ => 0.0,
        }
    }

    /// Accelerometer reading: +y tilts the top of the screen down
    fn reading(&self) -> (f32, f32) {
        (Self::axis(self.left, self.right), Self::axis(self.down, self.up))
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

fn print_controls() {
    println!("Controls:");
    println!("  Arrows     - Tilt");
    println!("  Space      - Shake");
    println!("  1          - Idle (clock)");
    println!("  2          - Listening");
    println!("  3          - Thinking");
    println!("  4          - Showing result");
    println!("  R          - Show a \"?\" result");
    println!("  F          - Toggle FPS display");
    println!("  Escape     - Quit");
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    args.apply(&mut config);

    let logical_w = config.window.width;
    let logical_h = config.window.height;
    let ratio = if config.window.pixel_ratio > 0.0 {
        config.window.pixel_ratio
    } else {
        1.0
    };
    let width = (logical_w as f32 * ratio).round() as u32;
    let height = (logical_h as f32 * ratio).round() as u32;

    let (mut display, texture_creator) =
        Display::with_options("liquidclock", width, height, config.window.vsync)?;
    let mut target = RenderTarget::with_size(&texture_creator, display.width(), display.height())?;
    let mut buffer = PixelBuffer::with_size(display.width(), display.height());

    let seed = args.seed.unwrap_or_else(time_seed);
    let mut sim = Simulation::new(&config, Box::new(LocalClock), seed);
    let font_path = config.sampling.font_path.as_deref().map(Path::new);
    let font = GlyphFont::load_or_bitmap(font_path);
    sim.init(
        Surface::new(logical_w as f32, logical_h as f32, ratio),
        font,
        Instant::now(),
    );
    let forcing: SharedForcing = sim.forcing();

    let controller = match &config.control.socket_path {
        Some(path) => match Controller::new(path, forcing.clone()) {
            Ok(c) => Some(c),
            Err(e) => {
                log::warn!("Remote control disabled: {}", e);
                None
            }
        }
        None => None,
    };
    let mqtt = match config.control.mqtt_host {
        Some(_) => match MqttClient::new(&config.control, forcing.clone()) {
            Ok(c) => Some(c),
            Err(e) => {
                log::warn!("MQTT disabled: {}", e);
                None
            }
        }
        None => None,
    };

    let mut fps_counter = FpsCounter::new(60);
    let mut show_fps = false;
    let mut tilt = KeyTilt::default();

    log::info!(
        "liquidclock {}x{} (x{}), vsync {}, seed {}",
        logical_w,
        logical_h,
        ratio,
        if config.window.vsync { "on" } else { "off" },
        seed
    );
    print_controls();

    'main: loop {
        let (_dt, avg_fps) = fps_counter.tick();
        let now = Instant::now();

        for event in display.poll_events() {
            match event {
                InputEvent::Quit => break 'main,
                InputEvent::KeyDown(key) => {
                    if tilt.set(key, true) {
                        let (ax, ay) = tilt.reading();
                        forcing.apply_accelerometer(ax, ay);
                        continue;
                    }
                    match key {
                        Keycode::Escape => break 'main,
                        Keycode::Space => forcing.add_shake_impulse(KEY_SHAKE),
                        Keycode::Num1 => sim.set_display_state(DisplayState::Idle),
                        Keycode::Num2 => sim.set_display_state(DisplayState::Listening),
                        Keycode::Num3 => sim.set_display_state(DisplayState::Thinking),
                        Keycode::Num4 => sim.set_display_state(DisplayState::ShowingResult),
                        Keycode::R => sim.show_result("?", now),
                        Keycode::F => show_fps = !show_fps,
                        _ => {}
                    }
                }
                InputEvent::KeyUp(key) => {
                    if tilt.set(key, false) {
                        let (ax, ay) = tilt.reading();
                        forcing.apply_accelerometer(ax, ay);
                    }
                }
            }
        }

        let remote = controller
            .iter()
            .flat_map(Controller::poll)
            .chain(mqtt.iter().flat_map(MqttClient::poll));
        for cmd in remote {
            match cmd {
                Command::SetState(state) => sim.set_display_state(state),
                Command::ShowResult(text) => sim.show_result(&text, now),
                Command::Quit => break 'main,
            }
        }

        sim.tick(now, &mut buffer);

        // FPS overlay (press F to toggle)
        if show_fps {
            let (min_fps, max_fps) = fps_counter.min_max_fps();
            let ms = fps_counter.avg_frame_time_ms();
            let fps_text = format!(
                "FPS {} avg  {} min  {} max  {}ms  {} particles",
                avg_fps as u32,
                min_fps as u32,
                max_fps as u32,
                ms as u32,
                sim.pool().len()
            );
            let y = buffer.height() as i32 - 12;
            draw_text(&mut buffer, 5, y + 1, &fps_text, 0, 0, 0);
            draw_text(&mut buffer, 4, y, &fps_text, 255, 255, 0);
        }

        display.present(&mut target, &buffer)?;
    }

    sim.teardown();
    Ok(())
}
