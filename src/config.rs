//! Renderer settings and the command line that fills them in.

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;

use crate::core::shadow::DEFAULT_SHADOW_MAP_SIZE;
use crate::core::Color;
use crate::pipeline::ShadowFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayTarget {
    #[default]
    Window,
    Terminal,
}

/// Renderer-wide shadow switches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    pub enabled: bool,
    pub filter: ShadowFilter,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: ShadowFilter::Pcf,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub width: usize,
    pub height: usize,
    pub clear_color: Color,
    pub shadows: ShadowSettings,
    /// 0 renders as fast as possible.
    pub target_fps: u32,
    /// Applied to every shadow-casting light the demo creates.
    pub default_map_size: u32,
    pub target: DisplayTarget,
    /// Render a single frame headless and write it here instead of opening a surface.
    pub snapshot: Option<PathBuf>,
    /// Scene time, in seconds, the snapshot frame is taken at.
    pub snapshot_time: f32,
    pub log_level: LevelFilter,
    pub log_file: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            clear_color: Color::BLACK,
            shadows: ShadowSettings::default(),
            target_fps: 60,
            default_map_size: DEFAULT_SHADOW_MAP_SIZE,
            target: DisplayTarget::Window,
            snapshot: None,
            snapshot_time: 0.0,
            log_level: LevelFilter::Info,
            log_file: PathBuf::from("shadow_renderer.log"),
        }
    }
}

pub fn create_clap_command() -> Command {
    Command::new("shadow_renderer")
        .about("Software shadow-mapping renderer")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("Where to present frames ('window', 'terminal', 'w' or 't')")
                .value_parser(["window", "terminal", "w", "t"]),
        )
        .arg(
            Arg::new("filter")
                .long("filter")
                .value_name("FILTER")
                .help("Shadow filtering: 'basic', 'pcf' or 'pcf-soft'")
                .value_parser(|s: &str| s.parse::<ShadowFilter>()),
        )
        .arg(
            Arg::new("no-shadows")
                .long("no-shadows")
                .help("Skip the shadow passes entirely")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("map-size")
                .long("map-size")
                .value_name("TEXELS")
                .help("Shadow map width and height for every shadow-casting light")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PIXELS")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PIXELS")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("FPS")
                .help("Frame rate cap, 0 for none")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("clear-color")
                .long("clear-color")
                .value_name("RRGGBB")
                .value_parser(|s: &str| Color::from_hex(s)),
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .value_name("FILE")
                .help("Render one frame headless and save it as an image")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("time")
                .long("time")
                .value_name("SECONDS")
                .help("Animation time of the snapshot frame")
                .requires("snapshot")
                .value_parser(value_parser!(f32)),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("off, error, warn, info, debug or trace")
                .value_parser(|s: &str| {
                    s.parse::<LevelFilter>()
                        .map_err(|_| format!("unknown log level '{}'", s))
                }),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("FILE")
                .help("Log destination in terminal mode")
                .value_parser(value_parser!(PathBuf)),
        )
}

impl RendererConfig {
    /// Defaults overridden by whatever was given on the command line.
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let mut config = RendererConfig::default();

        if let Some(mode) = matches.get_one::<String>("mode") {
            config.target = match mode.as_str() {
                "terminal" | "t" => DisplayTarget::Terminal,
                _ => DisplayTarget::Window,
            };
        }
        if let Some(filter) = matches.get_one::<ShadowFilter>("filter") {
            config.shadows.filter = *filter;
        }
        if matches.get_flag("no-shadows") {
            config.shadows.enabled = false;
        }
        if let Some(size) = matches.get_one::<u32>("map-size") {
            config.default_map_size = *size;
        }
        if let Some(width) = matches.get_one::<u32>("width") {
            config.width = *width as usize;
        }
        if let Some(height) = matches.get_one::<u32>("height") {
            config.height = *height as usize;
        }
        if let Some(fps) = matches.get_one::<u32>("fps") {
            config.target_fps = *fps;
        }
        if let Some(color) = matches.get_one::<Color>("clear-color") {
            config.clear_color = *color;
        }
        config.snapshot = matches.get_one::<PathBuf>("snapshot").cloned();
        if let Some(time) = matches.get_one::<f32>("time") {
            config.snapshot_time = *time;
        }
        if let Some(level) = matches.get_one::<LevelFilter>("log-level") {
            config.log_level = *level;
        }
        if let Some(path) = matches.get_one::<PathBuf>("log-file") {
            config.log_file = path.clone();
        }
        config
    }
}
