use std::panic;
use std::process::ExitCode;
use std::time::Duration;

use log::{error, info};
use shadow_renderer::{
    clock::FrameClock,
    create_clap_command, demo, logging,
    render_loop::{TickOutcome, Unpaced},
    surface::{self, HeadlessSurface, Surface, TerminalSurface, WindowSurface},
    DisplayTarget, RenderLoop, Renderer, RendererConfig, Result,
};

fn main() -> ExitCode {
    let matches = create_clap_command().get_matches();
    let config = RendererConfig::from_matches(&matches);
    if let Err(e) = logging::init(&config) {
        eprintln!("failed to set up logging: {}", e);
    }

    let result = if config.snapshot.is_some() {
        snapshot(config)
    } else {
        match config.target {
            DisplayTarget::Window => {
                WindowSurface::new(config.width, config.height).and_then(|s| run(config, s))
            }
            DisplayTarget::Terminal => {
                install_terminal_panic_hook();
                TerminalSurface::new().and_then(|s| run(config, s))
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run<S: Surface>(config: RendererConfig, surface: S) -> Result<()> {
    let (width, height) = surface.size();
    let demo = demo::build(width, height, config.default_map_size)?;
    let mut render_loop = RenderLoop::new(Renderer::new(config)?, surface);
    render_loop.set_animation(demo::animate(demo.sphere));
    render_loop.load(demo.scene)?;
    render_loop.run()?;
    info!("{}", render_loop.metrics());
    Ok(())
}

/// Render one frame at `config.snapshot_time` without opening a surface and
/// write it to `config.snapshot`.
fn snapshot(config: RendererConfig) -> Result<()> {
    let Some(path) = config.snapshot.clone() else {
        return Ok(());
    };
    let demo = demo::build(config.width, config.height, config.default_map_size)?;
    let time = config.snapshot_time;
    let mut render_loop = RenderLoop::new(
        Renderer::new(config.clone())?,
        HeadlessSurface::new(config.width, config.height),
    )
    .with_pacer(Unpaced)
    .with_clock(FrameClock::fixed(Duration::ZERO));

    let mut animate = demo::animate(demo.sphere);
    render_loop.set_animation(move |scene, frame| {
        let mut frame = *frame;
        frame.elapsed = time;
        animate(scene, &frame)
    });
    render_loop.load(demo.scene)?;
    render_loop.start()?;
    if let TickOutcome::Skipped(e) = render_loop.tick()? {
        return Err(e);
    }

    match render_loop.surface().last_frame() {
        Some(frame) => {
            frame.save_png(&path)?;
            info!("wrote {}", path.display());
            Ok(())
        }
        None => Err(shadow_renderer::Error::Device(
            "snapshot frame was not rendered".to_string(),
        )),
    }
}

/// Leave raw mode before the panic message is printed, or it ends up mangled.
fn install_terminal_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        if let Err(e) = surface::terminal::restore_terminal() {
            eprintln!("Failed to cleanup terminal: {}", e);
        }
        original_hook(panic_info);
        error!("Panic occurred: {:?}", panic_info);
    }));
}
