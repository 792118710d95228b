//! Per-frame orchestration: update, shadow passes, main pass, present, wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::clock::{FrameClock, FrameTime, Metrics};
use crate::core::Scene;
use crate::error::{ConfigError, Error, Result};
use crate::pipeline::{FrameReport, Renderer};
use crate::surface::{Surface, SurfaceEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Ready,
    Running,
    Stopped,
}

impl LoopState {
    fn name(self) -> &'static str {
        match self {
            LoopState::Uninitialized => "uninitialized",
            LoopState::Ready => "ready",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
        }
    }
}

/// Decides how long to wait after a frame before starting the next one.
pub trait FramePacer {
    fn wait(&mut self, frame_start: Instant);
}

/// Sleeps out the remainder of a fixed frame budget.
pub struct FixedRate {
    frame: Duration,
}

impl FixedRate {
    pub fn new(fps: u32) -> Self {
        Self {
            frame: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
        }
    }
}

impl FramePacer for FixedRate {
    fn wait(&mut self, frame_start: Instant) {
        if let Some(rest) = self.frame.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }
}

pub struct Unpaced;

impl FramePacer for Unpaced {
    fn wait(&mut self, _frame_start: Instant) {}
}

/// What to do after a frame fails on a bad resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameErrorPolicy {
    /// Log, skip presenting the frame, keep going.
    #[default]
    Continue,
    Stop,
}

#[derive(Debug)]
pub enum TickOutcome {
    Presented(FrameReport),
    /// The frame failed and nothing was presented.
    Skipped(Error),
    Stopped,
}

/// Cloneable handle for asking a loop to stop. The request takes effect at
/// the start of the next frame.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

type Animation = Box<dyn FnMut(&mut Scene, &FrameTime) -> Result<()>>;

pub struct RenderLoop<S: Surface> {
    state: LoopState,
    renderer: Renderer,
    surface: S,
    scene: Option<Scene>,
    animation: Option<Animation>,
    clock: FrameClock,
    metrics: Metrics,
    pacer: Box<dyn FramePacer>,
    policy: FrameErrorPolicy,
    stop: StopHandle,
    pending_resize: Option<(usize, usize)>,
    last_report: Option<FrameReport>,
}

impl<S: Surface> RenderLoop<S> {
    /// The loop paces itself to `renderer.config.target_fps`, or not at all
    /// when that is 0.
    pub fn new(renderer: Renderer, surface: S) -> Self {
        let pacer: Box<dyn FramePacer> = match renderer.config.target_fps {
            0 => Box::new(Unpaced),
            fps => Box::new(FixedRate::new(fps)),
        };
        Self {
            state: LoopState::Uninitialized,
            renderer,
            surface,
            scene: None,
            animation: None,
            clock: FrameClock::new(),
            metrics: Metrics::new(),
            pacer,
            policy: FrameErrorPolicy::default(),
            stop: StopHandle::default(),
            pending_resize: None,
            last_report: None,
        }
    }

    pub fn with_pacer(mut self, pacer: impl FramePacer + 'static) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    pub fn with_clock(mut self, clock: FrameClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_error_policy(mut self, policy: FrameErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Per-frame scene update, run after the clock ticks and before world
    /// matrices are recomputed.
    pub fn set_animation<F>(&mut self, animation: F)
    where
        F: FnMut(&mut Scene, &FrameTime) -> Result<()> + 'static,
    {
        self.animation = Some(Box::new(animation));
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Queue a resize, applied before the next frame's update.
    pub fn request_resize(&mut self, width: usize, height: usize) {
        self.pending_resize = Some((width, height));
    }

    fn invalid(&self, action: &'static str) -> Error {
        ConfigError::InvalidLoopState {
            action,
            state: self.state.name(),
        }
        .into()
    }

    /// Hand the loop its scene. The camera is fitted to the surface.
    pub fn load(&mut self, mut scene: Scene) -> Result<()> {
        if !matches!(self.state, LoopState::Uninitialized | LoopState::Ready) {
            return Err(self.invalid("load a scene"));
        }
        let (width, height) = self.surface.size();
        self.renderer.resize(width, height)?;
        scene.resize(width, height)?;
        scene.update_world_matrices();
        self.scene = Some(scene);
        self.state = LoopState::Ready;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state != LoopState::Ready {
            return Err(self.invalid("start"));
        }
        if let Some(scene) = &self.scene {
            let warnings = scene.log_shadow_diagnostics()?;
            info!(
                "starting render loop: {} light(s), {} instance(s), {} shadow warning(s)",
                scene.lights().len(),
                scene.instances().len(),
                warnings
            );
        }
        self.state = LoopState::Running;
        Ok(())
    }

    /// Run one frame. Resource errors skip the present and, depending on the
    /// error policy, stop the loop; any other error stops it and is returned.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.state != LoopState::Running {
            return Err(self.invalid("tick"));
        }
        let events = match self.surface.poll_events() {
            Ok(events) => events,
            Err(e) => {
                self.state = LoopState::Stopped;
                return Err(e);
            }
        };
        for event in events {
            match event {
                SurfaceEvent::Resized(width, height) => self.pending_resize = Some((width, height)),
                SurfaceEvent::CloseRequested => self.stop.request_stop(),
            }
        }
        if self.stop.is_requested() {
            info!("render loop stopped after {} frame(s)", self.clock.frames());
            self.state = LoopState::Stopped;
            return Ok(TickOutcome::Stopped);
        }

        let frame_start = Instant::now();
        let time = self.clock.tick();
        match self.frame(&time) {
            Ok(report) => {
                self.metrics.update(frame_start.elapsed());
                if let Err(e) = self.surface.present(self.renderer.frame(), &self.metrics) {
                    error!("present failed, stopping: {}", e);
                    self.state = LoopState::Stopped;
                    return Err(e);
                }
                self.last_report = Some(report.clone());
                self.pacer.wait(frame_start);
                Ok(TickOutcome::Presented(report))
            }
            Err(e) if e.is_frame_local() => {
                error!("frame {} failed: {}", time.frame, e);
                if self.policy == FrameErrorPolicy::Stop {
                    self.state = LoopState::Stopped;
                } else {
                    self.pacer.wait(frame_start);
                }
                Ok(TickOutcome::Skipped(e))
            }
            Err(e) => {
                error!("frame {} failed, stopping: {}", time.frame, e);
                self.state = LoopState::Stopped;
                Err(e)
            }
        }
    }

    /// Resize, update, world matrices, shadow passes and main pass.
    fn frame(&mut self, time: &FrameTime) -> Result<FrameReport> {
        let Some(scene) = self.scene.as_mut() else {
            return Err(ConfigError::InvalidLoopState {
                action: "render",
                state: "without a scene",
            }
            .into());
        };
        if let Some((width, height)) = self.pending_resize.take() {
            debug!("resizing to {}x{}", width, height);
            self.renderer.resize(width, height)?;
            scene.resize(width, height)?;
        }
        if let Some(animation) = self.animation.as_mut() {
            animation(scene, time)?;
        }
        scene.update_world_matrices();
        self.renderer.render(scene)
    }

    /// Tick until stopped. Starts the loop first if it is only `Ready`.
    pub fn run(&mut self) -> Result<()> {
        match self.state {
            LoopState::Ready => self.start()?,
            LoopState::Running => {}
            _ => return Err(self.invalid("run")),
        }
        while self.state == LoopState::Running {
            if let TickOutcome::Skipped(e) = self.tick()? {
                if self.state == LoopState::Stopped {
                    warn!("stopping after failed frame: {}", e);
                }
            }
        }
        Ok(())
    }
}
