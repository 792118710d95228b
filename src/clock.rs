//! Frame timing: the clock the render loop ticks and the metrics shown in
//! the window title.

use std::fmt::Display;
use std::time::{Duration, Instant};

/// Time information handed to the per-frame update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the loop started.
    pub elapsed: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
    pub frame: u64,
}

#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame: u64,
    fixed_step: Option<Duration>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame: 0,
            fixed_step: None,
        }
    }

    /// A clock that advances by exactly `step` per tick, whatever the wall
    /// clock says. Used for snapshots and tests.
    pub fn fixed(step: Duration) -> Self {
        Self {
            fixed_step: Some(step),
            ..Self::new()
        }
    }

    pub fn tick(&mut self) -> FrameTime {
        let frame = self.frame;
        self.frame += 1;
        match self.fixed_step {
            Some(step) => {
                let step = step.as_secs_f32();
                FrameTime {
                    elapsed: step * frame as f32,
                    delta: if frame == 0 { 0.0 } else { step },
                    frame,
                }
            }
            None => {
                let now = Instant::now();
                let time = FrameTime {
                    elapsed: (now - self.start).as_secs_f32(),
                    delta: (now - self.last).as_secs_f32(),
                    frame,
                };
                self.last = now;
                time
            }
        }
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }
}

const FRAME_WINDOW: usize = 120;

pub struct Metrics {
    pub last_frame: Instant,
    pub frame_time: Duration,
    pub fps_counter: u32,
    pub fps_update_timer: Instant,
    pub current_fps: f32,
    pub frame_times: Vec<f32>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            frame_time: Duration::from_secs_f32(1.0 / 60.0),
            fps_counter: 0,
            fps_update_timer: Instant::now(),
            current_fps: 0.0,
            frame_times: Vec::with_capacity(FRAME_WINDOW),
        }
    }

    /// Record one frame that took `frame_delta`. FPS is refreshed once a second.
    pub fn update(&mut self, frame_delta: Duration) {
        self.last_frame = Instant::now();
        self.frame_time = frame_delta;
        self.fps_counter += 1;
        if self.frame_times.len() == FRAME_WINDOW {
            self.frame_times.remove(0);
        }
        self.frame_times.push(frame_delta.as_secs_f32() * 1000.0);

        let since = self.fps_update_timer.elapsed();
        if since >= Duration::from_secs(1) {
            self.current_fps = self.fps_counter as f32 / since.as_secs_f32();
            self.fps_counter = 0;
            self.fps_update_timer = Instant::now();
        }
    }

    pub fn average_ms(&self) -> f32 {
        if self.frame_times.is_empty() {
            0.0
        } else {
            self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32
        }
    }
}

impl Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FPS: {:.2} | Avg: {:.2}ms | Min: {:.2}ms | Max: {:.2}ms",
            self.current_fps,
            self.average_ms(),
            self.frame_times
                .iter()
                .copied()
                .reduce(f32::min)
                .unwrap_or(0.0),
            self.frame_times
                .iter()
                .copied()
                .reduce(f32::max)
                .unwrap_or(0.0)
        )
    }
}
