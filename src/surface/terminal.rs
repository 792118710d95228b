use std::io::{self, stdout, Write};
use std::time::Duration;

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};

use super::{Surface, SurfaceEvent};
use crate::clock::Metrics;
use crate::core::Color;
use crate::error::{Error, Result};
use crate::pipeline::FrameBuffer;

/// Each character cell shows two pixels stacked vertically: the upper half
/// block takes the top pixel as foreground, the bottom pixel as background.
const HALF_BLOCK: char = '▀';

/// Full-screen rendering into the alternate screen of the controlling
/// terminal. Raw mode is left on drop.
pub struct TerminalSurface {
    size: (usize, usize),
    out: Vec<u8>,
}

fn cell_size_to_pixels(cols: u16, rows: u16) -> (usize, usize) {
    (cols.max(1) as usize, rows.max(1) as usize * 2)
}

impl TerminalSurface {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let (cols, rows) = undo_on_error(
            || {
                execute!(stdout(), EnterAlternateScreen, Hide)?;
                terminal::size()
            },
            restore_terminal,
        )?;
        let size = cell_size_to_pixels(cols, rows);
        info!("terminal surface {}x{} cells, {}x{} pixels", cols, rows, size.0, size.1);
        Ok(Self {
            size,
            out: Vec::new(),
        })
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        if let Err(e) = restore_terminal() {
            warn!("failed to restore terminal: {}", e);
        }
    }
}

/// Leave raw mode and the alternate screen. Safe to call more than once.
pub fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(stdout(), ResetColor, Show, LeaveAlternateScreen)
}

/// Run `setup`; if it fails, run `undo` before handing back the setup error.
fn undo_on_error<T>(
    setup: impl FnOnce() -> io::Result<T>,
    undo: impl FnOnce() -> io::Result<()>,
) -> io::Result<T> {
    setup().map_err(|e| {
        if let Err(undo_err) = undo() {
            warn!("failed to undo terminal setup: {}", undo_err);
        }
        e
    })
}

/// Queue the commands drawing `frame` into `out`. Consecutive cells of the
/// same colour pair are printed as one run.
fn encode_frame<W: Write>(out: &mut W, frame: &FrameBuffer) -> io::Result<usize> {
    let mut runs = 0;
    let mut last = None;
    let pixel = |x: usize, y: usize| {
        if y < frame.height {
            frame.data[x + y * frame.width]
        } else {
            0
        }
    };

    for row in 0..frame.height.div_ceil(2) {
        queue!(out, MoveTo(0, row as u16))?;
        let mut x = 0;
        while x < frame.width {
            let pair = (pixel(x, row * 2), pixel(x, row * 2 + 1));
            let mut run = String::new();
            while x < frame.width && (pixel(x, row * 2), pixel(x, row * 2 + 1)) == pair {
                run.push(HALF_BLOCK);
                x += 1;
            }
            if last != Some(pair) {
                queue!(
                    out,
                    SetForegroundColor(Color::from_u32(pair.0).to_crossterm_color()),
                    SetBackgroundColor(Color::from_u32(pair.1).to_crossterm_color())
                )?;
                last = Some(pair);
            }
            queue!(out, Print(run))?;
            runs += 1;
        }
    }
    Ok(runs)
}

impl Surface for TerminalSurface {
    fn size(&self) -> (usize, usize) {
        self.size
    }

    fn poll_events(&mut self) -> Result<Vec<SurfaceEvent>> {
        let mut events = Vec::new();
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Resize(cols, rows) => {
                    self.size = cell_size_to_pixels(cols, rows);
                    events.push(SurfaceEvent::Resized(self.size.0, self.size.1));
                }
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                        events.push(SurfaceEvent::CloseRequested)
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        events.push(SurfaceEvent::CloseRequested)
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(events)
    }

    fn present(&mut self, frame: &FrameBuffer, _metrics: &Metrics) -> Result<()> {
        self.out.clear();
        encode_frame(&mut self.out, frame)
            .and_then(|_| {
                let mut stdout = stdout();
                stdout.write_all(&self.out)?;
                stdout.flush()
            })
            .map_err(|e| Error::Device(format!("terminal present failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_setup_is_undone() {
        let undone = std::cell::Cell::new(0);
        let undo = || {
            undone.set(undone.get() + 1);
            Ok(())
        };

        let err = undo_on_error(
            || -> io::Result<(u16, u16)> { Err(io::Error::new(io::ErrorKind::Other, "no tty")) },
            undo,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "no tty");
        assert_eq!(undone.get(), 1);

        assert_eq!(undo_on_error(|| Ok((80, 24)), undo).unwrap(), (80, 24));
        assert_eq!(undone.get(), 1);
    }

    #[test]
    fn two_pixel_rows_per_cell() {
        assert_eq!(cell_size_to_pixels(80, 24), (80, 48));
        assert_eq!(cell_size_to_pixels(0, 0), (1, 2));
    }

    #[test]
    fn uniform_rows_are_single_runs() {
        let mut frame = FrameBuffer::new(8, 4);
        frame.clear(Color::GRAY);
        let mut out = Vec::new();
        assert_eq!(encode_frame(&mut out, &frame).unwrap(), 2);

        frame.set_pixel((3, 0), 0.0, Color::RED);
        out.clear();
        // Row 0 splits into three runs around the red pixel.
        assert_eq!(encode_frame(&mut out, &frame).unwrap(), 4);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches(HALF_BLOCK).count(), 16);
    }
}
