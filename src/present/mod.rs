//! Terminal display surface for tone-mapped frames.

mod halfblock;

pub use halfblock::HalfBlockPresenter;

use crate::engine::FrameImage;
use crate::renderer::{FrameSink, RenderError};
use std::io::{BufWriter, Stdout, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Terminal geometry in cells. The bottom `hud_rows` rows hold status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub cols: u16,
    pub rows: u16,
    pub hud_rows: u16,
    pub sync_updates: bool,
}

impl Screen {
    pub fn image_rows(&self) -> u16 {
        self.rows.saturating_sub(self.hud_rows)
    }
}

/// Centered text box drawn over a dimmed screen.
pub fn draw_overlay(out: &mut dyn Write, screen: &Screen, text: &str) -> std::io::Result<()> {
    let cols = screen.cols as usize;
    let rows = screen.rows as usize;
    if text.trim().is_empty() || cols < 8 || rows < 4 {
        return Ok(());
    }

    let max_inner = cols.saturating_sub(6).max(1);
    let lines: Vec<String> = text
        .lines()
        .map(|l| l.chars().take(max_inner).collect())
        .collect();
    let inner_w = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
    let box_w = (inner_w + 4).min(cols.saturating_sub(2));
    let body_h = lines.len().min(rows.saturating_sub(3).max(1));
    let box_h = body_h + 2;
    let col0 = (cols.saturating_sub(box_w)) / 2 + 1;
    let row0 = (rows.saturating_sub(box_h)) / 2 + 1;

    let horiz = "-".repeat(box_w.saturating_sub(2));
    let blank = " ".repeat(box_w.saturating_sub(4));
    out.write_all(b"\x1b[0m\x1b[38;2;236;242;255m\x1b[48;2;10;14;24m")?;
    write!(out, "\x1b[{row0};{col0}H+{horiz}+")?;
    for (i, line) in lines.iter().take(body_h).enumerate() {
        let row = row0 + 1 + i;
        write!(out, "\x1b[{row};{col0}H| {blank} |")?;
        write!(out, "\x1b[{row};{}H{line}", col0 + 2)?;
    }
    write!(out, "\x1b[{};{col0}H+{horiz}+", row0 + box_h - 1)?;
    out.write_all(b"\x1b[0m")
}

struct SurfaceInner {
    screen: Screen,
    hud: String,
    overlay: Option<String>,
    presenter: HalfBlockPresenter,
    out: BufWriter<Stdout>,
}

/// Shared handle to the terminal. The render thread presents through it as a
/// [`FrameSink`]; the UI thread updates geometry and HUD text.
#[derive(Clone)]
pub struct TerminalSurface {
    inner: Arc<Mutex<SurfaceInner>>,
}

impl TerminalSurface {
    pub fn new(screen: Screen, out: Stdout) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SurfaceInner {
                screen,
                hud: String::new(),
                overlay: None,
                presenter: HalfBlockPresenter::new(),
                out: BufWriter::new(out),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut SurfaceInner) -> R) -> R {
        f(&mut self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn screen(&self) -> Screen {
        self.with(|s| s.screen)
    }

    pub fn set_screen(&self, screen: Screen) {
        self.with(|s| s.screen = screen);
    }

    pub fn set_hud(&self, hud: String) {
        self.with(|s| s.hud = hud);
    }

    pub fn set_overlay(&self, overlay: Option<String>) {
        self.with(|s| s.overlay = overlay);
    }

    pub fn draw(&self, image: &FrameImage) -> std::io::Result<()> {
        self.with(|s| {
            let SurfaceInner {
                screen,
                hud,
                overlay,
                presenter,
                out,
            } = s;
            presenter.draw(screen, image, hud, overlay.as_deref(), out)
        })
    }
}

impl FrameSink for TerminalSurface {
    fn present(&mut self, frame: &FrameImage) -> Result<(), RenderError> {
        self.draw(frame)
            .map_err(|e| RenderError::SurfaceLost(e.to_string()))
    }
}
