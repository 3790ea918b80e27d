use super::{draw_overlay, Screen};
use crate::engine::FrameImage;
use std::io::Write;

const UPPER_HALF: char = '\u{2580}';

/// Paints two image rows per terminal row: the top pixel as foreground of an
/// upper half block, the bottom pixel as background.
#[derive(Default)]
pub struct HalfBlockPresenter {
    last_fg: Option<[u8; 3]>,
    last_bg: Option<[u8; 3]>,
}

impl HalfBlockPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image size that exactly fills `screen` above the HUD.
    pub fn pixel_size(screen: &Screen) -> (u32, u32) {
        (
            screen.cols.max(1) as u32,
            (screen.image_rows().max(1) as u32) * 2,
        )
    }

    pub fn draw(
        &mut self,
        screen: &Screen,
        image: &FrameImage,
        hud: &str,
        overlay: Option<&str>,
        out: &mut dyn Write,
    ) -> std::io::Result<()> {
        let cols = screen.cols as usize;
        let rows = screen.image_rows() as usize;
        if cols == 0 || rows == 0 {
            return Ok(());
        }
        // Stale frame from before a resize; the next one will fit.
        if image.width != cols || image.height != rows * 2 {
            return Ok(());
        }

        if screen.sync_updates {
            out.write_all(b"\x1b[?2026h")?;
        }
        out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;
        self.last_fg = None;
        self.last_bg = None;

        for row in 0..rows {
            let top = &image.rgba[(row * 2 * cols) * 4..(row * 2 + 1) * cols * 4];
            let bottom = &image.rgba[((row * 2 + 1) * cols) * 4..(row * 2 + 2) * cols * 4];
            for (t, b) in top.chunks_exact(4).zip(bottom.chunks_exact(4)) {
                let fg = [t[0], t[1], t[2]];
                let bg = [b[0], b[1], b[2]];
                if self.last_fg != Some(fg) {
                    write!(out, "\x1b[38;2;{};{};{}m", fg[0], fg[1], fg[2])?;
                    self.last_fg = Some(fg);
                }
                if self.last_bg != Some(bg) {
                    write!(out, "\x1b[48;2;{};{};{}m", bg[0], bg[1], bg[2])?;
                    self.last_bg = Some(bg);
                }
                write!(out, "{UPPER_HALF}")?;
            }
            out.write_all(b"\r\n")?;
        }

        let mut lines = hud.lines();
        for i in 0..screen.hud_rows as usize {
            write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", rows + i + 1)?;
            if let Some(line) = lines.next() {
                let clipped: String = line.chars().take(cols).collect();
                out.write_all(clipped.as_bytes())?;
            }
        }

        if let Some(text) = overlay {
            draw_overlay(out, screen, text)?;
        }

        out.write_all(b"\x1b[?7h")?;
        if screen.sync_updates {
            out.write_all(b"\x1b[?2026l")?;
        }
        out.flush()
    }
}
