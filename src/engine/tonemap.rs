use super::histogram::Histogram;
use crate::ifs::ViewParams;

/// Tone-mapped RGBA8 image, row-major, origin top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameImage {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl FrameImage {
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; width * height * 4],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]])
    }
}

/// Log-density tone mapper with depth fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneMapper {
    pub background: [f32; 3],
    pub fog_color: [f32; 3],
}

impl Default for ToneMapper {
    fn default() -> Self {
        Self {
            background: [0.0; 3],
            fog_color: [0.0; 3],
        }
    }
}

impl ToneMapper {
    pub fn map(&self, hist: &Histogram, view: &ViewParams) -> FrameImage {
        let view = view.sanitized();
        let mut frame = FrameImage::blank(hist.width(), hist.height());
        let max_hits = hist.max_hits();
        let log_max = (max_hits as f32).ln();
        let inv_gamma = 1.0 / view.gamma;
        let background = to_rgba8(self.background);

        for (i, px) in frame.rgba.chunks_exact_mut(4).enumerate() {
            let cell = hist.cell_at(i);
            if cell.hits == 0 {
                px.copy_from_slice(&background);
                continue;
            }
            let hits = cell.hits as f32;
            let density = if max_hits <= 1 { 1.0 } else { hits.ln() / log_max };
            let scale = view.brightness * density / hits;
            let mut rgb = cell.rgb.map(|c| (c * scale).max(0.0).powf(inv_gamma));

            let fog = fog_factor(cell.average_depth(), &view);
            if fog > 0.0 {
                for (c, f) in rgb.iter_mut().zip(self.fog_color) {
                    *c += (f - *c) * fog;
                }
            }
            px.copy_from_slice(&to_rgba8(rgb));
        }
        frame
    }
}

/// Blend factor toward the fog color for a cell whose average depth is
/// `depth`; 0 at or in front of the focus plane.
pub fn fog_factor(depth: f32, view: &ViewParams) -> f32 {
    if view.fog_effect <= 0.0 {
        return 0.0;
    }
    let behind = (depth - view.focus_distance).max(0.0) / view.focus_distance;
    (1.0 - (-view.fog_effect * behind).exp()).clamp(0.0, 1.0)
}

fn to_rgba8(rgb: [f32; 3]) -> [u8; 4] {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [q(rgb[0]), q(rgb[1]), q(rgb[2]), 255]
}
