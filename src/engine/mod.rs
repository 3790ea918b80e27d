//! Chaos-game iteration engine: a pool of walkers evolved in parallel and
//! splatted into a shared [`Histogram`].

mod histogram;
mod tonemap;

pub use histogram::{CellValue, Histogram, FIXED_ONE};
pub use tonemap::{fog_factor, FrameImage, ToneMapper};

use crate::camera::ScreenProjector;
use crate::ifs::{Ifs, IfsIterator, Palette, ViewParams};
use glam::Vec3;
use rayon::prelude::*;
use std::f32::consts::TAU;

/// Points farther than this from the origin count as escaped.
pub const ESCAPE_RADIUS: f32 = 1.0e10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub walkers: usize,
    pub steps_per_dispatch: u32,
    pub fuse: u32,
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            walkers: 4096,
            steps_per_dispatch: 256,
            fuse: 20,
            seed: None,
        }
    }
}

/// Immutable copy of everything one dispatch reads.
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    pub generation: u64,
    iterators: Vec<IfsIterator>,
    cumulative: Vec<f32>,
    final_iterator: IfsIterator,
    palette: Palette,
    view: ViewParams,
    projector: ScreenProjector,
    near: f32,
    far: f32,
}

impl SceneSnapshot {
    pub fn new(ifs: &Ifs, generation: u64) -> Self {
        let weights: Vec<f32> = ifs
            .iterators
            .iter()
            .map(|it| if it.w.is_finite() { it.w.max(0.0) } else { 0.0 })
            .collect();
        let sum: f32 = weights.iter().sum();
        let n = weights.len();
        let mut acc = 0.0;
        let cumulative = weights
            .iter()
            .map(|w| {
                acc += if sum > 0.0 { w / sum } else { 1.0 / n as f32 };
                acc
            })
            .collect();

        Self {
            generation,
            iterators: ifs.iterators.clone(),
            cumulative,
            final_iterator: ifs.final_iterator,
            palette: ifs.palette.clone(),
            view: ifs.view.sanitized(),
            projector: ifs.camera.projector(),
            near: ifs.camera.near,
            far: ifs.camera.far,
        }
    }

    pub fn view(&self) -> &ViewParams {
        &self.view
    }

    pub fn projector(&self) -> &ScreenProjector {
        &self.projector
    }

    pub fn iterator_count(&self) -> usize {
        self.iterators.len()
    }

    /// Index of the iterator selected by a uniform draw `r` in [0, 1).
    #[inline]
    pub fn pick(&self, r: f32) -> usize {
        self.cumulative
            .partition_point(|&c| c <= r)
            .min(self.iterators.len().saturating_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Still inside the fuse; nothing written.
    Fused,
    Splatted,
    /// Non-finite, escaped, behind the camera or out of frame.
    Reseeded,
}

#[derive(Debug, Clone)]
pub struct Walker {
    pub position: Vec3,
    pub color: f32,
    fuse_left: u32,
    fuse: u32,
    rng: fastrand::Rng,
}

impl Walker {
    pub fn new(seed: u64, fuse: u32) -> Self {
        let mut w = Self {
            position: Vec3::ZERO,
            color: 0.0,
            fuse_left: fuse,
            fuse,
            rng: fastrand::Rng::with_seed(seed),
        };
        w.reseed();
        w
    }

    pub fn fuse_left(&self) -> u32 {
        self.fuse_left
    }

    /// Fresh uniform position in [-1, 1]^3, random color, fuse restarted.
    pub fn reseed(&mut self) {
        let mut u = || self.rng.f32() * 2.0 - 1.0;
        self.position = Vec3::new(u(), u(), u());
        self.color = self.rng.f32();
        self.fuse_left = self.fuse;
    }

    /// One chaos-game step against `scene`, splatting into `hist` once past
    /// the fuse.
    pub fn step(&mut self, scene: &SceneSnapshot, hist: &Histogram) -> StepOutcome {
        if scene.iterators.is_empty() {
            return StepOutcome::Fused;
        }
        let it = &scene.iterators[scene.pick(self.rng.f32())];
        let p = it.transform_point(self.position);
        let color = it.transform_color(self.color);
        if !is_live(p) {
            self.reseed();
            return StepOutcome::Reseeded;
        }
        self.position = p;
        self.color = color;

        let fin = &scene.final_iterator;
        let q = fin.transform_point(p);
        let c = fin.transform_color(color);
        if !is_live(q) {
            self.reseed();
            return StepOutcome::Reseeded;
        }

        if self.fuse_left > 0 {
            self.fuse_left -= 1;
            return StepOutcome::Fused;
        }

        let proj = &scene.projector;
        let depth = proj.depth(q);
        if !(depth > scene.near) {
            self.reseed();
            return StepOutcome::Reseeded;
        }
        let q = self.defocus(q, depth, &scene.view, proj);
        let Some((x, y)) = proj.to_pixel(q) else {
            self.reseed();
            return StepOutcome::Reseeded;
        };

        let opacity = (it.op * fin.op).clamp(0.0, 1.0);
        let rgb = scene.palette.sample(c).map(|v| v * opacity);
        // The histogram can lag the snapshot by one resize.
        if !hist.splat(x as usize, y as usize, rgb, depth.min(scene.far)) {
            self.reseed();
            return StepOutcome::Reseeded;
        }
        StepOutcome::Splatted
    }

    /// Jitters `q` across a disk in the camera's right/up plane whose radius
    /// grows with distance outside the in-focus band.
    fn defocus(&mut self, q: Vec3, depth: f32, view: &ViewParams, proj: &ScreenProjector) -> Vec3 {
        let radius = view.dof * ((depth - view.focus_distance).abs() - view.focus_area * 0.5);
        if !(radius > 0.0) {
            return q;
        }
        let r = radius * self.rng.f32().sqrt();
        let (s, c) = (self.rng.f32() * TAU).sin_cos();
        q + proj.right * (r * c) + proj.up * (r * s)
    }
}

#[inline]
fn is_live(p: Vec3) -> bool {
    p.is_finite() && p.length_squared() <= ESCAPE_RADIUS * ESCAPE_RADIUS
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub steps: u64,
    pub splats: u64,
    pub reseeds: u64,
}

impl DispatchStats {
    fn record(&mut self, outcome: StepOutcome) {
        self.steps += 1;
        match outcome {
            StepOutcome::Fused => {}
            StepOutcome::Splatted => self.splats += 1,
            StepOutcome::Reseeded => self.reseeds += 1,
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            steps: self.steps + other.steps,
            splats: self.splats + other.splats,
            reseeds: self.reseeds + other.reseeds,
        }
    }
}

pub struct Engine {
    settings: EngineSettings,
    walkers: Vec<Walker>,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        let base = settings.seed.unwrap_or_else(|| fastrand::u64(..));
        let walkers = (0..settings.walkers.max(1) as u64)
            .map(|i| Walker::new(base ^ i.wrapping_mul(0x9E37_79B9_7F4A_7C15), settings.fuse))
            .collect();
        Self { settings, walkers }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn walkers(&self) -> &[Walker] {
        &self.walkers
    }

    /// Reseeds every walker; used after the accumulation was reset.
    pub fn reset(&mut self) {
        for w in &mut self.walkers {
            w.reseed();
        }
    }

    /// Runs `steps_per_dispatch` steps on every walker, data-parallel over the
    /// current rayon pool.
    pub fn dispatch(&mut self, scene: &SceneSnapshot, hist: &Histogram) -> DispatchStats {
        let steps = self.settings.steps_per_dispatch;
        self.walkers
            .par_iter_mut()
            .map(|w| {
                let mut stats = DispatchStats::default();
                for _ in 0..steps {
                    stats.record(w.step(scene, hist));
                }
                stats
            })
            .reduce(DispatchStats::default, DispatchStats::merge)
    }
}
