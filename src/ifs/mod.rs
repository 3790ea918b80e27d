//! Scene model: the weighted iterators, the final iterator, the camera and the
//! view parameters the tone mapper and depth of field read.

mod iterator;
mod palette;
mod variation;

pub use iterator::{Affine, IfsIterator, AFFINE_COEFFICIENTS};
pub use palette::Palette;
pub use variation::{Variation, RANDOMIZED_VARIATIONS, VARIATION_VERSION};

use crate::camera::YawPitchCamera;

pub const MIN_ITERATORS: usize = 2;
pub const MAX_ITERATORS: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewParams {
    pub brightness: f32,
    pub gamma: f32,
    pub fog_effect: f32,
    pub dof: f32,
    pub focus_distance: f32,
    pub focus_area: f32,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            gamma: 4.0,
            fog_effect: 2.0,
            dof: 0.05,
            focus_distance: 2.0,
            focus_area: 0.25,
        }
    }
}

impl ViewParams {
    /// Pulls every parameter back into its valid range. Non-finite values fall
    /// back to the defaults.
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let pick = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        Self {
            brightness: pick(self.brightness, d.brightness).max(1e-4),
            gamma: pick(self.gamma, d.gamma).max(1e-3),
            fog_effect: pick(self.fog_effect, d.fog_effect).max(0.0),
            dof: pick(self.dof, d.dof).max(0.0),
            focus_distance: pick(self.focus_distance, d.focus_distance).max(1e-3),
            focus_area: pick(self.focus_area, d.focus_area).max(0.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ifs {
    pub iterators: Vec<IfsIterator>,
    pub final_iterator: IfsIterator,
    pub camera: YawPitchCamera,
    pub view: ViewParams,
    pub palette: Palette,
}

impl Ifs {
    /// A freshly randomized scene with default camera and view.
    pub fn new() -> Self {
        let mut ifs = Self::empty();
        ifs.randomize_params();
        ifs
    }

    pub fn empty() -> Self {
        Self {
            iterators: Vec::new(),
            final_iterator: IfsIterator::identity(),
            camera: YawPitchCamera::new(),
            view: ViewParams::default(),
            palette: Palette::default(),
        }
    }

    pub fn randomize_params(&mut self) -> &mut Self {
        let mut rng = fastrand::Rng::new();
        self.randomize_params_with(&mut rng)
    }

    /// Replaces the iterators with 2..=6 random ones and normalizes weights
    /// once, after all of them were drawn.
    pub fn randomize_params_with(&mut self, rng: &mut fastrand::Rng) -> &mut Self {
        let count = rng.usize(MIN_ITERATORS..=MAX_ITERATORS);
        self.iterators.clear();
        for _ in 0..count {
            self.iterators.push(IfsIterator::random(rng));
        }
        self.normalize_weights();
        self
    }

    /// Divides each weight by the sum. Negative or non-finite weights count as
    /// zero; an all-zero system gets uniform weights.
    pub fn normalize_weights(&mut self) {
        for it in &mut self.iterators {
            if !it.w.is_finite() || it.w < 0.0 {
                it.w = 0.0;
            }
        }
        let sum: f32 = self.iterators.iter().map(|it| it.w).sum();
        if sum > 0.0 {
            for it in &mut self.iterators {
                it.w /= sum;
            }
        } else if !self.iterators.is_empty() {
            let uniform = 1.0 / self.iterators.len() as f32;
            for it in &mut self.iterators {
                it.w = uniform;
            }
        }
    }

    /// Recreates the camera, keeping the current resolution.
    pub fn reset_camera(&mut self) -> &mut Self {
        let (w, h) = (self.camera.width, self.camera.height);
        self.camera = YawPitchCamera::new();
        self.camera.width = w;
        self.camera.height = h;
        self
    }
}

impl Default for Ifs {
    fn default() -> Self {
        Self::new()
    }
}
