use super::curve::{AnimationCurve, Keyframe};
use super::path::PropertyPath;
use crate::audio::AudioClip;

/// Drives a channel from the energy of one frequency band of a loaded clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioChannelDriver {
    pub audio_channel_id: usize,
    pub min_frequency: f32,
    pub max_frequency: f32,
    pub effect_multiplier: f32,
}

impl Default for AudioChannelDriver {
    fn default() -> Self {
        Self {
            audio_channel_id: 0,
            min_frequency: 0.0,
            max_frequency: 20_000.0,
            effect_multiplier: 1.0,
        }
    }
}

impl AudioChannelDriver {
    /// Band energy at `t` scaled by the effect multiplier; 0 without a clip.
    pub fn sample(&self, clip: Option<&AudioClip>, t: f32) -> f32 {
        let Some(clip) = clip else {
            return 0.0;
        };
        let energy = clip.band_energy(
            self.audio_channel_id,
            t,
            self.min_frequency,
            self.max_frequency,
        );
        let out = energy * self.effect_multiplier;
        if out.is_finite() { out } else { 0.0 }
    }
}

/// Named binding from a scene property to its keyframes or an audio driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub path: PropertyPath,
    pub curve: AnimationCurve,
    pub audio: Option<AudioChannelDriver>,
}

impl Channel {
    pub fn new(name: impl Into<String>, path: PropertyPath) -> Self {
        Self {
            name: name.into(),
            path,
            curve: AnimationCurve::new(),
            audio: None,
        }
    }

    pub fn with_audio(mut self, driver: AudioChannelDriver) -> Self {
        self.audio = Some(driver);
        self
    }

    pub fn is_audio_driven(&self) -> bool {
        self.audio.is_some()
    }

    /// Value at `t`. An attached audio driver takes precedence over the
    /// keyframes; an empty curve yields `None`.
    pub fn evaluate_at(&self, t: f32, clip: Option<&AudioClip>) -> Option<f32> {
        match &self.audio {
            Some(driver) => Some(driver.sample(clip, t)),
            None => self.curve.evaluate(t),
        }
    }

    pub fn insert_keyframe(&mut self, time: f32, value: f32) -> bool {
        self.curve.insert(Keyframe::new(time, value))
    }
}

/// Couples one curve to one scalar setter and writes it on every tick.
pub struct PropertyAnimation<S> {
    curve: AnimationCurve,
    setter: S,
}

impl<S: FnMut(f32)> PropertyAnimation<S> {
    pub fn new(curve: AnimationCurve, setter: S) -> Self {
        Self { curve, setter }
    }

    pub fn curve(&self) -> &AnimationCurve {
        &self.curve
    }

    /// Evaluates the curve at `t` and writes the result. Returns the value
    /// written, or `None` for an empty curve.
    pub fn animate(&mut self, t: f32) -> Option<f32> {
        let v = self.curve.evaluate(t)?;
        (self.setter)(v);
        Some(v)
    }
}
