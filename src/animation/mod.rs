//! Keyframe curves, audio-driven channels and the set of channels bound to a
//! scene.

mod channel;
mod curve;
mod path;

pub use channel::{AudioChannelDriver, Channel, PropertyAnimation};
pub use curve::{AnimationCurve, Interpolation, Keyframe};
pub use path::{CameraField, IteratorField, PathError, PropertyPath, ViewField};

use crate::audio::AudioClip;
use crate::ifs::Ifs;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Animations {
    channels: Vec<Channel>,
    clip: Option<Arc<AudioClip>>,
}

impl Animations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.name == name)
    }

    /// Adds a channel, replacing any channel with the same name.
    pub fn add_channel(&mut self, channel: Channel) {
        match self.channel_mut(&channel.name) {
            Some(existing) => *existing = channel,
            None => self.channels.push(channel),
        }
    }

    pub fn remove_channel(&mut self, name: &str) -> Option<Channel> {
        let i = self.channels.iter().position(|c| c.name == name)?;
        Some(self.channels.remove(i))
    }

    pub fn audio_clip(&self) -> Option<&AudioClip> {
        self.clip.as_deref()
    }

    pub fn set_audio_clip(&mut self, clip: Option<Arc<AudioClip>>) {
        self.clip = clip;
    }

    /// Inserts a keyframe into the named channel, creating the channel bound
    /// to `path` when it does not exist yet.
    pub fn add_or_update_channel(&mut self, name: &str, path: PropertyPath, value: f32, time: f32) {
        if self.channel(name).is_none() {
            self.channels.push(Channel::new(name, path));
        }
        if let Some(channel) = self.channel_mut(name) {
            channel.path = path;
            if !channel.insert_keyframe(time, value) {
                log::warn!("rejected non-finite keyframe for channel '{name}'");
            }
        }
    }

    /// Keys the property's current value in `ifs` at `time`. Returns false
    /// when the path does not resolve in this scene.
    pub fn insert_keyframe_from_scene(
        &mut self,
        name: &str,
        path: PropertyPath,
        ifs: &Ifs,
        time: f32,
    ) -> bool {
        let Some(value) = path.get(ifs) else {
            return false;
        };
        self.add_or_update_channel(name, path, value, time);
        true
    }

    /// Evaluates every channel at `t` and writes the results into `ifs`.
    /// Returns true when any value changed, so callers know to invalidate.
    pub fn apply(&self, t: f32, ifs: &mut Ifs) -> bool {
        let clip = self.audio_clip();
        let mut changed = false;
        for channel in &self.channels {
            if let Some(v) = channel.evaluate_at(t, clip) {
                changed |= channel.path.set(ifs, v);
            }
        }
        changed
    }
}
