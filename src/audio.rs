//! Decoded audio clips and the band-energy sampler used by audio-driven
//! animation channels.

use anyhow::{bail, Context, Result};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Samples per analysis window. The window ends at the requested time.
pub const ANALYSIS_WINDOW: usize = 2048;

/// PCM samples per channel in [-1, 1], kept deinterleaved.
#[derive(Clone)]
pub struct AudioClip {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
    fft: Arc<dyn Fft<f32>>,
    hann: Arc<[f32]>,
    hann_power: f32,
    warned_channel: Arc<AtomicBool>,
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels.len())
            .field("frames", &self.frames())
            .finish()
    }
}

impl AudioClip {
    /// Builds a clip from per-channel samples. Shorter channels are padded
    /// with silence to the longest one.
    pub fn from_channels(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            bail!("sample rate must be positive");
        }
        if channels.is_empty() {
            bail!("audio clip needs at least one channel");
        }
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for ch in &mut channels {
            ch.resize(frames, 0.0);
            for s in ch.iter_mut() {
                *s = if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 };
            }
        }

        let n = ANALYSIS_WINDOW;
        let hann: Arc<[f32]> = (0..n)
            .map(|i| 0.5 - 0.5 * ((2.0 * PI * i as f32) / (n as f32)).cos())
            .collect();
        let hann_power = hann.iter().map(|w| w * w).sum();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);

        Ok(Self {
            sample_rate,
            channels,
            fft,
            hann,
            hann_power,
            warned_channel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn load_wav(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read audio file {}", path.display()))?;
        Self::decode_wav(&bytes).with_context(|| format!("decode {}", path.display()))
    }

    /// Decodes a RIFF/WAVE file holding PCM16 or Float32 samples.
    pub fn decode_wav(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 44 {
            bail!("wav too small");
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            bail!("not a RIFF/WAVE file");
        }

        let mut fmt_audio_format = 0u16;
        let mut fmt_channels = 0u16;
        let mut fmt_sample_rate = 0u32;
        let mut fmt_bits = 0u16;
        let mut data: Option<&[u8]> = None;

        let mut pos = 12usize;
        while pos + 8 <= bytes.len() {
            let id = &bytes[pos..pos + 4];
            let size = read_u32(bytes, pos + 4) as usize;
            let start = pos + 8;
            let end = start.saturating_add(size);
            if end > bytes.len() {
                break;
            }

            if id == b"fmt " {
                if size < 16 {
                    bail!("invalid fmt chunk");
                }
                fmt_audio_format = read_u16(bytes, start);
                fmt_channels = read_u16(bytes, start + 2);
                fmt_sample_rate = read_u32(bytes, start + 4);
                fmt_bits = read_u16(bytes, start + 14);
            } else if id == b"data" {
                data = Some(&bytes[start..end]);
            }

            pos = end + (size % 2);
        }

        let data = data.context("missing data chunk")?;
        if fmt_channels == 0 {
            bail!("invalid channel count");
        }
        let ch = fmt_channels as usize;

        let channels = match (fmt_audio_format, fmt_bits) {
            (1, 16) => deinterleave(data, ch, 2, |b| {
                i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0
            }),
            (3, 32) => deinterleave(data, ch, 4, |b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            (format, bits) => bail!("unsupported wav format={format} bits={bits}"),
        };
        Self::from_channels(fmt_sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 * 0.5
    }

    pub fn channel(&self, id: usize) -> Option<&[f32]> {
        self.channels.get(id).map(Vec::as_slice)
    }

    /// RMS amplitude carried by `[min_hz, max_hz]` in the window ending at
    /// `t` seconds. Out-of-range inputs are clamped; an empty band yields 0.
    /// A channel past the last one is logged once per clip.
    pub fn band_energy(&self, channel: usize, t: f32, min_hz: f32, max_hz: f32) -> f32 {
        let last = self.channel_count() - 1;
        if channel > last && !self.warned_channel.swap(true, Ordering::Relaxed) {
            log::warn!("audio channel {channel} out of range, using {last}");
        }
        let samples = &self.channels[channel.min(last)];

        let nyquist = self.nyquist();
        let clamp_hz = |hz: f32| if hz.is_finite() { hz.clamp(0.0, nyquist) } else { 0.0 };
        let (lo, hi) = (clamp_hz(min_hz), clamp_hz(max_hz));
        if hi <= lo {
            return 0.0;
        }

        let n = ANALYSIS_WINDOW;
        let bin_hz = self.sample_rate as f32 / n as f32;
        let first_bin = ((lo / bin_hz).ceil() as usize).max(1);
        let last_bin = ((hi / bin_hz).floor() as usize).min(n / 2);
        if last_bin < first_bin {
            return 0.0;
        }

        let t = if t.is_finite() { t.clamp(0.0, self.duration()) } else { 0.0 };
        let end = ((t * self.sample_rate as f32).round() as usize).min(samples.len());

        let mut buf = vec![Complex { re: 0.0f32, im: 0.0 }; n];
        // Window ends at `end`; samples before the clip start are silence.
        let offset = n.saturating_sub(end);
        let start = end.saturating_sub(n);
        for (i, s) in samples[start..end].iter().enumerate() {
            buf[offset + i].re = s * self.hann[offset + i];
        }
        self.fft.process(&mut buf);

        let power: f32 = buf[first_bin..=last_bin]
            .iter()
            .map(|c| c.re * c.re + c.im * c.im)
            .sum();
        (2.0 * power / (n as f32 * self.hann_power)).sqrt()
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn deinterleave(
    data: &[u8],
    channels: usize,
    sample_bytes: usize,
    decode: impl Fn(&[u8]) -> f32,
) -> Vec<Vec<f32>> {
    let frames = data.len() / (sample_bytes * channels);
    let mut out = vec![Vec::with_capacity(frames); channels];
    for frame in data.chunks_exact(sample_bytes * channels) {
        for (c, sample) in frame.chunks_exact(sample_bytes).enumerate() {
            out[c].push(decode(sample));
        }
    }
    out
}
