use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub struct Args {
    pub out: PathBuf,
    pub sample_rate: u32,
    pub seconds: f32,
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    let mut out = PathBuf::from("assets/test/flame_channels.wav");
    let mut sample_rate = 48_000u32;
    let mut seconds = 16.0f32;

    let mut it = args.into_iter();
    while let Some(k) = it.next() {
        let v = it.next();
        match (k.as_str(), v) {
            ("--out", Some(p)) => out = PathBuf::from(p),
            ("--sample-rate", Some(v)) => {
                if let Ok(sr) = v.parse::<u32>() {
                    sample_rate = sr.clamp(8_000, 192_000);
                }
            }
            ("--seconds", Some(v)) => {
                if let Ok(s) = v.parse::<f32>() {
                    seconds = s.clamp(1.0, 600.0);
                }
            }
            _ => {}
        }
    }

    Args {
        out,
        sample_rate,
        seconds,
    }
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1));
    if let Some(parent) = args.out.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }

    let channels = make_channel_fixture(args.sample_rate, args.seconds);
    write_wav_i16(&args.out, args.sample_rate, &channels)
        .with_context(|| format!("write {}", args.out.display()))?;

    println!("generated: {}", args.out.display());
    println!(
        "sample_rate={}Hz channels={} duration={:.2}s",
        args.sample_rate,
        channels.len(),
        args.seconds
    );
    Ok(())
}

/// Three channels for audio-driven animation:
/// 0: 60 Hz kick pulses at 120 BPM, 1: steady 440 Hz pad, 2: 120 Hz to 8 kHz chirp.
pub fn make_channel_fixture(sr: u32, seconds: f32) -> Vec<Vec<f32>> {
    let n = (seconds.max(0.0) * sr as f32).round() as usize;
    let mut kick = Vec::with_capacity(n);
    let mut pad = Vec::with_capacity(n);
    let mut chirp = Vec::with_capacity(n);
    // Exponential sweep rate; phase is the integral of 120·e^(k·t).
    let k = (8_000.0f32 / 120.0).ln() / seconds.max(1e-4);

    for i in 0..n {
        let t = i as f32 / sr as f32;

        let beat_phase = (t / 0.5).fract() * 0.5;
        let env = (1.0 - beat_phase / 0.12).max(0.0).powf(2.4);
        kick.push((2.0 * PI * 60.0 * t).sin() * 0.9 * env);

        pad.push((2.0 * PI * 440.0 * t).sin() * 0.5);

        let phase = 2.0 * PI * 120.0 * ((k * t).exp() - 1.0) / k;
        chirp.push(phase.sin() * 0.7);
    }

    vec![kick, pad, chirp]
}

pub fn to_i16(x: f32) -> i16 {
    let y = x.clamp(-1.0, 1.0);
    (y * i16::MAX as f32) as i16
}

/// PCM16 RIFF/WAVE image of deinterleaved `channels`.
pub fn encode_wav_i16(sr: u32, channels: &[Vec<f32>]) -> Vec<u8> {
    let ch = channels.len().max(1) as u16;
    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    let bits_per_sample: u16 = 16;
    let byte_rate = sr * ch as u32 * bits_per_sample as u32 / 8;
    let block_align = ch * bits_per_sample / 8;
    let data_bytes = (frames * ch as usize * 2) as u32;
    let riff_size = 4 + 8 + 16 + 8 + data_bytes;

    let mut w = Vec::with_capacity(44 + data_bytes as usize);
    w.extend_from_slice(b"RIFF");
    w.extend_from_slice(&riff_size.to_le_bytes());
    w.extend_from_slice(b"WAVE");

    w.extend_from_slice(b"fmt ");
    w.extend_from_slice(&16u32.to_le_bytes());
    w.extend_from_slice(&1u16.to_le_bytes()); // PCM
    w.extend_from_slice(&ch.to_le_bytes());
    w.extend_from_slice(&sr.to_le_bytes());
    w.extend_from_slice(&byte_rate.to_le_bytes());
    w.extend_from_slice(&block_align.to_le_bytes());
    w.extend_from_slice(&bits_per_sample.to_le_bytes());

    w.extend_from_slice(b"data");
    w.extend_from_slice(&data_bytes.to_le_bytes());
    for i in 0..frames {
        for c in channels {
            let s = c.get(i).copied().unwrap_or(0.0);
            w.extend_from_slice(&to_i16(s).to_le_bytes());
        }
    }
    w
}

pub fn write_wav_i16(path: &Path, sr: u32, channels: &[Vec<f32>]) -> Result<()> {
    fs::write(path, encode_wav_i16(sr, channels))?;
    Ok(())
}
