use crate::engine::EngineSettings;
use crate::renderer::RendererOptions;
use crate::scene_file::LoadOptions;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "flame_renderer",
    version,
    about = "Progressive 3D fractal-flame renderer for the terminal"
)]
pub struct Config {
    /// Scene document to load; a random scene is generated otherwise.
    #[arg(long)]
    pub scene: Option<PathBuf>,

    /// Image width for headless renders.
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Image height for headless renders.
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    #[arg(long, default_value_t = 4096)]
    pub walkers: usize,

    #[arg(long, default_value_t = 256)]
    pub steps_per_dispatch: u32,

    /// Steps discarded after each (re)seed before a walker splats.
    #[arg(long, default_value_t = 20)]
    pub fuse: u32,

    /// Display refresh cap while rendering.
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Worker threads; 0 uses one per core.
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    #[arg(long)]
    pub seed: Option<u64>,

    /// WAV file driving audio channels.
    #[arg(long)]
    pub audio: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub headless: bool,

    /// Accumulation time for headless renders.
    #[arg(long, default_value_t = 5.0)]
    pub seconds: f32,

    #[arg(long, default_value = "flame.png")]
    pub output: PathBuf,

    #[arg(long, default_value_t = false)]
    pub ignore_transform_versions: bool,

    /// Start with display updates suspended.
    #[arg(long, default_value_t = false)]
    pub no_display_updates: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,
}

impl Config {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            walkers: self.walkers.max(1),
            steps_per_dispatch: self.steps_per_dispatch.max(1),
            fuse: self.fuse,
            seed: self.seed,
        }
    }

    pub fn renderer_options(&self) -> RendererOptions {
        RendererOptions {
            engine: self.engine_settings(),
            present_fps: self.fps.max(1),
            display_updates: !self.no_display_updates,
            threads: self.threads,
            ..RendererOptions::default()
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            ignore_transform_versions: self.ignore_transform_versions,
        }
    }
}
