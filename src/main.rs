use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();
    let cfg = flame_renderer::config::Config::parse();
    flame_renderer::app::run(cfg)
}
