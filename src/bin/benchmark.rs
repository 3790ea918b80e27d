use std::time::Instant;

use anyhow::{bail, Result};
use flame_renderer::engine::{Engine, EngineSettings, Histogram, SceneSnapshot};
use flame_renderer::ifs::Ifs;

struct Args {
    scenes: usize,
    dispatches: usize,
    walkers: usize,
    steps: u32,
    w: u32,
    h: u32,
    seed: u64,
    min_msteps: f64,
}

fn parse_args() -> Args {
    let mut args = Args {
        scenes: 4,
        dispatches: 20,
        walkers: 4096,
        steps: 256,
        w: 320,
        h: 180,
        seed: 7,
        min_msteps: 0.0,
    };

    let argv = std::env::args().skip(1).collect::<Vec<_>>();
    let mut i = 0usize;
    while i < argv.len() {
        let k = argv[i].as_str();
        let v = argv.get(i + 1).map(|s| s.as_str());
        match (k, v) {
            ("--scenes", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.scenes = n.max(1);
                }
                i += 2;
            }
            ("--dispatches", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.dispatches = n.max(1);
                }
                i += 2;
            }
            ("--walkers", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.walkers = n.max(1);
                }
                i += 2;
            }
            ("--steps", Some(x)) => {
                if let Ok(n) = x.parse::<u32>() {
                    args.steps = n.max(1);
                }
                i += 2;
            }
            ("--w", Some(x)) => {
                if let Ok(n) = x.parse::<u32>() {
                    args.w = n.max(1);
                }
                i += 2;
            }
            ("--h", Some(x)) => {
                if let Ok(n) = x.parse::<u32>() {
                    args.h = n.max(1);
                }
                i += 2;
            }
            ("--seed", Some(x)) => {
                if let Ok(n) = x.parse::<u64>() {
                    args.seed = n;
                }
                i += 2;
            }
            ("--min-msteps", Some(x)) => {
                if let Ok(n) = x.parse::<f64>() {
                    args.min_msteps = n.max(0.0);
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    args
}

fn main() -> Result<()> {
    let args = parse_args();
    let mut rng = fastrand::Rng::with_seed(args.seed);
    let settings = EngineSettings {
        walkers: args.walkers,
        steps_per_dispatch: args.steps,
        fuse: 20,
        seed: Some(args.seed),
    };

    println!(
        "benchmark: scenes={} dispatches={} walkers={} steps={} res={}x{} threads={}",
        args.scenes,
        args.dispatches,
        args.walkers,
        args.steps,
        args.w,
        args.h,
        rayon::current_num_threads()
    );

    let mut rates = Vec::with_capacity(args.scenes);
    for scene_idx in 0..args.scenes {
        let mut ifs = Ifs::empty();
        ifs.randomize_params_with(&mut rng);
        ifs.camera.width = args.w;
        ifs.camera.height = args.h;

        let snapshot = SceneSnapshot::new(&ifs, scene_idx as u64);
        let hist = Histogram::new(args.w as usize, args.h as usize);
        let mut engine = Engine::new(settings);

        let start = Instant::now();
        let mut splats = 0u64;
        let mut reseeds = 0u64;
        let mut steps = 0u64;
        for _ in 0..args.dispatches {
            let s = engine.dispatch(&snapshot, &hist);
            steps += s.steps;
            splats += s.splats;
            reseeds += s.reseeds;
        }
        let secs = start.elapsed().as_secs_f64().max(1e-9);
        let msteps = steps as f64 / secs / 1.0e6;
        rates.push(msteps);

        println!(
            "scene {scene_idx}: iters={} {:.2} Msteps/s splat={:.1}% reseed={:.2}% max_hits={}",
            ifs.iterators.len(),
            msteps,
            100.0 * splats as f64 / steps.max(1) as f64,
            100.0 * reseeds as f64 / steps.max(1) as f64,
            hist.max_hits()
        );
    }

    let mean = rates.iter().sum::<f64>() / rates.len().max(1) as f64;
    println!("mean: {mean:.2} Msteps/s");
    if mean < args.min_msteps {
        bail!("throughput {mean:.2} Msteps/s below --min-msteps {:.2}", args.min_msteps);
    }
    Ok(())
}
