use flame_renderer::engine::{
    fog_factor, CellValue, Engine, EngineSettings, Histogram, SceneSnapshot, StepOutcome, ToneMapper, Walker,
};
use flame_renderer::ifs::{Affine, Ifs, IfsIterator, Variation, ViewParams};
use glam::Vec3;

fn single_iterator_scene(it: IfsIterator, width: u32, height: u32) -> Ifs {
    let mut ifs = Ifs::empty();
    ifs.iterators = vec![it];
    ifs.camera.width = width;
    ifs.camera.height = height;
    ifs
}

/// Collapses every point onto the origin, which sits in the middle of the
/// default camera's view at the focus distance.
fn collapse_to_origin() -> IfsIterator {
    IfsIterator {
        w: 1.0,
        affine: Affine::from_array([0.0; 12]),
        ..IfsIterator::identity()
    }
}

fn sierpinski() -> Ifs {
    let mut ifs = Ifs::empty();
    for v in [
        Vec3::new(-0.5, -0.4, 0.0),
        Vec3::new(0.5, -0.4, 0.0),
        Vec3::new(0.0, 0.5, 0.0),
    ] {
        let mut c = [0.0f32; 12];
        c[0] = 0.5;
        c[4] = 0.5;
        c[8] = 0.5;
        c[9] = v.x * 0.5;
        c[10] = v.y * 0.5;
        c[11] = v.z * 0.5;
        ifs.iterators.push(IfsIterator {
            w: 1.0,
            affine: Affine::from_array(c),
            op: 1.0,
            ..IfsIterator::identity()
        });
    }
    ifs.normalize_weights();
    ifs.camera.width = 64;
    ifs.camera.height = 48;
    ifs
}

#[test]
fn walker_with_non_finite_step_is_reseeded_without_writing() {
    // Zero affine followed by spherical divides by zero.
    let nan_maker = IfsIterator {
        variation: Variation::Spherical,
        ..collapse_to_origin()
    };
    let scene = SceneSnapshot::new(&single_iterator_scene(nan_maker, 32, 32), 1);
    let hist = Histogram::new(32, 32);
    let mut walker = Walker::new(99, 0);

    for _ in 0..100 {
        assert_eq!(walker.step(&scene, &hist), StepOutcome::Reseeded);
        assert!(walker.position.is_finite());
    }
    assert_eq!(hist.total_hits(), 0);
}

#[test]
fn walker_splats_once_past_the_fuse() {
    let scene = SceneSnapshot::new(&single_iterator_scene(collapse_to_origin(), 32, 32), 1);
    let hist = Histogram::new(32, 32);
    let mut walker = Walker::new(4, 3);

    for _ in 0..3 {
        assert_eq!(walker.step(&scene, &hist), StepOutcome::Fused);
    }
    assert_eq!(hist.total_hits(), 0);
    assert_eq!(walker.step(&scene, &hist), StepOutcome::Splatted);
    assert_eq!(hist.total_hits(), 1);

    let hit = (0..32)
        .flat_map(|y| (0..32).map(move |x| (x, y)))
        .find(|&(x, y)| hist.hits(x, y) == 1)
        .expect("one cell hit");
    assert!(hit.0.abs_diff(16) <= 1 && hit.1.abs_diff(16) <= 1, "{hit:?}");
}

#[test]
fn points_behind_the_camera_reseed() {
    let mut it = collapse_to_origin();
    it.affine.oz = 10.0;
    let scene = SceneSnapshot::new(&single_iterator_scene(it, 16, 16), 1);
    let hist = Histogram::new(16, 16);
    let mut walker = Walker::new(1, 0);
    assert_eq!(walker.step(&scene, &hist), StepOutcome::Reseeded);
    assert_eq!(hist.total_hits(), 0);
}

fn splat_many(scene: &SceneSnapshot, hist: &Histogram, steps: usize) -> (usize, usize) {
    let mut walker = Walker::new(11, 0);
    let mut splats = 0;
    let mut reseeds = 0;
    for _ in 0..steps {
        match walker.step(scene, hist) {
            StepOutcome::Splatted => splats += 1,
            StepOutcome::Reseeded => reseeds += 1,
            StepOutcome::Fused => {}
        }
    }
    (splats, reseeds)
}

fn lit_cells(hist: &Histogram) -> Vec<CellValue> {
    (0..hist.height())
        .flat_map(|y| (0..hist.width()).map(move |x| (x, y)))
        .filter_map(|(x, y)| hist.cell(x, y))
        .filter(|c| c.hits > 0)
        .collect()
}

#[test]
fn points_inside_the_focus_band_stay_sharp() {
    let mut ifs = single_iterator_scene(collapse_to_origin(), 64, 64);
    ifs.view.dof = 0.5;
    let scene = SceneSnapshot::new(&ifs, 1);
    let hist = Histogram::new(64, 64);

    let (splats, reseeds) = splat_many(&scene, &hist, 500);
    assert_eq!((splats, reseeds), (500, 0));
    let lit = lit_cells(&hist);
    assert_eq!(lit.len(), 1);
    assert_eq!(lit[0].hits, 500);
}

#[test]
fn points_outside_the_focus_band_blur_into_the_buffer() {
    // Depth 5 against focus distance 2: blur radius 0.5 * (3 - 0.125).
    let mut it = collapse_to_origin();
    it.affine.oz = -3.0;
    let mut ifs = single_iterator_scene(it, 64, 64);
    ifs.view.dof = 0.5;
    let scene = SceneSnapshot::new(&ifs, 1);
    let hist = Histogram::new(64, 64);

    let (splats, _) = splat_many(&scene, &hist, 2000);
    assert!(splats > 1000, "splats={splats}");
    assert_eq!(hist.total_hits(), splats as u64);
    let lit = lit_cells(&hist);
    assert!(lit.len() > 50, "lit={}", lit.len());
    let densest = lit.iter().map(|c| c.hits).max().unwrap_or(0);
    assert!(densest < splats as u64 / 10, "densest={densest}");

    // Zero depth of field leaves the same point sharp.
    ifs.view.dof = 0.0;
    let sharp = SceneSnapshot::new(&ifs, 2);
    hist.clear();
    splat_many(&sharp, &hist, 200);
    assert_eq!(lit_cells(&hist).len(), 1);
}

#[test]
fn points_outside_the_frame_reseed() {
    let mut it = collapse_to_origin();
    it.affine.ox = 100.0;
    let scene = SceneSnapshot::new(&single_iterator_scene(it, 16, 16), 1);
    let hist = Histogram::new(16, 16);
    let mut walker = Walker::new(3, 0);
    for _ in 0..20 {
        assert_eq!(walker.step(&scene, &hist), StepOutcome::Reseeded);
    }
    assert_eq!(hist.total_hits(), 0);
}

#[test]
fn pixels_beyond_a_smaller_buffer_reseed_instead_of_clamping() {
    // Snapshot already at the new size, buffer still at the old one.
    let scene = SceneSnapshot::new(&single_iterator_scene(collapse_to_origin(), 64, 64), 1);
    let hist = Histogram::new(8, 8);
    let mut walker = Walker::new(5, 0);
    for _ in 0..20 {
        assert_eq!(walker.step(&scene, &hist), StepOutcome::Reseeded);
    }
    assert_eq!(hist.total_hits(), 0);
    assert_eq!(hist.cell(7, 7).map(|c| c.hits), Some(0));
}

#[test]
fn splat_depth_is_capped_at_the_far_plane() {
    let mut it = collapse_to_origin();
    it.affine.oz = -3.0;
    let mut ifs = single_iterator_scene(it, 32, 32);
    ifs.view.dof = 0.0;
    ifs.camera.far = 3.0;
    let scene = SceneSnapshot::new(&ifs, 1);
    let hist = Histogram::new(32, 32);

    let (splats, _) = splat_many(&scene, &hist, 50);
    assert_eq!(splats, 50);
    let lit = lit_cells(&hist);
    assert_eq!(lit.len(), 1);
    assert_eq!(lit[0].hits, 50);
    assert!((lit[0].average_depth() - 3.0).abs() < 1e-3);
}

#[test]
fn cumulative_pick_follows_weights() {
    let mut ifs = Ifs::empty();
    ifs.iterators = vec![
        IfsIterator {
            w: 0.3,
            ..IfsIterator::identity()
        },
        IfsIterator {
            w: 0.9,
            ..IfsIterator::identity()
        },
    ];
    let scene = SceneSnapshot::new(&ifs, 0);
    assert_eq!(scene.pick(0.0), 0);
    assert_eq!(scene.pick(0.2), 0);
    assert_eq!(scene.pick(0.3), 1);
    assert_eq!(scene.pick(0.999_999), 1);
}

#[test]
fn dispatch_accumulates_and_reports_stats() {
    let scene = SceneSnapshot::new(&sierpinski(), 1);
    let hist = Histogram::new(64, 48);
    let mut engine = Engine::new(EngineSettings {
        walkers: 64,
        steps_per_dispatch: 50,
        fuse: 10,
        seed: Some(1),
    });

    let stats = engine.dispatch(&scene, &hist);
    assert_eq!(stats.steps, 64 * 50);
    assert_eq!(stats.splats, hist.total_hits());
    assert!(stats.splats > 0);
    assert_eq!(stats.steps, stats.splats + stats.reseeds + 64 * 10);
}

#[test]
fn seeded_engines_are_reproducible_per_walker() {
    let a = Engine::new(EngineSettings {
        walkers: 8,
        seed: Some(42),
        ..EngineSettings::default()
    });
    let b = Engine::new(EngineSettings {
        walkers: 8,
        seed: Some(42),
        ..EngineSettings::default()
    });
    for (wa, wb) in a.walkers().iter().zip(b.walkers()) {
        assert_eq!(wa.position, wb.position);
        assert_eq!(wa.color, wb.color);
    }
}

#[test]
fn clear_zeroes_cells_without_resizing() {
    let hist = Histogram::new(8, 4);
    assert!(hist.splat(1, 2, [1.0, 0.5, 0.25], 3.0));
    assert!(!hist.splat(8, 0, [1.0; 3], 1.0));
    assert_eq!(hist.total_hits(), 1);

    hist.clear();
    assert_eq!((hist.width(), hist.height()), (8, 4));
    assert_eq!(hist.total_hits(), 0);
    assert_eq!(hist.cell(1, 2).expect("cell").rgb, [0.0; 3]);
}

#[test]
fn cells_sum_color_and_depth() {
    let hist = Histogram::new(2, 2);
    hist.splat(0, 0, [0.5, 0.25, 0.0], 2.0);
    hist.splat(0, 0, [0.5, 0.25, 1.0], 4.0);
    let cell = hist.cell(0, 0).expect("cell");
    assert_eq!(cell.hits, 2);
    assert_eq!(cell.rgb, [1.0, 0.5, 1.0]);
    assert_eq!(cell.average_depth(), 3.0);
}

#[test]
fn tone_map_uses_log_density_and_background() {
    let hist = Histogram::new(3, 1);
    for _ in 0..4 {
        hist.splat(0, 0, [1.0, 0.0, 0.0], 2.0);
    }
    hist.splat(1, 0, [1.0, 0.0, 0.0], 2.0);

    let tone = ToneMapper {
        background: [0.0, 0.0, 1.0],
        ..ToneMapper::default()
    };
    let frame = tone.map(&hist, &ViewParams::default());
    assert_eq!((frame.width, frame.height), (3, 1));
    // Densest cell at full density.
    assert_eq!(frame.pixel(0, 0), Some([255, 0, 0, 255]));
    // A single hit has zero log density next to the densest cell.
    assert_eq!(frame.pixel(1, 0), Some([0, 0, 0, 255]));
    assert_eq!(frame.pixel(2, 0), Some([0, 0, 255, 255]));
}

#[test]
fn single_hit_buffer_has_full_density() {
    let hist = Histogram::new(1, 1);
    hist.splat(0, 0, [0.0625, 0.0625, 0.0625], 2.0);
    let view = ViewParams {
        gamma: 2.0,
        ..ViewParams::default()
    };
    let frame = ToneMapper::default().map(&hist, &view);
    // sqrt(0.0625) = 0.25
    assert_eq!(frame.pixel(0, 0), Some([64, 64, 64, 255]));
}

#[test]
fn fog_grows_behind_focus_plane_and_can_be_disabled() {
    let view = ViewParams::default();
    assert_eq!(fog_factor(1.0, &view), 0.0);
    assert_eq!(fog_factor(view.focus_distance, &view), 0.0);
    let expected = 1.0 - (-2.0f32).exp();
    assert!((fog_factor(4.0, &view) - expected).abs() < 1e-6);
    assert!(fog_factor(8.0, &view) > fog_factor(4.0, &view));

    let no_fog = ViewParams {
        fog_effect: 0.0,
        ..view
    };
    assert_eq!(fog_factor(100.0, &no_fog), 0.0);
}

#[test]
fn fog_blends_toward_fog_color() {
    let hist = Histogram::new(1, 1);
    hist.splat(0, 0, [1.0, 1.0, 1.0], 1.0e5);
    let tone = ToneMapper {
        fog_color: [0.0, 1.0, 0.0],
        ..ToneMapper::default()
    };
    let frame = tone.map(&hist, &ViewParams::default());
    assert_eq!(frame.pixel(0, 0), Some([0, 255, 0, 255]));
}
