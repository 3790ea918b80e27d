use flame_renderer::ifs::{
    Affine, Ifs, IfsIterator, Palette, Variation, ViewParams, MAX_ITERATORS, MIN_ITERATORS,
};
use glam::Vec3;

fn weighted(w: f32) -> IfsIterator {
    IfsIterator {
        w,
        ..IfsIterator::identity()
    }
}

#[test]
fn randomized_scenes_have_normalized_weights_and_valid_counts() {
    let mut rng = fastrand::Rng::with_seed(11);
    for _ in 0..200 {
        let mut ifs = Ifs::empty();
        ifs.randomize_params_with(&mut rng);

        let n = ifs.iterators.len();
        assert!((MIN_ITERATORS..=MAX_ITERATORS).contains(&n), "count {n}");
        let sum: f32 = ifs.iterators.iter().map(|it| it.w).sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum {sum}");
    }
}

#[test]
fn randomized_iterators_stay_in_documented_ranges() {
    let mut rng = fastrand::Rng::with_seed(5);
    let mut ifs = Ifs::empty();
    for _ in 0..50 {
        ifs.randomize_params_with(&mut rng);
        for it in &ifs.iterators {
            assert!(it.affine.to_array().iter().all(|c| c.abs() <= 1.5));
            assert!((-0.1..=0.1).contains(&it.cs));
            assert!((0.0..=1.0).contains(&it.ci));
            assert!((0.0..=1.0).contains(&it.op));
            assert!(it.variation.id() < 3, "randomizer picked {:?}", it.variation);
        }
    }
}

#[test]
fn normalize_weights_divides_by_the_sum() {
    let mut ifs = Ifs::empty();
    ifs.iterators = vec![weighted(0.3), weighted(0.9)];
    ifs.normalize_weights();
    assert!((ifs.iterators[0].w - 0.25).abs() < 1e-6);
    assert!((ifs.iterators[1].w - 0.75).abs() < 1e-6);
}

#[test]
fn normalize_weights_falls_back_to_uniform_for_zero_sum() {
    let mut ifs = Ifs::empty();
    ifs.iterators = vec![weighted(0.0), weighted(-1.0), weighted(f32::NAN), weighted(0.0)];
    ifs.normalize_weights();
    for it in &ifs.iterators {
        assert!((it.w - 0.25).abs() < 1e-6);
    }
}

#[test]
fn final_iterator_defaults_to_pass_through() {
    let ifs = Ifs::empty();
    let fin = ifs.final_iterator;
    assert_eq!(fin.affine, Affine::IDENTITY);
    assert_eq!(fin.variation, Variation::Linear);
    assert_eq!((fin.w, fin.ci, fin.cs, fin.op), (0.0, 0.0, 0.0, 1.0));

    let p = Vec3::new(0.3, -1.2, 4.0);
    assert_eq!(fin.transform_point(p), p);
    assert_eq!(fin.transform_color(0.42), 0.42);
}

#[test]
fn view_defaults_match_expected_values() {
    let v = ViewParams::default();
    assert_eq!(v.brightness, 1.0);
    assert_eq!(v.gamma, 4.0);
    assert_eq!(v.fog_effect, 2.0);
    assert_eq!(v.dof, 0.05);
    assert_eq!(v.focus_distance, 2.0);
    assert_eq!(v.focus_area, 0.25);
}

#[test]
fn sanitized_view_replaces_invalid_values() {
    let v = ViewParams {
        brightness: -3.0,
        gamma: f32::NAN,
        fog_effect: -1.0,
        dof: f32::INFINITY,
        focus_distance: 0.0,
        focus_area: -0.5,
    }
    .sanitized();
    assert!(v.brightness > 0.0);
    assert_eq!(v.gamma, 4.0);
    assert_eq!(v.fog_effect, 0.0);
    assert_eq!(v.dof, 0.05);
    assert!(v.focus_distance > 0.0);
    assert_eq!(v.focus_area, 0.0);
}

#[test]
fn affine_follows_row_naming() {
    let a = Affine {
        xy: 2.0,
        oz: 1.0,
        ..Affine::from_array([0.0; 12])
    };
    // xy weights input y into output x.
    assert_eq!(a.apply(Vec3::new(0.0, 3.0, 0.0)), Vec3::new(6.0, 0.0, 1.0));
}

#[test]
fn color_update_lerps_toward_ci_and_clamps() {
    let it = IfsIterator {
        ci: 1.0,
        cs: 0.5,
        ..IfsIterator::identity()
    };
    assert!((it.transform_color(0.0) - 0.5).abs() < 1e-6);

    let overshoot = IfsIterator {
        ci: 1.0,
        cs: 3.0,
        ..IfsIterator::identity()
    };
    assert_eq!(overshoot.transform_color(0.5), 1.0);
}

#[test]
fn variation_registry_resolves_ids_and_names() {
    for v in Variation::all() {
        assert_eq!(Variation::from_id(v.id()), Some(v));
        assert_eq!(Variation::from_name(v.name()), Some(v));
    }
    assert_eq!(Variation::from_id(99), None);
    assert_eq!(Variation::from_name("Spherical"), Some(Variation::Spherical));
}

#[test]
fn variations_follow_their_formulas() {
    let q = Vec3::new(1.0, 2.0, 2.0);
    assert_eq!(Variation::Linear.apply(q), q);
    let s = Variation::Spherical.apply(q);
    assert!((s - q / 9.0).length() < 1e-6);
    let b = Variation::Bubble.apply(q);
    assert!((b - q * (4.0 / 13.0)).length() < 1e-6);
    let sin = Variation::Sinusoidal.apply(q);
    assert!((sin.x - 1.0f32.sin()).abs() < 1e-6);
    assert!(Variation::Spherical.apply(Vec3::ZERO).x.is_nan());
}

#[test]
fn reset_camera_keeps_resolution() {
    let mut ifs = Ifs::new();
    ifs.camera.width = 320;
    ifs.camera.height = 200;
    ifs.camera.position = Vec3::new(5.0, 5.0, 5.0);
    ifs.camera.set_orientation(10.0, 20.0);

    ifs.reset_camera();
    assert_eq!((ifs.camera.width, ifs.camera.height), (320, 200));
    assert_eq!(ifs.camera.position, Vec3::new(0.0, 0.0, 2.0));
    assert_eq!(ifs.camera.yaw(), -90.0);
    assert_eq!(ifs.camera.pitch(), 0.0);
}

#[test]
fn palette_sampling_hits_endpoints_and_interpolates() {
    let p = Palette::new(vec![[0.0, 0.0, 0.0], [1.0, 0.5, 2.0]]);
    assert_eq!(p.sample(0.0), [0.0, 0.0, 0.0]);
    // Stops are clamped to [0, 1].
    assert_eq!(p.sample(1.0), [1.0, 0.5, 1.0]);
    assert_eq!(p.sample(0.5), [0.5, 0.25, 0.5]);
    assert_eq!(p.sample(-4.0), p.sample(0.0));
    assert_eq!(p.sample(f32::NAN), p.sample(0.0));

    assert_eq!(Palette::new(Vec::new()), Palette::default());
}
