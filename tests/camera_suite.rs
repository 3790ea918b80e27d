use flame_renderer::camera::YawPitchCamera;
use glam::Vec3;

fn approx(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < 1e-5
}

#[test]
fn default_camera_looks_down_negative_z() {
    let cam = YawPitchCamera::new();
    assert_eq!(cam.position, Vec3::new(0.0, 0.0, 2.0));
    assert!(approx(cam.forward(), Vec3::NEG_Z));
    assert!(approx(cam.right(), Vec3::X));
    assert!(approx(cam.up(), Vec3::Y));
}

#[test]
fn pitch_stays_clamped_under_any_rotation_sequence() {
    let mut rng = fastrand::Rng::with_seed(3);
    let mut cam = YawPitchCamera::new();
    for _ in 0..5_000 {
        let delta = Vec3::new(
            (rng.f32() - 0.5) * 400.0,
            (rng.f32() - 0.5) * 4_000.0,
            rng.f32(),
        );
        cam.rotate_with_sensitivity(delta);
        assert!((-89.0..=89.0).contains(&cam.pitch()), "pitch {}", cam.pitch());
        assert!(cam.forward().is_finite());
    }
}

#[test]
fn rotate_ignores_roll_and_non_finite_input() {
    let mut cam = YawPitchCamera::new();
    let before = (cam.yaw(), cam.pitch());
    cam.rotate_with_sensitivity(Vec3::new(0.0, 0.0, 30.0));
    assert_eq!((cam.yaw(), cam.pitch()), before);

    cam.rotate_with_sensitivity(Vec3::new(f32::NAN, f32::INFINITY, 0.0));
    assert_eq!((cam.yaw(), cam.pitch()), before);
}

#[test]
fn rotate_scales_by_sensitivity() {
    let mut cam = YawPitchCamera::new();
    cam.rotate_with_sensitivity(Vec3::new(100.0, 50.0, 0.0));
    assert!((cam.yaw() - -80.0).abs() < 1e-4);
    assert!((cam.pitch() - 5.0).abs() < 1e-4);
}

#[test]
fn translate_moves_along_camera_basis() {
    let mut cam = YawPitchCamera::new();
    cam.translate_sensitivity = 1.0;
    cam.translate_with_sensitivity(Vec3::new(0.0, 0.0, 1.0));
    assert!(approx(cam.position, Vec3::new(0.0, 0.0, 1.0)));
    cam.translate_with_sensitivity(Vec3::new(2.0, 3.0, 0.0));
    assert!(approx(cam.position, Vec3::new(2.0, 3.0, 1.0)));
}

#[test]
fn projector_maps_target_to_frame_center() {
    let mut cam = YawPitchCamera::new();
    cam.width = 100;
    cam.height = 80;
    let proj = cam.projector();

    let (x, y) = proj.to_pixel(Vec3::ZERO).expect("origin is visible");
    assert!((x - 50.0).abs() < 1e-3 && (y - 40.0).abs() < 1e-3);
    assert!((proj.depth(Vec3::ZERO) - 2.0).abs() < 1e-6);

    // Up in world space is toward row 0.
    let (_, y_up) = proj.to_pixel(Vec3::new(0.0, 0.3, 0.0)).expect("visible");
    assert!(y_up < y);
}

#[test]
fn projector_rejects_points_behind_or_outside() {
    let cam = YawPitchCamera::new();
    let proj = cam.projector();
    assert_eq!(proj.to_pixel(Vec3::new(0.0, 0.0, 3.0)), None);
    assert_eq!(proj.to_pixel(Vec3::new(100.0, 0.0, 0.0)), None);
    assert_eq!(proj.to_pixel(Vec3::new(f32::NAN, 0.0, 0.0)), None);
}

#[test]
fn view_projection_composes_projection_after_view() {
    let cam = YawPitchCamera::new();
    let expected = cam.projection_matrix() * cam.view_matrix();
    assert!(cam.view_projection().abs_diff_eq(expected, 1e-6));
}
