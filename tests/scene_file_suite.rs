use flame_renderer::animation::{
    Animations, AudioChannelDriver, Channel, Interpolation, Keyframe, PropertyPath, ViewField,
};
use flame_renderer::ifs::{Ifs, Variation};
use flame_renderer::scene_file::{self, LoadOptions, SceneFormatError, SCENE_VERSION};
use serde_json::{json, Value};
use std::error::Error;

const STRICT: LoadOptions = LoadOptions {
    ignore_transform_versions: false,
};
const TOLERANT: LoadOptions = LoadOptions {
    ignore_transform_versions: true,
};

fn seeded_scene(seed: u64) -> Ifs {
    let mut ifs = Ifs::empty();
    ifs.randomize_params_with(&mut fastrand::Rng::with_seed(seed));
    ifs.camera.width = 320;
    ifs.camera.height = 240;
    ifs.camera.position.x = 0.75;
    ifs.camera.set_orientation(-80.0, 12.5);
    ifs.view.brightness = 2.5;
    ifs.view.focus_distance = 3.25;
    ifs
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(1.0)
}

fn as_json(ifs: &Ifs) -> Value {
    let bytes = scene_file::save_bytes(ifs, &Animations::new()).expect("save");
    serde_json::from_slice(&bytes).expect("json")
}

fn format_error(err: &scene_file::SerializationError) -> &SceneFormatError {
    err.cause()
        .downcast_ref::<SceneFormatError>()
        .expect("format error")
}

#[test]
fn scene_round_trips_through_json() {
    let ifs = seeded_scene(21);
    let bytes = scene_file::save_bytes(&ifs, &Animations::new()).expect("save");
    let doc = scene_file::load_bytes(&bytes, STRICT).expect("load");
    let back = doc.ifs;

    assert_eq!(back.iterators.len(), ifs.iterators.len());
    for (a, b) in ifs.iterators.iter().zip(&back.iterators) {
        assert_eq!(a.variation, b.variation);
        for (x, y) in a.affine.to_array().iter().zip(b.affine.to_array()) {
            assert!(close(*x, y), "{x} vs {y}");
        }
        assert!(close(a.w, b.w) && close(a.ci, b.ci) && close(a.cs, b.cs) && close(a.op, b.op));
    }
    assert_eq!(back.final_iterator.variation, ifs.final_iterator.variation);
    assert_eq!((back.camera.width, back.camera.height), (320, 240));
    assert!(close(back.camera.position.x, 0.75));
    assert!(close(back.camera.yaw(), -80.0));
    assert!(close(back.camera.pitch(), 12.5));
    assert!(close(back.view.brightness, 2.5));
    assert!(close(back.view.focus_distance, 3.25));
    assert_eq!(back.palette, ifs.palette);
    assert!(doc.animations.is_empty());
}

#[test]
fn saved_document_carries_version_and_transform_identity() {
    let mut ifs = seeded_scene(3);
    ifs.iterators[0].variation = Variation::Swirl;
    let v = as_json(&ifs);

    assert_eq!(v["version"], json!(SCENE_VERSION));
    assert_eq!(v["iterators"][0]["transform"]["id"], json!(3));
    assert_eq!(v["iterators"][0]["transform"]["name"], json!("swirl"));
    assert_eq!(v["iterators"][0]["transform"]["version"], json!("1.0"));
    assert!(v.get("animations").is_none());
}

#[test]
fn strict_load_rejects_unknown_transform() {
    let mut v = as_json(&seeded_scene(4));
    v["iterators"][0]["transform"] = json!({ "id": 99, "name": "swirl", "version": "1.0" });
    let bytes = serde_json::to_vec(&v).expect("encode");

    let err = scene_file::load_bytes(&bytes, STRICT).expect_err("strict");
    assert!(matches!(
        format_error(&err),
        SceneFormatError::UnknownTransform { id: 99, .. }
    ));

    let doc = scene_file::load_bytes(&bytes, TOLERANT).expect("tolerant");
    assert_eq!(doc.ifs.iterators[0].variation, Variation::Swirl);
}

#[test]
fn tolerant_load_falls_back_to_linear() {
    let mut v = as_json(&seeded_scene(5));
    v["iterators"][1]["transform"] = json!({ "id": 42, "name": "julia", "version": "1.0" });
    let bytes = serde_json::to_vec(&v).expect("encode");

    assert!(scene_file::load_bytes(&bytes, STRICT).is_err());
    let doc = scene_file::load_bytes(&bytes, TOLERANT).expect("tolerant");
    assert_eq!(doc.ifs.iterators[1].variation, Variation::Linear);
}

#[test]
fn transform_version_mismatch_is_strict_only() {
    let mut v = as_json(&seeded_scene(6));
    v["iterators"][0]["transform"] = json!({ "id": 2, "name": "spherical", "version": "2.0" });
    let bytes = serde_json::to_vec(&v).expect("encode");

    let err = scene_file::load_bytes(&bytes, STRICT).expect_err("strict");
    assert_eq!(
        format_error(&err),
        &SceneFormatError::TransformVersion {
            name: "spherical".to_string(),
            found: "2.0".to_string(),
        }
    );
    let doc = scene_file::load_bytes(&bytes, TOLERANT).expect("tolerant");
    assert_eq!(doc.ifs.iterators[0].variation, Variation::Spherical);
}

#[test]
fn non_finite_values_save_as_defaults_and_reload() {
    let mut ifs = seeded_scene(5);
    ifs.view.brightness = f32::NAN;
    ifs.view.dof = f32::INFINITY;
    ifs.camera.position.x = f32::NEG_INFINITY;
    ifs.camera.fov_y_deg = f32::NAN;
    ifs.iterators[0].op = f32::NAN;
    ifs.iterators[0].affine.xx = f32::INFINITY;

    let json = as_json(&ifs);
    assert_eq!(json["view"]["brightness"], json!(1.0));
    assert!(!json.to_string().contains("null"));

    let bytes = scene_file::save_bytes(&ifs, &Animations::new()).expect("save");
    let doc = scene_file::load_bytes(&bytes, STRICT).expect("load");
    assert_eq!(doc.ifs.view.brightness, 1.0);
    assert_eq!(doc.ifs.view.dof, 0.05);
    assert!(close(doc.ifs.view.gamma, ifs.view.gamma));
    assert_eq!(doc.ifs.camera.position.to_array(), [0.0, 0.0, 2.0]);
    assert_eq!(doc.ifs.camera.fov_y_deg, 60.0);
    assert_eq!(doc.ifs.iterators[0].op, 1.0);
    assert_eq!(doc.ifs.iterators[0].affine.xx, 1.0);
    assert!(close(doc.ifs.iterators[0].affine.yy, ifs.iterators[0].affine.yy));
}

#[test]
fn malformed_json_reports_parser_cause() {
    let err = scene_file::load_bytes(b"{ \"version\": 1, ", STRICT).expect_err("malformed");
    assert!(err.source().is_some());
    assert!(err.cause().downcast_ref::<serde_json::Error>().is_some());
    assert!(err.to_string().contains("scene serialization failed"));
}

#[test]
fn missing_fields_fail_to_load() {
    let mut v = as_json(&seeded_scene(7));
    v.as_object_mut().expect("object").remove("view");
    let bytes = serde_json::to_vec(&v).expect("encode");
    let err = scene_file::load_bytes(&bytes, TOLERANT).expect_err("missing view");
    assert!(err.cause().downcast_ref::<serde_json::Error>().is_some());
}

#[test]
fn unsupported_document_version_is_rejected() {
    let mut v = as_json(&seeded_scene(8));
    v["version"] = json!(SCENE_VERSION + 1);
    let bytes = serde_json::to_vec(&v).expect("encode");
    let err = scene_file::load_bytes(&bytes, TOLERANT).expect_err("version");
    assert_eq!(
        format_error(&err),
        &SceneFormatError::UnsupportedVersion(SCENE_VERSION + 1)
    );
}

#[test]
fn animations_are_saved_with_the_scene() {
    let ifs = seeded_scene(9);
    let mut anims = Animations::new();
    let mut bright = Channel::new("bright", PropertyPath::View(ViewField::Brightness));
    bright.curve.insert(Keyframe::new(0.0, 1.0));
    bright
        .curve
        .insert(Keyframe::new(2.0, 3.0).with_interpolation(Interpolation::EaseOut));
    anims.add_channel(bright);
    anims.add_channel(
        Channel::new("opacity", PropertyPath::parse("iterators[0].op").expect("path")).with_audio(
            AudioChannelDriver {
                audio_channel_id: 2,
                min_frequency: 100.0,
                max_frequency: 250.0,
                effect_multiplier: 4.0,
            },
        ),
    );

    let bytes = scene_file::save_bytes(&ifs, &anims).expect("save");
    let doc = scene_file::load_bytes(&bytes, STRICT).expect("load");
    assert_eq!(doc.animations.channels().len(), 2);

    let b = doc.animations.channel("bright").expect("bright");
    assert_eq!(b.path, PropertyPath::View(ViewField::Brightness));
    assert_eq!(b.curve.keyframes()[1].interpolation, Interpolation::EaseOut);
    assert_eq!(b.curve.evaluate(2.0), Some(3.0));

    let d = doc.animations.channel("opacity").expect("opacity");
    let driver = d.audio.expect("driver");
    assert_eq!(driver.audio_channel_id, 2);
    assert_eq!(driver.effect_multiplier, 4.0);
    assert!(d.curve.is_empty());
}

#[test]
fn bad_channel_path_is_a_format_error() {
    let mut v = as_json(&seeded_scene(10));
    v["animations"] = json!({ "channels": [{ "name": "x", "path": "scene.w", "keyframes": [] }] });
    let bytes = serde_json::to_vec(&v).expect("encode");
    let err = scene_file::load_bytes(&bytes, TOLERANT).expect_err("path");
    assert!(matches!(format_error(&err), SceneFormatError::Path(_)));
}

#[test]
fn scene_files_round_trip_on_disk() {
    let dir = std::env::temp_dir().join(format!("flame_scene_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("dir");
    let path = dir.join("scene.json");

    let ifs = seeded_scene(12);
    scene_file::save_file(&path, &ifs, &Animations::new()).expect("save");
    let doc = scene_file::load_file(&path, STRICT).expect("load");
    assert_eq!(doc.ifs.iterators.len(), ifs.iterators.len());

    let missing = scene_file::load_file(&dir.join("absent.json"), STRICT).expect_err("missing");
    assert!(missing.cause().downcast_ref::<std::io::Error>().is_some());

    let _ = std::fs::remove_dir_all(&dir);
}
