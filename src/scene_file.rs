//! Versioned JSON scene documents.

use crate::animation::{
    Animations, AudioChannelDriver, Channel, Interpolation, Keyframe, PathError, PropertyPath,
};
use crate::camera::YawPitchCamera;
use crate::ifs::{Affine, Ifs, IfsIterator, Palette, Variation, ViewParams, VARIATION_VERSION};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const SCENE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Resolve unknown or mismatched transforms to the closest match instead
    /// of failing.
    pub ignore_transform_versions: bool,
}

/// Any failure reading or writing a scene document. The underlying cause is
/// available through `source()`.
#[derive(Debug)]
pub struct SerializationError {
    cause: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl SerializationError {
    fn wrap(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            cause: Box::new(cause),
        }
    }

    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.cause
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene serialization failed: {}", self.cause)
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.cause)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneFormatError {
    UnsupportedVersion(u32),
    UnknownTransform { id: u32, name: String },
    TransformVersion { name: String, found: String },
    Path(PathError),
    Interpolation(String),
}

impl fmt::Display for SceneFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion(v) => {
                write!(f, "unsupported scene version {v} (expected {SCENE_VERSION})")
            }
            Self::UnknownTransform { id, name } => {
                write!(f, "unknown transform id={id} name='{name}'")
            }
            Self::TransformVersion { name, found } => write!(
                f,
                "transform '{name}' has version {found}, this build has {VARIATION_VERSION}"
            ),
            Self::Path(err) => write!(f, "invalid channel path: {err}"),
            Self::Interpolation(s) => write!(f, "unknown interpolation '{s}'"),
        }
    }
}

impl std::error::Error for SceneFormatError {}

/// A scene together with the animation channels stored alongside it.
#[derive(Debug, Clone)]
pub struct SceneDocument {
    pub ifs: Ifs,
    pub animations: Animations,
}

#[derive(Debug, Serialize, Deserialize)]
struct DocumentDto {
    version: u32,
    iterators: Vec<IteratorDto>,
    final_iterator: IteratorDto,
    camera: CameraDto,
    view: ViewDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    palette: Option<Vec<[f32; 3]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    animations: Option<AnimationsDto>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AffineDto {
    xx: f32,
    xy: f32,
    xz: f32,
    yx: f32,
    yy: f32,
    yz: f32,
    zx: f32,
    zy: f32,
    zz: f32,
    ox: f32,
    oy: f32,
    oz: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct TransformDto {
    id: u32,
    name: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IteratorDto {
    w: f32,
    affine: AffineDto,
    transform: TransformDto,
    ci: f32,
    cs: f32,
    op: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CameraDto {
    position: [f32; 3],
    yaw: f32,
    pitch: f32,
    width: u32,
    height: u32,
    #[serde(default = "default_fov")]
    fov_y_deg: f32,
}

fn default_fov() -> f32 {
    YawPitchCamera::new().fov_y_deg
}

#[derive(Debug, Serialize, Deserialize)]
struct ViewDto {
    brightness: f32,
    gamma: f32,
    fog_effect: f32,
    dof: f32,
    focus_distance: f32,
    focus_area: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnimationsDto {
    channels: Vec<ChannelDto>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChannelDto {
    name: String,
    path: String,
    #[serde(default)]
    keyframes: Vec<KeyframeDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<AudioDriverDto>,
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyframeDto {
    time: f32,
    value: f32,
    #[serde(default = "default_interpolation")]
    interpolation: String,
}

fn default_interpolation() -> String {
    Interpolation::Linear.as_str().to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct AudioDriverDto {
    channel: usize,
    min_frequency: f32,
    max_frequency: f32,
    effect_multiplier: f32,
}

impl From<&IfsIterator> for IteratorDto {
    fn from(it: &IfsIterator) -> Self {
        let d = IfsIterator::identity();
        let mut a = it.affine.to_array();
        for (v, fallback) in a.iter_mut().zip(d.affine.to_array()) {
            *v = finite_or(*v, fallback);
        }
        Self {
            w: finite_or(it.w, 0.0),
            affine: AffineDto {
                xx: a[0],
                xy: a[1],
                xz: a[2],
                yx: a[3],
                yy: a[4],
                yz: a[5],
                zx: a[6],
                zy: a[7],
                zz: a[8],
                ox: a[9],
                oy: a[10],
                oz: a[11],
            },
            transform: TransformDto {
                id: it.variation.id(),
                name: it.variation.name().to_string(),
                version: it.variation.version().to_string(),
            },
            ci: finite_or(it.ci, d.ci),
            cs: finite_or(it.cs, d.cs),
            op: finite_or(it.op, d.op),
        }
    }
}

impl IteratorDto {
    fn into_iterator(self, opts: LoadOptions) -> Result<IfsIterator, SceneFormatError> {
        let a = self.affine;
        Ok(IfsIterator {
            w: self.w,
            affine: Affine {
                xx: a.xx,
                xy: a.xy,
                xz: a.xz,
                yx: a.yx,
                yy: a.yy,
                yz: a.yz,
                zx: a.zx,
                zy: a.zy,
                zz: a.zz,
                ox: a.ox,
                oy: a.oy,
                oz: a.oz,
            },
            variation: resolve_transform(&self.transform, opts)?,
            ci: self.ci,
            cs: self.cs,
            op: self.op,
        })
    }
}

fn resolve_transform(t: &TransformDto, opts: LoadOptions) -> Result<Variation, SceneFormatError> {
    let by_id = Variation::from_id(t.id);
    if !opts.ignore_transform_versions {
        let v = by_id.ok_or_else(|| SceneFormatError::UnknownTransform {
            id: t.id,
            name: t.name.clone(),
        })?;
        if t.version != v.version() {
            return Err(SceneFormatError::TransformVersion {
                name: t.name.clone(),
                found: t.version.clone(),
            });
        }
        return Ok(v);
    }

    if let Some(v) = by_id {
        if t.version != v.version() {
            log::warn!(
                "transform '{}' version {} differs from {}; loading anyway",
                t.name,
                t.version,
                v.version()
            );
        }
        return Ok(v);
    }
    if let Some(v) = Variation::from_name(&t.name) {
        log::warn!("unknown transform id {}; matched '{}' by name", t.id, v.name());
        return Ok(v);
    }
    log::warn!(
        "unknown transform id={} name='{}'; falling back to linear",
        t.id,
        t.name
    );
    Ok(Variation::Linear)
}

/// JSON has no NaN or infinity; such values are written as their defaults
/// so the document stays loadable.
fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() { v } else { fallback }
}

fn to_dto(ifs: &Ifs, animations: &Animations) -> DocumentDto {
    let cam = &ifs.camera;
    let cam_default = YawPitchCamera::new();
    let v = &ifs.view;
    let vd = ViewParams::default();
    let ad = AudioChannelDriver::default();
    let channels: Vec<ChannelDto> = animations
        .channels()
        .iter()
        .map(|c| ChannelDto {
            name: c.name.clone(),
            path: c.path.to_string(),
            keyframes: c
                .curve
                .keyframes()
                .iter()
                .map(|k| KeyframeDto {
                    time: k.time,
                    value: k.value,
                    interpolation: k.interpolation.as_str().to_string(),
                })
                .collect(),
            audio: c.audio.map(|a| AudioDriverDto {
                channel: a.audio_channel_id,
                min_frequency: finite_or(a.min_frequency, ad.min_frequency),
                max_frequency: finite_or(a.max_frequency, ad.max_frequency),
                effect_multiplier: finite_or(a.effect_multiplier, ad.effect_multiplier),
            }),
        })
        .collect();

    DocumentDto {
        version: SCENE_VERSION,
        iterators: ifs.iterators.iter().map(IteratorDto::from).collect(),
        final_iterator: IteratorDto::from(&ifs.final_iterator),
        camera: CameraDto {
            position: if cam.position.is_finite() {
                cam.position.to_array()
            } else {
                cam_default.position.to_array()
            },
            yaw: finite_or(cam.yaw(), cam_default.yaw()),
            pitch: finite_or(cam.pitch(), cam_default.pitch()),
            width: cam.width,
            height: cam.height,
            fov_y_deg: finite_or(cam.fov_y_deg, cam_default.fov_y_deg),
        },
        view: ViewDto {
            brightness: finite_or(v.brightness, vd.brightness),
            gamma: finite_or(v.gamma, vd.gamma),
            fog_effect: finite_or(v.fog_effect, vd.fog_effect),
            dof: finite_or(v.dof, vd.dof),
            focus_distance: finite_or(v.focus_distance, vd.focus_distance),
            focus_area: finite_or(v.focus_area, vd.focus_area),
        },
        palette: Some(
            ifs.palette
                .stops()
                .iter()
                .map(|c| c.map(|v| finite_or(v, 0.0)))
                .collect(),
        ),
        animations: (!channels.is_empty()).then_some(AnimationsDto { channels }),
    }
}

fn from_dto(doc: DocumentDto, opts: LoadOptions) -> Result<SceneDocument, SceneFormatError> {
    if doc.version != SCENE_VERSION {
        return Err(SceneFormatError::UnsupportedVersion(doc.version));
    }

    let iterators = doc
        .iterators
        .into_iter()
        .map(|it| it.into_iterator(opts))
        .collect::<Result<Vec<_>, _>>()?;
    let final_iterator = doc.final_iterator.into_iterator(opts)?;

    let c = doc.camera;
    let mut camera = YawPitchCamera::with_orientation(Vec3::from_array(c.position), c.yaw, c.pitch);
    camera.width = c.width.max(1);
    camera.height = c.height.max(1);
    camera.fov_y_deg = c.fov_y_deg;

    let v = doc.view;
    let view = ViewParams {
        brightness: v.brightness,
        gamma: v.gamma,
        fog_effect: v.fog_effect,
        dof: v.dof,
        focus_distance: v.focus_distance,
        focus_area: v.focus_area,
    };

    let mut animations = Animations::new();
    for ch in doc.animations.map(|a| a.channels).unwrap_or_default() {
        let path = PropertyPath::parse(&ch.path).map_err(SceneFormatError::Path)?;
        let mut channel = Channel::new(ch.name, path);
        for k in ch.keyframes {
            let interpolation = Interpolation::parse(&k.interpolation)
                .ok_or_else(|| SceneFormatError::Interpolation(k.interpolation.clone()))?;
            channel
                .curve
                .insert(Keyframe::new(k.time, k.value).with_interpolation(interpolation));
        }
        channel.audio = ch.audio.map(|a| AudioChannelDriver {
            audio_channel_id: a.channel,
            min_frequency: a.min_frequency,
            max_frequency: a.max_frequency,
            effect_multiplier: a.effect_multiplier,
        });
        animations.add_channel(channel);
    }

    Ok(SceneDocument {
        ifs: Ifs {
            iterators,
            final_iterator,
            camera,
            view,
            palette: doc.palette.map(Palette::new).unwrap_or_default(),
        },
        animations,
    })
}

pub fn save_bytes(ifs: &Ifs, animations: &Animations) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec_pretty(&to_dto(ifs, animations)).map_err(SerializationError::wrap)
}

pub fn load_bytes(bytes: &[u8], opts: LoadOptions) -> Result<SceneDocument, SerializationError> {
    let doc: DocumentDto = serde_json::from_slice(bytes).map_err(SerializationError::wrap)?;
    from_dto(doc, opts).map_err(SerializationError::wrap)
}

pub fn save_file(path: &Path, ifs: &Ifs, animations: &Animations) -> Result<(), SerializationError> {
    let bytes = save_bytes(ifs, animations)?;
    std::fs::write(path, bytes).map_err(SerializationError::wrap)?;
    log::info!("saved scene to {}", path.display());
    Ok(())
}

pub fn load_file(path: &Path, opts: LoadOptions) -> Result<SceneDocument, SerializationError> {
    let bytes = std::fs::read(path).map_err(SerializationError::wrap)?;
    let doc = load_bytes(&bytes, opts)?;
    log::info!(
        "loaded scene from {} ({} iterators, {} channels)",
        path.display(),
        doc.ifs.iterators.len(),
        doc.animations.channels().len()
    );
    Ok(doc)
}
