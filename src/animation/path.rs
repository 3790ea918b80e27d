use crate::ifs::{Ifs, IfsIterator, AFFINE_COEFFICIENTS};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewField {
    Brightness,
    Gamma,
    FogEffect,
    Dof,
    FocusDistance,
    FocusArea,
}

impl ViewField {
    const ALL: [Self; 6] = [
        Self::Brightness,
        Self::Gamma,
        Self::FogEffect,
        Self::Dof,
        Self::FocusDistance,
        Self::FocusArea,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Gamma => "gamma",
            Self::FogEffect => "fog_effect",
            Self::Dof => "dof",
            Self::FocusDistance => "focus_distance",
            Self::FocusArea => "focus_area",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraField {
    Yaw,
    Pitch,
    X,
    Y,
    Z,
}

impl CameraField {
    const ALL: [Self; 5] = [Self::Yaw, Self::Pitch, Self::X, Self::Y, Self::Z];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yaw => "yaw",
            Self::Pitch => "pitch",
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

/// A scalar on an iterator: `w`, `ci`, `cs`, `op` or one of the affine
/// coefficients by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IteratorField(&'static str);

impl IteratorField {
    pub fn parse(s: &str) -> Option<Self> {
        ["w", "ci", "cs", "op"]
            .into_iter()
            .chain(AFFINE_COEFFICIENTS)
            .find(|name| *name == s)
            .map(Self)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }

    fn get(self, it: &IfsIterator) -> Option<f32> {
        let mut copy = *it;
        copy.field_mut(self.0).map(|v| *v)
    }
}

/// Address of one animatable scalar in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyPath {
    View(ViewField),
    Camera(CameraField),
    Iterator(usize, IteratorField),
    Final(IteratorField),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    Empty,
    UnknownRoot(String),
    UnknownField(String),
    BadIndex(String),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty property path"),
            Self::UnknownRoot(root) => write!(f, "unknown property root '{root}'"),
            Self::UnknownField(field) => write!(f, "unknown property field '{field}'"),
            Self::BadIndex(raw) => write!(f, "invalid iterator index in '{raw}'"),
        }
    }
}

impl std::error::Error for PathError {}

impl PropertyPath {
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let (root, field) = s
            .split_once('.')
            .ok_or_else(|| PathError::UnknownField(s.to_string()))?;
        let unknown_field = || PathError::UnknownField(field.to_string());
        match root {
            "view" => ViewField::parse(field).map(Self::View).ok_or_else(unknown_field),
            "camera" => CameraField::parse(field)
                .map(Self::Camera)
                .ok_or_else(unknown_field),
            "final" => IteratorField::parse(field)
                .map(Self::Final)
                .ok_or_else(unknown_field),
            _ => {
                let index = root
                    .strip_prefix("iterators[")
                    .and_then(|rest| rest.strip_suffix(']'))
                    .ok_or_else(|| PathError::UnknownRoot(root.to_string()))?;
                let index = index
                    .parse::<usize>()
                    .map_err(|_| PathError::BadIndex(s.to_string()))?;
                IteratorField::parse(field)
                    .map(|f| Self::Iterator(index, f))
                    .ok_or_else(unknown_field)
            }
        }
    }

    /// Current value in `ifs`, or `None` when the path points at a missing
    /// iterator.
    pub fn get(&self, ifs: &Ifs) -> Option<f32> {
        match *self {
            Self::View(f) => Some(match f {
                ViewField::Brightness => ifs.view.brightness,
                ViewField::Gamma => ifs.view.gamma,
                ViewField::FogEffect => ifs.view.fog_effect,
                ViewField::Dof => ifs.view.dof,
                ViewField::FocusDistance => ifs.view.focus_distance,
                ViewField::FocusArea => ifs.view.focus_area,
            }),
            Self::Camera(f) => Some(match f {
                CameraField::Yaw => ifs.camera.yaw(),
                CameraField::Pitch => ifs.camera.pitch(),
                CameraField::X => ifs.camera.position.x,
                CameraField::Y => ifs.camera.position.y,
                CameraField::Z => ifs.camera.position.z,
            }),
            Self::Iterator(i, f) => ifs.iterators.get(i).and_then(|it| f.get(it)),
            Self::Final(f) => f.get(&ifs.final_iterator),
        }
    }

    /// Writes `value`; returns true when the stored value actually changed.
    pub fn set(&self, ifs: &mut Ifs, value: f32) -> bool {
        if !value.is_finite() || self.get(ifs) == Some(value) {
            return false;
        }
        match *self {
            Self::View(f) => {
                let slot = match f {
                    ViewField::Brightness => &mut ifs.view.brightness,
                    ViewField::Gamma => &mut ifs.view.gamma,
                    ViewField::FogEffect => &mut ifs.view.fog_effect,
                    ViewField::Dof => &mut ifs.view.dof,
                    ViewField::FocusDistance => &mut ifs.view.focus_distance,
                    ViewField::FocusArea => &mut ifs.view.focus_area,
                };
                *slot = value;
            }
            Self::Camera(f) => {
                let cam = &mut ifs.camera;
                match f {
                    CameraField::Yaw => cam.set_orientation(value, cam.pitch()),
                    CameraField::Pitch => cam.set_orientation(cam.yaw(), value),
                    CameraField::X => cam.position.x = value,
                    CameraField::Y => cam.position.y = value,
                    CameraField::Z => cam.position.z = value,
                }
            }
            Self::Iterator(i, f) => {
                let Some(slot) = ifs.iterators.get_mut(i).and_then(|it| it.field_mut(f.0)) else {
                    return false;
                };
                *slot = value;
            }
            Self::Final(f) => {
                let Some(slot) = ifs.final_iterator.field_mut(f.0) else {
                    return false;
                };
                *slot = value;
            }
        }
        true
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::View(field) => write!(f, "view.{}", field.as_str()),
            Self::Camera(field) => write!(f, "camera.{}", field.as_str()),
            Self::Iterator(i, field) => write!(f, "iterators[{i}].{}", field.as_str()),
            Self::Final(field) => write!(f, "final.{}", field.as_str()),
        }
    }
}

impl FromStr for PropertyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
