use glam::Vec3;

/// Closed set of nonlinear functions an iterator applies after its affine map.
///
/// The discriminant is the on-disk transform id. Ids 0..=2 are the ones the
/// randomizer draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Variation {
    Linear = 0,
    Sinusoidal = 1,
    Spherical = 2,
    Swirl = 3,
    Horseshoe = 4,
    Bubble = 5,
}

/// Number of variations the randomizer picks from.
pub const RANDOMIZED_VARIATIONS: u32 = 3;

pub const VARIATION_VERSION: &str = "1.0";

impl Variation {
    pub const fn all() -> [Self; 6] {
        [
            Self::Linear,
            Self::Sinusoidal,
            Self::Spherical,
            Self::Swirl,
            Self::Horseshoe,
            Self::Bubble,
        ]
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::all().into_iter().find(|v| v.id() == id)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::all().into_iter().find(|v| v.name() == name)
    }

    pub const fn id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Sinusoidal => "sinusoidal",
            Self::Spherical => "spherical",
            Self::Swirl => "swirl",
            Self::Horseshoe => "horseshoe",
            Self::Bubble => "bubble",
        }
    }

    pub fn version(self) -> &'static str {
        VARIATION_VERSION
    }

    /// Applies the variation to an affine output. May return non-finite
    /// components (e.g. spherical at the origin); callers reseed on that.
    #[inline]
    pub fn apply(self, q: Vec3) -> Vec3 {
        match self {
            Self::Linear => q,
            Self::Sinusoidal => Vec3::new(q.x.sin(), q.y.sin(), q.z.sin()),
            Self::Spherical => q / q.length_squared(),
            Self::Swirl => {
                let r2 = q.length_squared();
                let (s, c) = r2.sin_cos();
                Vec3::new(q.x * s - q.y * c, q.x * c + q.y * s, q.z)
            }
            Self::Horseshoe => {
                let r = q.length();
                Vec3::new((q.x - q.y) * (q.x + q.y) / r, 2.0 * q.x * q.y / r, q.z)
            }
            Self::Bubble => q * (4.0 / (q.length_squared() + 4.0)),
        }
    }
}

impl Default for Variation {
    fn default() -> Self {
        Self::Linear
    }
}
