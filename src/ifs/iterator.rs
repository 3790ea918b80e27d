use super::variation::Variation;
use glam::{Mat3, Vec3};

/// 3×3 linear map plus translation. `xy` is the weight of input `y` in output `x`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub xx: f32,
    pub xy: f32,
    pub xz: f32,
    pub yx: f32,
    pub yy: f32,
    pub yz: f32,
    pub zx: f32,
    pub zy: f32,
    pub zz: f32,
    pub ox: f32,
    pub oy: f32,
    pub oz: f32,
}

pub const AFFINE_COEFFICIENTS: [&str; 12] = [
    "xx", "xy", "xz", "yx", "yy", "yz", "zx", "zy", "zz", "ox", "oy", "oz",
];

impl Affine {
    pub const IDENTITY: Self = Self {
        xx: 1.0,
        xy: 0.0,
        xz: 0.0,
        yx: 0.0,
        yy: 1.0,
        yz: 0.0,
        zx: 0.0,
        zy: 0.0,
        zz: 1.0,
        ox: 0.0,
        oy: 0.0,
        oz: 0.0,
    };

    /// Coefficients in `AFFINE_COEFFICIENTS` order.
    pub fn to_array(&self) -> [f32; 12] {
        [
            self.xx, self.xy, self.xz, self.yx, self.yy, self.yz, self.zx, self.zy, self.zz,
            self.ox, self.oy, self.oz,
        ]
    }

    pub fn from_array(c: [f32; 12]) -> Self {
        Self {
            xx: c[0],
            xy: c[1],
            xz: c[2],
            yx: c[3],
            yy: c[4],
            yz: c[5],
            zx: c[6],
            zy: c[7],
            zz: c[8],
            ox: c[9],
            oy: c[10],
            oz: c[11],
        }
    }

    pub fn coefficient_mut(&mut self, name: &str) -> Option<&mut f32> {
        Some(match name {
            "xx" => &mut self.xx,
            "xy" => &mut self.xy,
            "xz" => &mut self.xz,
            "yx" => &mut self.yx,
            "yy" => &mut self.yy,
            "yz" => &mut self.yz,
            "zx" => &mut self.zx,
            "zy" => &mut self.zy,
            "zz" => &mut self.zz,
            "ox" => &mut self.ox,
            "oy" => &mut self.oy,
            "oz" => &mut self.oz,
            _ => return None,
        })
    }

    pub fn linear(&self) -> Mat3 {
        // glam matrices are column-major: column j holds the weights of input j.
        Mat3::from_cols(
            Vec3::new(self.xx, self.yx, self.zx),
            Vec3::new(self.xy, self.yy, self.zy),
            Vec3::new(self.xz, self.yz, self.zz),
        )
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.ox, self.oy, self.oz)
    }

    #[inline]
    pub fn apply(&self, p: Vec3) -> Vec3 {
        self.linear() * p + self.translation()
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One weighted transform of the system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IfsIterator {
    pub w: f32,
    pub affine: Affine,
    pub variation: Variation,
    pub ci: f32,
    pub cs: f32,
    pub op: f32,
}

impl IfsIterator {
    /// The pass-through transform used as the default final iterator.
    pub fn identity() -> Self {
        Self {
            w: 0.0,
            affine: Affine::IDENTITY,
            variation: Variation::Linear,
            ci: 0.0,
            cs: 0.0,
            op: 1.0,
        }
    }

    pub fn random(rng: &mut fastrand::Rng) -> Self {
        let mut coeffs = [0.0f32; 12];
        for c in &mut coeffs {
            *c = (rng.f32() * 2.0 - 1.0) * 1.5;
        }
        Self {
            w: rng.f32(),
            affine: Affine::from_array(coeffs),
            variation: Variation::from_id(rng.u32(..super::variation::RANDOMIZED_VARIATIONS))
                .unwrap_or_default(),
            ci: rng.f32(),
            cs: (rng.f32() * 2.0 - 1.0) * 0.1,
            op: rng.f32(),
        }
    }

    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.variation.apply(self.affine.apply(p))
    }

    #[inline]
    pub fn transform_color(&self, color: f32) -> f32 {
        (color + (self.ci - color) * self.cs).clamp(0.0, 1.0)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut f32> {
        match name {
            "w" => Some(&mut self.w),
            "ci" => Some(&mut self.ci),
            "cs" => Some(&mut self.cs),
            "op" => Some(&mut self.op),
            other => self.affine.coefficient_mut(other),
        }
    }
}

impl Default for IfsIterator {
    fn default() -> Self {
        Self::identity()
    }
}
