/// Easing applied between a keyframe and the next one. The left keyframe's
/// mode governs the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    SmoothStep,
}

impl Interpolation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "step" => Some(Self::Step),
            "linear" => Some(Self::Linear),
            "ease_in" => Some(Self::EaseIn),
            "ease_out" => Some(Self::EaseOut),
            "smoothstep" => Some(Self::SmoothStep),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Linear => "linear",
            Self::EaseIn => "ease_in",
            Self::EaseOut => "ease_out",
            Self::SmoothStep => "smoothstep",
        }
    }

    pub fn apply(self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Self::Step => 0.0,
            Self::Linear => x,
            Self::EaseIn => x * x,
            Self::EaseOut => 1.0 - (1.0 - x) * (1.0 - x),
            Self::SmoothStep => x * x * (3.0 - 2.0 * x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    pub interpolation: Interpolation,
}

impl Keyframe {
    pub fn new(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            interpolation: Interpolation::Linear,
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }
}

/// Keyframes kept in strictly increasing time order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationCurve {
    keys: Vec<Keyframe>,
}

impl AnimationCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a curve from unordered keyframes; later duplicates win.
    pub fn from_keyframes(keys: impl IntoIterator<Item = Keyframe>) -> Self {
        let mut curve = Self::new();
        for k in keys {
            curve.insert(k);
        }
        curve
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Inserts in time order, replacing a keyframe at the same time. Keyframes
    /// with a non-finite time or value are rejected.
    pub fn insert(&mut self, mut key: Keyframe) -> bool {
        if !key.time.is_finite() || !key.value.is_finite() {
            return false;
        }
        key.time = unsigned_zero(key.time);
        match self.search(key.time) {
            Ok(i) => self.keys[i] = key,
            Err(i) => self.keys.insert(i, key),
        }
        true
    }

    pub fn remove_at(&mut self, time: f32) -> Option<Keyframe> {
        let i = self.search(unsigned_zero(time)).ok()?;
        Some(self.keys.remove(i))
    }

    fn search(&self, time: f32) -> Result<usize, usize> {
        self.keys.binary_search_by(|k| k.time.total_cmp(&time))
    }

    /// Value at `t`. Outside the keyed range the boundary value is returned;
    /// an empty curve has no value.
    pub fn evaluate(&self, t: f32) -> Option<f32> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if t.is_nan() || t <= first.time {
            return Some(first.value);
        }
        if t >= last.time {
            return Some(last.value);
        }
        let right = self.keys.partition_point(|k| k.time <= t);
        let a = &self.keys[right - 1];
        if a.time == t {
            return Some(a.value);
        }
        let b = &self.keys[right];
        let x = (t - a.time) / (b.time - a.time);
        let eased = a.interpolation.apply(x);
        Some(a.value + (b.value - a.value) * eased)
    }
}

/// Folds -0.0 onto 0.0 so both name the same keyframe time.
#[inline]
fn unsigned_zero(t: f32) -> f32 {
    if t == 0.0 { 0.0 } else { t }
}
