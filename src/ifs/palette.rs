/// Color gradient indexed by a walker's color coordinate in [0, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    stops: Vec<[f32; 3]>,
}

impl Palette {
    /// Builds a palette from RGB stops in [0, 1]. An empty list yields the default.
    pub fn new(stops: Vec<[f32; 3]>) -> Self {
        if stops.is_empty() {
            return Self::default();
        }
        let stops = stops
            .into_iter()
            .map(|c| c.map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }))
            .collect();
        Self { stops }
    }

    pub fn stops(&self) -> &[[f32; 3]] {
        &self.stops
    }

    #[inline]
    pub fn sample(&self, t: f32) -> [f32; 3] {
        let n = self.stops.len();
        if n == 1 {
            return self.stops[0];
        }
        let x = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 } * (n - 1) as f32;
        let i = (x.floor() as usize).min(n - 2);
        let f = x - i as f32;
        let a = self.stops[i];
        let b = self.stops[i + 1];
        [
            a[0] + (b[0] - a[0]) * f,
            a[1] + (b[1] - a[1]) * f,
            a[2] + (b[2] - a[2]) * f,
        ]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            stops: vec![
                [0.05, 0.02, 0.35],
                [0.55, 0.05, 0.55],
                [0.95, 0.35, 0.10],
                [1.00, 0.85, 0.30],
                [1.00, 1.00, 0.95],
            ],
        }
    }
}
