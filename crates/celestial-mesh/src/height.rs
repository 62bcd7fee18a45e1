/// Minimum and maximum of the heights computed in one full generation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeightRange {
    pub min: f32,
    pub max: f32,
}

impl HeightRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Range over `heights`, or `None` if there are none.
    pub fn from_heights(heights: &[f32]) -> Option<Self> {
        let (&first, rest) = heights.split_first()?;
        let mut range = Self::new(first, first);
        for &h in rest {
            range.include(h);
        }
        Some(range)
    }

    /// Widen the range to contain `height`.
    pub fn include(&mut self, height: f32) {
        self.min = self.min.min(height);
        self.max = self.max.max(height);
    }

    pub fn contains(&self, height: f32) -> bool {
        self.min <= height && height <= self.max
    }

    /// Ocean surface radius for a body of `scale`.
    ///
    /// Interpolates from the lowest terrain point (level 0) to the unit radius
    /// (level 1). Zero when the body has no ocean.
    pub fn ocean_radius(&self, ocean_level: f32, scale: f32, has_ocean: bool) -> f32 {
        if !has_ocean {
            return 0.0;
        }
        let level = ocean_level.clamp(0.0, 1.0);
        (self.min + (1.0 - self.min) * level) * scale
    }
}
