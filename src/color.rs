//! # Light Bar Colors
//!
//! RGB value type shared by the report codec, LED driver, effects and config.

use serde::Deserialize;

/// 8-bit RGB color for the controller light bar.
///
/// Deserializes from a TOML array `[r, g, b]`.
///
/// # Examples
///
/// ```
/// use ds4_lightbar::color::Rgb;
///
/// let dim = Rgb::new(90, 30, 255).divided(3);
/// assert_eq!(dim, Rgb::new(30, 10, 85));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const ORANGE: Rgb = Rgb::new(255, 165, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_black(&self) -> bool {
        *self == Self::BLACK
    }

    /// Scale every channel by `factor` (0.0-1.0), truncating.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |c: u8| (c as f64 * factor).clamp(0.0, 255.0) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }

    /// Integer-divide every channel by `divisor`.
    pub fn divided(&self, divisor: u8) -> Self {
        Self::new(self.r / divisor, self.g / divisor, self.b / divisor)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RGB({}, {}, {})", self.r, self.g, self.b)
    }
}
