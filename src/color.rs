//! RGB color values and the interpolation shared by the fading effects.

use serde::{Deserialize, Serialize};

/// 8-bit RGB triple.
///
/// Channel values are clamped into `[0, 255]` at every mutation site via
/// [`Rgb::saturating`]; callers may pass raw arithmetic results without
/// bounds-checking.
///
/// # Example
///
/// ```
/// use bledomd::color::Rgb;
///
/// let c = Rgb::saturating(300, -5, 128);
/// assert_eq!(c, Rgb::new(255, 0, 128));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const WHITE: Rgb = Rgb::new(255, 255, 255);
pub const BLACK: Rgb = Rgb::new(0, 0, 0);
pub const RED: Rgb = Rgb::new(255, 0, 0);
pub const GREEN: Rgb = Rgb::new(0, 255, 0);
pub const BLUE: Rgb = Rgb::new(0, 0, 255);
pub const YELLOW: Rgb = Rgb::new(255, 255, 0);

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from raw channel arithmetic, clamping each channel
    /// into `[0, 255]`.
    pub fn saturating(r: i32, g: i32, b: i32) -> Self {
        Self {
            r: r.clamp(0, 255) as u8,
            g: g.clamp(0, 255) as u8,
            b: b.clamp(0, 255) as u8,
        }
    }

    /// Linear interpolation toward `target` at step `i` of `steps`.
    ///
    /// Per channel: `start + (target - start) * i / steps`, truncating
    /// toward zero. `i = 0` returns `self` exactly and `i = steps` lands
    /// exactly on `target`.
    pub fn lerp(self, target: Self, i: u32, steps: u32) -> Self {
        debug_assert!(steps >= 1 && i <= steps);
        let channel = |s: u8, t: u8| -> i32 {
            i32::from(s) + (i32::from(t) - i32::from(s)) * i as i32 / steps as i32
        };
        Self::saturating(
            channel(self.r, target.r),
            channel(self.g, target.g),
            channel(self.b, target.b),
        )
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

/// Maps a brightness percentage `[0, 100]` to the device's 8-bit scale.
///
/// `round(pct / 100 * 255)`: monotone, `0 -> 0`, `100 -> 255`.
pub fn brightness_to_device(pct: u8) -> u8 {
    debug_assert!(pct <= 100);
    ((f32::from(pct) / 100.0) * 255.0).round() as u8
}
