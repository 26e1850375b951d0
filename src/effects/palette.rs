//! Fixed palettes the generated effects draw from.

use std::ops::RangeInclusive;

use crate::color::Rgb;

/// Classic 7-color rainbow cycle.
pub const RAINBOW: [Rgb; 7] = [
    Rgb::new(255, 0, 0),   // red
    Rgb::new(255, 127, 0), // orange
    Rgb::new(255, 255, 0), // yellow
    Rgb::new(0, 255, 0),   // green
    Rgb::new(0, 0, 255),   // blue
    Rgb::new(75, 0, 130),  // indigo
    Rgb::new(148, 0, 211), // violet
];

/// Northern-lights hues cycled by the aurora effect.
pub const AURORA: [Rgb; 6] = [
    Rgb::new(0, 255, 100),
    Rgb::new(50, 255, 150),
    Rgb::new(0, 200, 255),
    Rgb::new(100, 150, 255),
    Rgb::new(150, 100, 255),
    Rgb::new(100, 255, 200),
];

/// Default palette for the custom fade effect.
pub const FADE_DEFAULT: [Rgb; 6] = [
    Rgb::new(255, 0, 0),
    Rgb::new(255, 165, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(148, 0, 211),
];

/// Warm-into-cool cycle for the wave effect.
pub const WAVE: [Rgb; 10] = [
    Rgb::new(255, 0, 0),
    Rgb::new(255, 87, 34),
    Rgb::new(255, 165, 0),
    Rgb::new(255, 193, 7),
    Rgb::new(255, 255, 0),
    Rgb::new(0, 255, 255),
    Rgb::new(0, 191, 255),
    Rgb::new(0, 0, 255),
    Rgb::new(75, 0, 130),
    Rgb::new(148, 0, 211),
];

/// Temperature band of a flame palette entry. Hotter bands flicker
/// brighter and faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlameBand {
    /// White-yellow heart of the fire (rare).
    Core,
    /// Main orange flames (frequent).
    Flame,
    /// Red-orange base (moderate).
    Base,
    /// Dark-red embers (rare).
    Ember,
}

impl FlameBand {
    pub fn brightness_range(self) -> RangeInclusive<u8> {
        match self {
            FlameBand::Core => 85..=100,
            FlameBand::Flame => 75..=95,
            FlameBand::Base => 65..=85,
            FlameBand::Ember => 60..=80,
        }
    }

    /// Flicker delay bounds in milliseconds; hotter bands change faster.
    pub fn delay_ms_range(self) -> RangeInclusive<u64> {
        match self {
            FlameBand::Core => 30..=80,
            FlameBand::Flame => 50..=120,
            FlameBand::Base => 80..=150,
            FlameBand::Ember => 100..=200,
        }
    }
}

/// One entry of the warm flame palette.
#[derive(Debug, Clone, Copy)]
pub struct FlameColor {
    pub color: Rgb,
    pub weight: u32,
    pub band: FlameBand,
}

const fn flame(r: u8, g: u8, b: u8, weight: u32, band: FlameBand) -> FlameColor {
    FlameColor {
        color: Rgb::new(r, g, b),
        weight,
        band,
    }
}

/// Warm palette with pick weights favoring the mid-flame hues.
pub const FIRE: [FlameColor; 14] = [
    flame(255, 255, 200, 8, FlameBand::Core),
    flame(255, 245, 150, 10, FlameBand::Core),
    flame(255, 235, 100, 12, FlameBand::Core),
    flame(255, 200, 50, 15, FlameBand::Flame),
    flame(255, 180, 40, 20, FlameBand::Flame),
    flame(255, 160, 30, 20, FlameBand::Flame),
    flame(255, 140, 20, 18, FlameBand::Flame),
    flame(255, 120, 10, 15, FlameBand::Base),
    flame(255, 100, 5, 12, FlameBand::Base),
    flame(255, 80, 0, 10, FlameBand::Base),
    flame(245, 70, 0, 8, FlameBand::Base),
    flame(220, 50, 0, 5, FlameBand::Ember),
    flame(200, 40, 0, 3, FlameBand::Ember),
    flame(180, 30, 0, 2, FlameBand::Ember),
];

/// Weighted pick from the flame palette.
///
/// `point` must be below the total weight; callers sample it uniformly.
pub fn pick_flame(point: u32) -> FlameColor {
    debug_assert!(point < fire_total_weight());
    let mut remaining = point;
    for entry in FIRE {
        if remaining < entry.weight {
            return entry;
        }
        remaining -= entry.weight;
    }
    FIRE[FIRE.len() - 1]
}

pub fn fire_total_weight() -> u32 {
    FIRE.iter().map(|entry| entry.weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fire_palette_has_fourteen_weighted_entries() {
        assert_eq!(FIRE.len(), 14);
        assert_eq!(fire_total_weight(), 158);
    }

    #[test]
    fn pick_flame_covers_every_entry_boundary() {
        // First point of each entry's weight span maps to that entry.
        let mut offset = 0;
        for entry in FIRE {
            assert_eq!(pick_flame(offset).color, entry.color);
            assert_eq!(pick_flame(offset + entry.weight - 1).color, entry.color);
            offset += entry.weight;
        }
    }

    #[test]
    fn hotter_bands_flicker_faster_and_brighter() {
        assert!(FlameBand::Core.delay_ms_range().end() <= FlameBand::Flame.delay_ms_range().end());
        assert!(FlameBand::Flame.delay_ms_range().end() <= FlameBand::Base.delay_ms_range().end());
        assert!(FlameBand::Base.delay_ms_range().end() <= FlameBand::Ember.delay_ms_range().end());
        assert!(
            FlameBand::Core.brightness_range().start()
                >= FlameBand::Ember.brightness_range().start()
        );
    }

    #[test]
    fn mid_flame_hues_dominate_the_weights() {
        let flame_weight: u32 = FIRE
            .iter()
            .filter(|entry| entry.band == FlameBand::Flame)
            .map(|entry| entry.weight)
            .sum();
        let ember_weight: u32 = FIRE
            .iter()
            .filter(|entry| entry.band == FlameBand::Ember)
            .map(|entry| entry.weight)
            .sum();
        assert!(flame_weight > ember_weight);
    }

    #[test]
    fn wave_concatenates_warm_then_cool() {
        assert_eq!(WAVE.len(), 10);
        // Warm half is red-dominant, cool half is blue/green-dominant.
        assert!(WAVE[..5].iter().all(|c| c.r == 255));
        assert!(WAVE[5..].iter().all(|c| c.r < 255));
    }
}
