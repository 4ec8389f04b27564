/// Color table: maps flight mode to the color shown on every arm.
///
/// Built once at startup and read-only afterwards. Lookup is a plain array
/// index, so every mode resolves and nothing can be missing:
///   Manual          → red
///   PositionControl → green
///   AltitudeControl → blue
///   Mission         → light blue
///   Hold            → pink
///   Offboard        → orange
///   Acro            → purple
///   Stabilized      → yellow
///   everything else → the default (white)

use crate::color::Color;
use crate::flight_mode::FlightMode;

#[derive(Debug, Clone)]
pub struct ColorTable {
    colors: [Color; FlightMode::COUNT],
}

impl ColorTable {
    /// Modes missing from `entries` resolve to `default`. Later entries win.
    pub fn new(entries: &[(FlightMode, Color)], default: Color) -> Self {
        let mut colors = [default; FlightMode::COUNT];
        for &(mode, color) in entries {
            colors[mode.index()] = color;
        }
        Self { colors }
    }

    /// Built-in table with the white default.
    #[cfg(test)]
    pub fn standard() -> Self {
        Self::new(&Self::STANDARD, Color::WHITE)
    }

    const STANDARD: [(FlightMode, Color); 8] = [
        (FlightMode::Manual, Color::RED),
        (FlightMode::PositionControl, Color::GREEN),
        (FlightMode::AltitudeControl, Color::BLUE),
        (FlightMode::Mission, Color::LIGHTBLUE),
        (FlightMode::Hold, Color::PINK),
        (FlightMode::Offboard, Color::ORANGE),
        (FlightMode::Acro, Color::PURPLE),
        (FlightMode::Stabilized, Color::YELLOW),
    ];

    /// Standard table with config overrides layered on top.
    pub fn with_overrides(overrides: &[(FlightMode, Color)], default: Color) -> Self {
        let mut entries = Self::STANDARD.to_vec();
        entries.extend_from_slice(overrides);
        Self::new(&entries, default)
    }

    pub fn color_for(&self, mode: FlightMode) -> Color {
        self.colors[mode.index()]
    }
}
