/// 24-bit packed RGB color as stored in the LED buffer (`0x00RRGGBB`).
///
/// No alpha, no gamma. Equality is bitwise on the packed value.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const OFF: Color = Color(0x0000_0000);
    pub const RED: Color = Color(0x00FF_0000);
    pub const ORANGE: Color = Color(0x00FF_7F00);
    pub const YELLOW: Color = Color(0x00FF_FF00);
    pub const GREEN: Color = Color(0x0000_FF00);
    pub const LIGHTBLUE: Color = Color(0x0000_FFFF);
    pub const BLUE: Color = Color(0x0000_00FF);
    pub const PURPLE: Color = Color(0x00FF_00FF);
    pub const PINK: Color = Color(0x00FF_007F);
    pub const WHITE: Color = Color(0x00FF_FFFF);

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Color(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Accept a packed value only if nothing is set above the low 24 bits.
    pub fn from_packed(value: u32) -> Option<Self> {
        if value & 0xFF00_0000 != 0 {
            return None;
        }
        Some(Color(value))
    }

    pub fn packed(self) -> u32 {
        self.0
    }

    pub fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn b(self) -> u8 {
        self.0 as u8
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:06X}", self.packed())
    }
}

/// RGB triple as written in the config file.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ColorConfig {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<Color> for ColorConfig {
    fn from(c: Color) -> Self {
        ColorConfig {
            r: c.r(),
            g: c.g(),
            b: c.b(),
        }
    }
}

impl From<ColorConfig> for Color {
    fn from(c: ColorConfig) -> Self {
        Color::from_rgb(c.r, c.g, c.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_unpack() {
        let pink = Color::PINK;
        assert_eq!((pink.r(), pink.g(), pink.b()), (0xFF, 0x00, 0x7F));
        assert_eq!(Color::from_rgb(0xFF, 0x00, 0x7F), pink);
    }

    #[test]
    fn packed_rejects_high_byte() {
        assert_eq!(Color::from_packed(0x0000_FF00), Some(Color::GREEN));
        assert_eq!(Color::from_packed(0x0100_0000), None);
        assert_eq!(Color::from_packed(0xFFFF_FFFF), None);
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(Color::ORANGE.to_string(), "#FF7F00");
        assert_eq!(Color::OFF.to_string(), "#000000");
    }
}
