/// Frame encoder: one arm's colors → raw strip bytes in wire order.
///
/// Byte order per strip type (3 bytes per LED, 4 for RGBW parts):
///
///   rgb  → R G B
///   rbg  → R B G
///   grb  → G R B   (WS2812 / SK6812RGB, the default)
///   gbr  → G B R
///   brg  → B R G
///   bgr  → B G R
///   rgbw → R G B W
///   grbw → G R B W
///
/// Colors are 24-bit, so the W byte of RGBW parts is always 0.
/// Brightness scales each channel by `brightness / 255` (255 = passthrough).

use crate::color::Color;
use crate::driver::StripType;

/// Encode one arm into wire bytes.
pub fn encode_arm(strip: StripType, brightness: u8, leds: &[Color]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(leds.len() * strip.bytes_per_led());
    for &color in leds {
        let (r, g, b) = (
            scale(color.r(), brightness),
            scale(color.g(), brightness),
            scale(color.b(), brightness),
        );
        match strip {
            StripType::Rgb => buf.extend_from_slice(&[r, g, b]),
            StripType::Rbg => buf.extend_from_slice(&[r, b, g]),
            StripType::Grb => buf.extend_from_slice(&[g, r, b]),
            StripType::Gbr => buf.extend_from_slice(&[g, b, r]),
            StripType::Brg => buf.extend_from_slice(&[b, r, g]),
            StripType::Bgr => buf.extend_from_slice(&[b, g, r]),
            StripType::Rgbw => buf.extend_from_slice(&[r, g, b, 0]),
            StripType::Grbw => buf.extend_from_slice(&[g, r, b, 0]),
        }
    }
    buf
}

fn scale(channel: u8, brightness: u8) -> u8 {
    if brightness == u8::MAX {
        return channel;
    }
    ((channel as u16 * (brightness as u16 + 1)) >> 8) as u8
}

/// Hex dump for debug logging, e.g. `FF007F FF007F`.
pub fn hex(bytes: &[u8], bytes_per_led: usize) -> String {
    bytes
        .chunks(bytes_per_led.max(1))
        .map(|led| led.iter().map(|b| format!("{b:02X}")).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}
