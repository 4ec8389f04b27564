/// Remote LED commands: the raw `led_strip_set` payload and its validated form.
///
/// Payload fields (as sent on the link):
///   target_system     system the command is addressed to
///   target_component  component the command is addressed to (ours: 134)
///   fill_mode         0 = fill all, 1 = fill range, 2 = follow flight mode
///   led_index         first LED of the range (fill range only)
///   length            LEDs in the range, 255 = to the end of the arm
///   strip_index       arm to paint, 255 = every arm
///   colors            up to 8 packed 0x00RRGGBB values
///
/// Decoding reads colors only from the payload itself. A command that needs a
/// color and has none is rejected here and never reaches the LED buffer.

use crate::color::Color;
use serde::Deserialize;

pub const FILL_MODE_ALL: u8 = 0;
pub const FILL_MODE_INDEX: u8 = 1;
pub const FILL_MODE_FOLLOW_FLIGHT_MODE: u8 = 2;

/// Sentinel for "every arm" / "to the end of the arm".
pub const ALL: u8 = u8::MAX;

/// Colors a single command can carry.
pub const MAX_COLORS: usize = 8;

/// `led_strip_set` exactly as received.
///
/// Addressing, fill mode and arm selection are required; a payload without
/// them does not deserialize. The range fields only matter for fill range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LedStripSet {
    #[serde(default)]
    pub target_system: u8,
    pub target_component: u8,
    pub fill_mode: u8,
    #[serde(default)]
    pub led_index: u8,
    #[serde(default)]
    pub length: u8,
    pub strip_index: u8,
    #[serde(default)]
    pub colors: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripTarget {
    All,
    Arm(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillAction {
    /// Every position of the targeted arms.
    All(Color),
    /// `colors` repeated over `start..start + length`; `None` runs to the arm's end.
    Range {
        start: usize,
        length: Option<usize>,
        colors: Vec<Color>,
    },
    /// Go back to showing the flight mode color.
    FollowFlightMode,
}

/// A decoded, well-formed remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLedCommand {
    pub target: StripTarget,
    pub action: FillAction,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("no color data")]
    MissingColor,
    #[error("{0} colors (max 8)")]
    TooManyColors(usize),
    #[error("color 0x{0:08X} is not 24-bit")]
    InvalidColor(u32),
    #[error("unknown fill mode {0}")]
    UnknownFillMode(u8),
}

impl TryFrom<&LedStripSet> for RemoteLedCommand {
    type Error = DecodeError;

    fn try_from(msg: &LedStripSet) -> Result<Self, DecodeError> {
        let target = match msg.strip_index {
            ALL => StripTarget::All,
            i => StripTarget::Arm(i as usize),
        };
        let action = match msg.fill_mode {
            FILL_MODE_ALL => {
                let colors = decode_colors(msg.colors.as_deref())?;
                FillAction::All(colors[0])
            }
            FILL_MODE_INDEX => FillAction::Range {
                start: msg.led_index as usize,
                length: (msg.length != ALL).then_some(msg.length as usize),
                colors: decode_colors(msg.colors.as_deref())?,
            },
            FILL_MODE_FOLLOW_FLIGHT_MODE => FillAction::FollowFlightMode,
            other => return Err(DecodeError::UnknownFillMode(other)),
        };
        Ok(RemoteLedCommand { target, action })
    }
}

/// Validate the color list. The result is never empty.
fn decode_colors(raw: Option<&[u32]>) -> Result<Vec<Color>, DecodeError> {
    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => return Err(DecodeError::MissingColor),
    };
    if raw.len() > MAX_COLORS {
        return Err(DecodeError::TooManyColors(raw.len()));
    }
    raw.iter()
        .map(|&v| Color::from_packed(v).ok_or(DecodeError::InvalidColor(v)))
        .collect()
}
