/// Vehicle flight modes as reported over the link.
///
/// Names are snake_case on the wire (`position_control`, also `posctl`).
/// Anything the autopilot reports that we don't know decodes to `Unknown`
/// instead of failing.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightMode {
    Manual,
    #[serde(alias = "posctl")]
    PositionControl,
    #[serde(alias = "altctl")]
    AltitudeControl,
    Mission,
    Hold,
    Offboard,
    Acro,
    Stabilized,
    FollowMe,
    Land,
    Rattitude,
    Ready,
    #[serde(alias = "rtl")]
    ReturnToLaunch,
    Takeoff,
    #[serde(other)]
    Unknown,
}

impl FlightMode {
    pub const COUNT: usize = 15;

    pub const ALL: [FlightMode; Self::COUNT] = [
        FlightMode::Manual,
        FlightMode::PositionControl,
        FlightMode::AltitudeControl,
        FlightMode::Mission,
        FlightMode::Hold,
        FlightMode::Offboard,
        FlightMode::Acro,
        FlightMode::Stabilized,
        FlightMode::FollowMe,
        FlightMode::Land,
        FlightMode::Rattitude,
        FlightMode::Ready,
        FlightMode::ReturnToLaunch,
        FlightMode::Takeoff,
        FlightMode::Unknown,
    ];

    /// Dense index into per-mode tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FlightMode::Manual => "manual",
            FlightMode::PositionControl => "position_control",
            FlightMode::AltitudeControl => "altitude_control",
            FlightMode::Mission => "mission",
            FlightMode::Hold => "hold",
            FlightMode::Offboard => "offboard",
            FlightMode::Acro => "acro",
            FlightMode::Stabilized => "stabilized",
            FlightMode::FollowMe => "follow_me",
            FlightMode::Land => "land",
            FlightMode::Rattitude => "rattitude",
            FlightMode::Ready => "ready",
            FlightMode::ReturnToLaunch => "return_to_launch",
            FlightMode::Takeoff => "takeoff",
            FlightMode::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FlightMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense() {
        for (i, mode) in FlightMode::ALL.iter().enumerate() {
            assert_eq!(mode.index(), i);
        }
    }

    #[test]
    fn wire_names_match_display() {
        for mode in FlightMode::ALL {
            let json = format!("\"{mode}\"");
            assert_eq!(serde_json::from_str::<FlightMode>(&json).unwrap(), mode);
        }
    }

    #[test]
    fn aliases() {
        let parse = |s: &str| serde_json::from_str::<FlightMode>(&format!("\"{s}\"")).unwrap();
        assert_eq!(parse("posctl"), FlightMode::PositionControl);
        assert_eq!(parse("rtl"), FlightMode::ReturnToLaunch);
        assert_eq!(parse("hold"), FlightMode::Hold);
    }

    #[test]
    fn deserialize_unknown_name() {
        let mode: FlightMode = serde_json::from_str("\"altctl\"").unwrap();
        assert_eq!(mode, FlightMode::AltitudeControl);
        let mode: FlightMode = serde_json::from_str("\"precision_land\"").unwrap();
        assert_eq!(mode, FlightMode::Unknown);
    }
}
