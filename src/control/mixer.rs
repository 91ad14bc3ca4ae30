//! Wheel power mixing for a four-wheel base

use crate::common::WheelPowers;

/// Tank mixing: `(left, right) = (drive - turn, drive + turn)`
pub fn mix_tank(drive: f64, turn: f64) -> (f64, f64) {
    (drive - turn, drive + turn)
}

/// Lateral move by differential side thrust, positive to the right.
///
/// Not true omnidirectional strafing; the distance covered is calibrated empirically.
pub fn mix_strafe(power: f64) -> WheelPowers {
    WheelPowers {
        front_left: -power,
        back_left: power,
        front_right: power,
        back_right: -power,
    }
}

/// Combines the drive, turn and strafe channels into four wheel powers
#[derive(Debug, Default, Clone, Copy)]
pub struct DriveMixer;

impl DriveMixer {
    pub fn new() -> Self {
        DriveMixer
    }

    /// Sum the tank and strafe contributions and clamp each wheel to [-1, 1]
    pub fn mix(&self, drive: f64, turn: f64, strafe: f64) -> WheelPowers {
        let (left, right) = mix_tank(drive, turn);
        let lateral = mix_strafe(strafe);
        WheelPowers {
            front_left: left + lateral.front_left,
            back_left: left + lateral.back_left,
            front_right: right + lateral.front_right,
            back_right: right + lateral.back_right,
        }
        .clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tank_mix() {
        assert_eq!(mix_tank(0.5, 0.25), (0.25, 0.75));
        assert_eq!(mix_tank(0.0, -0.3), (0.3, -0.3));
    }

    #[test]
    fn test_same_side_wheels_match() {
        let powers = DriveMixer::new().mix(0.2, 0.1, 0.0);
        assert_eq!(powers.front_left, powers.back_left);
        assert_eq!(powers.front_right, powers.back_right);
    }

    #[test]
    fn test_strafe_pattern() {
        let powers = DriveMixer::new().mix(0.0, 0.0, 0.28);
        assert_eq!(powers, mix_strafe(0.28));
        assert_eq!(powers.front_left, -0.28);
        assert_eq!(powers.back_left, 0.28);
        assert_eq!(powers.front_right, 0.28);
        assert_eq!(powers.back_right, -0.28);
    }

    #[test]
    fn test_output_is_clamped() {
        let powers = DriveMixer::new().mix(0.9, 0.8, 0.0);
        assert_eq!(powers.front_right, 1.0);
        assert!((powers.front_left - 0.1).abs() < 1e-12);
    }
}
