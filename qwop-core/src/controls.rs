use serde::{Deserialize, Serialize};

use crate::constants::{
    ELBOW_SPEED, HIP_SPEED, KNEE_SPEED, LEFT_HIP_LIMITS_DEFAULT, LEFT_HIP_LIMITS_O,
    LEFT_HIP_LIMITS_P, RIGHT_HIP_LIMITS_DEFAULT, RIGHT_HIP_LIMITS_O, RIGHT_HIP_LIMITS_P,
    SHOULDER_SPEED,
};
use crate::skeleton::JointName;
use crate::world::RigidBodyWorld;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Q,
    W,
    O,
    P,
}

impl Key {
    /// Case-insensitive; anything other than q/w/o/p is not a control key.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'q' => Some(Self::Q),
            'w' => Some(Self::W),
            'o' => Some(Self::O),
            'p' => Some(Self::P),
            _ => None,
        }
    }
}

/// One axis state's effect on the joints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisCommand {
    pub motor_speeds: &'static [(JointName, f64)],
    pub hip_limits: Option<[(JointName, (f64, f64)); 2]>,
}

const THIGHS_Q: AxisCommand = AxisCommand {
    motor_speeds: &[
        (JointName::RightHip, HIP_SPEED),
        (JointName::LeftHip, -HIP_SPEED),
        (JointName::RightShoulder, -SHOULDER_SPEED),
        (JointName::LeftShoulder, SHOULDER_SPEED),
        (JointName::RightElbow, -ELBOW_SPEED),
        (JointName::LeftElbow, -ELBOW_SPEED),
    ],
    hip_limits: None,
};

const THIGHS_W: AxisCommand = AxisCommand {
    motor_speeds: &[
        (JointName::RightHip, -HIP_SPEED),
        (JointName::LeftHip, HIP_SPEED),
        (JointName::RightShoulder, SHOULDER_SPEED),
        (JointName::LeftShoulder, -SHOULDER_SPEED),
        (JointName::RightElbow, ELBOW_SPEED),
        (JointName::LeftElbow, ELBOW_SPEED),
    ],
    hip_limits: None,
};

const THIGHS_IDLE: AxisCommand = AxisCommand {
    motor_speeds: &[
        (JointName::RightHip, 0.0),
        (JointName::LeftHip, 0.0),
        (JointName::RightShoulder, 0.0),
        (JointName::LeftShoulder, 0.0),
    ],
    hip_limits: None,
};

const CALVES_O: AxisCommand = AxisCommand {
    motor_speeds: &[
        (JointName::RightKnee, KNEE_SPEED),
        (JointName::LeftKnee, -KNEE_SPEED),
    ],
    hip_limits: Some([
        (JointName::LeftHip, LEFT_HIP_LIMITS_O),
        (JointName::RightHip, RIGHT_HIP_LIMITS_O),
    ]),
};

const CALVES_P: AxisCommand = AxisCommand {
    motor_speeds: &[
        (JointName::RightKnee, -KNEE_SPEED),
        (JointName::LeftKnee, KNEE_SPEED),
    ],
    hip_limits: Some([
        (JointName::LeftHip, LEFT_HIP_LIMITS_P),
        (JointName::RightHip, RIGHT_HIP_LIMITS_P),
    ]),
};

const CALVES_IDLE: AxisCommand = AxisCommand {
    motor_speeds: &[(JointName::RightKnee, 0.0), (JointName::LeftKnee, 0.0)],
    hip_limits: Some([
        (JointName::LeftHip, LEFT_HIP_LIMITS_DEFAULT),
        (JointName::RightHip, RIGHT_HIP_LIMITS_DEFAULT),
    ]),
};

// Indexed by (first << 1) | second; the first key of an axis wins ties.
const THIGH_AXIS: [AxisCommand; 4] = [THIGHS_IDLE, THIGHS_W, THIGHS_Q, THIGHS_Q];
const CALF_AXIS: [AxisCommand; 4] = [CALVES_IDLE, CALVES_P, CALVES_O, CALVES_O];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlState {
    pub q: bool,
    pub w: bool,
    pub o: bool,
    pub p: bool,
}

impl ControlState {
    pub const fn new(q: bool, w: bool, o: bool, p: bool) -> Self {
        Self { q, w, o, p }
    }

    pub fn set(&mut self, key: Key, down: bool) {
        match key {
            Key::Q => self.q = down,
            Key::W => self.w = down,
            Key::O => self.o = down,
            Key::P => self.p = down,
        }
    }

    /// Returns true when `c` is a control key.
    pub fn key_down(&mut self, c: char) -> bool {
        match Key::from_char(c) {
            Some(key) => {
                self.set(key, true);
                true
            }
            None => false,
        }
    }

    pub fn key_up(&mut self, c: char) -> bool {
        match Key::from_char(c) {
            Some(key) => {
                self.set(key, false);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn any(&self) -> bool {
        self.q || self.w || self.o || self.p
    }

    #[inline]
    pub fn thigh_command(&self) -> &'static AxisCommand {
        &THIGH_AXIS[((self.q as usize) << 1) | self.w as usize]
    }

    #[inline]
    pub fn calf_command(&self) -> &'static AxisCommand {
        &CALF_AXIS[((self.o as usize) << 1) | self.p as usize]
    }

    /// Writes motor speeds (and hip limits for the o/p axis) for the current keys.
    pub fn apply(&self, world: &mut RigidBodyWorld) {
        for command in [self.thigh_command(), self.calf_command()] {
            for (joint, speed) in command.motor_speeds {
                world.set_motor_speed(*joint, *speed);
            }
            if let Some(limits) = command.hip_limits {
                for (joint, (lower, upper)) in limits {
                    world.set_limits(joint, lower, upper);
                }
            }
        }
    }

    /// Canonical label such as "QP"; "none" when no key is held.
    pub fn label(&self) -> &'static str {
        const LABELS: [&str; 16] = [
            "none", "P", "O", "OP", "W", "WP", "WO", "WOP", "Q", "QP", "QO", "QOP", "QW", "QWP",
            "QWO", "QWOP",
        ];
        let bits = (self.q as usize) << 3
            | (self.w as usize) << 2
            | (self.o as usize) << 1
            | self.p as usize;
        LABELS[bits]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn world() -> RigidBodyWorld {
        let mut world = RigidBodyWorld::new(SimConfig::default());
        world.initialize();
        world
    }

    fn motor_snapshot(world: &RigidBodyWorld) -> Vec<f64> {
        JointName::ALL
            .iter()
            .map(|joint| world.motor_speed(*joint))
            .collect()
    }

    #[test]
    fn keys_are_case_insensitive() {
        let mut controls = ControlState::default();
        assert!(controls.key_down('Q'));
        assert!(controls.key_down('p'));
        assert!(!controls.key_down('x'));
        assert_eq!(controls, ControlState::new(true, false, false, true));
        assert!(controls.key_up('q'));
        assert_eq!(controls, ControlState::new(false, false, false, true));
        controls.reset();
        assert!(!controls.any());
    }

    #[test]
    fn first_key_on_each_axis_wins() {
        let both = ControlState::new(true, true, true, true);
        let firsts = ControlState::new(true, false, true, false);
        assert_eq!(both.thigh_command(), firsts.thigh_command());
        assert_eq!(both.calf_command(), firsts.calf_command());
    }

    #[test]
    fn q_drives_hips_shoulders_and_elbows() {
        let mut world = world();
        ControlState::new(true, false, false, false).apply(&mut world);
        assert_eq!(world.motor_speed(JointName::RightHip), 2.5);
        assert_eq!(world.motor_speed(JointName::LeftHip), -2.5);
        assert_eq!(world.motor_speed(JointName::RightShoulder), -2.0);
        assert_eq!(world.motor_speed(JointName::LeftShoulder), 2.0);
        assert_eq!(world.motor_speed(JointName::RightElbow), -10.0);
        assert_eq!(world.motor_speed(JointName::LeftElbow), -10.0);
    }

    #[test]
    fn w_is_q_mirrored() {
        let mut world = world();
        ControlState::new(false, true, false, false).apply(&mut world);
        assert_eq!(world.motor_speed(JointName::RightHip), -2.5);
        assert_eq!(world.motor_speed(JointName::LeftHip), 2.5);
        assert_eq!(world.motor_speed(JointName::LeftElbow), 10.0);
    }

    #[test]
    fn releasing_thigh_keys_keeps_elbow_speed() {
        let mut world = world();
        ControlState::new(true, false, false, false).apply(&mut world);
        ControlState::default().apply(&mut world);
        assert_eq!(world.motor_speed(JointName::RightHip), 0.0);
        assert_eq!(world.motor_speed(JointName::LeftShoulder), 0.0);
        assert_eq!(world.motor_speed(JointName::RightElbow), -10.0);
    }

    #[test]
    fn o_and_p_swap_knees_and_hip_limits() {
        let mut world = world();
        ControlState::new(false, false, true, false).apply(&mut world);
        assert_eq!(world.motor_speed(JointName::RightKnee), 2.5);
        assert_eq!(world.motor_speed(JointName::LeftKnee), -2.5);
        assert_eq!(world.limits(JointName::LeftHip), (-1.0, 1.0));
        assert_eq!(world.limits(JointName::RightHip), (-1.3f32 as f64, 0.7f32 as f64));

        ControlState::new(false, false, false, true).apply(&mut world);
        assert_eq!(world.motor_speed(JointName::RightKnee), -2.5);
        assert_eq!(world.limits(JointName::LeftHip), (-1.5, 0.5));
        assert_eq!(world.limits(JointName::RightHip), (-0.8f32 as f64, 1.2f32 as f64));

        ControlState::default().apply(&mut world);
        assert_eq!(world.motor_speed(JointName::LeftKnee), 0.0);
        assert_eq!(world.limits(JointName::RightHip), (-1.3f32 as f64, 0.7f32 as f64));
    }

    #[test]
    fn precedence_holds_on_live_joints() {
        let mut both = world();
        let mut firsts = world();
        ControlState::new(true, true, true, true).apply(&mut both);
        ControlState::new(true, false, true, false).apply(&mut firsts);
        assert_eq!(motor_snapshot(&both), motor_snapshot(&firsts));
        assert_eq!(both.limits(JointName::LeftHip), firsts.limits(JointName::LeftHip));
    }

    #[test]
    fn labels() {
        assert_eq!(ControlState::default().label(), "none");
        assert_eq!(ControlState::new(true, false, false, true).label(), "QP");
    }
}
