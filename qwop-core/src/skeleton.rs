use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
    Torso,
    Head,
    LeftArm,
    LeftForearm,
    LeftThigh,
    LeftCalf,
    LeftFoot,
    RightArm,
    RightForearm,
    RightThigh,
    RightCalf,
    RightFoot,
}

pub const BODY_COUNT: usize = 12;
pub const JOINT_COUNT: usize = 11;

impl BodyPart {
    pub const ALL: [BodyPart; BODY_COUNT] = [
        Self::Torso,
        Self::Head,
        Self::LeftArm,
        Self::LeftForearm,
        Self::LeftThigh,
        Self::LeftCalf,
        Self::LeftFoot,
        Self::RightArm,
        Self::RightForearm,
        Self::RightThigh,
        Self::RightCalf,
        Self::RightFoot,
    ];

    /// Order bodies are inserted into the physics world.
    pub const CREATION_ORDER: [BodyPart; BODY_COUNT] = [
        Self::Torso,
        Self::Head,
        Self::LeftArm,
        Self::RightArm,
        Self::LeftForearm,
        Self::RightForearm,
        Self::LeftThigh,
        Self::RightThigh,
        Self::LeftCalf,
        Self::RightCalf,
        Self::LeftFoot,
        Self::RightFoot,
    ];

    /// Order of the 12 five-value groups in an observation vector.
    pub const OBSERVATION_ORDER: [BodyPart; BODY_COUNT] = [
        Self::Torso,
        Self::Head,
        Self::LeftArm,
        Self::LeftCalf,
        Self::LeftFoot,
        Self::LeftForearm,
        Self::LeftThigh,
        Self::RightArm,
        Self::RightCalf,
        Self::RightFoot,
        Self::RightForearm,
        Self::RightThigh,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Torso => "torso",
            Self::Head => "head",
            Self::LeftArm => "leftArm",
            Self::LeftForearm => "leftForearm",
            Self::LeftThigh => "leftThigh",
            Self::LeftCalf => "leftCalf",
            Self::LeftFoot => "leftFoot",
            Self::RightArm => "rightArm",
            Self::RightForearm => "rightForearm",
            Self::RightThigh => "rightThigh",
            Self::RightCalf => "rightCalf",
            Self::RightFoot => "rightFoot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|part| part.name() == name)
    }

    #[inline]
    pub fn is_foot(self) -> bool {
        matches!(self, Self::LeftFoot | Self::RightFoot)
    }

    /// Parts whose contact with the track counts as a fall.
    #[inline]
    pub fn is_upper_body(self) -> bool {
        matches!(
            self,
            Self::Head | Self::LeftArm | Self::RightArm | Self::LeftForearm | Self::RightForearm
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JointName {
    Neck,
    RightShoulder,
    LeftShoulder,
    RightElbow,
    LeftElbow,
    RightHip,
    LeftHip,
    RightKnee,
    LeftKnee,
    RightAnkle,
    LeftAnkle,
}

impl JointName {
    /// Creation order; also the declaration order of the enum.
    pub const ALL: [JointName; JOINT_COUNT] = [
        Self::Neck,
        Self::RightShoulder,
        Self::LeftShoulder,
        Self::RightElbow,
        Self::LeftElbow,
        Self::RightHip,
        Self::LeftHip,
        Self::RightKnee,
        Self::LeftKnee,
        Self::RightAnkle,
        Self::LeftAnkle,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Neck => "neck",
            Self::RightShoulder => "rightShoulder",
            Self::LeftShoulder => "leftShoulder",
            Self::RightElbow => "rightElbow",
            Self::LeftElbow => "leftElbow",
            Self::RightHip => "rightHip",
            Self::LeftHip => "leftHip",
            Self::RightKnee => "rightKnee",
            Self::LeftKnee => "leftKnee",
            Self::RightAnkle => "rightAnkle",
            Self::LeftAnkle => "leftAnkle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|joint| joint.name() == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    pub part: BodyPart,
    pub position: (f64, f64),
    pub angle: f64,
    pub half_width: f64,
    pub half_height: f64,
    pub friction: f64,
    pub density: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub joint: JointName,
    pub body_a: BodyPart,
    pub body_b: BodyPart,
    /// World-space anchors at spawn, converted to body-local on creation.
    pub anchor_a: (f64, f64),
    pub anchor_b: (f64, f64),
    pub lower_angle: f64,
    pub upper_angle: f64,
    pub reference_angle: f64,
    pub enable_motor: bool,
    pub max_motor_torque: f64,
}

const LIMB_FRICTION: f64 = 0.2;
const LIMB_DENSITY: f64 = 1.0;
const FOOT_FRICTION: f64 = 1.5;
const FOOT_DENSITY: f64 = 3.0;

const fn limb(
    part: BodyPart,
    position: (f64, f64),
    angle: f64,
    half_width: f64,
    half_height: f64,
) -> BodySpec {
    BodySpec {
        part,
        position,
        angle,
        half_width,
        half_height,
        friction: LIMB_FRICTION,
        density: LIMB_DENSITY,
    }
}

const fn foot(
    part: BodyPart,
    position: (f64, f64),
    angle: f64,
    half_width: f64,
    half_height: f64,
) -> BodySpec {
    BodySpec {
        part,
        position,
        angle,
        half_width,
        half_height,
        friction: FOOT_FRICTION,
        density: FOOT_DENSITY,
    }
}

/// Spawn table, indexed by `BodyPart::index`.
pub const BODY_SPECS: [BodySpec; BODY_COUNT] = [
    limb(
        BodyPart::Torso,
        (2.5111726226000157, -1.8709517533957938),
        -1.2514497119301329,
        3.275,
        1.425,
    ),
    limb(
        BodyPart::Head,
        (3.888130278719558, -5.621802929095265),
        0.06448415835225099,
        1.075,
        1.325,
    ),
    limb(
        BodyPart::LeftArm,
        (4.417861014480877, -2.806563606410589),
        0.9040095895272826,
        1.85,
        0.625,
    ),
    limb(
        BodyPart::LeftForearm,
        (5.830008603424893, -2.8733539631159584),
        -1.2049772618421237,
        1.75,
        0.55,
    ),
    limb(
        BodyPart::LeftThigh,
        (2.5648987628203876, 1.648090668682522),
        -2.0177234426823394,
        2.525,
        1.0,
    ),
    limb(
        BodyPart::LeftCalf,
        (3.12585731974087, 5.525511655361298),
        -1.5903971528225265,
        2.5,
        0.75,
    ),
    foot(
        BodyPart::LeftFoot,
        (3.926921842806667, 8.08884032049622),
        0.12027524643408766,
        1.35,
        0.675,
    ),
    limb(
        BodyPart::RightArm,
        (1.1812303663272852, -3.5000256518601014),
        -0.5222217404634386,
        1.95,
        0.75,
    ),
    limb(
        BodyPart::RightForearm,
        (0.4078206420797428, -1.0599953233084172),
        -1.7553358283857299,
        2.225,
        0.675,
    ),
    limb(
        BodyPart::RightThigh,
        (1.6120186135678773, 2.0615320561881516),
        1.4849422964528027,
        2.65,
        1.0,
    ),
    limb(
        BodyPart::RightCalf,
        (-0.07253905736790486, 5.347881871063159),
        -0.7588859967104447,
        2.5,
        0.75,
    ),
    foot(
        BodyPart::RightFoot,
        (-1.1254742643908706, 7.567193169625567),
        0.5897605418219602,
        1.35,
        0.725,
    ),
];

#[allow(clippy::too_many_arguments)]
const fn joint(
    joint: JointName,
    body_a: BodyPart,
    body_b: BodyPart,
    anchor_a: (f64, f64),
    anchor_b: (f64, f64),
    limits: (f64, f64),
    reference_angle: f64,
    enable_motor: bool,
    max_motor_torque: f64,
) -> JointSpec {
    JointSpec {
        joint,
        body_a,
        body_b,
        anchor_a,
        anchor_b,
        lower_angle: limits.0,
        upper_angle: limits.1,
        reference_angle,
        enable_motor,
        max_motor_torque,
    }
}

/// Joint table in creation order, indexed by `JointName::index`.
pub const JOINT_SPECS: [JointSpec; JOINT_COUNT] = [
    joint(
        JointName::Neck,
        BodyPart::Head,
        BodyPart::Torso,
        (3.5885141908253755, -4.526224223627244),
        (3.588733341630704, -4.526434658500262),
        (-0.5, 0.0),
        -1.308996406363529,
        false,
        0.0,
    ),
    joint(
        JointName::RightShoulder,
        BodyPart::RightArm,
        BodyPart::Torso,
        (2.228476821818547, -4.086468732185028),
        (2.228929993886102, -4.08707555939957),
        (-0.5, 1.5),
        -0.7853907065463961,
        true,
        1000.0,
    ),
    joint(
        JointName::LeftShoulder,
        BodyPart::LeftArm,
        BodyPart::Torso,
        (3.6241979856895377, -3.5334881618011442),
        (3.6241778782207157, -3.533950434531982),
        (-2.0, 0.0),
        -2.09438311816829,
        true,
        1000.0,
    ),
    joint(
        JointName::RightElbow,
        BodyPart::RightForearm,
        BodyPart::RightArm,
        (-0.006090859076100963, -2.8004758838752157),
        (-0.0060908611708438976, -2.8004758929205846),
        (-0.1, 0.5),
        1.2968199012274688,
        false,
        0.0,
    ),
    joint(
        JointName::LeftElbow,
        BodyPart::LeftForearm,
        BodyPart::LeftArm,
        (5.525375332758792, -1.63856204930891),
        (5.52537532948459, -1.6385620366077662),
        (-0.1, 0.5),
        2.09438311816829,
        false,
        0.0,
    ),
    joint(
        JointName::RightHip,
        BodyPart::RightThigh,
        BodyPart::Torso,
        (1.2475900729227194, -0.011046642863645761),
        (1.2470052823973599, -0.011635347168778898),
        (-1.3, 0.7),
        -2.719359381718199,
        true,
        6000.0,
    ),
    joint(
        JointName::LeftHip,
        BodyPart::LeftThigh,
        BodyPart::Torso,
        (2.0030339754142847, 0.23737160622781284),
        (2.003367181376716, 0.23802590387419476),
        (-1.5, 0.5),
        0.7258477508944043,
        true,
        6000.0,
    ),
    joint(
        JointName::RightKnee,
        BodyPart::RightCalf,
        BodyPart::RightThigh,
        (1.4982369235492752, 4.175600306005656),
        (1.4982043532615996, 4.17493520671361),
        (-1.3, 0.3),
        2.2893406247158676,
        true,
        3000.0,
    ),
    joint(
        JointName::LeftKnee,
        BodyPart::LeftCalf,
        BodyPart::LeftThigh,
        (3.384323411985692, 3.5168931240916876),
        (3.3844684376952108, 3.5174122997898016),
        (-1.6, 0.0),
        -0.3953113764119829,
        true,
        3000.0,
    ),
    joint(
        JointName::RightAnkle,
        BodyPart::RightFoot,
        BodyPart::RightCalf,
        (-1.6562855402197227, 6.961551452557676),
        (-1.655726670462596, 6.961493826969391),
        (-0.5, 0.5),
        -1.5708045825942758,
        false,
        2000.0,
    ),
    joint(
        JointName::LeftAnkle,
        BodyPart::LeftFoot,
        BodyPart::LeftCalf,
        (3.312322507818897, 7.947704853895541),
        (3.3123224825088817, 7.947704836256229),
        (-0.5, 0.5),
        -1.7244327585010226,
        false,
        2000.0,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_indexed_by_enum_position() {
        for part in BodyPart::ALL {
            assert_eq!(BODY_SPECS[part.index()].part, part);
        }
        for joint in JointName::ALL {
            assert_eq!(JOINT_SPECS[joint.index()].joint, joint);
        }
    }

    #[test]
    fn names_roundtrip() {
        for part in BodyPart::ALL {
            assert_eq!(BodyPart::from_name(part.name()), Some(part));
        }
        for joint in JointName::ALL {
            assert_eq!(JointName::from_name(joint.name()), Some(joint));
        }
        assert_eq!(BodyPart::from_name("hurdleTop"), None);
        assert_eq!(JointName::from_name("Neck"), None);
    }

    #[test]
    fn orders_cover_every_body_once() {
        for order in [BodyPart::CREATION_ORDER, BodyPart::OBSERVATION_ORDER] {
            let mut seen = [false; BODY_COUNT];
            for part in order {
                assert!(!seen[part.index()], "{} listed twice", part.name());
                seen[part.index()] = true;
            }
            assert!(seen.iter().all(|s| *s));
        }
    }

    #[test]
    fn feet_are_heavier_and_grippier() {
        for spec in BODY_SPECS {
            if spec.part.is_foot() {
                assert_eq!((spec.friction, spec.density), (1.5, 3.0));
            } else {
                assert_eq!((spec.friction, spec.density), (0.2, 1.0));
            }
        }
    }

    #[test]
    fn every_joint_limit_is_ordered() {
        for spec in JOINT_SPECS {
            assert!(spec.lower_angle <= spec.upper_angle, "{}", spec.joint.name());
        }
    }
}
