use crate::constants::{
    OBSERVATION_LEN, OBS_ANGLE_RANGE, OBS_POS_X_RANGE, OBS_POS_Y_RANGE, OBS_VEL_X_RANGE,
    OBS_VEL_Y_RANGE,
};
use crate::skeleton::BodyPart;
use crate::world::RigidBodyWorld;

pub type Observation = [f64; OBSERVATION_LEN];

/// Per-body component ranges, in the order (x, y, angle, vx, vy).
pub const COMPONENT_RANGES: [(f64, f64); 5] = [
    OBS_POS_X_RANGE,
    OBS_POS_Y_RANGE,
    OBS_ANGLE_RANGE,
    OBS_VEL_X_RANGE,
    OBS_VEL_Y_RANGE,
];

/// Raw body states, five values per body in `BodyPart::OBSERVATION_ORDER`.
pub fn extract_raw(world: &RigidBodyWorld) -> Observation {
    let mut out = [0.0; OBSERVATION_LEN];
    for (i, part) in BodyPart::OBSERVATION_ORDER.iter().enumerate() {
        let state = world.body_state(*part);
        out[i * 5..i * 5 + 5].copy_from_slice(&[state.x, state.y, state.angle, state.vx, state.vy]);
    }
    out
}

#[inline]
fn centre_and_deviation((lo, hi): (f64, f64)) -> (f64, f64) {
    let centre = (lo + hi) / 2.0;
    (centre, hi - centre)
}

/// Maps each value into [-1, 1] around the centre of its range; values outside are clipped.
pub fn normalize(raw: &Observation) -> Observation {
    let mut out = [0.0; OBSERVATION_LEN];
    for (i, value) in raw.iter().enumerate() {
        let (centre, deviation) = centre_and_deviation(COMPONENT_RANGES[i % 5]);
        out[i] = ((value - centre) / deviation).clamp(-1.0, 1.0);
    }
    out
}

pub fn denormalize(normalized: &Observation) -> Observation {
    let mut out = [0.0; OBSERVATION_LEN];
    for (i, value) in normalized.iter().enumerate() {
        let (centre, deviation) = centre_and_deviation(COMPONENT_RANGES[i % 5]);
        out[i] = value * deviation + centre;
    }
    out
}

pub fn observe(world: &RigidBodyWorld) -> Observation {
    normalize(&extract_raw(world))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::skeleton::BODY_SPECS;

    #[test]
    fn spawn_observation_follows_fixed_order() {
        let mut world = RigidBodyWorld::new(SimConfig::default());
        world.initialize();
        let raw = extract_raw(&world);
        for (i, part) in BodyPart::OBSERVATION_ORDER.iter().enumerate() {
            let spec = BODY_SPECS[part.index()];
            assert!((raw[i * 5] - spec.position.0).abs() < 1e-6);
            assert!((raw[i * 5 + 1] - spec.position.1).abs() < 1e-6);
            assert!((raw[i * 5 + 2] - spec.angle).abs() < 1e-6);
            assert_eq!(raw[i * 5 + 3], 0.0);
            assert_eq!(raw[i * 5 + 4], 0.0);
        }
    }

    #[test]
    fn normalize_centres_and_clips() {
        let mut raw = [0.0; OBSERVATION_LEN];
        raw[0] = 520.0; // centre of the x range
        raw[1] = 25.0;
        raw[2] = -6.0;
        raw[3] = 60.0;
        raw[4] = -1_000.0;
        let obs = normalize(&raw);
        assert_eq!(obs[0], 0.0);
        assert_eq!(obs[1], 1.0);
        assert_eq!(obs[2], -1.0);
        assert_eq!(obs[3], 1.0);
        assert_eq!(obs[4], -1.0);
        assert!(obs.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn denormalize_inverts_in_range_values() {
        let mut raw = [0.0; OBSERVATION_LEN];
        for (i, value) in raw.iter_mut().enumerate() {
            let (lo, hi) = COMPONENT_RANGES[i % 5];
            *value = lo + (hi - lo) * (i as f64 / OBSERVATION_LEN as f64);
        }
        let back = denormalize(&normalize(&raw));
        for (a, b) in raw.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
