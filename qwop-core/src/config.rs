use serde::{Deserialize, Serialize};

use crate::constants::{
    CATEGORY_GROUND, CATEGORY_PLAYER, GRAVITY_X, GRAVITY_Y, GROUND_SEGMENTS, MASK_ALL,
    MASK_NO_SELF, PHYSICS_TIMESTEP, POSITION_ITERATIONS, SCREEN_WIDTH_PX, TRACK_DENSITY,
    TRACK_FRICTION, TRACK_HALF_HEIGHT, TRACK_Y, VELOCITY_ITERATIONS, WORLD_SCALE,
};
use crate::error::SimError;
use crate::skeleton::{BodySpec, JointSpec, BODY_COUNT, BODY_SPECS, JOINT_COUNT, JOINT_SPECS};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    pub segments: usize,
    pub y: f64,
    pub half_height: f64,
    pub friction: f64,
    pub density: f64,
    pub category_bits: u16,
    pub mask_bits: u16,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            segments: GROUND_SEGMENTS,
            y: TRACK_Y,
            half_height: TRACK_HALF_HEIGHT,
            friction: TRACK_FRICTION,
            density: TRACK_DENSITY,
            category_bits: CATEGORY_GROUND,
            mask_bits: MASK_ALL,
        }
    }
}

/// Static world description handed to `RigidBodyWorld` at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub gravity: (f64, f64),
    pub timestep: f64,
    pub velocity_iterations: i32,
    pub position_iterations: i32,
    pub world_scale: f64,
    pub screen_width: f64,
    pub track: TrackConfig,
    pub player_category_bits: u16,
    pub player_mask_bits: u16,
    pub bodies: Vec<BodySpec>,
    pub joints: Vec<JointSpec>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravity: (GRAVITY_X, GRAVITY_Y),
            timestep: PHYSICS_TIMESTEP,
            velocity_iterations: VELOCITY_ITERATIONS,
            position_iterations: POSITION_ITERATIONS,
            world_scale: WORLD_SCALE,
            screen_width: SCREEN_WIDTH_PX,
            track: TrackConfig::default(),
            player_category_bits: CATEGORY_PLAYER,
            player_mask_bits: MASK_NO_SELF,
            bodies: BODY_SPECS.to_vec(),
            joints: JOINT_SPECS.to_vec(),
        }
    }
}

impl SimConfig {
    /// Width of one ground segment in metres.
    #[inline]
    pub fn segment_width(&self) -> f64 {
        self.screen_width / self.world_scale
    }

    /// Checks the tables are complete and indexed the way the world expects.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.bodies.len() != BODY_COUNT {
            return Err(SimError::BodyTableSize {
                expected: BODY_COUNT,
                actual: self.bodies.len(),
            });
        }
        if self.joints.len() != JOINT_COUNT {
            return Err(SimError::JointTableSize {
                expected: JOINT_COUNT,
                actual: self.joints.len(),
            });
        }
        for (index, spec) in self.bodies.iter().enumerate() {
            if spec.part.index() != index {
                return Err(SimError::TableOrder {
                    entry: spec.part.name(),
                });
            }
        }
        for (index, spec) in self.joints.iter().enumerate() {
            if spec.joint.index() != index {
                return Err(SimError::TableOrder {
                    entry: spec.joint.name(),
                });
            }
        }
        if self.timestep.is_nan() || self.timestep <= 0.0 {
            return Err(SimError::InvalidTimestep {
                timestep: self.timestep,
            });
        }
        Ok(())
    }
}
