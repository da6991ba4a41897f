use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::ActionMapper;
use crate::config::SimConfig;
use crate::constants::{
    CAMERA_HORIZONTAL_OFFSET, CAMERA_VERTICAL_OFFSET_PX, CAMERA_VERTICAL_THRESHOLD,
    HEAD_TORQUE_FACTOR, HEAD_TORQUE_OFFSET, INITIAL_CAMERA_X_PX, INITIAL_CAMERA_Y_PX,
    OUTCOME_FALLEN, OUTCOME_GAME_ENDED, OUTCOME_JUMPED, OUTCOME_JUMP_LANDED,
    SPEED_WINDOW_CAPACITY, WORLD_SCALE,
};
use crate::contact::{score_for, ContactStateMachine, GameState};
use crate::controls::ControlState;
use crate::env::{EnvConfig, QwopEnv};
use crate::error::SimError;
use crate::observation::{extract_raw, Observation};
use crate::skeleton::BodyPart;
use crate::world::{BodyState, RigidBodyWorld};

mod game;

pub use game::SimulationLoop;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodePhase {
    #[default]
    NotStarted,
    Running,
    Paused,
    Ended,
}

impl EpisodePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }
}

/// Camera offset in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: INITIAL_CAMERA_X_PX,
            y: INITIAL_CAMERA_Y_PX,
        }
    }
}

/// Loop-level view of one simulation, for logs and reports.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoopSnapshot {
    pub phase: EpisodePhase,
    pub game: GameState,
    pub score_time: f64,
    pub camera: Camera,
    pub average_speed: f64,
    pub ticks: u64,
}

/// Packs the four latch flags into the trace outcome byte.
pub fn outcome_flags(state: &GameState) -> u8 {
    let mut flags = 0;
    if state.fallen {
        flags |= OUTCOME_FALLEN;
    }
    if state.jumped {
        flags |= OUTCOME_JUMPED;
    }
    if state.jump_landed {
        flags |= OUTCOME_JUMP_LANDED;
    }
    if state.game_ended {
        flags |= OUTCOME_GAME_ENDED;
    }
    flags
}

/// Score in whole decimetres, as stored in trace footers.
#[inline]
pub fn score_decimetres(score: f64) -> i32 {
    (score * 10.0).round() as i32
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    pub step_count: u32,
    pub final_score: f64,
    pub score_decimetres: i32,
    pub outcome_flags: u8,
    pub total_reward: f64,
    pub score_time: f64,
}

/// Per-step sample for trajectory comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayCheckpoint {
    pub step: u32,
    pub score: f64,
    pub reward: f64,
    pub done: bool,
    pub outcome_flags: u8,
    /// One entry per body in observation order.
    pub bodies: Vec<BodyState>,
}

impl ReplayCheckpoint {
    fn capture(env: &QwopEnv, step: u32, reward: f64, done: bool) -> Self {
        let sim = env.sim();
        Self {
            step,
            score: sim.game_state().score,
            reward,
            done,
            outcome_flags: outcome_flags(&sim.game_state()),
            bodies: BodyPart::OBSERVATION_ORDER
                .iter()
                .map(|part| sim.body_state(*part))
                .collect(),
        }
    }
}

/// Runs `actions` from a fresh episode until they run out or the episode ends.
pub fn replay(config: &EnvConfig, actions: &[u8]) -> Result<ReplayResult, SimError> {
    let mut env = QwopEnv::new(config.clone())?;
    env.reset(config.seed);

    for action in actions {
        let step = env.step(*action as usize)?;
        if step.done {
            break;
        }
    }

    Ok(env.replay_result())
}

/// Like `replay`, sampling a checkpoint at reset, every `sample_every` steps and at the last step.
pub fn replay_with_checkpoints(
    config: &EnvConfig,
    actions: &[u8],
    sample_every: u32,
) -> Result<Vec<ReplayCheckpoint>, SimError> {
    let mut env = QwopEnv::new(config.clone())?;
    env.reset(config.seed);
    let stride = if sample_every == 0 { 1 } else { sample_every };
    let total_steps = actions.len() as u32;
    let mut checkpoints = vec![ReplayCheckpoint::capture(&env, 0, 0.0, false)];

    for (index, action) in actions.iter().enumerate() {
        let outcome = env.step(*action as usize)?;
        let step = (index + 1) as u32;
        if step.is_multiple_of(stride) || step == total_steps || outcome.done {
            checkpoints.push(ReplayCheckpoint::capture(&env, step, outcome.reward, outcome.done));
        }
        if outcome.done {
            break;
        }
    }

    Ok(checkpoints)
}
