use serde::{Deserialize, Serialize};

use crate::actions::ActionMapper;
use crate::config::SimConfig;
use crate::constants::{
    DEFAULT_FAILURE_COST, DEFAULT_SPEED_REW_MULT, DEFAULT_SUCCESS_REWARD, DEFAULT_TIME_COST_MULT,
    MIN_REWARD_DT, PROTOCOL_CLOCK_HZ,
};
use crate::error::SimError;
use crate::observation::{normalize, Observation};
use crate::sim::{outcome_flags, score_decimetres, ReplayResult, SimulationLoop};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMode {
    /// Forward speed minus a time cost.
    #[default]
    Velocity,
    /// Metres gained minus a time cost.
    Distance,
}

/// Which clock the reward's dt is measured on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardClock {
    /// Simulated time elapsed during the step.
    #[default]
    Sim,
    /// Fixed 30 Hz browser clock, scaled by 1/10.
    #[serde(rename = "protocol_30hz")]
    Protocol30Hz,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub seed: u32,
    pub frames_per_step: u32,
    pub reduced_action_set: bool,
    pub failure_cost: f64,
    pub success_reward: f64,
    pub time_cost_mult: f64,
    pub speed_rew_mult: f64,
    pub reward_mode: RewardMode,
    pub distance_rew_mult: f64,
    pub time_cost_mult_distance: f64,
    pub reward_dt_mode: RewardClock,
    /// Steps after which `truncated` is reported; `None` never truncates.
    pub max_episode_steps: Option<u32>,
    pub sim: SimConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            frames_per_step: 1,
            reduced_action_set: false,
            failure_cost: DEFAULT_FAILURE_COST,
            success_reward: DEFAULT_SUCCESS_REWARD,
            time_cost_mult: DEFAULT_TIME_COST_MULT,
            speed_rew_mult: DEFAULT_SPEED_REW_MULT,
            reward_mode: RewardMode::Velocity,
            distance_rew_mult: 1.0,
            time_cost_mult_distance: 0.0,
            reward_dt_mode: RewardClock::Sim,
            max_episode_steps: None,
            sim: SimConfig::default(),
        }
    }
}

impl EnvConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.frames_per_step == 0 || self.frames_per_step > u8::MAX as u32 {
            return Err(SimError::InvalidFramesPerStep {
                frames_per_step: self.frames_per_step,
            });
        }
        self.sim.validate()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub time: f64,
    pub distance: f64,
    pub avgspeed: f64,
    pub is_success: bool,
    pub fallen: bool,
    pub jumped: bool,
    pub jump_landed: bool,
    pub game_ended: bool,
    pub episode_steps: u32,
    pub total_reward: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Episode wrapper with frameskip, discrete actions and shaped reward.
pub struct QwopEnv {
    config: EnvConfig,
    mapper: ActionMapper,
    sim: SimulationLoop,
    last_distance: f64,
    last_time: f64,
    episode_steps: u32,
    total_reward: f64,
}

impl QwopEnv {
    pub fn new(config: EnvConfig) -> Result<Self, SimError> {
        config.validate()?;
        let sim = SimulationLoop::new(config.sim.clone(), config.seed)?;
        Ok(Self {
            mapper: ActionMapper::new(config.reduced_action_set),
            sim,
            config,
            last_distance: 0.0,
            last_time: 0.0,
            episode_steps: 0,
            total_reward: 0.0,
        })
    }

    /// Resets the simulation and starts the episode immediately.
    pub fn reset(&mut self, seed: u32) -> (Observation, StepInfo) {
        self.config.seed = seed;
        self.sim.reset(Some(seed));
        self.sim.start();

        self.last_distance = 0.0;
        self.last_time = 0.0;
        self.episode_steps = 0;
        self.total_reward = 0.0;

        (self.observation(), self.info())
    }

    pub fn step(&mut self, action: usize) -> Result<StepOutcome, SimError> {
        if self.sim.is_ended() {
            return Err(SimError::EpisodeEnded);
        }
        self.sim.apply_action(&self.mapper, action)?;

        let timestep = self.config.sim.timestep;
        for _ in 0..self.config.frames_per_step {
            if self.sim.is_ended() {
                break;
            }
            self.sim.update(timestep);
        }

        let reward = self.reward();
        self.total_reward += reward;
        self.episode_steps += 1;

        let truncated = self
            .config
            .max_episode_steps
            .is_some_and(|max| self.episode_steps >= max);

        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            done: self.sim.is_ended(),
            truncated,
            info: self.info(),
        })
    }

    fn reward(&mut self) -> f64 {
        let state = self.sim.game_state();
        let distance = state.score;
        let time = self.sim.score_time();
        let frames = self.config.frames_per_step as f64;
        let ds = distance - self.last_distance;

        let dt = match self.config.reward_dt_mode {
            RewardClock::Protocol30Hz => frames * (1.0 / PROTOCOL_CLOCK_HZ) / 10.0,
            RewardClock::Sim => time - self.last_time,
        }
        .max(MIN_REWARD_DT);

        let mut reward = match self.config.reward_mode {
            RewardMode::Velocity => {
                (ds / dt) * self.config.speed_rew_mult - self.config.time_cost_mult * dt / frames
            }
            RewardMode::Distance => {
                ds * self.config.distance_rew_mult
                    - self.config.time_cost_mult_distance * dt / frames
            }
        };

        if state.game_ended {
            if state.is_success() {
                reward += self.config.success_reward;
            } else {
                reward -= self.config.failure_cost;
            }
        }

        self.last_distance = distance;
        if self.config.reward_dt_mode == RewardClock::Sim {
            self.last_time = time;
        }
        reward
    }

    pub fn info(&self) -> StepInfo {
        let state = self.sim.game_state();
        let time = self.sim.score_time();
        StepInfo {
            time: match self.config.reward_dt_mode {
                RewardClock::Sim => time,
                RewardClock::Protocol30Hz => time / 10.0,
            },
            distance: state.score,
            avgspeed: if time > 0.0 {
                10.0 * state.score / time
            } else {
                0.0
            },
            is_success: state.is_success(),
            fallen: state.fallen,
            jumped: state.jumped,
            jump_landed: state.jump_landed,
            game_ended: state.game_ended,
            episode_steps: self.episode_steps,
            total_reward: self.total_reward,
        }
    }

    pub fn observation(&self) -> Observation {
        normalize(&self.sim.raw_observation())
    }

    pub fn raw_observation(&self) -> Observation {
        self.sim.raw_observation()
    }

    pub fn replay_result(&self) -> ReplayResult {
        let state = self.sim.game_state();
        ReplayResult {
            step_count: self.episode_steps,
            final_score: state.score,
            score_decimetres: score_decimetres(state.score),
            outcome_flags: outcome_flags(&state),
            total_reward: self.total_reward,
            score_time: self.sim.score_time(),
        }
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn mapper(&self) -> &ActionMapper {
        &self.mapper
    }

    pub fn num_actions(&self) -> usize {
        self.mapper.num_actions()
    }

    pub fn sim(&self) -> &SimulationLoop {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut SimulationLoop {
        &mut self.sim
    }

    pub fn is_done(&self) -> bool {
        self.sim.is_ended()
    }
}
