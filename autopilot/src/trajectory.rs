use anyhow::{anyhow, Context, Result};
use qwop_core::sim::outcome_flags;
use qwop_core::{ActionMapper, EnvConfig, QwopEnv};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const VALUES_PER_BODY: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    pub step: u32,
    pub action: u8,
    pub keys: String,
    pub reward: f64,
    pub done: bool,
    pub score: f64,
    /// Raw (unnormalized) observation after the step.
    pub observation: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub label: String,
    pub seed: u32,
    pub frames_per_step: u32,
    pub reduced_action_set: bool,
    pub initial_observation: Vec<f64>,
    pub steps: Vec<TrajectoryStep>,
    pub final_score: f64,
    pub outcome_flags: u8,
}

/// Replays `actions` and keeps the raw observation after every step.
pub fn record_trajectory(label: &str, config: &EnvConfig, actions: &[u8]) -> Result<Trajectory> {
    let mut env = QwopEnv::new(config.clone()).context("invalid env config")?;
    env.reset(config.seed);
    let initial_observation = env.raw_observation().to_vec();

    let mut steps = Vec::with_capacity(actions.len());
    for (idx, action) in actions.iter().enumerate() {
        if env.is_done() {
            break;
        }
        let outcome = env
            .step(*action as usize)
            .with_context(|| format!("step {idx} rejected action {action}"))?;
        steps.push(TrajectoryStep {
            step: outcome.info.episode_steps,
            action: *action,
            keys: env.mapper().action_name(*action as usize).to_string(),
            reward: outcome.reward,
            done: outcome.done,
            score: outcome.info.distance,
            observation: env.raw_observation().to_vec(),
        });
    }

    let state = env.sim().game_state();
    Ok(Trajectory {
        label: label.to_string(),
        seed: config.seed,
        frames_per_step: config.frames_per_step,
        reduced_action_set: config.reduced_action_set,
        initial_observation,
        steps,
        final_score: state.score,
        outcome_flags: outcome_flags(&state),
    })
}

pub fn write_trajectory(path: &Path, trajectory: &Trajectory) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }
    let encoded = serde_json::to_vec_pretty(trajectory).context("failed to serialize trajectory")?;
    fs::write(path, encoded).with_context(|| format!("failed writing {}", path.display()))
}

pub fn read_trajectory(path: &Path) -> Result<Trajectory> {
    let data = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("invalid trajectory {}", path.display()))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    /// Applies to x, y and angle.
    pub position: f64,
    /// Applies to vx and vy.
    pub velocity: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            position: 1e-3,
            velocity: 1e-2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrajectoryComparison {
    pub steps_compared: usize,
    pub length_mismatch: bool,
    /// 0 is the initial observation; `n` is the observation after step `n`.
    pub first_divergence_step: Option<u32>,
    pub max_position_diff: f64,
    pub max_velocity_diff: f64,
    pub done_mismatch: bool,
    pub score_diff: f64,
}

impl TrajectoryComparison {
    pub fn is_match(&self) -> bool {
        self.first_divergence_step.is_none() && !self.length_mismatch && !self.done_mismatch
    }
}

pub fn compare_trajectories(
    a: &Trajectory,
    b: &Trajectory,
    tolerances: Tolerances,
) -> TrajectoryComparison {
    let mut out = TrajectoryComparison {
        steps_compared: 0,
        length_mismatch: a.steps.len() != b.steps.len(),
        first_divergence_step: None,
        max_position_diff: 0.0,
        max_velocity_diff: 0.0,
        done_mismatch: false,
        score_diff: (a.final_score - b.final_score).abs(),
    };

    let initial = std::iter::once((0u32, &a.initial_observation, &b.initial_observation));
    let stepped = a
        .steps
        .iter()
        .zip(&b.steps)
        .map(|(left, right)| (left.step, &left.observation, &right.observation));

    for (step, left, right) in initial.chain(stepped) {
        let (pos, vel) = observation_diff(left, right);
        out.max_position_diff = out.max_position_diff.max(pos);
        out.max_velocity_diff = out.max_velocity_diff.max(vel);
        if out.first_divergence_step.is_none()
            && (pos > tolerances.position || vel > tolerances.velocity)
        {
            out.first_divergence_step = Some(step);
        }
    }
    out.steps_compared = a.steps.len().min(b.steps.len());
    out.done_mismatch = a
        .steps
        .iter()
        .zip(&b.steps)
        .any(|(left, right)| left.done != right.done);
    out
}

/// Largest absolute (position, velocity) component difference.
fn observation_diff(a: &[f64], b: &[f64]) -> (f64, f64) {
    if a.len() != b.len() {
        return (f64::INFINITY, f64::INFINITY);
    }
    let mut pos = 0.0f64;
    let mut vel = 0.0f64;
    for (idx, (x, y)) in a.iter().zip(b).enumerate() {
        let diff = (x - y).abs();
        if idx % VALUES_PER_BODY < 3 {
            pos = pos.max(diff);
        } else {
            vel = vel.max(diff);
        }
    }
    (pos, vel)
}

/// JSON action script; exactly one of `actions` or `key_sequences` is set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionScript {
    pub seed: Option<u32>,
    pub frames_per_step: Option<u32>,
    pub reduced_action_set: Option<bool>,
    pub actions: Option<Vec<u8>>,
    pub key_sequences: Option<Vec<String>>,
}

impl ActionScript {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("invalid action script {}", path.display()))
    }

    /// Applies the script's settings over `base` and decodes the action list.
    pub fn resolve(&self, base: &EnvConfig) -> Result<(EnvConfig, Vec<u8>)> {
        let config = EnvConfig {
            seed: self.seed.unwrap_or(base.seed),
            frames_per_step: self.frames_per_step.unwrap_or(base.frames_per_step),
            reduced_action_set: self.reduced_action_set.unwrap_or(base.reduced_action_set),
            ..base.clone()
        };
        config.validate().context("action script settings are invalid")?;
        let mapper = ActionMapper::new(config.reduced_action_set);

        let actions = match (&self.actions, &self.key_sequences) {
            (Some(actions), None) => {
                if let Some((idx, bad)) = actions
                    .iter()
                    .enumerate()
                    .find(|(_, action)| **action as usize >= mapper.num_actions())
                {
                    return Err(anyhow!(
                        "action {bad} at step {idx} is outside the {}-action set",
                        mapper.num_actions()
                    ));
                }
                actions.clone()
            }
            (None, Some(sequences)) => sequences
                .iter()
                .enumerate()
                .map(|(idx, keys)| {
                    mapper.action_from_label(keys).map(|a| a as u8).ok_or_else(|| {
                        anyhow!(
                            "step {idx}: '{keys}' is not in the {}-action set",
                            mapper.num_actions()
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            (Some(_), Some(_)) => {
                return Err(anyhow!(
                    "action script sets both 'actions' and 'key_sequences'"
                ))
            }
            (None, None) => {
                return Err(anyhow!(
                    "action script needs 'actions' or 'key_sequences'"
                ))
            }
        };
        if actions.is_empty() {
            return Err(anyhow!("action script has no steps"));
        }
        Ok((config, actions))
    }
}
