use crate::policies::{create_policy, Policy, ScriptedPolicy};
use anyhow::{anyhow, Context, Result};
use qwop_core::trace::{serialize_trace, TraceSummary};
use qwop_core::verify::verify_trace_with;
use qwop_core::constants::SPAWN_TOLERANCE;
use qwop_core::skeleton::BodyPart;
use qwop_core::{EnvConfig, QwopEnv, SimConfig, SimulationLoop};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Clone, Debug, Serialize)]
pub struct RunMetrics {
    pub policy_id: String,
    pub seed: u32,
    pub frames_per_step: u32,
    pub reduced_action_set: bool,
    pub max_steps: u32,
    pub step_count: u32,
    pub final_score: f64,
    pub score_decimetres: i32,
    pub score_time: f64,
    pub avg_speed: f64,
    pub total_reward: f64,
    pub outcome_flags: u8,
    pub fallen: bool,
    pub jump_landed: bool,
    pub game_ended: bool,
    pub is_success: bool,
    pub checksum: u32,
    pub key_steps: u32,
    pub q_steps: u32,
    pub w_steps: u32,
    pub o_steps: u32,
    pub p_steps: u32,
}

#[derive(Clone, Debug)]
pub struct RunArtifact {
    pub metrics: RunMetrics,
    pub actions: Vec<u8>,
    pub trace: Vec<u8>,
}

pub fn run_policy(policy_id: &str, config: &EnvConfig, max_steps: u32) -> Result<RunArtifact> {
    let mut policy =
        create_policy(policy_id).ok_or_else(|| anyhow!("unknown policy '{policy_id}'"))?;
    run_policy_instance(policy.as_mut(), config, max_steps)
}

/// Runs a fixed action list; stops early if the episode ends first.
pub fn run_actions(config: &EnvConfig, actions: &[u8]) -> Result<RunArtifact> {
    let max_steps = u32::try_from(actions.len()).context("action script too long")?;
    let mut policy = ScriptedPolicy::new(actions.to_vec());
    run_policy_instance(&mut policy, config, max_steps)
}

pub fn run_policy_instance(
    policy: &mut dyn Policy,
    config: &EnvConfig,
    max_steps: u32,
) -> Result<RunArtifact> {
    if max_steps == 0 {
        return Err(anyhow!("max_steps must be > 0"));
    }

    policy.reset(config.seed);
    let mut env = QwopEnv::new(config.clone()).context("invalid env config")?;
    env.reset(config.seed);

    let mut actions = Vec::with_capacity(max_steps as usize);
    while (actions.len() as u32) < max_steps && !env.is_done() {
        let Some(action) = policy.next_action(&env) else {
            break;
        };
        let outcome = env
            .step(action)
            .with_context(|| format!("step {} rejected action {action}", actions.len()))?;
        actions.push(action as u8);
        if outcome.truncated {
            break;
        }
    }
    if actions.is_empty() {
        return Err(anyhow!("policy '{}' produced no actions", policy.id()));
    }

    let result = env.replay_result();
    let info = env.info();
    let trace = serialize_trace(
        &TraceSummary {
            seed: config.seed,
            frames_per_step: config.frames_per_step as u8,
            reduced_action_set: config.reduced_action_set,
            score_decimetres: result.score_decimetres,
            outcome_flags: result.outcome_flags,
        },
        &actions,
    );
    let report = verify_trace_with(&trace, max_steps.max(result.step_count), config)
        .map_err(|err| anyhow!("generated trace failed verification: {err}"))?;
    debug!(
        policy = policy.id(),
        seed = config.seed,
        steps = result.step_count,
        score = result.final_score,
        "run complete"
    );

    let mut metrics = RunMetrics {
        policy_id: policy.id().to_string(),
        seed: config.seed,
        frames_per_step: config.frames_per_step,
        reduced_action_set: config.reduced_action_set,
        max_steps,
        step_count: result.step_count,
        final_score: result.final_score,
        score_decimetres: result.score_decimetres,
        score_time: result.score_time,
        avg_speed: info.avgspeed,
        total_reward: result.total_reward,
        outcome_flags: result.outcome_flags,
        fallen: info.fallen,
        jump_landed: info.jump_landed,
        game_ended: info.game_ended,
        is_success: info.is_success,
        checksum: report.checksum,
        key_steps: 0,
        q_steps: 0,
        w_steps: 0,
        o_steps: 0,
        p_steps: 0,
    };
    for action in &actions {
        let keys = env.mapper().keys_for(*action as usize)?;
        if keys.any() {
            metrics.key_steps += 1;
        }
        metrics.q_steps += keys.q as u32;
        metrics.w_steps += keys.w as u32;
        metrics.o_steps += keys.o as u32;
        metrics.p_steps += keys.p as u32;
    }

    Ok(RunArtifact {
        metrics,
        actions,
        trace,
    })
}

pub fn write_trace(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed writing {}", path.display()))
}

#[derive(Clone, Debug, Serialize)]
pub struct SpawnDeviation {
    pub part: BodyPart,
    pub dx: f64,
    pub dy: f64,
    pub dangle: f64,
}

impl SpawnDeviation {
    pub fn max_abs(&self) -> f64 {
        self.dx.abs().max(self.dy.abs()).max(self.dangle.abs())
    }

    pub fn within_tolerance(&self) -> bool {
        self.max_abs() <= SPAWN_TOLERANCE
    }
}

/// Starts a fresh simulation and diffs every body pose against its spawn table entry.
pub fn spawn_check(sim: &SimConfig, seed: u32) -> Result<Vec<SpawnDeviation>> {
    let mut game = SimulationLoop::new(sim.clone(), seed).context("invalid sim config")?;
    game.start();
    Ok(sim
        .bodies
        .iter()
        .map(|spec| {
            let state = game.body_state(spec.part);
            SpawnDeviation {
                part: spec.part,
                dx: state.x - spec.position.0,
                dy: state.y - spec.position.1,
                dangle: state.angle - spec.angle,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qwop_core::constants::MAX_STEPS_DEFAULT;
    use qwop_core::verify_trace;

    fn reduced(seed: u32) -> EnvConfig {
        EnvConfig {
            seed,
            frames_per_step: 2,
            reduced_action_set: true,
            ..EnvConfig::default()
        }
    }

    #[test]
    fn idle_run_stays_upright_until_the_cap() {
        let artifact = run_policy("idle", &reduced(1), 40).unwrap();
        assert!(!artifact.metrics.fallen);
        assert!(!artifact.metrics.game_ended);
        assert_eq!(artifact.metrics.step_count, 40);
        assert_eq!(artifact.metrics.key_steps, 0);
    }

    #[test]
    fn knee_drop_run_ends_in_a_fall() {
        let artifact = run_policy("knee-drop", &reduced(1), 500).unwrap();
        assert!(artifact.metrics.fallen);
        assert!(artifact.metrics.game_ended);
        assert!(!artifact.metrics.is_success);
        assert!(artifact.metrics.step_count < 500);
        assert_eq!(artifact.metrics.key_steps, artifact.metrics.step_count);
    }

    #[test]
    fn trace_from_run_verifies_independently() {
        let artifact = run_policy("stride-qp-wo", &reduced(0xC0FFEE), 120).unwrap();
        let report = verify_trace(&artifact.trace, MAX_STEPS_DEFAULT).unwrap();
        assert_eq!(report.step_count, artifact.metrics.step_count);
        assert_eq!(report.score_decimetres, artifact.metrics.score_decimetres);
        assert_eq!(artifact.actions.len() as u32, artifact.metrics.step_count);
    }

    #[test]
    fn step_cap_bounds_the_run() {
        let artifact = run_policy("random-hold", &reduced(3), 5).unwrap();
        assert!(artifact.metrics.step_count <= 5);
    }

    #[test]
    fn zero_step_cap_is_rejected() {
        assert!(run_policy("idle", &reduced(1), 0).is_err());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = run_policy("moonwalk", &reduced(1), 10).unwrap_err();
        assert!(err.to_string().contains("moonwalk"));
    }

    #[test]
    fn out_of_range_script_action_is_rejected() {
        let err = run_actions(&reduced(1), &[0, 9]).unwrap_err();
        assert!(format!("{err:#}").contains("step 1"));
    }

    #[test]
    fn default_spawn_is_within_tolerance() {
        let deviations = spawn_check(&SimConfig::default(), 0).unwrap();
        assert_eq!(deviations.len(), 12);
        assert!(deviations.iter().all(SpawnDeviation::within_tolerance));
    }

    #[test]
    fn key_counts_follow_the_action_table() {
        let config = reduced(4);
        // Reduced index 5 is QW.
        let artifact = run_actions(&config, &[5, 5, 0]).unwrap();
        let steps = artifact.metrics.step_count;
        assert_eq!(artifact.metrics.q_steps, steps.min(2));
        assert_eq!(artifact.metrics.w_steps, steps.min(2));
        assert_eq!(artifact.metrics.o_steps, 0);
    }
}
