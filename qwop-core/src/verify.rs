use serde::{Deserialize, Serialize};

use crate::env::EnvConfig;
use crate::error::{SimError, TraceError};
use crate::sim::{replay, ReplayResult};
use crate::trace::{parse_trace, serialize_trace, TraceSummary};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    pub seed: u32,
    pub step_count: u32,
    pub frames_per_step: u8,
    pub reduced_action_set: bool,
    pub score_decimetres: i32,
    pub outcome_flags: u8,
    pub checksum: u32,
    pub total_reward: f64,
}

/// Replays `actions` and encodes them with the computed outcome.
///
/// Actions after the episode ends are dropped so the trace verifies.
pub fn record_trace(config: &EnvConfig, actions: &[u8]) -> Result<Vec<u8>, SimError> {
    config.validate()?;
    let result = replay(config, actions)?;
    let summary = TraceSummary {
        seed: config.seed,
        frames_per_step: config.frames_per_step as u8,
        reduced_action_set: config.reduced_action_set,
        score_decimetres: result.score_decimetres,
        outcome_flags: result.outcome_flags,
    };
    Ok(serialize_trace(
        &summary,
        &actions[..result.step_count as usize],
    ))
}

/// Parses a trace, replays it with default reward settings and checks the footer.
pub fn verify_trace(bytes: &[u8], max_steps: u32) -> Result<TraceReport, TraceError> {
    verify_trace_with(bytes, max_steps, &EnvConfig::default())
}

/// Like `verify_trace`, taking reward and world settings from `base`.
pub fn verify_trace_with(
    bytes: &[u8],
    max_steps: u32,
    base: &EnvConfig,
) -> Result<TraceReport, TraceError> {
    verify_trace_with_replay(bytes, max_steps, base, replay)
}

fn verify_trace_with_replay<F>(
    bytes: &[u8],
    max_steps: u32,
    base: &EnvConfig,
    replay_fn: F,
) -> Result<TraceReport, TraceError>
where
    F: FnOnce(&EnvConfig, &[u8]) -> Result<ReplayResult, SimError>,
{
    let trace = parse_trace(bytes, max_steps)?;
    let config = EnvConfig {
        seed: trace.header.seed,
        frames_per_step: trace.header.frames_per_step as u32,
        reduced_action_set: trace.header.reduced_action_set(),
        ..base.clone()
    };
    let result = replay_fn(&config, trace.actions)?;

    if result.step_count != trace.header.step_count {
        return Err(TraceError::StepCountMismatch {
            claimed: trace.header.step_count,
            computed: result.step_count,
        });
    }

    if result.score_decimetres != trace.footer.score_decimetres {
        return Err(TraceError::ScoreMismatch {
            claimed: trace.footer.score_decimetres,
            computed: result.score_decimetres,
        });
    }

    if result.outcome_flags != trace.footer.outcome_flags {
        return Err(TraceError::OutcomeMismatch {
            claimed: trace.footer.outcome_flags,
            computed: result.outcome_flags,
        });
    }

    Ok(TraceReport {
        seed: trace.header.seed,
        step_count: trace.header.step_count,
        frames_per_step: trace.header.frames_per_step,
        reduced_action_set: trace.header.reduced_action_set(),
        score_decimetres: result.score_decimetres,
        outcome_flags: result.outcome_flags,
        checksum: trace.footer.checksum,
        total_reward: result.total_reward,
    })
}
