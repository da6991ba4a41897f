use anyhow::{Context, Result};
use qwop_core::constants::MAX_STEPS_DEFAULT;
use qwop_core::EnvConfig;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const ENV_FRAMES_PER_STEP: &str = "QWOP_FRAMES_PER_STEP";
pub const ENV_MAX_STEPS: &str = "QWOP_MAX_STEPS";
pub const ENV_REDUCED_ACTIONS: &str = "QWOP_REDUCED_ACTIONS";

pub(crate) fn read_env_u32(name: &str, default: u32) -> u32 {
    let Ok(raw) = env::var(name) else {
        return default;
    };
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!(var = name, value = %raw, default, "ignoring invalid env override");
            default
        }
    }
}

pub(crate) fn read_env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}

/// Loads env options from an optional JSON file, then applies `QWOP_*` overrides.
pub fn load_env_config(path: Option<&Path>) -> Result<EnvConfig> {
    let mut config = match path {
        Some(path) => {
            let data =
                fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
            serde_json::from_slice::<EnvConfig>(&data)
                .with_context(|| format!("invalid env config {}", path.display()))?
        }
        None => EnvConfig::default(),
    };
    apply_env_overrides(&mut config);
    config
        .validate()
        .context("env config failed validation")?;
    Ok(config)
}

pub fn apply_env_overrides(config: &mut EnvConfig) {
    config.frames_per_step = read_env_u32(ENV_FRAMES_PER_STEP, config.frames_per_step);
    config.reduced_action_set = read_env_bool(ENV_REDUCED_ACTIONS, config.reduced_action_set);
}

/// Step cap for runs: explicit flag, then `QWOP_MAX_STEPS`, then the trace limit.
pub fn resolve_max_steps(flag: Option<u32>) -> u32 {
    flag.unwrap_or_else(|| read_env_u32(ENV_MAX_STEPS, MAX_STEPS_DEFAULT))
}
