use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use qwop_autopilot::benchmark::{resolve_policies, run_benchmark, BenchmarkConfig, Objective};
use qwop_autopilot::config::{load_env_config, resolve_max_steps};
use qwop_autopilot::policies::{create_policy, describe_policies, policy_ids, policy_manifest_entries};
use qwop_autopilot::runner::{run_actions, run_policy, spawn_check, write_trace, RunArtifact};
use qwop_autopilot::trajectory::{
    compare_trajectories, read_trajectory, record_trajectory, write_trajectory, ActionScript,
    Tolerances,
};
use qwop_autopilot::util::{parse_seed, parse_seed_csv, parse_seed_file, seed_sequence, seed_to_hex};
use qwop_core::constants::{MAX_STEPS_DEFAULT, SPAWN_TOLERANCE};
use qwop_core::trace::parse_trace;
use qwop_core::verify::verify_trace_with;
use qwop_core::EnvConfig;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "qwop-autopilot")]
#[command(about = "Deterministic QWOP runner: policies, action traces, benchmarks and parity checks")]
struct Cli {
    /// JSON file with env options (reward, frameskip, world tables)
    #[arg(long, global = true)]
    env_config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available policies
    ListPolicies {
        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one policy or action script and write a verifiable trace
    Run {
        #[arg(long, conflicts_with = "script")]
        policy: Option<String>,
        /// JSON action script ({seed, frames_per_step, reduced_action_set, actions | key_sequences})
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long)]
        seed: Option<String>,
        #[arg(long)]
        max_steps: Option<u32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay a trace and check its recorded score and outcome
    VerifyTrace {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = MAX_STEPS_DEFAULT)]
        max_steps: u32,
    },
    /// Run policies across seeds in parallel
    Benchmark {
        #[arg(long)]
        policies: Option<String>,
        #[arg(long)]
        seeds: Option<String>,
        #[arg(long)]
        seed_file: Option<PathBuf>,
        #[arg(long)]
        seed_start: Option<String>,
        #[arg(long, default_value_t = 8)]
        seed_count: u32,
        #[arg(long)]
        max_steps: Option<u32>,
        #[arg(long, value_enum, default_value_t = CliObjective::Distance)]
        objective: CliObjective,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        save_top: usize,
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Compare initial body poses against the spawn table
    SpawnCheck {
        #[arg(long, default_value = "0")]
        seed: String,
    },
    /// Record a per-step trajectory (raw observations) as JSON
    Record {
        #[arg(long, conflicts_with = "script")]
        policy: Option<String>,
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long)]
        seed: Option<String>,
        #[arg(long)]
        max_steps: Option<u32>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Compare two recorded trajectories
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[arg(long, default_value_t = 1e-3)]
        tol_pos: f64,
        #[arg(long, default_value_t = 1e-2)]
        tol_vel: f64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliObjective {
    Distance,
    Reward,
    Survival,
}

impl From<CliObjective> for Objective {
    fn from(value: CliObjective) -> Self {
        match value {
            CliObjective::Distance => Objective::Distance,
            CliObjective::Reward => Objective::Reward,
            CliObjective::Survival => Objective::Survival,
        }
    }
}

/// Where a run's actions come from.
enum RunSource {
    Policy(String),
    Script(Vec<u8>),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base = load_env_config(cli.env_config.as_deref())?;

    match cli.command {
        Commands::ListPolicies { json } => {
            if json {
                let encoded = serde_json::to_vec_pretty(&policy_manifest_entries())?;
                println!("{}", String::from_utf8_lossy(&encoded));
            } else {
                for (id, description) in describe_policies() {
                    println!("{id:16} {description}");
                }
            }
        }
        Commands::Run {
            policy,
            script,
            seed,
            max_steps,
            output,
        } => {
            let (config, source) =
                resolve_run_source(&base, policy.as_deref(), script.as_deref(), seed.as_deref())?;
            let artifact = match &source {
                RunSource::Policy(id) => run_policy(id, &config, resolve_max_steps(max_steps))?,
                RunSource::Script(actions) => run_actions(&config, actions)?,
            };
            let metrics = &artifact.metrics;
            let output = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "traces/{}-{}-dm{}-steps{}.trace",
                    metrics.policy_id,
                    seed_to_hex(metrics.seed),
                    metrics.score_decimetres,
                    metrics.step_count
                ))
            });
            write_trace(&output, &artifact.trace)?;
            info!(path = %output.display(), "trace written");
            print_run(&artifact);
            println!("output={}", output.display());
        }
        Commands::VerifyTrace { input, max_steps } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("failed reading {}", input.display()))?;
            let trace = parse_trace(&bytes, max_steps)?;
            let report = verify_trace_with(&bytes, max_steps, &base)?;
            println!("input={}", input.display());
            println!("seed={}", seed_to_hex(trace.header.seed));
            println!("frames_per_step={}", trace.header.frames_per_step);
            println!("reduced_action_set={}", trace.header.reduced_action_set());
            println!("step_count={}", report.step_count);
            println!("score_m={:.1}", report.score_decimetres as f64 / 10.0);
            println!("outcome_flags={:#04x}", report.outcome_flags);
            println!("checksum={:#010x}", report.checksum);
            println!("total_reward={:.4}", report.total_reward);
        }
        Commands::Benchmark {
            policies,
            seeds,
            seed_file,
            seed_start,
            seed_count,
            max_steps,
            objective,
            out_dir,
            save_top,
            jobs,
        } => {
            let policies = resolve_policies(policies.as_deref())?;
            for id in &policies {
                ensure_policy(id)?;
            }
            let seeds = resolve_seeds(
                seeds.as_deref(),
                seed_file.as_deref(),
                seed_start.as_deref(),
                seed_count,
            )?;
            let objective: Objective = objective.into();
            let out_dir = out_dir.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "benchmarks/{}-{}",
                    objective.as_str(),
                    timestamp_suffix()
                ))
            });

            let report = run_benchmark(BenchmarkConfig {
                policies,
                seeds,
                env: base,
                max_steps: resolve_max_steps(max_steps),
                objective,
                out_dir: out_dir.clone(),
                save_top,
                jobs,
            })?;

            println!("objective={}", objective.as_str());
            println!("runs={}", report.run_count);
            println!(
                "jobs={}",
                report
                    .jobs
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "auto".to_string())
            );
            println!("out_dir={}", out_dir.display());
            println!("top policies:");
            for (idx, policy) in report.policy_rankings.iter().take(5).enumerate() {
                println!(
                    "  {}. {}  objective={:.2} avg_score={:.2} max_score={:.2} avg_time={:.2} fall_rate={:.0}% success={:.0}%",
                    idx + 1,
                    policy.policy_id,
                    policy.objective_value,
                    policy.avg_score,
                    policy.max_score,
                    policy.avg_time,
                    policy.fall_rate * 100.0,
                    policy.success_rate * 100.0,
                );
            }
            println!("saved traces:");
            for trace in report.saved_traces.iter().take(10) {
                println!(
                    "  [{} #{:02}] {} {} score={:.1} steps={}",
                    trace.metric, trace.rank, trace.policy_id, trace.seed_hex, trace.score, trace.steps,
                );
            }
        }
        Commands::SpawnCheck { seed } => {
            let seed = parse_seed(&seed)?;
            let deviations = spawn_check(&base.sim, seed)?;
            let mut failures = 0usize;
            for deviation in &deviations {
                let ok = deviation.within_tolerance();
                if !ok {
                    failures += 1;
                }
                println!(
                    "{:?} dx={:.3e} dy={:.3e} dangle={:.3e} ok={ok}",
                    deviation.part, deviation.dx, deviation.dy, deviation.dangle
                );
            }
            println!("tolerance={SPAWN_TOLERANCE:e}");
            println!("bodies={}", deviations.len());
            println!("failures={failures}");
            if failures > 0 {
                return Err(anyhow!("{failures} bodies spawned outside tolerance"));
            }
        }
        Commands::Record {
            policy,
            script,
            seed,
            max_steps,
            output,
        } => {
            let (config, source) =
                resolve_run_source(&base, policy.as_deref(), script.as_deref(), seed.as_deref())?;
            let (label, actions) = match source {
                RunSource::Policy(id) => {
                    let artifact = run_policy(&id, &config, resolve_max_steps(max_steps))?;
                    (id, artifact.actions)
                }
                RunSource::Script(actions) => ("script".to_string(), actions),
            };
            let trajectory = record_trajectory(&label, &config, &actions)?;
            write_trajectory(&output, &trajectory)?;
            println!("label={}", trajectory.label);
            println!("seed={}", seed_to_hex(trajectory.seed));
            println!("steps={}", trajectory.steps.len());
            println!("final_score={:.3}", trajectory.final_score);
            println!("outcome_flags={:#04x}", trajectory.outcome_flags);
            println!("output={}", output.display());
        }
        Commands::Compare {
            a,
            b,
            tol_pos,
            tol_vel,
        } => {
            let left = read_trajectory(&a)?;
            let right = read_trajectory(&b)?;
            let cmp = compare_trajectories(
                &left,
                &right,
                Tolerances {
                    position: tol_pos,
                    velocity: tol_vel,
                },
            );
            println!("a={}", a.display());
            println!("b={}", b.display());
            println!("steps_compared={}", cmp.steps_compared);
            println!("length_mismatch={}", cmp.length_mismatch);
            println!(
                "first_divergence_step={}",
                cmp.first_divergence_step
                    .map(|step| step.to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
            println!("max_position_diff={:.3e}", cmp.max_position_diff);
            println!("max_velocity_diff={:.3e}", cmp.max_velocity_diff);
            println!("done_mismatch={}", cmp.done_mismatch);
            println!("score_diff={:.4}", cmp.score_diff);
            println!("match={}", cmp.is_match());
        }
    }

    Ok(())
}

fn ensure_policy(id: &str) -> Result<()> {
    if create_policy(id).is_none() {
        let available = policy_ids().join(", ");
        return Err(anyhow!("unknown policy '{id}'. available: {available}"));
    }
    Ok(())
}

fn resolve_run_source(
    base: &EnvConfig,
    policy: Option<&str>,
    script: Option<&Path>,
    seed: Option<&str>,
) -> Result<(EnvConfig, RunSource)> {
    let (mut config, source) = match (policy, script) {
        (Some(id), None) => {
            ensure_policy(id)?;
            (base.clone(), RunSource::Policy(id.to_string()))
        }
        (None, Some(path)) => {
            let (config, actions) = ActionScript::load(path)?.resolve(base)?;
            (config, RunSource::Script(actions))
        }
        _ => return Err(anyhow!("pass exactly one of --policy or --script")),
    };
    if let Some(seed) = seed {
        config.seed = parse_seed(seed)?;
    }
    Ok((config, source))
}

fn print_run(artifact: &RunArtifact) {
    let metrics = &artifact.metrics;
    println!("policy={}", metrics.policy_id);
    println!("seed={}", seed_to_hex(metrics.seed));
    println!("frames_per_step={}", metrics.frames_per_step);
    println!("reduced_action_set={}", metrics.reduced_action_set);
    println!("steps={}", metrics.step_count);
    println!("score_m={:.3}", metrics.final_score);
    println!("time_s={:.2}", metrics.score_time);
    println!("avg_speed={:.3}", metrics.avg_speed);
    println!("total_reward={:.4}", metrics.total_reward);
    println!("fallen={}", metrics.fallen);
    println!("jump_landed={}", metrics.jump_landed);
    println!("success={}", metrics.is_success);
    println!("checksum={:#010x}", metrics.checksum);
    println!(
        "key_steps={} q={} w={} o={} p={}",
        metrics.key_steps, metrics.q_steps, metrics.w_steps, metrics.o_steps, metrics.p_steps
    );
}

fn resolve_seeds(
    seeds: Option<&str>,
    seed_file: Option<&Path>,
    seed_start: Option<&str>,
    seed_count: u32,
) -> Result<Vec<u32>> {
    if let Some(path) = seed_file {
        return parse_seed_file(path);
    }
    if let Some(csv) = seeds {
        return parse_seed_csv(csv);
    }
    let start = match seed_start {
        Some(start) => parse_seed(start)?,
        None => 0xA57E_0001,
    };
    Ok(seed_sequence(start, seed_count))
}

fn timestamp_suffix() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{now}")
}
