use crate::policies::policy_ids;
use crate::runner::{run_policy, RunMetrics};
use crate::util::{parse_id_csv, seed_to_hex};
use anyhow::{anyhow, Context, Result};
use qwop_core::EnvConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Distance,
    Reward,
    Survival,
}

impl Objective {
    pub fn run_value(self, metrics: &RunMetrics) -> f64 {
        let standing = if metrics.fallen { 0.0 } else { 1.0 };
        match self {
            Self::Distance => {
                metrics.final_score + if metrics.is_success { 100.0 } else { 0.0 }
            }
            Self::Reward => metrics.total_reward,
            Self::Survival => metrics.score_time + standing * 50.0 + metrics.final_score * 0.1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Reward => "reward",
            Self::Survival => "survival",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub policies: Vec<String>,
    pub seeds: Vec<u32>,
    pub env: EnvConfig,
    pub max_steps: u32,
    pub objective: Objective,
    pub out_dir: PathBuf,
    pub save_top: usize,
    pub jobs: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub policy_id: String,
    pub seed: u32,
    pub seed_hex: String,
    pub step_count: u32,
    pub final_score: f64,
    pub score_time: f64,
    pub total_reward: f64,
    pub fallen: bool,
    pub is_success: bool,
    pub objective_value: f64,
    pub key_steps: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyAggregate {
    pub policy_id: String,
    pub runs: usize,
    pub avg_score: f64,
    pub max_score: f64,
    pub avg_steps: f64,
    pub avg_time: f64,
    pub avg_reward: f64,
    pub fall_rate: f64,
    pub success_rate: f64,
    pub objective_value: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedTraceRecord {
    pub rank: usize,
    pub metric: String,
    pub policy_id: String,
    pub seed: u32,
    pub seed_hex: String,
    pub score: f64,
    pub steps: u32,
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub generated_unix_s: u64,
    pub objective: Objective,
    pub max_steps: u32,
    pub jobs: Option<usize>,
    pub env: EnvConfig,
    pub policies: Vec<String>,
    pub seeds: Vec<u32>,
    pub run_count: usize,
    pub policy_rankings: Vec<PolicyAggregate>,
    pub runs: Vec<RunRecord>,
    pub saved_traces: Vec<SavedTraceRecord>,
}

#[derive(Clone, Debug)]
struct InternalRun {
    metrics: RunMetrics,
    objective_value: f64,
    trace: Vec<u8>,
}

pub fn resolve_policies(input: Option<&str>) -> Result<Vec<String>> {
    match input {
        None => Ok(policy_ids().iter().map(|id| (*id).to_string()).collect()),
        Some(raw) => parse_id_csv(raw, "--policies"),
    }
}

pub fn run_benchmark(config: BenchmarkConfig) -> Result<BenchmarkReport> {
    if config.seeds.is_empty() {
        return Err(anyhow!("benchmark requires at least one seed"));
    }
    if config.policies.is_empty() {
        return Err(anyhow!("benchmark requires at least one policy"));
    }
    if let Some(jobs) = config.jobs {
        if jobs == 0 {
            return Err(anyhow!("benchmark --jobs must be >= 1 when provided"));
        }
    }
    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("failed creating {}", config.out_dir.display()))?;

    let run_jobs: Vec<(String, u32)> = config
        .policies
        .iter()
        .flat_map(|policy| config.seeds.iter().map(move |seed| (policy.clone(), *seed)))
        .collect();
    info!(
        runs = run_jobs.len(),
        objective = config.objective.as_str(),
        "starting benchmark"
    );

    // The physics world is not Send: each task builds its own env.
    let run_one = |(policy_id, seed): &(String, u32)| -> Result<InternalRun> {
        let env = EnvConfig {
            seed: *seed,
            ..config.env.clone()
        };
        let artifact = run_policy(policy_id, &env, config.max_steps).with_context(|| {
            format!("benchmark run failed for policy={policy_id} seed={seed:#x}")
        })?;
        let objective_value = config.objective.run_value(&artifact.metrics);
        Ok(InternalRun {
            metrics: artifact.metrics,
            objective_value,
            trace: artifact.trace,
        })
    };

    let run_results: Vec<Result<InternalRun>> = if let Some(jobs) = config.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| run_jobs.par_iter().map(run_one).collect())
    } else {
        run_jobs.par_iter().map(run_one).collect()
    };

    let runs = run_results.into_iter().collect::<Result<Vec<_>>>()?;

    let mut grouped: HashMap<&str, Vec<&InternalRun>> = HashMap::new();
    for run in &runs {
        grouped
            .entry(run.metrics.policy_id.as_str())
            .or_default()
            .push(run);
    }

    let mut rankings: Vec<PolicyAggregate> = grouped
        .into_iter()
        .map(|(policy_id, policy_runs)| aggregate(policy_id, &policy_runs))
        .collect();
    rankings.sort_by(|a, b| {
        b.objective_value
            .total_cmp(&a.objective_value)
            .then_with(|| b.avg_score.total_cmp(&a.avg_score))
            .then_with(|| a.policy_id.cmp(&b.policy_id))
    });

    let mut run_records: Vec<RunRecord> = runs
        .iter()
        .map(|run| RunRecord {
            policy_id: run.metrics.policy_id.clone(),
            seed: run.metrics.seed,
            seed_hex: seed_to_hex(run.metrics.seed),
            step_count: run.metrics.step_count,
            final_score: run.metrics.final_score,
            score_time: run.metrics.score_time,
            total_reward: run.metrics.total_reward,
            fallen: run.metrics.fallen,
            is_success: run.metrics.is_success,
            objective_value: run.objective_value,
            key_steps: run.metrics.key_steps,
        })
        .collect();
    run_records.sort_by(|a, b| {
        b.objective_value
            .total_cmp(&a.objective_value)
            .then_with(|| b.final_score.total_cmp(&a.final_score))
            .then_with(|| a.seed.cmp(&b.seed))
    });

    let mut saved_traces = Vec::new();
    if config.save_top > 0 {
        save_top_traces(
            &config.out_dir,
            &runs,
            config.objective.as_str(),
            config.save_top,
            |run| run.objective_value,
            &mut saved_traces,
        )?;
        if config.objective != Objective::Distance {
            save_top_traces(
                &config.out_dir,
                &runs,
                "distance",
                config.save_top,
                |run| run.metrics.final_score,
                &mut saved_traces,
            )?;
        }
    }

    write_runs_csv(&config.out_dir.join("runs.csv"), &run_records)?;

    let report = BenchmarkReport {
        generated_unix_s: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        objective: config.objective,
        max_steps: config.max_steps,
        jobs: config.jobs,
        env: config.env,
        policies: config.policies,
        seeds: config.seeds,
        run_count: run_records.len(),
        policy_rankings: rankings,
        runs: run_records,
        saved_traces,
    };

    let report_path = config.out_dir.join("summary.json");
    fs::write(
        &report_path,
        serde_json::to_vec_pretty(&report).context("failed to serialize summary json")?,
    )
    .with_context(|| format!("failed writing {}", report_path.display()))?;
    info!(path = %report_path.display(), "benchmark summary written");

    Ok(report)
}

fn aggregate(policy_id: &str, runs: &[&InternalRun]) -> PolicyAggregate {
    let count = runs.len() as f64;
    let mean = |f: fn(&InternalRun) -> f64| runs.iter().map(|r| f(r)).sum::<f64>() / count;
    PolicyAggregate {
        policy_id: policy_id.to_string(),
        runs: runs.len(),
        avg_score: mean(|r| r.metrics.final_score),
        max_score: runs
            .iter()
            .map(|r| r.metrics.final_score)
            .fold(f64::NEG_INFINITY, f64::max),
        avg_steps: mean(|r| r.metrics.step_count as f64),
        avg_time: mean(|r| r.metrics.score_time),
        avg_reward: mean(|r| r.metrics.total_reward),
        fall_rate: mean(|r| if r.metrics.fallen { 1.0 } else { 0.0 }),
        success_rate: mean(|r| if r.metrics.is_success { 1.0 } else { 0.0 }),
        objective_value: mean(|r| r.objective_value),
    }
}

fn save_top_traces<F>(
    out_dir: &Path,
    runs: &[InternalRun],
    metric_name: &str,
    count: usize,
    metric: F,
    saved_traces: &mut Vec<SavedTraceRecord>,
) -> Result<()>
where
    F: Fn(&InternalRun) -> f64,
{
    let mut order: Vec<&InternalRun> = runs.iter().collect();
    order.sort_by(|a, b| {
        metric(b)
            .total_cmp(&metric(a))
            .then_with(|| b.metrics.final_score.total_cmp(&a.metrics.final_score))
            .then_with(|| a.metrics.seed.cmp(&b.metrics.seed))
    });

    let save_dir = out_dir.join(format!("top-{metric_name}"));
    fs::create_dir_all(&save_dir)
        .with_context(|| format!("failed creating {}", save_dir.display()))?;

    for (idx, run) in order.into_iter().take(count).enumerate() {
        let rank = idx + 1;
        let base = format!(
            "rank{rank:02}-{}-seed{:08x}-dm{}-steps{}",
            run.metrics.policy_id,
            run.metrics.seed,
            run.metrics.score_decimetres,
            run.metrics.step_count
        );
        let trace_path = save_dir.join(format!("{base}.trace"));
        fs::write(&trace_path, &run.trace)
            .with_context(|| format!("failed writing {}", trace_path.display()))?;

        let meta_path = save_dir.join(format!("{base}.json"));
        let mut meta = serde_json::to_value(&run.metrics)
            .context("failed to serialize top trace metadata")?;
        meta["rank"] = rank.into();
        meta["metric"] = metric_name.into();
        meta["objective_value"] = run.objective_value.into();
        fs::write(
            &meta_path,
            serde_json::to_vec_pretty(&meta).context("failed to serialize top trace metadata")?,
        )
        .with_context(|| format!("failed writing {}", meta_path.display()))?;

        saved_traces.push(SavedTraceRecord {
            rank,
            metric: metric_name.to_string(),
            policy_id: run.metrics.policy_id.clone(),
            seed: run.metrics.seed,
            seed_hex: seed_to_hex(run.metrics.seed),
            score: run.metrics.final_score,
            steps: run.metrics.step_count,
            path: trace_path.to_string_lossy().into_owned(),
        });
    }

    Ok(())
}

fn write_runs_csv(path: &Path, rows: &[RunRecord]) -> Result<()> {
    let mut csv = String::from(
        "policy_id,seed_hex,seed,step_count,final_score,score_time,total_reward,fallen,is_success,objective_value,key_steps\n",
    );
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{},{:.3},{:.3},{:.4},{},{},{:.4},{}\n",
            row.policy_id,
            row.seed_hex,
            row.seed,
            row.step_count,
            row.final_score,
            row.score_time,
            row.total_reward,
            row.fallen,
            row.is_success,
            row.objective_value,
            row.key_steps
        ));
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}
