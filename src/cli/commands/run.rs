//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command for the Wheel Matrix CLI,
//! which expands the build matrix and executes this host's build jobs.
//!
//! 此模块实现了 Wheel Matrix CLI 的 `run` 命令，
//! 展开构建矩阵并执行本宿主机的构建作业。

use anyhow::{Context, Result};
use colored::*;
use futures::{StreamExt, stream};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::signal;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::{self, BuildMatrix},
        execution::{JobContext, resolve_store_dir, run_build_job},
        models::{BuildJob, FailureReason, JobResult, Manifest, TargetOs, Trigger},
        planner,
    },
    infra::{artifacts::ArtifactStore, t},
    reporting::{
        console::{print_summary, print_unexpected_failure_details},
        html::generate_html_report,
    },
};

/// Arguments of the `run` command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Number of jobs to run concurrently / 并发运行的作业数
    pub jobs: Option<usize>,
    pub config: PathBuf,
    pub project_dir: PathBuf,
    pub event: Trigger,
    /// Overrides `upload.store` from the config / 覆盖配置中的 `upload.store`
    pub store: Option<PathBuf>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
    pub html: Option<PathBuf>,
    /// Explicit `--lang`; when absent the config's `language` is used.
    pub language: Option<String>,
}

/// Counts of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub warnings: usize,
}

impl RunSummary {
    pub fn from_results(results: &[JobResult]) -> Self {
        Self {
            total: results.len(),
            passed: results.iter().filter(|r| r.is_passed()).count(),
            failed: results.iter().filter(|r| r.is_failure()).count(),
            skipped: results
                .iter()
                .filter(|r| matches!(r, JobResult::Skipped { .. }))
                .count(),
            warnings: results.iter().filter(|r| r.has_warnings()).count(),
        }
    }
}

/// Executes the run command with the provided arguments.
///
/// Configuration problems are returned as errors before any job starts. Job
/// failures are not errors here; they are counted in the returned summary.
///
/// 使用提供的参数执行 run 命令。
/// 配置问题会在任何作业启动之前作为错误返回。作业失败在这里不是错误，而是计入返回的摘要中。
pub async fn execute(args: RunArgs) -> Result<RunSummary> {
    let build_matrix = config::load_build_matrix(&args.config)?;
    let locale = crate::resolve_locale(
        args.language
            .as_deref()
            .or(Some(build_matrix.language.as_str())),
    );
    rust_i18n::set_locale(&locale);

    let project_root = fs::canonicalize(&args.project_dir).with_context(|| {
        t!("project_dir_not_found", locale = &locale, path = args.project_dir.display()).to_string()
    })?;
    println!(
        "{}",
        t!("project_root_detected", locale = &locale, path = project_root.display())
    );
    if let Some(crate_name) = detect_crate_name(&project_root) {
        println!(
            "{}",
            t!("packaging_crate", locale = &locale, name = crate_name.yellow())
        );
    }
    println!(
        "{}",
        t!("loading_build_matrix", locale = &locale, path = args.config.display())
    );

    let jobs = planner::expand_matrix(&build_matrix)?;
    let matrix_total = jobs.len();

    if !build_matrix.is_triggered_by(args.event) {
        println!(
            "{}",
            t!("event_not_triggered", locale = &locale, event = args.event).yellow()
        );
        return Ok(RunSummary::default());
    }

    let host = TargetOs::host();
    println!(
        "{}",
        t!("current_os", locale = &locale, os = std::env::consts::OS).cyan()
    );

    let plan = planner::plan_execution(jobs, host, args.total_runners, args.runner_index)?;

    if plan.filtered_os_count > 0 {
        println!(
            "{}",
            t!(
                "filtered_os_jobs",
                locale = &locale,
                filtered = plan.filtered_os_count,
                total = matrix_total
            )
            .cyan()
        );
    }

    if let (Some(total), Some(index)) = (args.total_runners, args.runner_index) {
        println!(
            "{}",
            t!(
                "running_as_split_runner",
                locale = &locale,
                index = index + 1,
                total = total,
                count = plan.jobs_to_run.len()
            )
            .bold()
        );
    } else {
        println!("{}", t!("running_as_single_runner", locale = &locale).bold());
    }

    if plan.jobs_to_run.is_empty() {
        println!("{}", t!("no_jobs_to_run", locale = &locale).green());
        return Ok(RunSummary::default());
    }

    let store_dir = match &args.store {
        Some(dir) => dir.clone(),
        None => resolve_store_dir(&project_root, &build_matrix.upload.store),
    };
    let store = ArtifactStore::open(store_dir)?;
    let ctx = job_context(&build_matrix, project_root, store, &locale);

    let stop_token = setup_signal_handler(&locale);
    let parallelism = args.jobs.unwrap_or(num_cpus::get() / 2 + 1).max(1);
    let results = run_jobs(plan.jobs_to_run, parallelism, ctx, stop_token).await;

    print_summary(&results, &locale);

    if let Some(report_path) = &args.html {
        println!(
            "\n{}",
            t!("generating_html_report", locale = &locale, path = report_path.display())
        );
        if let Err(e) = generate_html_report(&results, report_path, &locale) {
            eprintln!(
                "{} {e:#}",
                t!("html_report_failed", locale = &locale).red()
            );
        }
    }

    let summary = RunSummary::from_results(&results);
    if summary.failed > 0 {
        let failures: Vec<_> = results.iter().filter(|r| r.is_failure()).collect();
        print_unexpected_failure_details(&failures, &locale);
    } else {
        println!("\n{}", t!("all_jobs_passed", locale = &locale).green().bold());
    }
    Ok(summary)
}

/// Builds the shared context handed to every job.
pub fn job_context(
    build_matrix: &BuildMatrix,
    project_root: PathBuf,
    store: ArtifactStore,
    locale: &str,
) -> Arc<JobContext> {
    Arc::new(JobContext {
        project_root,
        steps: build_matrix.steps.clone(),
        upload: build_matrix.upload.clone(),
        store,
        timeout: build_matrix.timeout_secs.map(Duration::from_secs),
        locale: locale.to_string(),
    })
}

/// Reads the package name from `Cargo.toml`, if the project has one.
fn detect_crate_name(project_root: &Path) -> Option<String> {
    let content = fs::read_to_string(project_root.join("Cargo.toml")).ok()?;
    let manifest: Manifest = toml::from_str(&content).ok()?;
    Some(manifest.package.name)
}

/// Sets up a signal handler that cancels the run on Ctrl-C.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("\n{}", t!("shutdown_signal", locale = &locale).yellow());
            token_clone.cancel();
        }
    });

    token
}

/// Runs the jobs with at most `parallelism` in flight.
///
/// Jobs are independent: a failure never cancels the others. Only `stop_token`
/// does, in which case running jobs report `Cancelled` and queued ones `Skipped`.
/// Results come back in matrix order.
///
/// 以最多 `parallelism` 个并发运行作业。
/// 作业相互独立：一个失败永远不会取消其他作业。只有 `stop_token` 会取消，
/// 此时正在运行的作业报告 `Cancelled`，排队的作业报告 `Skipped`。结果按矩阵顺序返回。
pub async fn run_jobs(
    jobs: Vec<BuildJob>,
    parallelism: usize,
    ctx: Arc<JobContext>,
    stop_token: CancellationToken,
) -> Vec<JobResult> {
    let mut indexed: Vec<(usize, JobResult)> = stream::iter(jobs.into_iter().enumerate().map(
        |(index, job)| {
            let ctx = Arc::clone(&ctx);
            let stop_token = stop_token.clone();
            let fallback = job.clone();

            async move {
                let start = Instant::now();
                let handle = tokio::spawn(run_build_job(job, ctx, stop_token));
                let result = handle
                    .await
                    .unwrap_or_else(|e| aborted_job(fallback, e, start.elapsed()));
                (index, result)
            }
        },
    ))
    .buffer_unordered(parallelism.max(1))
    .collect()
    .await;

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}

/// Reports a job whose task died (panicked or was aborted) as a failure that
/// carries the panic message.
fn aborted_job(job: BuildJob, error: JoinError, duration: Duration) -> JobResult {
    let output = if error.is_panic() {
        let payload = error.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "job task panicked".to_string())
    } else {
        error.to_string()
    };
    JobResult::Failed {
        job,
        output,
        reason: FailureReason::Panicked,
        step: None,
        duration,
    }
}
