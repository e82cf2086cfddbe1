//! # Build Job Execution Engine Module / 构建作业执行引擎模块
//!
//! This module runs a single build job from start to finish: it provisions an
//! isolated workspace, installs the runtime, the compiler toolchain and the
//! packaging tool, runs the release build, collects the outputs and uploads
//! them to the artifact store. Steps run strictly in sequence and the first
//! failing step ends the job.
//!
//! 此模块从头到尾运行单个构建作业：准备隔离的工作区，安装运行时、编译器工具链和打包工具，
//! 运行发布构建，收集输出并将其上传到产物存储。步骤严格按顺序运行，第一个失败的步骤会结束作业。

use anyhow::{Context, Result, anyhow, bail};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::{IfNoFilesFound, StepCommands, UploadOptions},
        models::{ArtifactRecord, BuildJob, FailureReason, JobResult, StepKind},
    },
    infra::{
        artifacts::{self, ArtifactStore, CollectedArtifacts},
        command,
        fs::{self as job_fs, JobWorkspace},
        t,
    },
};

/// Everything a job needs besides its own coordinates. Shared read-only
/// between all jobs of a run.
///
/// 作业除自身坐标外所需的一切。在一次运行的所有作业之间只读共享。
#[derive(Debug, Clone)]
pub struct JobContext {
    /// The checkout copied into every workspace / 复制到每个工作区的检出目录
    pub project_root: PathBuf,
    pub steps: StepCommands,
    pub upload: UploadOptions,
    pub store: ArtifactStore,
    /// Whole-job timeout / 整个作业的超时时间
    pub timeout: Option<Duration>,
    pub locale: String,
}

/// Output accumulated across the steps of one job. It outlives the job
/// future so partial output survives a timeout or cancellation.
#[derive(Clone, Default)]
struct JobLog(Arc<Mutex<String>>);

impl JobLog {
    fn append(&self, text: &str) {
        let mut log = self.0.lock().unwrap_or_else(|e| e.into_inner());
        log.push_str(text);
        if !text.ends_with('\n') {
            log.push('\n');
        }
    }

    fn take(&self) -> String {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

/// A step that did not succeed, with the message to report.
#[derive(Debug)]
struct StepFailure {
    step: StepKind,
    message: String,
}

impl StepFailure {
    fn new(step: StepKind, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

/// What a job produced when every step succeeded.
struct JobOutcome {
    artifact: Option<ArtifactRecord>,
    warnings: Vec<String>,
}

/// The main entry point for running a single build job.
///
/// Never returns an error: every failure is reported as a [`JobResult::Failed`]
/// so that one job cannot abort the others. The job's workspace is deleted
/// before this returns, whatever the outcome.
///
/// 运行单个构建作业的主入口点。
/// 从不返回错误：每个失败都报告为 [`JobResult::Failed`]，因此一个作业不会中止其他作业。
/// 无论结果如何，作业的工作区都会在返回前被删除。
pub async fn run_build_job(
    job: BuildJob,
    ctx: Arc<JobContext>,
    cancel: CancellationToken,
) -> JobResult {
    let locale = ctx.locale.clone();
    if cancel.is_cancelled() {
        return JobResult::Skipped { job };
    }

    println!(
        "{}",
        t!("run.job_started", locale = &locale, job = job.label(), name = &job.artifact_name).blue()
    );

    let log = JobLog::default();
    let current_step = Mutex::new(None::<StepKind>);
    let start = Instant::now();

    let steps = run_job_steps(&job, &ctx, &log, &current_step);
    let timed = async {
        match ctx.timeout {
            Some(limit) => tokio::time::timeout(limit, steps).await.map_err(|_| limit),
            None => Ok(steps.await),
        }
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        res = timed => Some(res),
    };
    let duration = start.elapsed();
    let last_step = *current_step.lock().unwrap_or_else(|e| e.into_inner());

    match outcome {
        Some(Ok(Ok(JobOutcome { artifact, warnings }))) => {
            println!(
                "{}",
                t!(
                    "run.job_passed",
                    locale = &locale,
                    job = job.label(),
                    duration = format!("{:.2}", duration.as_secs_f64())
                )
                .green()
            );
            JobResult::Passed {
                job,
                output: log.take(),
                duration,
                artifact,
                warnings,
            }
        }
        Some(Ok(Err(failure))) => {
            log.append(&failure.message);
            println!(
                "{}",
                t!(
                    "run.job_failed",
                    locale = &locale,
                    job = job.label(),
                    step = failure.step.display_name(&locale),
                    duration = format!("{:.2}", duration.as_secs_f64())
                )
                .red()
            );
            JobResult::Failed {
                job,
                output: log.take(),
                reason: FailureReason::for_step(failure.step),
                step: Some(failure.step),
                duration,
            }
        }
        Some(Err(limit)) => {
            let message = t!(
                "run.job_timeout",
                locale = &locale,
                job = job.label(),
                timeout = limit.as_secs()
            )
            .to_string();
            log.append(&message);
            println!("{}", message.red());
            JobResult::Failed {
                job,
                output: log.take(),
                reason: FailureReason::Timeout,
                step: last_step,
                duration,
            }
        }
        None => {
            let message = t!("run.job_cancelled", locale = &locale, job = job.label()).to_string();
            log.append(&message);
            println!("{}", message.yellow());
            JobResult::Failed {
                job,
                output: log.take(),
                reason: FailureReason::Cancelled,
                step: last_step,
                duration,
            }
        }
    }
}

/// Runs the steps of one job in order. The workspace lives inside this
/// future, so dropping the future (timeout, cancellation) tears it down and
/// kills any running tool.
async fn run_job_steps(
    job: &BuildJob,
    ctx: &JobContext,
    log: &JobLog,
    current_step: &Mutex<Option<StepKind>>,
) -> Result<JobOutcome, StepFailure> {
    let locale = ctx.locale.as_str();
    let enter = |step: StepKind| {
        *current_step.lock().unwrap_or_else(|e| e.into_inner()) = Some(step);
        println!(
            "  {} {}",
            format!("[{}]", job.label()).dimmed(),
            t!("run.step_started", locale = locale, step = step.display_name(locale))
        );
    };

    enter(StepKind::Provision);
    let workspace = provision(job, ctx)
        .await
        .map_err(|e| StepFailure::new(StepKind::Provision, format!("{e:#}")))?;
    log.append(&t!("run.workspace_ready", locale = locale, path = workspace.path().display()));

    let command_steps = [
        (StepKind::InstallRuntime, ctx.steps.install_runtime.as_str()),
        (StepKind::InstallToolchain, ctx.steps.install_toolchain.as_str()),
        (StepKind::InstallPackager, ctx.steps.install_packager.as_str()),
        (StepKind::Build, ctx.steps.build.as_str()),
    ];
    for (step, template) in command_steps {
        enter(step);
        run_command_step(step, template, job, &workspace, log, locale).await?;
    }

    enter(StepKind::Collect);
    let collected = collect(job, ctx, &workspace)
        .await
        .map_err(|e| StepFailure::new(StepKind::Collect, format!("{e:#}")))?;

    if collected.is_empty() {
        let message = t!(
            "run.no_files_found",
            locale = locale,
            pattern = &job.artifact_glob,
            name = &job.artifact_name
        )
        .to_string();
        return match ctx.upload.if_no_files_found {
            IfNoFilesFound::Error => Err(StepFailure::new(StepKind::Collect, message)),
            IfNoFilesFound::Warn => {
                println!("  {} {}", format!("[{}]", job.label()).dimmed(), message.yellow());
                log.append(&message);
                Ok(JobOutcome {
                    artifact: None,
                    warnings: vec![message],
                })
            }
            IfNoFilesFound::Ignore => Ok(JobOutcome {
                artifact: None,
                warnings: Vec::new(),
            }),
        };
    }

    enter(StepKind::Upload);
    let record = upload(job, ctx, collected)
        .await
        .map_err(|e| StepFailure::new(StepKind::Upload, format!("{e:#}")))?;
    log.append(&t!(
        "run.uploaded",
        locale = locale,
        name = &record.name,
        count = record.file_count,
        path = record.archive_path.display()
    ));

    // Keep the workspace alive until the upload has read every file.
    drop(workspace);
    Ok(JobOutcome {
        artifact: Some(record),
        warnings: Vec::new(),
    })
}

/// Copies the checkout into a fresh workspace. The artifact store and the
/// directory the upload pattern collects from are left out, so the job only
/// ever uploads what its own build produced.
async fn provision(job: &BuildJob, ctx: &JobContext) -> Result<JobWorkspace> {
    let project_root = ctx.project_root.clone();
    let mut excluded = vec![ctx.store.root().to_path_buf()];
    let output_dir = artifacts::artifact_base_dir(&job.artifact_glob);
    if !output_dir.as_os_str().is_empty() {
        excluded.push(project_root.join(output_dir));
    }
    let job = job.clone();
    tokio::task::spawn_blocking(move || {
        job_fs::create_job_workspace(&project_root, &job, &excluded)
    })
    .await
    .context("workspace task panicked")?
}

async fn collect(
    job: &BuildJob,
    ctx: &JobContext,
    workspace: &JobWorkspace,
) -> Result<CollectedArtifacts> {
    let root = workspace.path().to_path_buf();
    let pattern = job.artifact_glob.clone();
    let include_hidden = ctx.upload.include_hidden_files;
    tokio::task::spawn_blocking(move || artifacts::collect_artifacts(&root, &pattern, include_hidden))
        .await
        .context("collect task panicked")?
}

/// Hand-off between the blocking upload and the job future. An upload that
/// finishes after its job was abandoned is discarded by whichever side sees
/// the other's flag second.
#[derive(Default)]
struct UploadHandoff {
    abandoned: bool,
    committed: bool,
}

/// Discards a committed upload if the job future is dropped before it sees
/// the result.
struct UploadGuard {
    store: ArtifactStore,
    name: String,
    handoff: Arc<Mutex<UploadHandoff>>,
    finished: bool,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut handoff = self.handoff.lock().unwrap_or_else(|e| e.into_inner());
        handoff.abandoned = true;
        if handoff.committed {
            self.store.discard(&self.name);
        }
    }
}

async fn upload(
    job: &BuildJob,
    ctx: &JobContext,
    collected: CollectedArtifacts,
) -> Result<ArtifactRecord> {
    let store = ctx.store.clone();
    let options = ctx.upload.clone();
    let job = job.clone();
    let handoff = Arc::new(Mutex::new(UploadHandoff::default()));
    let mut guard = UploadGuard {
        store: store.clone(),
        name: job.artifact_name.clone(),
        handoff: Arc::clone(&handoff),
        finished: false,
    };
    // Dropping this future (timeout, cancellation) stops the blocking writer.
    let cancel = CancellationToken::new();
    let _stop_on_drop = cancel.clone().drop_guard();

    let result = tokio::task::spawn_blocking(move || {
        let record = store.upload(&job, &collected, &options, &cancel)?;
        let mut handoff = handoff.lock().unwrap_or_else(|e| e.into_inner());
        if handoff.abandoned {
            store.discard(&job.artifact_name);
            bail!("{}", t!("artifacts.upload_cancelled", name = &job.artifact_name));
        }
        handoff.committed = true;
        Ok(record)
    })
    .await
    .context("upload task panicked")?;

    guard.finished = true;
    result
}

/// Renders and runs one external tool inside the workspace. A spawn error or
/// nonzero exit fails the step.
async fn run_command_step(
    step: StepKind,
    template: &str,
    job: &BuildJob,
    workspace: &JobWorkspace,
    log: &JobLog,
    locale: &str,
) -> Result<(), StepFailure> {
    let workspace_dir = workspace.path().to_string_lossy().into_owned();
    let vars = [
        ("os", job.os.as_str()),
        ("runtime_version", job.runtime_version.as_str()),
        ("artifact_name", job.artifact_name.as_str()),
        ("workspace", workspace_dir.as_str()),
    ];
    let parts = command::render_command(template, &vars)
        .map_err(|e| StepFailure::new(step, format!("{e:#}")))?;

    log.append(&format!(
        "{} {}",
        t!("run.command_prefix", locale = locale),
        shlex::try_join(parts.iter().map(String::as_str)).unwrap_or_else(|_| parts.join(" "))
    ));

    let mut cmd = command::build_command(&parts);
    configure_environment(&mut cmd, job, workspace);

    let (status, output) = command::spawn_and_capture(cmd).await;
    if !output.is_empty() {
        log.append(&output);
    }

    let status = status.map_err(|e| {
        StepFailure::new(
            step,
            anyhow!(e)
                .context(t!("run.spawn_failed", locale = locale, program = &parts[0]).to_string())
                .to_string(),
        )
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(StepFailure::new(
            step,
            t!(
                "run.step_exit_status",
                locale = locale,
                step = step.display_name(locale),
                status = status
            )
            .to_string(),
        ))
    }
}

fn configure_environment(cmd: &mut tokio::process::Command, job: &BuildJob, workspace: &JobWorkspace) {
    cmd.current_dir(workspace.path())
        .env("WHEEL_MATRIX_OS", job.os.as_str())
        .env("WHEEL_MATRIX_RUNTIME_VERSION", &job.runtime_version)
        .env("WHEEL_MATRIX_ARTIFACT_NAME", &job.artifact_name)
        .env("CARGO_TARGET_DIR", workspace.target_dir());
}

/// Resolves the artifact store directory: absolute paths are used as-is,
/// relative ones are taken from the project root.
pub fn resolve_store_dir(project_root: &Path, store: &str) -> PathBuf {
    let store = Path::new(store);
    if store.is_absolute() {
        store.to_path_buf()
    } else {
        project_root.join(store)
    }
}
