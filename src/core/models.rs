//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the build
//! matrix runner: target platforms, build jobs, job steps, failure reasons,
//! job results and artifact records.
//!
//! 此模块定义了整个构建矩阵运行器中使用的核心数据结构：
//! 目标平台、构建作业、作业步骤、失败原因、作业结果和产物记录。

use crate::infra::t;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// An operating system a build job can target.
/// 构建作业可以面向的操作系统。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    Windows,
    Macos,
    Linux,
}

impl TargetOs {
    /// All supported targets, in display order.
    pub const ALL: [TargetOs; 3] = [TargetOs::Windows, TargetOs::Macos, TargetOs::Linux];

    /// The operating system this process is running on, if it is a supported target.
    /// 当前进程运行的操作系统（如果是受支持的目标）。
    pub fn host() -> Option<Self> {
        std::env::consts::OS.parse().ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOs::Windows => "windows",
            TargetOs::Macos => "macos",
            TargetOs::Linux => "linux",
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetOs {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(TargetOs::Windows),
            "macos" | "darwin" => Ok(TargetOs::Macos),
            "linux" => Ok(TargetOs::Linux),
            other => anyhow::bail!("unsupported operating system: {other}"),
        }
    }
}

/// The event that started a run. A matrix only runs for the events it lists.
/// 启动运行的事件。矩阵只对其列出的事件运行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Push,
    PullRequest,
    WorkflowDispatch,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Push => "push",
            Trigger::PullRequest => "pull_request",
            Trigger::WorkflowDispatch => "workflow_dispatch",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(Trigger::Push),
            "pull_request" => Ok(Trigger::PullRequest),
            "workflow_dispatch" | "manual" => Ok(Trigger::WorkflowDispatch),
            other => anyhow::bail!("unknown trigger event: {other}"),
        }
    }
}

/// One execution of install -> build -> upload for a single
/// (operating system, runtime version) pair.
///
/// 针对单个（操作系统，运行时版本）组合的一次 安装 -> 构建 -> 上传 执行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJob {
    /// The operating system this job targets / 此作业面向的操作系统
    pub os: TargetOs,
    /// The interpreter version, e.g. "3.11" / 解释器版本，例如 "3.11"
    pub runtime_version: String,
    /// Glob, relative to the job workspace, selecting the build outputs.
    /// 相对于作业工作区的 glob，用于选择构建输出。
    pub artifact_glob: String,
    /// Storage key for the uploaded artifact. Unique across the matrix.
    /// 上传产物的存储键。在整个矩阵中唯一。
    pub artifact_name: String,
}

impl BuildJob {
    /// A short human-readable label, e.g. "macos / 3.11".
    pub fn label(&self) -> String {
        format!("{} / {}", self.os, self.runtime_version)
    }
}

/// The sequential steps of a build job.
/// 构建作业的顺序步骤。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Provision,
    InstallRuntime,
    InstallToolchain,
    InstallPackager,
    Build,
    Collect,
    Upload,
}

impl StepKind {
    /// Localized step name for console and HTML output.
    pub fn display_name(&self, locale: &str) -> String {
        let key = match self {
            StepKind::Provision => "step.provision",
            StepKind::InstallRuntime => "step.install_runtime",
            StepKind::InstallToolchain => "step.install_toolchain",
            StepKind::InstallPackager => "step.install_packager",
            StepKind::Build => "step.build",
            StepKind::Collect => "step.collect",
            StepKind::Upload => "step.upload",
        };
        t!(key, locale = locale).to_string()
    }
}

/// Enumerates the possible reasons for a build job failure.
/// 枚举构建作业失败的可能原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum FailureReason {
    /// The isolated workspace could not be created.
    /// 无法创建隔离的工作区。
    Provision,
    /// A runtime, toolchain or packaging tool installation step failed.
    /// 运行时、工具链或打包工具的安装步骤失败。
    Install,
    /// The packaging tool's release build failed.
    /// 打包工具的发布构建失败。
    Build,
    /// The artifact could not be stored, including key collisions.
    /// 无法存储产物，包括键冲突。
    Upload,
    /// The job exceeded its configured timeout.
    /// 作业超出了其配置的超时时间。
    Timeout,
    /// The job was interrupted by a shutdown signal.
    /// 作业被关闭信号中断。
    Cancelled,
    /// The job's task panicked; the output holds the panic message.
    /// 作业任务发生 panic；输出中包含 panic 消息。
    Panicked,
}

impl FailureReason {
    /// Maps the step that failed onto the failure taxonomy.
    pub fn for_step(step: StepKind) -> Self {
        match step {
            StepKind::Provision => FailureReason::Provision,
            StepKind::InstallRuntime | StepKind::InstallToolchain | StepKind::InstallPackager => {
                FailureReason::Install
            }
            StepKind::Build => FailureReason::Build,
            StepKind::Collect | StepKind::Upload => FailureReason::Upload,
        }
    }

    pub fn display_name(&self, locale: &str) -> String {
        let key = match self {
            FailureReason::Provision => "reason.provision",
            FailureReason::Install => "reason.install",
            FailureReason::Build => "reason.build",
            FailureReason::Upload => "reason.upload",
            FailureReason::Timeout => "reason.timeout",
            FailureReason::Cancelled => "reason.cancelled",
            FailureReason::Panicked => "reason.panicked",
        };
        t!(key, locale = locale).to_string()
    }
}

/// A single file included in an uploaded artifact.
/// 上传产物中包含的单个文件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    /// Path inside the archive, using `/` separators / 归档内的路径，使用 `/` 分隔符
    pub path: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the file contents / 文件内容的小写十六进制 SHA-256
    pub sha256: String,
}

/// Metadata written next to every stored artifact archive.
/// 写在每个已存储产物归档旁边的元数据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    pub os: TargetOs,
    pub runtime_version: String,
    pub files: Vec<ArtifactFile>,
    pub compression_level: u8,
    pub created_at: DateTime<Utc>,
}

/// Where a job's artifact ended up.
/// 作业产物的存放位置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub archive_path: PathBuf,
    pub file_count: usize,
}

/// Represents the final result of a single build job.
///
/// 表示单个构建作业的最终结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobResult {
    /// Every step succeeded.
    /// 所有步骤均成功。
    Passed {
        job: BuildJob,
        /// Combined output of all steps / 所有步骤的合并输出
        output: String,
        duration: Duration,
        /// `None` when no files matched and the upload was skipped.
        /// 当没有匹配文件并跳过上传时为 `None`。
        artifact: Option<ArtifactRecord>,
        /// Non-fatal problems, such as an empty artifact collection.
        /// 非致命问题，例如产物收集为空。
        warnings: Vec<String>,
    },
    /// A step failed and the remaining steps were not run.
    /// 某个步骤失败，其余步骤未运行。
    Failed {
        job: BuildJob,
        output: String,
        reason: FailureReason,
        /// The step that failed, if the job got far enough to start one.
        /// 失败的步骤（如果作业已开始执行某个步骤）。
        step: Option<StepKind>,
        duration: Duration,
    },
    /// The job never started because the run was cancelled first.
    /// 作业从未启动，因为运行先被取消了。
    Skipped { job: BuildJob },
}

impl JobResult {
    pub fn job(&self) -> &BuildJob {
        match self {
            JobResult::Passed { job, .. }
            | JobResult::Failed { job, .. }
            | JobResult::Skipped { job } => job,
        }
    }

    pub fn artifact_name(&self) -> &str {
        &self.job().artifact_name
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobResult::Failed { .. })
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, JobResult::Passed { .. })
    }

    pub fn has_warnings(&self) -> bool {
        matches!(self, JobResult::Passed { warnings, .. } if !warnings.is_empty())
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            JobResult::Passed { duration, .. } | JobResult::Failed { duration, .. } => {
                Some(*duration)
            }
            JobResult::Skipped { .. } => None,
        }
    }

    pub fn output(&self) -> &str {
        match self {
            JobResult::Passed { output, .. } | JobResult::Failed { output, .. } => output,
            JobResult::Skipped { .. } => "",
        }
    }

    /// Gets the status of the job as a localized string for display.
    /// 以本地化字符串形式获取作业状态以供显示。
    pub fn status_str(&self, locale: &str) -> String {
        match self {
            JobResult::Passed { .. } if self.has_warnings() => {
                t!("report.status_warning", locale = locale).to_string()
            }
            JobResult::Passed { .. } => t!("report.status_passed", locale = locale).to_string(),
            JobResult::Failed {
                reason: FailureReason::Timeout,
                ..
            } => t!("report.status_timeout", locale = locale).to_string(),
            JobResult::Failed {
                reason: FailureReason::Cancelled,
                ..
            } => t!("report.status_cancelled", locale = locale).to_string(),
            JobResult::Failed { .. } => t!("report.status_failed", locale = locale).to_string(),
            JobResult::Skipped { .. } => t!("report.status_skipped", locale = locale).to_string(),
        }
    }

    /// Gets the CSS class used for the status cell in the HTML report.
    pub fn status_class(&self) -> &'static str {
        match self {
            JobResult::Passed { .. } if self.has_warnings() => "status-Warning",
            JobResult::Passed { .. } => "status-Passed",
            JobResult::Failed {
                reason: FailureReason::Timeout,
                ..
            } => "status-Timeout",
            JobResult::Failed { .. } => "status-Failed",
            JobResult::Skipped { .. } => "status-Skipped",
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobResult::Passed { job, .. } => write!(f, "{}: passed", job.artifact_name),
            JobResult::Failed { job, reason, .. } => {
                write!(f, "{}: failed ({reason:?})", job.artifact_name)
            }
            JobResult::Skipped { job } => write!(f, "{}: skipped", job.artifact_name),
        }
    }
}

/// Package information from Cargo.toml
/// 来自Cargo.toml的包信息
#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    pub name: String,
}

/// Cargo.toml manifest structure, used to name the crate being packaged.
/// Cargo.toml清单结构，用于确定被打包 crate 的名称。
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub package: Package,
}
