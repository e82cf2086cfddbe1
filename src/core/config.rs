//! # Configuration Module / 配置模块
//!
//! Parsing and validation of the `BuildMatrix.toml` file that declares the
//! build matrix, the per-job step commands and the artifact upload options.
//!
//! 解析和验证 `BuildMatrix.toml` 文件，该文件声明构建矩阵、每个作业的步骤命令以及产物上传选项。

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::models::{TargetOs, Trigger};
use crate::infra::t;

/// The default name for the build matrix configuration file.
/// 构建矩阵配置文件的默认名称。
pub const CONFIG_FILE_NAME: &str = "BuildMatrix.toml";

/// One row of the matrix: an operating system and the runtime versions built on it.
/// 矩阵中的一行：一个操作系统及在其上构建的运行时版本。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatrixEntry {
    pub os: TargetOs,
    pub runtime_versions: Vec<String>,
}

/// Command templates for each external step of a job.
///
/// Templates may use `{os}`, `{runtime_version}`, `{artifact_name}` and
/// `{workspace}`. Environment variables and `~` are expanded afterwards.
///
/// 作业每个外部步骤的命令模板。
/// 模板可以使用 `{os}`、`{runtime_version}`、`{artifact_name}` 和 `{workspace}`。
/// 之后会展开环境变量和 `~`。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StepCommands {
    pub install_runtime: String,
    /// Always run, even when a toolchain is already installed.
    /// 总是运行，即使已经安装了工具链。
    pub install_toolchain: String,
    pub install_packager: String,
    pub build: String,
}

impl Default for StepCommands {
    fn default() -> Self {
        Self {
            install_runtime: "uv venv --python {runtime_version} .venv".to_string(),
            install_toolchain: "rustup toolchain install stable --profile minimal".to_string(),
            install_packager: "uv pip install --python .venv maturin".to_string(),
            build: "uv run --no-project --python .venv maturin build --release --out dist"
                .to_string(),
        }
    }
}

/// What to do when the artifact glob matches nothing.
/// 当产物 glob 没有匹配任何文件时的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IfNoFilesFound {
    #[default]
    Warn,
    Error,
    Ignore,
}

/// Artifact upload options.
/// 产物上传选项。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Glob selecting build outputs, relative to the job workspace.
    /// 选择构建输出的 glob，相对于作业工作区。
    pub path: String,
    /// Directory of the artifact store, relative to the project root.
    /// 产物存储目录，相对于项目根目录。
    pub store: String,
    pub if_no_files_found: IfNoFilesFound,
    /// Deflate level, 0 (stored) to 9.
    /// Deflate 压缩级别，0（仅存储）到 9。
    pub compression_level: u8,
    /// When `false`, uploading to an existing key fails.
    /// 为 `false` 时，上传到已存在的键会失败。
    pub overwrite: bool,
    pub include_hidden_files: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            path: "dist/*.whl".to_string(),
            store: "artifacts".to_string(),
            if_no_files_found: IfNoFilesFound::Warn,
            compression_level: 6,
            overwrite: false,
            include_hidden_files: false,
        }
    }
}

/// Represents the entire build matrix configuration, loaded from a TOML file.
/// 代表从 TOML 文件加载的整个构建矩阵配置。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildMatrix {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,

    /// Events that start a run / 启动运行的事件
    #[serde(default = "default_triggers")]
    pub triggers: Vec<Trigger>,

    /// Template for each job's storage key / 每个作业存储键的模板
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,

    /// Optional whole-job timeout in seconds / 可选的整个作业超时时间（秒）
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    pub matrix: Vec<MatrixEntry>,

    #[serde(default)]
    pub steps: StepCommands,

    #[serde(default)]
    pub upload: UploadOptions,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_triggers() -> Vec<Trigger> {
    vec![Trigger::Push, Trigger::PullRequest, Trigger::WorkflowDispatch]
}

fn default_artifact_name() -> String {
    "wheels-{os}-{runtime_version}".to_string()
}

impl BuildMatrix {
    /// The wheel-publishing workflow: Windows on 3.11 and 3.12, macOS on
    /// 3.9, 3.11 and 3.12, built with maturin.
    ///
    /// 发布 wheel 的工作流：Windows 上的 3.11 和 3.12，macOS 上的 3.9、3.11 和 3.12，使用 maturin 构建。
    pub fn default_workflow() -> Self {
        Self {
            language: default_language(),
            triggers: default_triggers(),
            artifact_name: default_artifact_name(),
            timeout_secs: None,
            matrix: vec![
                MatrixEntry {
                    os: TargetOs::Windows,
                    runtime_versions: vec!["3.11".to_string(), "3.12".to_string()],
                },
                MatrixEntry {
                    os: TargetOs::Macos,
                    runtime_versions: vec![
                        "3.9".to_string(),
                        "3.11".to_string(),
                        "3.12".to_string(),
                    ],
                },
            ],
            steps: StepCommands::default(),
            upload: UploadOptions::default(),
        }
    }

    /// Checks the invariants that cannot be expressed through deserialization alone.
    /// 检查仅靠反序列化无法表达的不变量。
    pub fn validate(&self) -> Result<()> {
        if self.matrix.is_empty() {
            bail!("{}", t!("config.empty_matrix"));
        }
        if let Some(entry) = self.matrix.iter().find(|e| e.runtime_versions.is_empty()) {
            bail!("{}", t!("config.empty_versions", os = entry.os));
        }
        if let Some(entry) = self
            .matrix
            .iter()
            .find(|e| e.runtime_versions.iter().any(|v| v.trim().is_empty()))
        {
            bail!("{}", t!("config.blank_version", os = entry.os));
        }
        if self.artifact_name.trim().is_empty() {
            bail!("{}", t!("config.empty_artifact_name"));
        }
        if self.upload.path.trim().is_empty() {
            bail!("{}", t!("config.empty_upload_path"));
        }
        if self.upload.compression_level > 9 {
            bail!(
                "{}",
                t!(
                    "config.invalid_compression_level",
                    level = self.upload.compression_level
                )
            );
        }
        Ok(())
    }

    /// Whether a run started by `trigger` should execute this matrix.
    pub fn is_triggered_by(&self, trigger: Trigger) -> bool {
        self.triggers.contains(&trigger)
    }
}

/// Reads, parses and validates a build matrix file.
/// 读取、解析并验证构建矩阵文件。
pub fn load_build_matrix(path: &Path) -> Result<BuildMatrix> {
    let content = fs::read_to_string(path)
        .with_context(|| t!("config.read_failed", path = path.display()).to_string())?;
    parse_build_matrix(&content)
}

/// Parses and validates a build matrix from TOML text.
pub fn parse_build_matrix(content: &str) -> Result<BuildMatrix> {
    let matrix: BuildMatrix =
        toml::from_str(content).with_context(|| t!("config.parse_failed").to_string())?;
    matrix.validate()?;
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let matrix = parse_build_matrix(
            r#"
            [[matrix]]
            os = "linux"
            runtime_versions = ["3.12"]
            "#,
        )
        .unwrap();

        assert_eq!(matrix.language, "en");
        assert_eq!(matrix.artifact_name, "wheels-{os}-{runtime_version}");
        assert_eq!(matrix.triggers.len(), 3);
        assert_eq!(matrix.upload, UploadOptions::default());
        assert_eq!(matrix.steps, StepCommands::default());
        assert!(matrix.timeout_secs.is_none());
    }

    #[test]
    fn upload_options_match_the_workflow_defaults() {
        let upload = UploadOptions::default();
        assert_eq!(upload.if_no_files_found, IfNoFilesFound::Warn);
        assert_eq!(upload.compression_level, 6);
        assert!(!upload.overwrite);
        assert!(!upload.include_hidden_files);
    }

    #[test]
    fn default_workflow_declares_five_pairs() {
        let matrix = BuildMatrix::default_workflow();
        let pairs: usize = matrix.matrix.iter().map(|e| e.runtime_versions.len()).sum();
        assert_eq!(pairs, 5);
        matrix.validate().unwrap();
    }

    #[test]
    fn default_workflow_survives_toml_round_trip() {
        let matrix = BuildMatrix::default_workflow();
        let text = toml::to_string_pretty(&matrix).unwrap();
        assert_eq!(parse_build_matrix(&text).unwrap(), matrix);
    }

    #[test]
    fn rejects_empty_matrix() {
        assert!(parse_build_matrix("matrix = []").is_err());
    }

    #[test]
    fn rejects_os_without_versions() {
        let err = parse_build_matrix(
            r#"
            [[matrix]]
            os = "windows"
            runtime_versions = []
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_out_of_range_compression() {
        let err = parse_build_matrix(
            r#"
            [[matrix]]
            os = "macos"
            runtime_versions = ["3.11"]

            [upload]
            compression_level = 12
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_unknown_os() {
        let err = parse_build_matrix(
            r#"
            [[matrix]]
            os = "plan9"
            runtime_versions = ["3.11"]
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn trigger_filtering() {
        let mut matrix = BuildMatrix::default_workflow();
        matrix.triggers = vec![Trigger::Push];
        assert!(matrix.is_triggered_by(Trigger::Push));
        assert!(!matrix.is_triggered_by(Trigger::PullRequest));
    }
}
