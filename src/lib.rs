//! # Wheel Matrix Library / Wheel Matrix 库
//!
//! This library provides the core functionality for the Wheel Matrix tool,
//! a configuration-driven runner that builds Python wheels for every
//! (operating system, interpreter version) pair declared in a build matrix.
//!
//! 此库为 Wheel Matrix 工具提供核心功能，
//! 这是一个配置驱动的运行器，为构建矩阵中声明的每个（操作系统，解释器版本）组合构建 Python wheel。
//!
//! ## Modules / 模块
//!
//! - `core` - Data models, configuration, matrix planning and the job execution engine
//! - `infra` - Infrastructure services like command execution, workspaces and artifact storage
//! - `reporting` - Build result reporting and visualization
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 数据模型、配置、矩阵规划和作业执行引擎
//! - `infra` - 基础设施服务，如命令执行、工作区和产物存储
//! - `reporting` - 构建结果报告和可视化
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;
pub use core::planner;

/// Resolves the language to use for console output.
///
/// An explicit request (from `--lang` or the config file) wins if a matching
/// locale is bundled. Otherwise the system locale is tried, first in full
/// (e.g. "zh-CN"), then by its language part (e.g. "en" from "en-US"), and
/// finally "en" is used.
pub fn resolve_locale(requested: Option<&str>) -> String {
    let available = rust_i18n::available_locales!();
    let is_available = |code: &str| available.iter().any(|l| *l == code);
    let pick = |candidate: &str| -> Option<String> {
        if is_available(candidate) {
            return Some(candidate.to_string());
        }
        candidate
            .split('-')
            .next()
            .filter(|lang_code| is_available(lang_code))
            .map(str::to_string)
    };

    requested
        .and_then(pick)
        .or_else(|| sys_locale::get_locale().as_deref().and_then(pick))
        .unwrap_or_else(|| "en".to_string())
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
