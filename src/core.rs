//! # Core Module / 核心模块
//!
//! This module contains the core functionality of Wheel Matrix,
//! including data models, configuration, matrix planning and job execution.
//!
//! 此模块包含 Wheel Matrix 的核心功能，
//! 包括数据模型、配置、矩阵规划和作业执行。

pub mod config;
pub mod execution;
pub mod models;
pub mod planner;

// Re-exports
pub use config::BuildMatrix;
pub use execution::run_build_job;
pub use models::JobResult;
