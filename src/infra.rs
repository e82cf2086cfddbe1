//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for Wheel Matrix,
//! including command execution, job workspaces and the artifact store.
//!
//! 此模块为 Wheel Matrix 提供基础设施服务，
//! 包括命令执行、作业工作区和产物存储。

pub mod artifacts;
pub mod command;
pub mod fs;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
