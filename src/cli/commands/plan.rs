//! # Plan Command Module / 计划命令模块
//!
//! Prints the jobs a build matrix expands to, for every operating system,
//! without running anything. `--json` output can feed another CI system's
//! dynamic matrix.
//!
//! 打印构建矩阵展开后的所有作业（涵盖每个操作系统），不运行任何内容。
//! `--json` 输出可以提供给其他 CI 系统的动态矩阵。

use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::core::{config, planner};
use crate::infra::t;

pub fn execute(config_path: &Path, json: bool) -> Result<()> {
    let build_matrix = config::load_build_matrix(config_path)?;
    let jobs = planner::expand_matrix(&build_matrix)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    println!("\n{}", t!("plan.banner", count = jobs.len()).bold());
    for job in &jobs {
        println!(
            "  - {:<10} {:<8} -> {}",
            job.os.as_str().cyan(),
            job.runtime_version,
            job.artifact_name.yellow()
        );
    }
    let triggers: Vec<_> = build_matrix.triggers.iter().map(|trigger| trigger.as_str()).collect();
    println!("\n{}", t!("plan.triggers", triggers = triggers.join(", ")));
    Ok(())
}
