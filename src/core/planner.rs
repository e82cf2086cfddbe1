//! # Build Matrix Planner Module / 构建矩阵计划模块
//!
//! This module expands a matrix declaration into build jobs and decides which
//! of them this runner executes: jobs are filtered to the host operating
//! system and optionally distributed across several CI runners.
//!
//! 此模块将矩阵声明展开为构建作业，并决定本运行器执行哪些作业：
//! 作业按宿主操作系统过滤，并可选地分布到多个 CI 运行器上。

use anyhow::{Result, bail};
use std::collections::HashMap;

use crate::core::config::BuildMatrix;
use crate::core::models::{BuildJob, TargetOs};
use crate::infra::t;

/// Represents the jobs this runner will execute.
/// 表示本运行器将执行的作业。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// Jobs to run, in matrix order (after sharding).
    /// 要运行的作业，按矩阵顺序（分片之后）。
    pub jobs_to_run: Vec<BuildJob>,
    /// Jobs dropped because they target another operating system.
    /// 因面向其他操作系统而被丢弃的作业。
    pub filtered_os_count: usize,
    /// Whether the jobs are distributed across multiple runners (CI environment).
    /// 作业是否分布在多个运行器上（CI 环境）。
    pub is_distributed: bool,
}

/// Substitutes `{os}` and `{runtime_version}` in an artifact name template.
pub fn derive_artifact_name(template: &str, os: TargetOs, runtime_version: &str) -> String {
    template
        .replace("{os}", os.as_str())
        .replace("{runtime_version}", runtime_version)
}

/// Expands the matrix into one build job per (os, runtime_version) pair, in
/// declaration order.
///
/// Fails if a pair is declared twice or if two jobs would derive the same
/// artifact name, since the second upload would otherwise collide with the first.
///
/// 将矩阵展开为每个（os，runtime_version）组合一个构建作业，按声明顺序排列。
/// 如果某个组合被声明两次，或者两个作业会得出相同的产物名称，则失败。
pub fn expand_matrix(matrix: &BuildMatrix) -> Result<Vec<BuildJob>> {
    let mut jobs = Vec::new();
    let mut names: HashMap<String, String> = HashMap::new();

    for entry in &matrix.matrix {
        for version in &entry.runtime_versions {
            let version = version.trim();
            let job = BuildJob {
                os: entry.os,
                runtime_version: version.to_string(),
                artifact_glob: matrix.upload.path.clone(),
                artifact_name: derive_artifact_name(&matrix.artifact_name, entry.os, version),
            };

            if let Some(existing) = jobs
                .iter()
                .find(|j: &&BuildJob| j.os == job.os && j.runtime_version == job.runtime_version)
            {
                bail!("{}", t!("plan.duplicate_pair", job = existing.label()));
            }
            if let Some(previous) = names.insert(job.artifact_name.clone(), job.label()) {
                bail!(
                    "{}",
                    t!(
                        "plan.artifact_name_collision",
                        name = job.artifact_name,
                        first = previous,
                        second = job.label()
                    )
                );
            }
            jobs.push(job);
        }
    }

    Ok(jobs)
}

/// Creates an execution plan from the expanded jobs.
///
/// Only jobs for `host` can be provisioned locally; the others are counted as
/// filtered. When `total_runners` and `runner_index` are both given the
/// remaining jobs are dealt round-robin and only this runner's share is kept.
///
/// 从展开的作业创建执行计划。
/// 只有面向 `host` 的作业可以在本地准备；其他作业计为已过滤。
/// 当同时给出 `total_runners` 和 `runner_index` 时，剩余作业按轮询分配，只保留本运行器的份额。
pub fn plan_execution(
    jobs: Vec<BuildJob>,
    host: Option<TargetOs>,
    total_runners: Option<usize>,
    runner_index: Option<usize>,
) -> Result<ExecutionPlan> {
    let (host_jobs, other_jobs): (Vec<_>, Vec<_>) =
        jobs.into_iter().partition(|job| Some(job.os) == host);

    let (jobs_to_run, is_distributed) = match (total_runners, runner_index) {
        (Some(total), Some(index)) => {
            if total == 0 || index >= total {
                bail!("{}", t!("plan.invalid_runner_index", index = index, total = total));
            }
            let share = host_jobs
                .into_iter()
                .enumerate()
                .filter(|(i, _)| i % total == index)
                .map(|(_, job)| job)
                .collect();
            (share, true)
        }
        (None, None) => (host_jobs, false),
        _ => bail!("{}", t!("plan.runner_args_incomplete")),
    };

    Ok(ExecutionPlan {
        jobs_to_run,
        filtered_os_count: other_jobs.len(),
        is_distributed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MatrixEntry;

    fn matrix_of(entries: &[(TargetOs, &[&str])]) -> BuildMatrix {
        let mut matrix = BuildMatrix::default_workflow();
        matrix.matrix = entries
            .iter()
            .map(|(os, versions)| MatrixEntry {
                os: *os,
                runtime_versions: versions.iter().map(|v| v.to_string()).collect(),
            })
            .collect();
        matrix
    }

    #[test]
    fn derives_names_from_template() {
        assert_eq!(
            derive_artifact_name("wheels-{os}-{runtime_version}", TargetOs::Windows, "3.12"),
            "wheels-windows-3.12"
        );
    }

    #[test]
    fn duplicate_version_is_rejected() {
        let matrix = matrix_of(&[(TargetOs::Macos, &["3.11", "3.11"])]);
        assert!(expand_matrix(&matrix).is_err());
    }

    #[test]
    fn template_without_placeholders_collides() {
        let mut matrix = matrix_of(&[(TargetOs::Macos, &["3.11", "3.12"])]);
        matrix.artifact_name = "wheels".to_string();
        assert!(expand_matrix(&matrix).is_err());
    }

    #[test]
    fn template_without_os_collides_across_oses() {
        let mut matrix = matrix_of(&[
            (TargetOs::Windows, &["3.11"]),
            (TargetOs::Macos, &["3.11"]),
        ]);
        matrix.artifact_name = "wheels-{runtime_version}".to_string();
        assert!(expand_matrix(&matrix).is_err());
    }

    #[test]
    fn host_filter_counts_other_oses() {
        let matrix = BuildMatrix::default_workflow();
        let jobs = expand_matrix(&matrix).unwrap();
        let plan = plan_execution(jobs, Some(TargetOs::Macos), None, None).unwrap();
        assert_eq!(plan.jobs_to_run.len(), 3);
        assert_eq!(plan.filtered_os_count, 2);
        assert!(!plan.is_distributed);
        assert!(plan.jobs_to_run.iter().all(|j| j.os == TargetOs::Macos));
    }

    #[test]
    fn unknown_host_runs_nothing() {
        let jobs = expand_matrix(&BuildMatrix::default_workflow()).unwrap();
        let plan = plan_execution(jobs, None, None, None).unwrap();
        assert!(plan.jobs_to_run.is_empty());
        assert_eq!(plan.filtered_os_count, 5);
    }

    #[test]
    fn sharding_splits_round_robin() {
        let jobs = expand_matrix(&BuildMatrix::default_workflow()).unwrap();
        let first = plan_execution(jobs.clone(), Some(TargetOs::Macos), Some(2), Some(0)).unwrap();
        let second = plan_execution(jobs, Some(TargetOs::Macos), Some(2), Some(1)).unwrap();

        let first: Vec<_> = first.jobs_to_run.iter().map(|j| j.runtime_version.as_str()).collect();
        let second: Vec<_> = second.jobs_to_run.iter().map(|j| j.runtime_version.as_str()).collect();
        assert_eq!(first, vec!["3.9", "3.12"]);
        assert_eq!(second, vec!["3.11"]);
    }

    #[test]
    fn sharding_requires_both_arguments() {
        let jobs = expand_matrix(&BuildMatrix::default_workflow()).unwrap();
        assert!(plan_execution(jobs.clone(), Some(TargetOs::Macos), Some(2), None).is_err());
        assert!(plan_execution(jobs.clone(), Some(TargetOs::Macos), None, Some(0)).is_err());
        assert!(plan_execution(jobs, Some(TargetOs::Macos), Some(2), Some(2)).is_err());
    }
}
