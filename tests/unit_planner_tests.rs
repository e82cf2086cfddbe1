//! # Planner Unit Tests / Planner 模块单元测试
//!
//! Tests matrix expansion and runner sharding through the public API, using
//! the default wheel workflow as the reference matrix.
//!
//! 通过公共 API 测试矩阵展开和运行器分片，使用默认 wheel 工作流作为参考矩阵。

use std::collections::HashSet;
use wheel_matrix::core::config::{BuildMatrix, MatrixEntry, parse_build_matrix};
use wheel_matrix::core::models::TargetOs;
use wheel_matrix::core::planner::{derive_artifact_name, expand_matrix, plan_execution};

#[cfg(test)]
mod expansion_tests {
    use super::*;

    #[test]
    fn test_default_workflow_expands_in_declaration_order() {
        let jobs = expand_matrix(&BuildMatrix::default_workflow()).unwrap();
        let labels: Vec<String> = jobs.iter().map(|j| j.label()).collect();
        assert_eq!(
            labels,
            [
                "windows / 3.11",
                "windows / 3.12",
                "macos / 3.9",
                "macos / 3.11",
                "macos / 3.12"
            ]
        );
    }

    #[test]
    fn test_every_job_gets_a_distinct_name() {
        let jobs = expand_matrix(&BuildMatrix::default_workflow()).unwrap();
        let names: HashSet<&str> = jobs.iter().map(|j| j.artifact_name.as_str()).collect();
        assert_eq!(names.len(), jobs.len());
    }

    #[test]
    fn test_jobs_carry_the_upload_pattern() {
        let mut matrix = BuildMatrix::default_workflow();
        matrix.upload.path = "target/wheels/*.whl".to_string();
        let jobs = expand_matrix(&matrix).unwrap();
        assert!(jobs.iter().all(|j| j.artifact_glob == "target/wheels/*.whl"));
    }

    #[test]
    fn test_derive_artifact_name_substitutes_both_placeholders() {
        assert_eq!(
            derive_artifact_name("py{runtime_version}-{os}", TargetOs::Linux, "3.10"),
            "py3.10-linux"
        );
    }

    #[test]
    fn test_duplicate_version_is_rejected() {
        let mut matrix = BuildMatrix::default_workflow();
        matrix.matrix.push(MatrixEntry {
            os: TargetOs::Windows,
            runtime_versions: vec!["3.12".to_string()],
        });
        assert!(expand_matrix(&matrix).is_err());
    }

    #[test]
    fn test_versions_are_compared_as_text() {
        let matrix = parse_build_matrix(
            r#"
[[matrix]]
os = "linux"
runtime_versions = ["3.1", "3.10"]
"#,
        )
        .unwrap();
        assert_eq!(expand_matrix(&matrix).unwrap().len(), 2);
    }
}

#[cfg(test)]
mod sharding_tests {
    use super::*;

    #[test]
    fn test_shards_cover_every_host_job_exactly_once() {
        let jobs = expand_matrix(&BuildMatrix::default_workflow()).unwrap();
        let mut seen = Vec::new();
        for index in 0..3 {
            let plan = plan_execution(jobs.clone(), Some(TargetOs::Macos), Some(3), Some(index)).unwrap();
            assert!(plan.is_distributed);
            seen.extend(plan.jobs_to_run.into_iter().map(|j| j.artifact_name));
        }
        seen.sort();
        assert_eq!(seen, ["wheels-macos-3.11", "wheels-macos-3.12", "wheels-macos-3.9"]);
    }

    #[test]
    fn test_more_runners_than_jobs_leaves_some_idle() {
        let jobs = expand_matrix(&BuildMatrix::default_workflow()).unwrap();
        let plan = plan_execution(jobs, Some(TargetOs::Windows), Some(4), Some(3)).unwrap();
        assert!(plan.jobs_to_run.is_empty());
        assert_eq!(plan.filtered_os_count, 3);
    }
}
