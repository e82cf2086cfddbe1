//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints the end-of-run summary of build jobs to the console and
//! the captured output of every failed job, with internationalization support.
//!
//! 此模块在控制台打印构建作业的运行结束摘要，以及每个失败作业的捕获输出，支持国际化。

use colored::*;

use crate::core::models::{FailureReason, JobResult, StepKind};
use crate::infra::t;

/// Prints a formatted summary of job results to the console.
///
/// 在控制台打印格式化的作业结果摘要。
///
/// # Output Format / 输出格式
/// ```text
/// --- Build Summary ---
///   - Status      | OS       | Runtime  | Artifact                       | Duration
///   - Passed      | macos    | 3.11     | wheels-macos-3.11              |   41.20s
///   - Failed      | macos    | 3.9      | wheels-macos-3.9               |    3.05s
///   - Warning     | macos    | 3.12     | wheels-macos-3.12              |   39.87s
/// ```
pub fn print_summary(results: &[JobResult], locale: &str) {
    println!("\n{}", t!("summary_banner", locale = locale).bold());

    for result in results {
        let job = result.job();
        let status_str = result.status_str(locale);
        let duration_str = result
            .duration()
            .map(|d| format!("{:.2}s", d.as_secs_f64()))
            .unwrap_or_else(|| "N/A".to_string());

        let status_colored = match result {
            JobResult::Passed { .. } if result.has_warnings() => status_str.yellow(),
            JobResult::Passed { .. } => status_str.green(),
            JobResult::Failed { .. } => status_str.red(),
            JobResult::Skipped { .. } => status_str.dimmed(),
        };

        println!(
            "  - {:<12} | {:<8} | {:<8} | {:<30} | {:>9}",
            status_colored,
            job.os.as_str(),
            job.runtime_version,
            job.artifact_name,
            duration_str
        );

        if let JobResult::Passed { warnings, .. } = result {
            for warning in warnings {
                println!("      {} {}", "!".yellow(), warning);
            }
        }
    }
}

/// Prints the captured output of every failed job, so each (os, runtime)
/// pair's failure can be diagnosed on its own.
///
/// 打印每个失败作业的捕获输出，以便单独诊断每个（os，runtime）组合的失败。
pub fn print_unexpected_failure_details(failures: &[&JobResult], locale: &str) {
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        let JobResult::Failed {
            job,
            output,
            reason,
            step,
            ..
        } = result
        else {
            continue;
        };

        println!(
            "[{}/{}] {} '{}' ({})",
            i + 1,
            failures.len(),
            t!("report_header_failure", locale = locale).red(),
            job.artifact_name.cyan(),
            describe_failure(*reason, *step, locale)
        );
        println!("\n--- {} ---\n", t!("job_log", locale = locale).yellow());
        println!("{}", output.trim_end());
        println!("\n{}", "-".repeat(80));
    }
}

/// "Install failure at step 'Install toolchain'" style description.
pub fn describe_failure(
    reason: FailureReason,
    step: Option<StepKind>,
    locale: &str,
) -> String {
    match step {
        Some(step) => t!(
            "failure_at_step",
            locale = locale,
            reason = reason.display_name(locale),
            step = step.display_name(locale)
        )
        .to_string(),
        None => reason.display_name(locale),
    }
}
