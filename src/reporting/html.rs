//! # HTML Reporting Module / HTML 报告模块
//!
//! This module renders a standalone HTML report of a run: summary counts, one
//! row per (os, runtime) job with its artifact, and the collapsible captured
//! output of every job that did not pass cleanly.
//!
//! 此模块渲染一次运行的独立 HTML 报告：汇总计数、每个（os，runtime）作业一行及其产物，
//! 以及每个未完全通过的作业的可折叠捕获输出。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;

use crate::core::models::JobResult;
use crate::infra::t;
use crate::reporting::console::describe_failure;

const HTML_STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 2rem; color: #24292f; }
h1 { font-size: 1.6rem; }
.summary-container { display: flex; gap: 1.5rem; margin-bottom: 1.5rem; }
.summary-item { display: flex; flex-direction: column; align-items: center; padding: .75rem 1.25rem; border: 1px solid #d0d7de; border-radius: 6px; }
.summary-item .count { font-size: 1.5rem; font-weight: 600; }
.passed-text { color: #1a7f37; } .failed-text { color: #cf222e; } .warning-text { color: #9a6700; } .skipped-text { color: #57606a; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: .5rem .75rem; border-bottom: 1px solid #d0d7de; vertical-align: top; }
.status-cell { display: inline-block; padding: .1rem .5rem; border-radius: 4px; font-weight: 600; }
.status-Passed { background: #dafbe1; color: #1a7f37; }
.status-Warning { background: #fff8c5; color: #9a6700; }
.status-Failed, .status-Timeout { background: #ffebe9; color: #cf222e; }
.status-Skipped { background: #eaeef2; color: #57606a; }
.duration-cell { text-align: right; white-space: nowrap; }
details summary { cursor: pointer; color: #0969da; margin-top: .25rem; }
pre.output-content { background: #f6f8fa; padding: .75rem; overflow-x: auto; max-height: 40rem; }
"#;

/// Generates an HTML report from job results and writes it to `output_path`.
///
/// 从作业结果生成 HTML 报告并写入 `output_path`。
///
/// # Errors / 错误
/// Fails if the file cannot be written.
/// 如果无法写入文件则失败。
pub fn generate_html_report(results: &[JobResult], output_path: &Path, locale: &str) -> Result<()> {
    let markup = render_report(results, locale);
    fs::write(output_path, markup.into_string())
        .with_context(|| t!("html_report_write_failed", locale = locale, path = output_path.display()).to_string())
}

/// Renders the report document.
pub fn render_report(results: &[JobResult], locale: &str) -> Markup {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_passed() && !r.has_warnings()).count();
    let warned = results.iter().filter(|r| r.has_warnings()).count();
    let failed = results.iter().filter(|r| r.is_failure()).count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r, JobResult::Skipped { .. }))
        .count();

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale)) }
                div class="summary-container" {
                    (summary_item(total, "", &t!("html_report.summary.total", locale = locale)))
                    (summary_item(passed, "passed-text", &t!("html_report.summary.passed", locale = locale)))
                    (summary_item(warned, "warning-text", &t!("html_report.summary.warnings", locale = locale)))
                    (summary_item(failed, "failed-text", &t!("html_report.summary.failed", locale = locale)))
                    (summary_item(skipped, "skipped-text", &t!("html_report.summary.skipped", locale = locale)))
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.header.os", locale = locale)) }
                            th { (t!("html_report.table.header.runtime", locale = locale)) }
                            th { (t!("html_report.table.header.artifact", locale = locale)) }
                            th { (t!("html_report.table.header.status", locale = locale)) }
                            th class="duration-cell" { (t!("html_report.table.header.duration", locale = locale)) }
                        }
                    }
                    tbody {
                        @for result in results {
                            (result_row(result, locale))
                        }
                    }
                }
            }
        }
    }
}

fn summary_item(count: usize, class: &str, label: &str) -> Markup {
    html! {
        div class="summary-item" {
            span class={ "count " (class) } { (count) }
            span class="label" { (label) }
        }
    }
}

fn result_row(result: &JobResult, locale: &str) -> Markup {
    let job = result.job();
    let duration = result
        .duration()
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "N/A".to_string());
    let detail = match result {
        JobResult::Failed { reason, step, .. } => Some(describe_failure(*reason, *step, locale)),
        JobResult::Passed { warnings, .. } if !warnings.is_empty() => Some(warnings.join("\n")),
        _ => None,
    };
    let show_output = result.is_failure() || result.has_warnings();
    let artifact_files = match result {
        JobResult::Passed {
            artifact: Some(record),
            ..
        } => Some(record.file_count),
        _ => None,
    };

    html! {
        tr {
            td { (job.os.as_str()) }
            td { (job.runtime_version) }
            td {
                code { (job.artifact_name) }
                @if let Some(count) = artifact_files {
                    " (" (t!("html_report.file_count", locale = locale, count = count)) ")"
                }
            }
            td {
                div class={ "status-cell " (result.status_class()) } { (result.status_str(locale)) }
                @if let Some(detail) = &detail {
                    div { small { (detail) } }
                }
                @if show_output {
                    details {
                        summary { (t!("html_report.toggle_output", locale = locale)) }
                        pre class="output-content" { (result.output()) }
                    }
                }
            }
            td class="duration-cell" { (duration) }
        }
    }
}
