//! # Reporting Module / 报告模块
//!
//! This module handles the display of build results: a colourful console
//! summary and a standalone HTML report.
//!
//! 此模块处理构建结果的显示：彩色控制台摘要和独立的 HTML 报告。

pub mod console;
pub mod html;

// Re-export common reporting functions
pub use console::{print_summary, print_unexpected_failure_details};
pub use html::generate_html_report;
