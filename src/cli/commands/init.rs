//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command, which writes a new
//! `BuildMatrix.toml`. By default an interactive wizard asks which operating
//! systems and interpreter versions to build and how to invoke the packaging
//! tool; `--non-interactive` writes the default wheel workflow directly.
//!
//! 此模块实现 `init` 命令，用于写入新的 `BuildMatrix.toml`。
//! 默认情况下，交互式向导会询问要构建哪些操作系统和解释器版本以及如何调用打包工具；
//! `--non-interactive` 则直接写入默认的 wheel 工作流。

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input, MultiSelect, theme::ColorfulTheme};
use std::fs;
use std::path::Path;

use crate::core::config::{BuildMatrix, MatrixEntry};
use crate::core::models::TargetOs;
use crate::core::planner;
use crate::infra::t;

/// Executes the init command.
///
/// # Arguments
/// * `output` - Path for the new configuration file
/// * `force` - Overwrite an existing file without asking
/// * `non_interactive` - Skip the wizard and write the default workflow
/// * `language` - Language recorded in the generated file
pub fn execute(output: &Path, force: bool, non_interactive: bool, language: &str) -> Result<()> {
    let mut build_matrix = if non_interactive {
        if output.exists() && !force {
            println!("{}", t!("init.file_exists", path = output.display()).red());
            println!("{}", t!("init.use_force").yellow());
            return Ok(());
        }
        BuildMatrix::default_workflow()
    } else {
        let theme = ColorfulTheme::default();
        println!("\n{}", t!("init.wizard_welcome").bold().cyan());
        println!("{}\n", t!("init.wizard_description"));

        if output.exists() && !force && !confirm_overwrite(&theme, output)? {
            println!("{}", t!("init.aborted").yellow());
            return Ok(());
        }
        prompt_for_matrix(&theme)?
    };
    build_matrix.language = language.to_string();

    // Refuse to write a file `run` would reject.
    build_matrix.validate()?;
    planner::expand_matrix(&build_matrix)?;

    write_config(output, &build_matrix)?;

    println!(
        "\n{} {}",
        "✔".green(),
        t!("init.success", path = output.display()).bold()
    );
    println!("{}", t!("init.next_steps"));
    Ok(())
}

/// Serializes the matrix and writes it, creating parent directories as needed.
pub fn write_config(output: &Path, build_matrix: &BuildMatrix) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            t!("init.create_parent_dir_failed", path = parent.display()).to_string()
        })?;
    }

    let toml_string = toml::to_string_pretty(build_matrix)
        .with_context(|| t!("init.serialize_failed").to_string())?;
    let content = format!("{}\n\n{}", t!("init.file_header"), toml_string);

    fs::write(output, content)
        .with_context(|| t!("init.write_failed", path = output.display()).to_string())
}

fn confirm_overwrite(theme: &ColorfulTheme, output: &Path) -> Result<bool> {
    Confirm::with_theme(theme)
        .with_prompt(t!("init.overwrite_prompt", path = output.display()).to_string())
        .default(false)
        .interact()
        .with_context(|| t!("init.confirmation_failed").to_string())
}

/// Asks for the operating systems, their interpreter versions and the build command.
fn prompt_for_matrix(theme: &ColorfulTheme) -> Result<BuildMatrix> {
    let mut build_matrix = BuildMatrix::default_workflow();

    let os_names: Vec<&str> = TargetOs::ALL.iter().map(|os| os.as_str()).collect();
    let defaults: Vec<bool> = TargetOs::ALL
        .iter()
        .map(|os| build_matrix.matrix.iter().any(|e| e.os == *os))
        .collect();

    let selections = MultiSelect::with_theme(theme)
        .with_prompt(t!("init.os_selection_prompt").to_string())
        .items(&os_names)
        .defaults(&defaults)
        .interact()?;

    let mut entries = Vec::new();
    for index in selections {
        let os = TargetOs::ALL[index];
        let suggested = build_matrix
            .matrix
            .iter()
            .find(|e| e.os == os)
            .map(|e| e.runtime_versions.join(", "))
            .unwrap_or_else(|| "3.12".to_string());

        let versions: String = Input::with_theme(theme)
            .with_prompt(t!("init.versions_prompt", os = os).to_string())
            .default(suggested)
            .interact_text()?;

        let runtime_versions = parse_version_list(&versions);
        if runtime_versions.is_empty() {
            println!("{}", t!("init.no_versions_for_os", os = os).yellow());
            continue;
        }
        entries.push(MatrixEntry { os, runtime_versions });
    }

    if entries.is_empty() {
        println!("{}", t!("init.no_os_selected").yellow());
    } else {
        build_matrix.matrix = entries;
    }

    build_matrix.steps.build = Input::with_theme(theme)
        .with_prompt(t!("init.build_command_prompt").to_string())
        .default(build_matrix.steps.build.clone())
        .interact_text()?;

    build_matrix.upload.path = Input::with_theme(theme)
        .with_prompt(t!("init.artifact_path_prompt").to_string())
        .default(build_matrix.upload.path.clone())
        .interact_text()?;

    Ok(build_matrix)
}

/// Splits "3.9, 3.11 3.12" into its versions, dropping blanks and repeats.
pub fn parse_version_list(input: &str) -> Vec<String> {
    let mut versions: Vec<String> = Vec::new();
    for version in input.split([',', ' ']).map(str::trim).filter(|v| !v.is_empty()) {
        if !versions.iter().any(|v| v == version) {
            versions.push(version.to_string());
        }
    }
    versions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::load_build_matrix;

    #[test]
    fn parses_comma_and_space_separated_versions() {
        assert_eq!(parse_version_list("3.9, 3.11 3.12,3.11"), vec!["3.9", "3.11", "3.12"]);
        assert!(parse_version_list(" , ").is_empty());
    }

    #[test]
    fn written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("BuildMatrix.toml");
        let matrix = BuildMatrix::default_workflow();

        write_config(&path, &matrix).unwrap();
        assert_eq!(load_build_matrix(&path).unwrap(), matrix);
    }

    #[test]
    fn non_interactive_does_not_clobber_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BuildMatrix.toml");
        fs::write(&path, "keep me").unwrap();

        execute(&path, false, true, "en").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");

        execute(&path, true, true, "en").unwrap();
        assert!(load_build_matrix(&path).is_ok());
    }
}
