// Shared test helpers for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// Name of the host OS as it appears in `BuildMatrix.toml`.
pub fn host_os() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows",
        "macos" => "macos",
        _ => "linux",
    }
}

/// Creates a minimal extension crate to package.
pub fn setup_test_project() -> TempDir {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let project_path = temp_dir.path();
    let src_path = project_path.join("src");
    fs::create_dir_all(&src_path).expect("Failed to create src directory");

    let cargo_toml_content = r#"[package]
name = "sample_extension"
version = "0.1.0"
edition = "2021"

[lib]
name = "sample_extension"
crate-type = ["cdylib"]
"#;
    fs::write(project_path.join("Cargo.toml"), cargo_toml_content)
        .expect("Failed to write Cargo.toml");
    fs::write(src_path.join("lib.rs"), "pub fn answer() -> u32 { 42 }\n")
        .expect("Failed to write lib.rs");

    temp_dir
}

/// Step commands that fake the toolchain with `sh`. The build step drops one
/// wheel per runtime version into `dist/`.
pub struct FakeSteps {
    pub install_toolchain: String,
    pub build: String,
}

impl Default for FakeSteps {
    fn default() -> Self {
        Self {
            install_toolchain: "true".to_string(),
            build: "sh -c 'mkdir -p dist && echo wheel-{runtime_version} > dist/pkg-{runtime_version}.whl'"
                .to_string(),
        }
    }
}

/// Renders a host-only build matrix. `extra` is appended verbatim and may
/// carry top-level keys such as `timeout_secs`.
pub fn matrix_toml(versions: &[&str], steps: &FakeSteps, upload_extra: &str, extra: &str) -> String {
    let versions = versions
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"language = "en"
{extra}

[[matrix]]
os = "{os}"
runtime_versions = [{versions}]

[steps]
install_runtime = "true"
install_toolchain = "{toolchain}"
install_packager = "true"
build = "{build}"

[upload]
path = "dist/*.whl"
store = "artifacts"
{upload_extra}
"#,
        os = host_os(),
        toolchain = steps.install_toolchain.replace('"', "\\\""),
        build = steps.build.replace('"', "\\\""),
    )
}

/// Writes `content` as `BuildMatrix.toml` inside `dir`.
pub fn write_matrix(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("BuildMatrix.toml");
    fs::write(&path, content).expect("Failed to write BuildMatrix.toml");
    path
}

/// Helper function to create an invalid TOML configuration
pub fn create_invalid_toml(dir: &Path) -> PathBuf {
    write_matrix(
        dir,
        r#"
language = "en"
# Invalid TOML - missing closing bracket
[[matrix]
os = "linux"
"#,
    )
}
