//! # File System Operations Module / 文件系统操作模块
//!
//! Provisioning of the isolated per-job workspace: a fresh temporary
//! directory holding a copy of the project checkout.
//!
//! 准备每个作业的隔离工作区：一个包含项目检出副本的全新临时目录。

use anyhow::{Context, Result};
use fs_extra::dir::CopyOptions;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::core::models::BuildJob;
use crate::infra::t;

/// Entries of the project root that never reach a job workspace.
/// 永远不会复制到作业工作区的项目根目录条目。
pub const ALWAYS_EXCLUDED: &[&str] = &["target", ".git", ".hg", ".svn"];

/// A job's private copy of the checkout.
/// The directory on disk is deleted when this value is dropped.
///
/// 作业私有的检出副本。
/// 当此值被丢弃时，磁盘上的目录会被删除。
pub struct JobWorkspace {
    _temp_root: TempDir,
    path: PathBuf,
}

impl JobWorkspace {
    /// Root of the checkout copy; all steps run here.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cargo output directory private to this workspace.
    pub fn target_dir(&self) -> PathBuf {
        self.path.join("target")
    }
}

impl fmt::Debug for JobWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobWorkspace")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Creates a fresh workspace for `job` and copies the checkout into it.
///
/// Top-level entries named in [`ALWAYS_EXCLUDED`] are not copied. Neither is
/// anything listed in `extra_excluded` (the artifact store, the build output
/// directory), at any depth below `project_root`.
///
/// 为 `job` 创建一个全新的工作区并将检出内容复制进去。
/// [`ALWAYS_EXCLUDED`] 中列出的顶层条目不会被复制。
/// `extra_excluded` 中列出的路径（产物存储、构建输出目录）无论位于 `project_root` 下的哪一层都不会被复制。
pub fn create_job_workspace(
    project_root: &Path,
    job: &BuildJob,
    extra_excluded: &[PathBuf],
) -> Result<JobWorkspace> {
    let temp_root = tempfile::Builder::new()
        .prefix(&format!("wheel_matrix_{}_", sanitize(&job.artifact_name)))
        .tempdir()
        .with_context(|| t!("workspace.create_failed").to_string())?;
    let path = temp_root.path().join("checkout");
    fs::create_dir_all(&path)
        .with_context(|| t!("workspace.create_failed").to_string())?;

    let items = checkout_entries(project_root, extra_excluded)?;
    if !items.is_empty() {
        let mut options = CopyOptions::new();
        options.overwrite = true;
        fs_extra::copy_items(&items, &path, &options).with_context(|| {
            t!(
                "workspace.copy_failed",
                from = project_root.display(),
                to = path.display()
            )
            .to_string()
        })?;
    }
    prune_nested(project_root, &path, extra_excluded)?;

    Ok(JobWorkspace {
        _temp_root: temp_root,
        path,
    })
}

/// Lists the top-level entries of `project_root` that belong in a checkout copy.
fn checkout_entries(project_root: &Path, extra_excluded: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let read = fs::read_dir(project_root).with_context(|| {
        t!("workspace.read_failed", path = project_root.display()).to_string()
    })?;

    let mut items = Vec::new();
    for entry in read {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        if ALWAYS_EXCLUDED.iter().any(|ex| name == *ex) {
            continue;
        }
        if extra_excluded.iter().any(|ex| same_path(ex, &path)) {
            continue;
        }
        items.push(path);
    }
    items.sort();
    Ok(items)
}

/// Removes from the copy the excluded paths that sit below a copied
/// top-level entry.
fn prune_nested(project_root: &Path, copy: &Path, extra_excluded: &[PathBuf]) -> Result<()> {
    for excluded in extra_excluded {
        let Ok(relative) = excluded.strip_prefix(project_root) else {
            continue;
        };
        if relative.components().count() < 2 {
            continue;
        }
        let mirrored = copy.join(relative);
        let removed = if mirrored.is_dir() {
            fs::remove_dir_all(&mirrored)
        } else if mirrored.exists() {
            fs::remove_file(&mirrored)
        } else {
            continue;
        };
        removed.with_context(|| {
            t!("workspace.copy_failed", from = excluded.display(), to = mirrored.display()).to_string()
        })?;
    }
    Ok(())
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
