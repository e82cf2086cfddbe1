//! # Artifacts Command Module / 产物命令模块
//!
//! Inspects and retrieves artifacts from a local artifact store.
//!
//! 查看并取回本地产物存储中的产物。

use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::infra::{artifacts::ArtifactStore, t};

/// Prints every stored artifact with its files.
pub fn list(store_dir: &Path) -> Result<()> {
    let store = ArtifactStore::open(store_dir)?;
    let manifests = store.list()?;

    if manifests.is_empty() {
        println!("{}", t!("artifacts.store_empty", path = store_dir.display()).yellow());
        return Ok(());
    }

    for manifest in manifests {
        println!(
            "{} ({} / {}, {})",
            manifest.name.bold(),
            manifest.os,
            manifest.runtime_version,
            manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for file in &manifest.files {
            println!("    {:<60} {:>10}  {}", file.path, file.size, &file.sha256[..12.min(file.sha256.len())]);
        }
    }
    Ok(())
}

/// Extracts the artifact `name` into `dest`.
pub fn download(store_dir: &Path, name: &str, dest: &Path) -> Result<()> {
    let store = ArtifactStore::open(store_dir)?;
    let extracted = store.download(name, dest)?;
    println!(
        "{}",
        t!(
            "artifacts.downloaded",
            name = name,
            count = extracted.len(),
            path = dest.display()
        )
        .green()
    );
    Ok(())
}
