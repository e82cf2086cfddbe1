//! # Artifact Storage Module / 产物存储模块
//!
//! Collection of build outputs from a job workspace and the local artifact
//! store they are uploaded to. Each artifact is a zip archive named after its
//! key plus a JSON manifest listing the contained files and their digests.
//!
//! 从作业工作区收集构建输出，以及它们被上传到的本地产物存储。
//! 每个产物是一个以其键命名的 zip 归档，外加一个列出所含文件及其摘要的 JSON 清单。

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use globset::GlobBuilder;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};
use zip::CompressionMethod;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;

use crate::core::config::UploadOptions;
use crate::core::models::{ArtifactFile, ArtifactManifest, ArtifactRecord, BuildJob};
use crate::infra::t;

/// Files matched by an artifact glob.
/// 由产物 glob 匹配到的文件。
#[derive(Debug, Default)]
pub struct CollectedArtifacts {
    /// Directory the archive paths are relative to / 归档路径所相对的目录
    pub base: PathBuf,
    /// Absolute paths, sorted / 绝对路径，已排序
    pub files: Vec<PathBuf>,
}

impl CollectedArtifacts {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Splits a glob into its literal leading directory and the remainder.
/// `dist/*.whl` becomes (`dist`, `*.whl`); `**/*.whl` becomes (``, `**/*.whl`).
fn split_glob_base(pattern: &str) -> (PathBuf, String) {
    let is_glob = |s: &str| s.contains(['*', '?', '[', '{']);
    let normalized = pattern.replace('\\', "/");
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty() && *s != ".").collect();

    let literal = segments
        .iter()
        .take(segments.len().saturating_sub(1))
        .take_while(|s| !is_glob(s))
        .count();

    let base: PathBuf = segments[..literal].iter().collect();
    let rest = segments[literal..].join("/");
    (base, rest)
}

/// The literal directory an upload pattern collects from, relative to the
/// project root. Empty when the pattern starts with a wildcard.
///
/// 上传模式收集文件的字面目录，相对于项目根目录。模式以通配符开头时为空。
pub fn artifact_base_dir(pattern: &str) -> PathBuf {
    split_glob_base(pattern).0
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Collects the regular files under `root` matching `pattern`.
///
/// Hidden files and directories (leading `.`) are skipped unless
/// `include_hidden` is set. An absent base directory yields an empty result.
///
/// 收集 `root` 下匹配 `pattern` 的普通文件。
/// 除非设置了 `include_hidden`，否则跳过隐藏文件和目录（以 `.` 开头）。
/// 基础目录不存在时返回空结果。
pub fn collect_artifacts(root: &Path, pattern: &str, include_hidden: bool) -> Result<CollectedArtifacts> {
    let (relative_base, rest) = split_glob_base(pattern);
    if relative_base.components().any(|c| matches!(c, Component::ParentDir)) {
        bail!("{}", t!("artifacts.pattern_escapes", pattern = pattern));
    }
    let base = root.join(&relative_base);

    let matcher = GlobBuilder::new(&rest)
        .literal_separator(true)
        .build()
        .with_context(|| t!("artifacts.invalid_glob", pattern = pattern).to_string())?
        .compile_matcher();

    let mut files = Vec::new();
    if base.is_dir() {
        let walker = WalkDir::new(&base)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || include_hidden || !is_hidden(e));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&base)?;
            if matcher.is_match(relative) {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();

    Ok(CollectedArtifacts { base, files })
}

/// Lowercase hex SHA-256 of everything `input` yields.
pub fn sha256_hex<R: Read>(mut input: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let count = input.read(&mut buf)?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// A directory holding uploaded artifacts, keyed by artifact name.
/// 保存已上传产物的目录，以产物名称为键。
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| t!("artifacts.store_create_failed", path = root.display()).to_string())?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.zip"))
    }

    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archive_path(name).exists()
    }

    /// Stores `collected` under `job.artifact_name`.
    ///
    /// With `overwrite` disabled the archive is created exclusively, so an
    /// existing key (or a concurrent writer of the same key) makes this fail
    /// instead of replacing the stored data. `cancel` is checked between files
    /// and before the manifest is written. A cancelled or failed upload leaves
    /// neither archive nor manifest behind, so the key stays free.
    ///
    /// 将 `collected` 存储在 `job.artifact_name` 下。
    /// 禁用 `overwrite` 时，归档以独占方式创建，因此已存在的键（或同一键的并发写入者）会导致失败，而不是替换已存储的数据。
    /// 在文件之间以及写入清单之前检查 `cancel`。被取消或失败的上传不会留下归档或清单，因此该键仍然可用。
    pub fn upload(
        &self,
        job: &BuildJob,
        collected: &CollectedArtifacts,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<ArtifactRecord> {
        let name = &job.artifact_name;
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            bail!("{}", t!("artifacts.invalid_name", name = name));
        }
        let archive_path = self.archive_path(name);
        let manifest_path = self.manifest_path(name);

        let mut open = OpenOptions::new();
        open.write(true);
        if options.overwrite {
            open.create(true).truncate(true);
        } else {
            open.create_new(true);
        }
        let file = match open.open(&archive_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                bail!("{}", t!("artifacts.key_exists", name = name));
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    t!("artifacts.write_failed", path = archive_path.display()).to_string()
                });
            }
        };

        let result = self
            .write_archive(file, job, collected, options, cancel)
            .and_then(|manifest| {
                if cancel.is_cancelled() {
                    bail!("{}", t!("artifacts.upload_cancelled", name = name));
                }
                let manifest_json = serde_json::to_string_pretty(&manifest)?;
                fs::write(&manifest_path, manifest_json).with_context(|| {
                    t!("artifacts.write_failed", path = manifest_path.display()).to_string()
                })?;
                Ok(manifest)
            });

        match result {
            Ok(manifest) => Ok(ArtifactRecord {
                name: name.clone(),
                archive_path,
                file_count: manifest.files.len(),
            }),
            Err(e) => {
                let _ = fs::remove_file(&archive_path);
                if manifest_path.is_file() {
                    let _ = fs::remove_file(&manifest_path);
                }
                Err(e)
            }
        }
    }

    /// Removes whatever is stored under `name`. Missing files are ignored.
    pub fn discard(&self, name: &str) {
        let _ = fs::remove_file(self.archive_path(name));
        let _ = fs::remove_file(self.manifest_path(name));
    }

    fn write_archive(
        &self,
        file: File,
        job: &BuildJob,
        collected: &CollectedArtifacts,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<ArtifactManifest> {
        let file_options = if options.compression_level == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(options.compression_level)))
        };

        let mut zip = zip::ZipWriter::new(BufWriter::new(file));
        let mut files = Vec::with_capacity(collected.files.len());

        for path in &collected.files {
            if cancel.is_cancelled() {
                bail!("{}", t!("artifacts.upload_cancelled", name = &job.artifact_name));
            }
            let relative = path.strip_prefix(&collected.base).unwrap_or(path);
            let entry_name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let sha256 = sha256_hex(BufReader::new(File::open(path)?))?;
            let size = fs::metadata(path)?.len();

            zip.start_file(entry_name.as_str(), file_options)?;
            io::copy(&mut BufReader::new(File::open(path)?), &mut zip)?;

            files.push(ArtifactFile {
                path: entry_name,
                size,
                sha256,
            });
        }

        let mut writer = zip.finish()?;
        writer.flush()?;

        Ok(ArtifactManifest {
            name: job.artifact_name.clone(),
            os: job.os,
            runtime_version: job.runtime_version.clone(),
            files,
            compression_level: options.compression_level,
            created_at: Utc::now(),
        })
    }

    /// Reads the manifest stored under `name`.
    /// 读取存储在 `name` 下的清单。
    pub fn manifest(&self, name: &str) -> Result<ArtifactManifest> {
        let path = self.manifest_path(name);
        let content = fs::read_to_string(&path)
            .with_context(|| t!("artifacts.not_found", name = name).to_string())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Lists the manifests of all stored artifacts, sorted by name.
    pub fn list(&self) -> Result<Vec<ArtifactManifest>> {
        let mut manifests = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if self.contains(name) {
                    manifests.push(self.manifest(name)?);
                }
            }
        }
        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(manifests)
    }

    /// Extracts the artifact stored under `name` into `dest`, verifying each
    /// file against the manifest digest. Returns the extracted paths.
    ///
    /// 将存储在 `name` 下的产物解压到 `dest`，并根据清单摘要校验每个文件。返回解压出的路径。
    pub fn download(&self, name: &str, dest: &Path) -> Result<Vec<PathBuf>> {
        let manifest = self.manifest(name)?;
        let archive_file = File::open(self.archive_path(name))
            .with_context(|| t!("artifacts.not_found", name = name).to_string())?;
        let mut archive = zip::ZipArchive::new(BufReader::new(archive_file))?;
        fs::create_dir_all(dest)?;

        let mut extracted = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| anyhow!("{}", t!("artifacts.invalid_entry", name = entry.name())))?;
            let out_path = dest.join(&relative);
            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let entry_name = entry.name().to_string();
            let mut out = File::create(&out_path)?;
            io::copy(&mut entry, &mut out)?;
            drop(out);

            let expected = manifest.files.iter().find(|f| f.path == entry_name);
            let actual = sha256_hex(BufReader::new(File::open(&out_path)?))?;
            if expected.is_none_or(|f| f.sha256 != actual) {
                bail!("{}", t!("artifacts.digest_mismatch", name = entry_name));
            }
            extracted.push(out_path);
        }
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_literal_prefix() {
        assert_eq!(split_glob_base("dist/*.whl"), (PathBuf::from("dist"), "*.whl".to_string()));
        assert_eq!(
            split_glob_base("./target/wheels/**/*.whl"),
            (PathBuf::from("target/wheels"), "**/*.whl".to_string())
        );
        assert_eq!(split_glob_base("*.whl"), (PathBuf::new(), "*.whl".to_string()));
        assert_eq!(
            split_glob_base("dist/pkg.whl"),
            (PathBuf::from("dist"), "pkg.whl".to_string())
        );
    }

    #[test]
    fn base_dir_of_upload_patterns() {
        assert_eq!(artifact_base_dir("dist/*.whl"), PathBuf::from("dist"));
        assert_eq!(artifact_base_dir("target/wheels/**/*.whl"), PathBuf::from("target/wheels"));
        assert_eq!(artifact_base_dir("**/*.whl"), PathBuf::new());
    }

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            sha256_hex("abc".as_bytes()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn collects_only_matching_visible_files() {
        let root = tempfile::tempdir().unwrap();
        let dist = root.path().join("dist");
        fs::create_dir_all(dist.join("nested")).unwrap();
        fs::write(dist.join("a-3.11.whl"), "a").unwrap();
        fs::write(dist.join("b.tar.gz"), "b").unwrap();
        fs::write(dist.join(".hidden.whl"), "h").unwrap();
        fs::write(dist.join("nested/c.whl"), "c").unwrap();

        let collected = collect_artifacts(root.path(), "dist/*.whl", false).unwrap();
        let names: Vec<_> = collected
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a-3.11.whl"]);

        let with_hidden = collect_artifacts(root.path(), "dist/*.whl", true).unwrap();
        assert_eq!(with_hidden.files.len(), 2);

        let recursive = collect_artifacts(root.path(), "dist/**/*.whl", false).unwrap();
        assert_eq!(recursive.files.len(), 2);
    }

    #[test]
    fn missing_directory_collects_nothing() {
        let root = tempfile::tempdir().unwrap();
        let collected = collect_artifacts(root.path(), "dist/*.whl", false).unwrap();
        assert!(collected.is_empty());
    }

    #[test]
    fn parent_directory_patterns_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        assert!(collect_artifacts(root.path(), "../dist/*.whl", false).is_err());
    }

    fn job(name: &str) -> BuildJob {
        BuildJob {
            os: crate::core::models::TargetOs::Linux,
            runtime_version: "3.11".to_string(),
            artifact_glob: "dist/*.whl".to_string(),
            artifact_name: name.to_string(),
        }
    }

    fn one_wheel() -> (tempfile::TempDir, CollectedArtifacts) {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("dist")).unwrap();
        fs::write(root.path().join("dist/pkg.whl"), "wheel").unwrap();
        let collected = collect_artifacts(root.path(), "dist/*.whl", false).unwrap();
        (root, collected)
    }

    #[test]
    fn cancelled_upload_leaves_the_key_free() {
        let (_root, collected) = one_wheel();
        let store_dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(store_dir.path()).unwrap();
        let job = job("wheels-linux-3.11");
        let options = UploadOptions::default();

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(store.upload(&job, &collected, &options, &cancelled).is_err());
        assert!(!store.contains("wheels-linux-3.11"));
        assert!(!store.manifest_path("wheels-linux-3.11").exists());

        let record = store
            .upload(&job, &collected, &options, &CancellationToken::new())
            .unwrap();
        assert_eq!(record.file_count, 1);
    }

    #[test]
    fn failed_manifest_write_removes_the_archive() {
        let (_root, collected) = one_wheel();
        let store_dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(store_dir.path()).unwrap();
        let job = job("wheels-linux-3.11");
        fs::create_dir(store.manifest_path("wheels-linux-3.11")).unwrap();

        let err = store
            .upload(&job, &collected, &UploadOptions::default(), &CancellationToken::new())
            .unwrap_err();
        assert!(format!("{err:#}").contains("wheels-linux-3.11.json"));
        assert!(!store.contains("wheels-linux-3.11"));
        assert!(store.manifest_path("wheels-linux-3.11").is_dir());
    }
}
