//! # Build Script for Translation Completeness / 翻译完整性构建脚本
//!
//! Parses every `.toml` file in `locales/`, flattens nested tables into the
//! dotted keys `t!` looks up, and compares each locale against the base
//! language (`en.toml`). Missing or unknown keys are reported as cargo
//! warnings so an incomplete translation never goes unnoticed.
//!
//! 解析 `locales/` 中的每个 `.toml` 文件，将嵌套表展平为 `t!` 查找使用的点分键，
//! 并将每种语言与基础语言（`en.toml`）进行比较。缺失或未知的键会作为 cargo 警告报告，
//! 以免不完整的翻译被忽略。

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Collects the dotted keys of every string leaf in `table`.
///
/// 收集 `table` 中每个字符串叶子节点的点分键。
fn flatten_keys(prefix: &str, table: &toml::Table, keys: &mut BTreeSet<String>) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten_keys(&full_key, nested, keys),
            _ => {
                keys.insert(full_key);
            }
        }
    }
}

fn read_keys(path: &Path) -> Result<BTreeSet<String>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let table: toml::Table = toml::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
    let mut keys = BTreeSet::new();
    flatten_keys("", &table, &mut keys);
    Ok(keys)
}

fn main() -> Result<(), String> {
    println!("cargo:rerun-if-changed=locales/");

    let locales_dir = Path::new("locales");
    let base_path = locales_dir.join("en.toml");
    let base_keys = read_keys(&base_path)?;

    let lang_files: Vec<PathBuf> = fs::read_dir(locales_dir)
        .map_err(|e| format!("{}: {e}", locales_dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("toml"))
        .filter(|path| *path != base_path)
        .collect();

    for path in &lang_files {
        let keys = read_keys(path)?;
        for missing in base_keys.difference(&keys) {
            println!(
                "cargo:warning=Key '{missing}' is missing from {}",
                path.display()
            );
        }
        for extra in keys.difference(&base_keys) {
            println!(
                "cargo:warning=Key '{extra}' in {} is not present in en.toml",
                path.display()
            );
        }
    }

    Ok(())
}
