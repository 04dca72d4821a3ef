//! Data files and deep merging.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{AssetKind, AssetLoadError};
use crate::page::{extension_of, page_name};

/// Extensions recognised as data files.
pub(crate) const DATA_EXTENSIONS: &[&str] = &["json", "yml", "yaml", "toml"];

/// Stem of the data file merged into the root of global data.
const ROOT_DATA_STEM: &str = "data";

/// Merge `source` into `target`.
///
/// Objects merge key by key, recursively. Any other value in `source`
/// replaces the value in `target`.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => merge_maps(target, source),
        (target, source) => *target = source,
    }
}

/// Map form of [`deep_merge`].
pub fn merge_maps(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match target.get_mut(&key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

/// Whether `path` has a data file extension.
pub(crate) fn is_data_file(path: &Path) -> bool {
    DATA_EXTENSIONS.contains(&extension_of(path).as_str())
}

/// Parse a data file according to its extension.
pub(crate) fn parse_data_file(path: &Path) -> Result<Value, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    parse_data(&extension_of(path), &content)
}

/// Parse data text in the format named by `extension`.
pub(crate) fn parse_data(extension: &str, content: &str) -> Result<Value, String> {
    match extension {
        "json" => serde_json::from_str(content).map_err(|e| e.to_string()),
        "yml" | "yaml" => {
            if content.trim().is_empty() {
                return Ok(Value::Object(Map::new()));
            }
            serde_yaml::from_str(content).map_err(|e| e.to_string())
        }
        "toml" => toml::from_str::<toml::Table>(content)
            .map_err(|e| e.to_string())
            .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string())),
        other => Err(format!("unsupported data format \"{other}\"")),
    }
}

/// Load every data file under `root` into one map.
///
/// Each file is stored under its stem. A file named `data.*` is merged into
/// the root instead. Unparseable files are skipped and reported.
pub(crate) fn load_data_dir(root: &Path) -> (Map<String, Value>, Vec<AssetLoadError>) {
    let mut data = Map::new();
    let mut warnings = Vec::new();

    let files = match folio_storage::glob_entries(root, "**/*.*") {
        Ok(entries) => entries,
        Err(e) => {
            warnings.push(AssetLoadError::new(AssetKind::Data, root, e));
            return (data, warnings);
        }
    };

    for path in files.iter().filter(|p| p.is_file() && is_data_file(p)) {
        match parse_data_file(path) {
            Ok(value) => {
                let stem = page_name(path);
                if stem == ROOT_DATA_STEM {
                    if let Value::Object(map) = value {
                        merge_maps(&mut data, map);
                    } else {
                        warnings.push(AssetLoadError::new(
                            AssetKind::Data,
                            path,
                            "root data file must contain a mapping",
                        ));
                    }
                } else {
                    let slot = data.entry(stem).or_insert(Value::Null);
                    deep_merge(slot, value);
                }
            }
            Err(message) => warnings.push(AssetLoadError::new(AssetKind::Data, path, message)),
        }
    }

    (data, warnings)
}

/// Load a directory as a nested tree.
///
/// Subdirectories become nested objects keyed by directory name, data files
/// become their parsed contents keyed by stem.
pub(crate) fn load_tree(dir: &Path, kind: AssetKind, warnings: &mut Vec<AssetLoadError>) -> Map<String, Value> {
    let mut tree = Map::new();
    let entries = match folio_storage::glob_entries(dir, "*") {
        Ok(entries) => entries,
        Err(e) => {
            warnings.push(AssetLoadError::new(kind, dir, e));
            return tree;
        }
    };

    for path in entries {
        if path.is_dir() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let child = load_tree(&path, kind, warnings);
            deep_merge(tree.entry(name).or_insert(Value::Null), Value::Object(child));
        } else if is_data_file(&path) {
            match parse_data_file(&path) {
                Ok(value) => deep_merge(tree.entry(page_name(&path)).or_insert(Value::Null), value),
                Err(message) => warnings.push(AssetLoadError::new(kind, &path, message)),
            }
        }
    }
    tree
}
