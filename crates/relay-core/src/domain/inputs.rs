//! File-path input resolution.

use std::path::{Component, Path, PathBuf};

use super::metadata::TaskMetadata;
use super::request::TaskInstance;

/// Collapse `.` and `..` without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // ルートより上には行かない
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `value` against `base` the way a shell `cd base; realpath -m value` would.
pub fn resolve_against(base: &Path, value: &str) -> PathBuf {
    normalize(&base.join(value))
}

/// Rewrite every `filePath`-typed input of `task` to an absolute path under `source_folder`.
///
/// Returns the names of the rewritten inputs.
pub fn resolve_file_path_inputs(
    task: &mut TaskInstance,
    metadata: &TaskMetadata,
    source_folder: &Path,
) -> Vec<String> {
    let mut rewritten = Vec::new();
    for name in metadata.file_path_inputs() {
        if let Some(value) = task.inputs.get_mut(name) {
            *value = resolve_against(source_folder, value).to_string_lossy().into_owned();
            rewritten.push(name.to_string());
        }
    }
    rewritten
}
