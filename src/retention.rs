use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::{debug, info, warn};

use crate::{error::BuildResult, rules::Rule};

const MESH_EXTS: [&str; 2] = ["obj", "mtl"];

/// Whether a file belongs to the derived mesh-pair class that `clean`
/// removes and the intermediate sweep protects.
pub fn is_mesh_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MESH_EXTS.contains(&ext))
}

/// Delete every mesh pair under the project tree, regardless of which
/// sources produced it. Depends on nothing, regenerates nothing.
pub fn clean_project(root: &Path) -> BuildResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    remove_mesh_files(root, &mut removed)?;
    removed.sort();
    Ok(removed)
}

fn remove_mesh_files(dir: &Path, removed: &mut Vec<PathBuf>) -> BuildResult<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("cleaning `{}`", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("cleaning `{}`", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            remove_mesh_files(&path, removed)?;
        } else if is_mesh_artifact(&path) {
            std::fs::remove_file(&path)
                .with_context(|| format!("removing `{}`", path.display()))?;
            info!(artifact = %path.display(), "removed");
            removed.push(path);
        }
    }
    Ok(())
}

/// Drop outputs that only existed to satisfy prerequisites of the
/// requested goal. Precious rules are exempt; for this graph that is
/// exactly the mesh pair, which stays behind after `run`/`view`.
pub fn sweep_intermediates<'a>(built: impl IntoIterator<Item = &'a Rule>) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for rule in built {
        if rule.precious {
            debug!(rule = %rule.name, "keeping precious outputs");
            continue;
        }
        for output in &rule.outputs {
            match std::fs::remove_file(output) {
                Ok(()) => {
                    info!(artifact = %output.display(), "removed intermediate");
                    removed.push(output.clone());
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!(
                    artifact = %output.display(),
                    %err,
                    "could not remove intermediate"
                ),
            }
        }
    }
    removed
}
