use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, BuildResult};

/// File name of the optional per-project configuration, looked up in the
/// project root. Absence is not an error; every key inside is optional.
pub const MANIFEST_FILE: &str = "ps3dmake.json";

/// Project-pinned overrides, layered between built-in defaults and the
/// environment.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub interpreter: Option<String>,
    pub lint: Option<String>,
    pub renderer: Option<String>,
    pub viewer: Option<String>,
    /// Whole seconds; 0 disables the bound.
    pub render_timeout: Option<u64>,
    /// Whole seconds; 0 disables the bound.
    pub view_timeout: Option<u64>,
    /// `"joint"` or `"single"`.
    pub output_mode: Option<String>,
    /// File name or stem of the scene `run`/`view`/`ps` demonstrate.
    pub sample: Option<String>,
}

impl Manifest {
    pub fn load(project_root: &Path) -> BuildResult<Option<Self>> {
        let path = project_root.join(MANIFEST_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(BuildError::config(format!(
                    "cannot read `{}`: {err}",
                    path.display()
                )));
            }
        };
        let manifest = serde_json::from_str(&text).map_err(|err| {
            BuildError::config(format!("malformed `{}`: {err}", path.display()))
        })?;
        Ok(Some(manifest))
    }
}
