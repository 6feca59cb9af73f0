use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::{BuildError, BuildResult},
    manifest::Manifest,
};

pub const DEFAULT_INTERPRETER: &str = "python3";
/// Debian and Fedora install the checker as `pylint`; some older hosts ship
/// `pylint3`. The name is therefore always overridable (`PYLINT`,
/// `--lint-tool`, or the manifest).
pub const DEFAULT_LINT_TOOL: &str = "pylint";
pub const DEFAULT_RENDERER: &str = "gs";
pub const DEFAULT_VIEWER: &str = "meshlab";
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_VIEW_TIMEOUT_SECS: u64 = 10;

/// Extension of human-authored scene sources.
pub const SCENE_EXT: &str = "ps3d";
/// Extension of the project's code files, the lint/doctest subjects.
pub const CODE_EXT: &str = "py";
/// The converter script, expected at the project root. It is both the
/// program every conversion runs and a prerequisite of every mesh pair.
pub const CONVERTER_SCRIPT: &str = "ps3d.py";

/// How many destination paths the converter accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// One invocation names both destinations, object before material.
    /// This is what the real converter's entry point takes.
    Joint,
    /// One destination path; the material file is the converter's business.
    Single,
}

impl OutputMode {
    fn parse(source: &str, value: &str) -> BuildResult<Self> {
        match value.trim() {
            "joint" => Ok(Self::Joint),
            "single" => Ok(Self::Single),
            other => Err(BuildError::config(format!(
                "{source} must be `joint` or `single`, got `{other}`"
            ))),
        }
    }
}

/// Explicit command-line overrides, the outermost configuration layer.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub interpreter: Option<String>,
    pub lint_tool: Option<String>,
    pub renderer: Option<String>,
    pub viewer: Option<String>,
    pub render_timeout: Option<u64>,
    pub view_timeout: Option<u64>,
    pub output_mode: Option<String>,
    pub sample: Option<String>,
}

/// Resolved configuration, built once at startup from
/// defaults ← manifest ← environment ← CLI flags, then passed by reference
/// everywhere. Nothing reads the environment after this point.
#[derive(Clone, Debug)]
pub struct Config {
    pub project_root: PathBuf,
    pub interpreter: String,
    pub lint_tool: String,
    pub renderer: String,
    pub viewer: String,
    /// `None` means unbounded.
    pub render_timeout: Option<Duration>,
    /// `None` means unbounded.
    pub view_timeout: Option<Duration>,
    pub output_mode: OutputMode,
    /// File name or stem of the demonstration scene; `None` selects the
    /// lexicographically first discovered scene.
    pub sample: Option<String>,
}

impl Config {
    pub fn resolve(project_root: &Path, overrides: &Overrides) -> BuildResult<Self> {
        let manifest = Manifest::load(project_root)?;
        Self::resolve_with(
            project_root,
            manifest.as_ref(),
            |key| std::env::var(key).ok(),
            overrides,
        )
    }

    fn resolve_with(
        project_root: &Path,
        manifest: Option<&Manifest>,
        env: impl Fn(&str) -> Option<String>,
        overrides: &Overrides,
    ) -> BuildResult<Self> {
        let manifest_default = Manifest::default();
        let manifest = manifest.unwrap_or(&manifest_default);

        let pick = |flag: &Option<String>, var: &str, pinned: &Option<String>, default: &str| {
            flag.clone()
                .or_else(|| env(var))
                .or_else(|| pinned.clone())
                .unwrap_or_else(|| default.to_string())
        };

        let output_mode = if let Some(value) = &overrides.output_mode {
            OutputMode::parse("--outputs", value)?
        } else if let Some(value) = env("PS3D_OUTPUTS") {
            OutputMode::parse("PS3D_OUTPUTS", &value)?
        } else if let Some(value) = &manifest.output_mode {
            OutputMode::parse("manifest key `output_mode`", value)?
        } else {
            OutputMode::Joint
        };

        Ok(Self {
            project_root: project_root.to_path_buf(),
            interpreter: pick(
                &overrides.interpreter,
                "PYTHON",
                &manifest.interpreter,
                DEFAULT_INTERPRETER,
            ),
            lint_tool: pick(
                &overrides.lint_tool,
                "PYLINT",
                &manifest.lint,
                DEFAULT_LINT_TOOL,
            ),
            renderer: pick(
                &overrides.renderer,
                "PS3D_RENDERER",
                &manifest.renderer,
                DEFAULT_RENDERER,
            ),
            viewer: pick(
                &overrides.viewer,
                "PS3D_VIEWER",
                &manifest.viewer,
                DEFAULT_VIEWER,
            ),
            render_timeout: resolve_timeout(
                "GS_TIMEOUT",
                overrides.render_timeout,
                env("GS_TIMEOUT"),
                manifest.render_timeout,
                DEFAULT_RENDER_TIMEOUT_SECS,
            )?,
            view_timeout: resolve_timeout(
                "VIEW_TIMEOUT",
                overrides.view_timeout,
                env("VIEW_TIMEOUT"),
                manifest.view_timeout,
                DEFAULT_VIEW_TIMEOUT_SECS,
            )?,
            output_mode,
            sample: overrides.sample.clone().or_else(|| manifest.sample.clone()),
        })
    }

    pub fn converter_script(&self) -> PathBuf {
        self.project_root.join(CONVERTER_SCRIPT)
    }
}

fn resolve_timeout(
    var: &str,
    flag: Option<u64>,
    env_value: Option<String>,
    pinned: Option<u64>,
    default_secs: u64,
) -> BuildResult<Option<Duration>> {
    let secs = if let Some(secs) = flag {
        secs
    } else if let Some(raw) = env_value {
        raw.trim().parse::<u64>().map_err(|_| {
            BuildError::config(format!(
                "{var} must be a whole number of seconds (0 disables the limit), got `{raw}`"
            ))
        })?
    } else if let Some(secs) = pinned {
        secs
    } else {
        default_secs
    };
    Ok((secs != 0).then(|| Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply_without_any_override() {
        let cfg =
            Config::resolve_with(Path::new("."), None, no_env, &Overrides::default()).unwrap();
        assert_eq!(cfg.interpreter, DEFAULT_INTERPRETER);
        assert_eq!(cfg.lint_tool, DEFAULT_LINT_TOOL);
        assert_eq!(cfg.render_timeout, Some(Duration::from_secs(3)));
        assert_eq!(cfg.view_timeout, Some(Duration::from_secs(10)));
        assert_eq!(cfg.output_mode, OutputMode::Joint);
        assert!(cfg.sample.is_none());
    }

    #[test]
    fn environment_overrides_manifest_and_flags_override_environment() {
        let manifest = Manifest {
            viewer: Some("pinned-viewer".into()),
            interpreter: Some("pinned-python".into()),
            ..Manifest::default()
        };
        let env = |key: &str| match key {
            "PS3D_VIEWER" => Some("env-viewer".to_string()),
            "PYTHON" => Some("env-python".to_string()),
            _ => None,
        };
        let overrides = Overrides {
            viewer: Some("flag-viewer".into()),
            ..Overrides::default()
        };
        let cfg = Config::resolve_with(Path::new("."), Some(&manifest), env, &overrides).unwrap();
        assert_eq!(cfg.viewer, "flag-viewer");
        assert_eq!(cfg.interpreter, "env-python");
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let env = |key: &str| (key == "VIEW_TIMEOUT").then(|| "0".to_string());
        let cfg =
            Config::resolve_with(Path::new("."), None, env, &Overrides::default()).unwrap();
        assert_eq!(cfg.view_timeout, None);
        assert_eq!(cfg.render_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn malformed_timeout_names_the_variable() {
        let env = |key: &str| (key == "GS_TIMEOUT").then(|| "soon".to_string());
        let err =
            Config::resolve_with(Path::new("."), None, env, &Overrides::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("GS_TIMEOUT"));
        assert!(msg.contains("`soon`"));
    }

    #[test]
    fn malformed_output_mode_names_the_flag() {
        let overrides = Overrides {
            output_mode: Some("both".into()),
            ..Overrides::default()
        };
        let err =
            Config::resolve_with(Path::new("."), None, no_env, &overrides).unwrap_err();
        assert!(err.to_string().contains("--outputs"));
    }
}
