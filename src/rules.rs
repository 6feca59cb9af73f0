use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    config::{CODE_EXT, Config, OutputMode, SCENE_EXT},
    error::BuildResult,
    tools::ToolKind,
};

/// Whether a rule's failure aborts the requesting goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Failure aborts the goal with the tool's diagnostics surfaced.
    Fatal,
    /// Failure (including timeout and a missing binary) is logged and
    /// swallowed; siblings and the goal's exit status are unaffected.
    BestEffort,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// What a rule runs: a tool plus the arguments that follow the tool's own
/// leading arguments. Program name and time limit stay in the registry.
#[derive(Clone, Debug)]
pub struct InvocationSpec {
    pub tool: ToolKind,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
}

/// One executable step of the graph.
///
/// `outputs` empty means phony: no file-existence signal, re-run every
/// invocation. `forced` marks rules that re-run even when their outputs
/// look fresh. `precious` exempts outputs from the intermediate sweep.
#[derive(Clone, Debug)]
pub struct Rule {
    pub name: String,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub class: FailureClass,
    pub precious: bool,
    pub forced: bool,
    pub spec: InvocationSpec,
}

/// Geometry/material destinations for a scene source.
pub fn mesh_pair(scene: &Path) -> (PathBuf, PathBuf) {
    (scene.with_extension("obj"), scene.with_extension("mtl"))
}

/// Per-source static check. Phony and fatal.
pub fn lint_rule(code_file: &Path, cfg: &Config) -> Rule {
    Rule {
        name: format!("lint {}", display_name(code_file)),
        inputs: vec![code_file.to_path_buf()],
        outputs: vec![],
        class: FailureClass::Fatal,
        precious: false,
        forced: false,
        spec: InvocationSpec {
            tool: ToolKind::Lint,
            args: vec![rel_arg(code_file, &cfg.project_root)],
            cwd: cfg.project_root.clone(),
        },
    }
}

/// Per-source embedded-test check. Phony and fatal.
pub fn doctest_rule(code_file: &Path, cfg: &Config) -> Rule {
    Rule {
        name: format!("doctest {}", display_name(code_file)),
        inputs: vec![code_file.to_path_buf()],
        outputs: vec![],
        class: FailureClass::Fatal,
        precious: false,
        forced: false,
        spec: InvocationSpec {
            tool: ToolKind::Doctest,
            args: vec![rel_arg(code_file, &cfg.project_root)],
            cwd: cfg.project_root.clone(),
        },
    }
}

/// Joint-output conversion: one interpreter invocation against the
/// converter script and one scene yields the whole mesh pair. The argument
/// list is the full prerequisite list (script, then scene) followed by the
/// destination paths, object before material. Single mode passes one
/// destination and tracks only the object file.
pub fn convert_rule(scene: &Path, cfg: &Config) -> Rule {
    let script = cfg.converter_script();
    let (obj, mtl) = mesh_pair(scene);
    let root = &cfg.project_root;

    let mut args = vec![
        rel_arg(&script, root),
        rel_arg(scene, root),
        rel_arg(&obj, root),
    ];
    let mut outputs = vec![obj];
    if cfg.output_mode == OutputMode::Joint {
        args.push(rel_arg(&mtl, root));
        outputs.push(mtl);
    }

    Rule {
        name: format!("convert {}", display_name(scene)),
        inputs: vec![script, scene.to_path_buf()],
        outputs,
        class: FailureClass::Fatal,
        // The mesh pair is an end product even when built as a
        // prerequisite of `view`; the intermediate sweep must not eat it.
        precious: true,
        forced: false,
        spec: InvocationSpec {
            tool: ToolKind::Interpreter,
            args,
            cwd: root.clone(),
        },
    }
}

/// Launch the interactive viewer on a scene's object file, scoped to the
/// artifact's directory. The material file is an implicit same-stem
/// sibling; the viewer finds it by the mesh format's own convention.
pub fn view_rule(scene: &Path, cfg: &Config) -> Rule {
    let (obj, _) = mesh_pair(scene);
    let cwd = obj
        .parent()
        .map_or_else(|| cfg.project_root.clone(), Path::to_path_buf);
    Rule {
        name: format!("view {}", display_name(&obj)),
        inputs: vec![obj.clone()],
        outputs: vec![],
        class: FailureClass::BestEffort,
        precious: false,
        forced: false,
        spec: InvocationSpec {
            tool: ToolKind::Viewer,
            args: vec![rel_arg(&obj, &cwd)],
            cwd,
        },
    }
}

/// Page preview straight from the scene source, bypassing the converter.
/// Forced: the point is the live preview side effect, so staleness never
/// skips it.
pub fn render_rule(scene: &Path, cfg: &Config) -> Rule {
    Rule {
        name: format!("preview {}", display_name(scene)),
        inputs: vec![scene.to_path_buf()],
        outputs: vec![],
        class: FailureClass::BestEffort,
        precious: false,
        forced: true,
        spec: InvocationSpec {
            tool: ToolKind::Renderer,
            args: vec![rel_arg(scene, &cfg.project_root)],
            cwd: cfg.project_root.clone(),
        },
    }
}

/// Template table keyed by the requested artifact's extension. `obj` and
/// `mtl` requests share the one conversion rule for their stem, so asking
/// for either (or both) yields exactly one invocation.
pub fn rule_for_target(target: &Path, cfg: &Config) -> Option<Rule> {
    match target.extension()?.to_str()? {
        "obj" | "mtl" => Some(convert_rule(&target.with_extension(SCENE_EXT), cfg)),
        "lint" => Some(lint_rule(&target.with_extension(CODE_EXT), cfg)),
        "doctest" => Some(doctest_rule(&target.with_extension(CODE_EXT), cfg)),
        _ => None,
    }
}

/// Scene sources directly under the project root, sorted for determinism.
pub fn discover_scenes(root: &Path) -> BuildResult<Vec<PathBuf>> {
    discover_by_ext(root, SCENE_EXT)
}

/// Code files (lint/doctest subjects) directly under the project root.
pub fn discover_code(root: &Path) -> BuildResult<Vec<PathBuf>> {
    discover_by_ext(root, CODE_EXT)
}

fn discover_by_ext(root: &Path, ext: &str) -> BuildResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("scanning project root `{}`", root.display()))?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("scanning `{}`", root.display()))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

fn rel_arg(path: &Path, base: &Path) -> OsString {
    path.strip_prefix(base).unwrap_or(path).as_os_str().to_os_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
