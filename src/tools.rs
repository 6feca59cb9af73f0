use std::time::Duration;

use crate::config::Config;

/// The external programs the build orchestrates. Everything here is invoked,
/// never reimplemented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Runs the converter script.
    Interpreter,
    /// Static checker for the project's code files.
    Lint,
    /// Embedded-test runner (the interpreter with `-m doctest`).
    Doctest,
    /// Non-interactive PostScript previewer.
    Renderer,
    /// Interactive mesh viewer.
    Viewer,
}

#[derive(Clone, Debug)]
pub struct Tool {
    pub program: String,
    /// Arguments that come before any rule-specific paths.
    pub leading_args: Vec<String>,
    /// Which override configures this tool, for not-found diagnostics.
    pub override_hint: &'static str,
}

/// Resolves tool kinds to concrete programs and per-tool time limits from
/// the configuration.
#[derive(Clone, Debug)]
pub struct ToolRegistry {
    interpreter: Tool,
    lint: Tool,
    doctest: Tool,
    renderer: Tool,
    viewer: Tool,
    render_timeout: Option<Duration>,
    view_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            interpreter: Tool {
                program: cfg.interpreter.clone(),
                leading_args: vec![],
                override_hint: "PYTHON / --interpreter",
            },
            lint: Tool {
                program: cfg.lint_tool.clone(),
                leading_args: vec![],
                override_hint: "PYLINT / --lint-tool",
            },
            doctest: Tool {
                program: cfg.interpreter.clone(),
                leading_args: vec!["-m".to_string(), "doctest".to_string()],
                override_hint: "PYTHON / --interpreter",
            },
            renderer: Tool {
                program: cfg.renderer.clone(),
                leading_args: vec![],
                override_hint: "PS3D_RENDERER / --renderer",
            },
            viewer: Tool {
                program: cfg.viewer.clone(),
                leading_args: vec![],
                override_hint: "PS3D_VIEWER / --viewer",
            },
            render_timeout: cfg.render_timeout,
            view_timeout: cfg.view_timeout,
        }
    }

    pub fn get(&self, kind: ToolKind) -> &Tool {
        match kind {
            ToolKind::Interpreter => &self.interpreter,
            ToolKind::Lint => &self.lint,
            ToolKind::Doctest => &self.doctest,
            ToolKind::Renderer => &self.renderer,
            ToolKind::Viewer => &self.viewer,
        }
    }

    /// Wall-clock bound for a tool, `None` when unbounded. Limits apply
    /// per tool: viewers need longer to load a scene than a renderer needs
    /// to put up a page.
    pub fn timeout(&self, kind: ToolKind) -> Option<Duration> {
        match kind {
            ToolKind::Renderer => self.render_timeout,
            ToolKind::Viewer => self.view_timeout,
            ToolKind::Interpreter | ToolKind::Lint | ToolKind::Doctest => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, OutputMode};

    fn cfg() -> Config {
        Config {
            project_root: "target/tools_cfg".into(),
            interpreter: "python3".into(),
            lint_tool: "pylint".into(),
            renderer: "gs".into(),
            viewer: "meshlab".into(),
            render_timeout: Some(Duration::from_secs(3)),
            view_timeout: Some(Duration::from_secs(10)),
            output_mode: OutputMode::Joint,
            sample: None,
        }
    }

    #[test]
    fn doctest_runner_is_the_interpreter_with_module_flag() {
        let reg = ToolRegistry::from_config(&cfg());
        let doctest = reg.get(ToolKind::Doctest);
        assert_eq!(doctest.program, reg.get(ToolKind::Interpreter).program);
        assert_eq!(doctest.leading_args, vec!["-m", "doctest"]);
    }

    #[test]
    fn only_preview_tools_are_bounded() {
        let reg = ToolRegistry::from_config(&cfg());
        assert!(reg.timeout(ToolKind::Renderer).is_some());
        assert!(reg.timeout(ToolKind::Viewer).is_some());
        assert!(reg.timeout(ToolKind::Lint).is_none());
        assert!(reg.timeout(ToolKind::Interpreter).is_none());
    }
}
