use std::{ffi::OsString, fmt::Write as _, path::PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{BuildError, BuildResult},
    graph::{Plan, RuleGraph},
    invoke::{Invocation, OutputDisposition, Verdict},
    retention,
    rules::{self, FailureClass, Rule},
    stale::{self, Freshness},
    tools::ToolRegistry,
};

/// What a build did, reported at the end of every goal.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct BuildSummary {
    pub executed: usize,
    pub skipped: usize,
    pub best_effort_failures: usize,
    pub swept: usize,
}

/// Sequential, deterministic plan runner. Each step runs at most once;
/// fresh steps are skipped; fatality class decides whether a failure stops
/// the goal or is logged and swallowed.
pub struct Executor<'a> {
    cfg: &'a Config,
    tools: ToolRegistry,
}

impl<'a> Executor<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self {
            cfg,
            tools: ToolRegistry::from_config(cfg),
        }
    }

    pub fn execute(&self, plan: &Plan) -> BuildResult<BuildSummary> {
        let mut summary = BuildSummary::default();
        let mut built_as_prerequisite: Vec<&Rule> = Vec::new();

        for step in &plan.steps {
            let rule = &step.rule;
            let freshness = match stale::freshness(&rule.inputs, &rule.outputs, rule.forced) {
                Ok(freshness) => freshness,
                Err(err) => {
                    if rule.class == FailureClass::Fatal {
                        return Err(err);
                    }
                    warn!(rule = %rule.name, %err, "best-effort rule skipped");
                    summary.best_effort_failures += 1;
                    continue;
                }
            };
            let Freshness::Stale(reason) = freshness else {
                debug!(rule = %rule.name, "up to date");
                summary.skipped += 1;
                continue;
            };
            debug!(rule = %rule.name, %reason, "stale");

            let invocation = self.invocation(rule);
            info!(rule = %rule.name, command = %invocation.command_line(), "running");
            match invocation.run() {
                Ok(Verdict::Success) => {
                    summary.executed += 1;
                    if !step.requested {
                        built_as_prerequisite.push(rule);
                    }
                }
                Ok(Verdict::Failed { code, stderr }) => {
                    let status = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                    if rule.class == FailureClass::Fatal {
                        // Fatal checks run with inherited stdio, so the
                        // tool's own diagnostics are already on the
                        // terminal, verbatim.
                        return Err(BuildError::check(format!(
                            "{} exited with status {status}",
                            rule.name
                        )));
                    }
                    warn!(
                        rule = %rule.name,
                        status = %status,
                        stderr = stderr.as_deref().unwrap_or(""),
                        "best-effort rule failed"
                    );
                    summary.best_effort_failures += 1;
                }
                Ok(Verdict::TimedOut { limit }) => {
                    if rule.class == FailureClass::Fatal {
                        return Err(BuildError::check(format!(
                            "{} timed out after {limit:?}",
                            rule.name
                        )));
                    }
                    warn!(rule = %rule.name, ?limit, "best-effort rule timed out");
                    summary.best_effort_failures += 1;
                }
                Err(err) => {
                    if rule.class == FailureClass::Fatal {
                        return Err(err);
                    }
                    warn!(rule = %rule.name, %err, "best-effort rule failed");
                    summary.best_effort_failures += 1;
                }
            }
        }

        summary.swept = retention::sweep_intermediates(built_as_prerequisite).len();
        Ok(summary)
    }

    /// Resolve a step against the tool registry. The fatality class picks
    /// the output wiring: checks stream through verbatim, previews are
    /// quieted and their stderr captured for the log.
    fn invocation(&self, rule: &Rule) -> Invocation {
        let tool = self.tools.get(rule.spec.tool);
        let mut args: Vec<OsString> = tool.leading_args.iter().map(OsString::from).collect();
        args.extend(rule.spec.args.iter().cloned());
        Invocation {
            program: tool.program.clone(),
            args,
            cwd: Some(rule.spec.cwd.clone()),
            timeout: self.tools.timeout(rule.spec.tool),
            output: match rule.class {
                FailureClass::Fatal => OutputDisposition::Inherit,
                FailureClass::BestEffort => OutputDisposition::Quiet,
            },
            missing_hint: tool.override_hint,
        }
    }

    /// Describe a plan without executing it.
    pub fn explain(&self, plan: &Plan) -> PlanView {
        let steps = plan
            .steps
            .iter()
            .map(|step| {
                let rule = &step.rule;
                let (stale, detail) =
                    match stale::freshness(&rule.inputs, &rule.outputs, rule.forced) {
                        Ok(Freshness::Fresh) => (false, "up to date".to_string()),
                        Ok(Freshness::Stale(reason)) => (true, reason.to_string()),
                        Err(err) => (true, err.to_string()),
                    };
                StepView {
                    rule: rule.name.clone(),
                    class: rule.class.to_string(),
                    command: self.invocation(rule).command_line(),
                    inputs: rule.inputs.clone(),
                    outputs: rule.outputs.clone(),
                    precious: rule.precious,
                    stale,
                    detail,
                }
            })
            .collect();
        PlanView { steps }
    }

    /// Freshness of every derivable mesh pair in the project.
    pub fn status(&self, graph: &RuleGraph) -> Vec<SceneStatus> {
        graph
            .scenes()
            .iter()
            .map(|scene| {
                let rule = rules::convert_rule(scene, self.cfg);
                let (fresh, detail) =
                    match stale::freshness(&rule.inputs, &rule.outputs, rule.forced) {
                        Ok(Freshness::Fresh) => (true, "up to date".to_string()),
                        Ok(Freshness::Stale(reason)) => (false, reason.to_string()),
                        Err(err) => (false, err.to_string()),
                    };
                SceneStatus {
                    scene: scene.clone(),
                    fresh,
                    detail,
                }
            })
            .collect()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PlanView {
    pub steps: Vec<StepView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct StepView {
    pub rule: String,
    pub class: String,
    pub command: String,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub precious: bool,
    pub stale: bool,
    pub detail: String,
}

impl PlanView {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if self.steps.is_empty() {
            out.push_str("nothing to do\n");
            return out;
        }
        for step in &self.steps {
            let state = if step.stale { "stale" } else { "fresh" };
            let _ = writeln!(
                out,
                "{:<9} [{}] {} ({})",
                state, step.class, step.rule, step.detail
            );
            let _ = writeln!(out, "          $ {}", step.command);
        }
        out
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SceneStatus {
    pub scene: PathBuf,
    pub fresh: bool,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputMode;
    use crate::goals::Goal;
    use std::time::Duration;

    fn project(name: &str, files: &[&str]) -> PathBuf {
        let dir = PathBuf::from("target").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        for file in files {
            std::fs::write(dir.join(file), "x").unwrap();
        }
        dir
    }

    fn cfg(root: PathBuf) -> Config {
        Config {
            project_root: root,
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
    fn checks_stream_verbatim_and_previews_are_quieted() {
        let root = project("exec_wiring", &["ps3d.py", "a.ps3d"]);
        let cfg = cfg(root.clone());
        let exec = Executor::new(&cfg);

        let lint = rules::lint_rule(&root.join("ps3d.py"), &cfg);
        let inv = exec.invocation(&lint);
        assert_eq!(inv.output, OutputDisposition::Inherit);
        assert_eq!(inv.timeout, None);

        let view = rules::view_rule(&root.join("a.ps3d"), &cfg);
        let inv = exec.invocation(&view);
        assert_eq!(inv.output, OutputDisposition::Quiet);
        assert_eq!(inv.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn doctest_invocations_carry_the_module_flag_first() {
        let root = project("exec_doctest", &["ps3d.py"]);
        let cfg = cfg(root.clone());
        let exec = Executor::new(&cfg);
        let rule = rules::doctest_rule(&root.join("ps3d.py"), &cfg);
        let inv = exec.invocation(&rule);
        assert_eq!(inv.program, "python3");
        let args: Vec<_> = inv.args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["-m", "doctest", "ps3d.py"]);
    }

    #[test]
    fn explain_marks_phony_rules_stale_without_running_them() {
        let root = project("exec_explain", &["ps3d.py", "a.ps3d"]);
        let cfg = cfg(root);
        let graph = RuleGraph::load(&cfg).unwrap();
        let exec = Executor::new(&cfg);
        let view = exec.explain(&graph.plan(Goal::All).unwrap());
        assert!(view.steps.iter().all(|s| s.stale));
        let text = view.render_text();
        assert!(text.contains("lint ps3d.py"));
        assert!(text.contains("$ pylint ps3d.py"));
    }

    #[test]
    fn status_reports_missing_pairs_as_stale() {
        let root = project("exec_status", &["ps3d.py", "a.ps3d"]);
        let cfg = cfg(root);
        let graph = RuleGraph::load(&cfg).unwrap();
        let exec = Executor::new(&cfg);
        let statuses = exec.status(&graph);
        assert_eq!(statuses.len(), 1);
        assert!(!statuses[0].fresh);
        assert!(statuses[0].detail.contains("does not exist"));
    }
}
