use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    config::{Config, SCENE_EXT},
    error::{BuildError, BuildResult},
    goals::Goal,
    rules::{self, Rule},
};

/// One entry of a resolved plan.
#[derive(Clone, Debug)]
pub struct PlanStep {
    pub rule: Rule,
    /// Whether the step's outputs are what the goal asked for, as opposed
    /// to prerequisites built along the way. Drives the intermediate sweep.
    pub requested: bool,
}

/// Ordered set of rules satisfying one goal, each rule at most once.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

/// The project's declared targets and pattern rules, instantiated against
/// whatever sources discovery found.
pub struct RuleGraph<'a> {
    cfg: &'a Config,
    scenes: Vec<PathBuf>,
    code: Vec<PathBuf>,
}

impl<'a> RuleGraph<'a> {
    pub fn load(cfg: &'a Config) -> BuildResult<Self> {
        Ok(Self {
            scenes: rules::discover_scenes(&cfg.project_root)?,
            code: rules::discover_code(&cfg.project_root)?,
            cfg,
        })
    }

    pub fn scenes(&self) -> &[PathBuf] {
        &self.scenes
    }

    pub fn code_files(&self) -> &[PathBuf] {
        &self.code
    }

    /// The scene `run`/`view`/`ps` demonstrate: the configured sample, or
    /// the first discovered scene.
    pub fn sample_scene(&self) -> BuildResult<&Path> {
        match &self.cfg.sample {
            Some(wanted) => self
                .scenes
                .iter()
                .find(|scene| {
                    let wanted = std::ffi::OsStr::new(wanted.as_str());
                    scene.file_name() == Some(wanted) || scene.file_stem() == Some(wanted)
                })
                .map(PathBuf::as_path)
                .ok_or_else(|| {
                    BuildError::config(format!(
                        "sample scene `{wanted}` not found under `{}`",
                        self.cfg.project_root.display()
                    ))
                }),
            None => self.scenes.first().map(PathBuf::as_path).ok_or_else(|| {
                BuildError::config(format!(
                    "no `.{SCENE_EXT}` scenes under `{}`",
                    self.cfg.project_root.display()
                ))
            }),
        }
    }

    /// Resolve a goal to the minimal ordered set of rules. Fatal checks
    /// come before the preview rules that depend on their subjects, and a
    /// rule appears at most once even when several requests need it.
    pub fn plan(&self, goal: Goal) -> BuildResult<Plan> {
        let mut builder = PlanBuilder::default();
        self.extend_plan(&mut builder, goal)?;
        Ok(builder.finish())
    }

    fn extend_plan(&self, builder: &mut PlanBuilder, goal: Goal) -> BuildResult<()> {
        match goal {
            Goal::Lint => {
                for file in &self.code {
                    builder.push(rules::lint_rule(file, self.cfg), true);
                }
            }
            Goal::Test => {
                for file in &self.code {
                    builder.push(rules::doctest_rule(file, self.cfg), true);
                }
            }
            Goal::Run | Goal::View => {
                let scene = self.sample_scene()?;
                builder.push(rules::convert_rule(scene, self.cfg), false);
                builder.push(rules::view_rule(scene, self.cfg), true);
            }
            Goal::Ps => {
                let scene = self.sample_scene()?;
                builder.push(rules::render_rule(scene, self.cfg), true);
            }
            Goal::All => {
                self.extend_plan(builder, Goal::Lint)?;
                self.extend_plan(builder, Goal::Test)?;
                self.extend_plan(builder, Goal::Run)?;
            }
            // Deletion and reporting build nothing.
            Goal::Clean | Goal::Status => {}
        }
        Ok(())
    }

    /// Resolve explicit file targets (the `%.obj`-style surface). Asking
    /// for both halves of a mesh pair still yields one conversion step.
    pub fn plan_for_targets(&self, targets: &[PathBuf]) -> BuildResult<Plan> {
        let mut builder = PlanBuilder::default();
        for target in targets {
            let rule = rules::rule_for_target(target, self.cfg).ok_or_else(|| {
                BuildError::config(format!(
                    "no rule produces `{}`",
                    target.display()
                ))
            })?;
            builder.push(rule, true);
        }
        Ok(builder.finish())
    }
}

#[derive(Default)]
struct PlanBuilder {
    steps: Vec<PlanStep>,
    seen: HashMap<String, usize>,
}

impl PlanBuilder {
    fn push(&mut self, rule: Rule, requested: bool) {
        if let Some(&at) = self.seen.get(&rule.name) {
            // Already planned; a direct request upgrades an intermediate.
            self.steps[at].requested |= requested;
            return;
        }
        self.seen.insert(rule.name.clone(), self.steps.len());
        self.steps.push(PlanStep { rule, requested });
    }

    fn finish(self) -> Plan {
        Plan { steps: self.steps }
    }
}
