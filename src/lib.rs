#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod exec;
pub mod goals;
pub mod graph;
pub mod invoke;
pub mod manifest;
pub mod retention;
pub mod rules;
pub mod stale;
pub mod tools;

pub use config::{Config, OutputMode, Overrides};
pub use error::{BuildError, BuildResult};
pub use exec::{BuildSummary, Executor, PlanView, SceneStatus};
pub use goals::Goal;
pub use graph::{Plan, PlanStep, RuleGraph};
pub use rules::{FailureClass, Rule};
