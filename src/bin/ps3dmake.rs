use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ps3dmake::{Config, Executor, Goal, Overrides, RuleGraph, retention};

#[derive(Parser, Debug)]
#[command(name = "ps3dmake", version)]
#[command(about = "Build, check, and preview ps3d scene projects")]
struct Cli {
    /// Project root containing ps3d.py and the scene sources.
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Interpreter that runs the converter (also: PYTHON).
    #[arg(long)]
    interpreter: Option<String>,

    /// Lint checker; the binary name varies by distribution (also: PYLINT).
    #[arg(long)]
    lint_tool: Option<String>,

    /// Page renderer used by `ps` (also: PS3D_RENDERER).
    #[arg(long)]
    renderer: Option<String>,

    /// Mesh viewer used by `run`/`view` (also: PS3D_VIEWER).
    #[arg(long)]
    viewer: Option<String>,

    /// Renderer limit in whole seconds, 0 for none (also: GS_TIMEOUT).
    #[arg(long)]
    render_timeout: Option<u64>,

    /// Viewer limit in whole seconds, 0 for none (also: VIEW_TIMEOUT).
    #[arg(long)]
    view_timeout: Option<u64>,

    /// Converter destination convention, `joint` or `single` (also: PS3D_OUTPUTS).
    #[arg(long)]
    outputs: Option<String>,

    /// Scene to demonstrate, by file name or stem.
    #[arg(long)]
    sample: Option<String>,

    /// Print the resolved plan without executing anything.
    #[arg(long)]
    explain: bool,

    /// Emit JSON instead of text (for --explain and `status`).
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    goal: Option<GoalCmd>,
}

#[derive(Subcommand, Clone, Copy, Debug)]
enum GoalCmd {
    /// Lint, test, then run.
    All,
    /// Static-check every code file.
    Lint,
    /// Run every code file's embedded tests.
    Test,
    /// Convert the sample scene and open the viewer on it.
    Run,
    /// Alias of `run`.
    View,
    /// Preview the sample scene in the page renderer.
    Ps,
    /// Delete every derived .obj/.mtl under the project tree.
    Clean,
    /// Report freshness of every derivable mesh pair.
    Status,
}

impl From<GoalCmd> for Goal {
    fn from(cmd: GoalCmd) -> Self {
        match cmd {
            GoalCmd::All => Goal::All,
            GoalCmd::Lint => Goal::Lint,
            GoalCmd::Test => Goal::Test,
            GoalCmd::Run => Goal::Run,
            GoalCmd::View => Goal::View,
            GoalCmd::Ps => Goal::Ps,
            GoalCmd::Clean => Goal::Clean,
            GoalCmd::Status => Goal::Status,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let goal = Goal::from(cli.goal.unwrap_or(GoalCmd::All));

    let overrides = Overrides {
        interpreter: cli.interpreter,
        lint_tool: cli.lint_tool,
        renderer: cli.renderer,
        viewer: cli.viewer,
        render_timeout: cli.render_timeout,
        view_timeout: cli.view_timeout,
        output_mode: cli.outputs,
        sample: cli.sample,
    };
    let cfg = Config::resolve(&cli.project, &overrides)?;
    let graph = RuleGraph::load(&cfg)?;
    let exec = Executor::new(&cfg);

    match goal {
        Goal::Clean => {
            let removed = retention::clean_project(&cfg.project_root)?;
            eprintln!("removed {} artifact(s)", removed.len());
        }
        Goal::Status => {
            let statuses = exec.status(&graph);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                for status in &statuses {
                    let state = if status.fresh { "fresh" } else { "stale" };
                    println!("{state:<7} {} ({})", status.scene.display(), status.detail);
                }
            }
        }
        goal => {
            let plan = graph.plan(goal)?;
            if cli.explain {
                let view = exec.explain(&plan);
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&view)?);
                } else {
                    print!("{}", view.render_text());
                }
                return Ok(());
            }
            let summary = exec.execute(&plan)?;
            eprintln!(
                "{goal}: {} executed, {} up to date, {} best-effort failure(s)",
                summary.executed, summary.skipped, summary.best_effort_failures
            );
        }
    }
    Ok(())
}
