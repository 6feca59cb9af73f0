use std::fmt;

/// The user-facing build goals. `All` is the default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Goal {
    /// `lint`, then `test`, then `run`.
    All,
    /// Static-check every code file.
    Lint,
    /// Run every code file's embedded tests.
    Test,
    /// Convert the sample scene and open it in the viewer.
    Run,
    /// Alias of `Run`.
    View,
    /// Preview the sample scene in the page renderer.
    Ps,
    /// Delete every derived mesh pair under the project tree.
    Clean,
    /// Report freshness of every derivable artifact.
    Status,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Lint => "lint",
            Self::Test => "test",
            Self::Run => "run",
            Self::View => "view",
            Self::Ps => "ps",
            Self::Clean => "clean",
            Self::Status => "status",
        };
        write!(f, "{name}")
    }
}
