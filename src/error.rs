use std::path::PathBuf;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("tool `{tool}` not found on PATH (override with {hint})")]
    ToolMissing { tool: String, hint: &'static str },

    #[error("check failed: {0}")]
    Check(String),

    #[error("missing prerequisite `{0}` (no rule produces it)")]
    MissingInput(PathBuf),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn check(msg: impl Into<String>) -> Self {
        Self::Check(msg.into())
    }

    pub fn tool_missing(tool: impl Into<String>, hint: &'static str) -> Self {
        Self::ToolMissing {
            tool: tool.into(),
            hint,
        }
    }
}
