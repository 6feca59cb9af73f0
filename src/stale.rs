use std::{
    fmt,
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::Context as _;

use crate::error::{BuildError, BuildResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StaleReason {
    /// The rule has no file outputs to compare against.
    Phony,
    /// The rule is marked always-out-of-date.
    Forced,
    MissingOutput(PathBuf),
    NewerInput { input: PathBuf, output: PathBuf },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phony => write!(f, "no file outputs"),
            Self::Forced => write!(f, "forced"),
            Self::MissingOutput(path) => write!(f, "`{}` does not exist", path.display()),
            Self::NewerInput { input, output } => write!(
                f,
                "`{}` is newer than `{}`",
                input.display(),
                output.display()
            ),
        }
    }
}

/// Decide whether a rule must run. This is the only place that knows the
/// mechanism (mtimes); rule definitions only see the verdict, so the
/// mechanism can move to content hashing without touching them.
///
/// A file-producing rule is stale iff any output is absent or any input is
/// newer than the oldest output. A missing input is an error: nothing in
/// the graph produces sources.
pub fn freshness(inputs: &[PathBuf], outputs: &[PathBuf], forced: bool) -> BuildResult<Freshness> {
    if forced {
        return Ok(Freshness::Stale(StaleReason::Forced));
    }
    if outputs.is_empty() {
        return Ok(Freshness::Stale(StaleReason::Phony));
    }

    let mut oldest: Option<(SystemTime, &PathBuf)> = None;
    for output in outputs {
        let Some(time) = mtime(output)? else {
            return Ok(Freshness::Stale(StaleReason::MissingOutput(output.clone())));
        };
        if oldest.is_none_or(|(t, _)| time < t) {
            oldest = Some((time, output));
        }
    }
    let Some((oldest_time, oldest_output)) = oldest else {
        return Ok(Freshness::Stale(StaleReason::Phony));
    };

    for input in inputs {
        match mtime(input)? {
            None => return Err(BuildError::MissingInput(input.clone())),
            Some(time) if time > oldest_time => {
                return Ok(Freshness::Stale(StaleReason::NewerInput {
                    input: input.clone(),
                    output: oldest_output.clone(),
                }));
            }
            Some(_) => {}
        }
    }
    Ok(Freshness::Fresh)
}

fn mtime(path: &Path) -> BuildResult<Option<SystemTime>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified().with_context(|| {
            format!("no modification time for `{}`", path.display())
        })?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::new(err)
            .context(format!("stat `{}`", path.display()))
            .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = PathBuf::from("target").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path) {
        std::fs::write(path, "x").unwrap();
    }

    fn settle() {
        // Keep writes distinguishable even on filesystems with coarse
        // mtime resolution in the tens of milliseconds.
        std::thread::sleep(std::time::Duration::from_millis(30));
    }

    #[test]
    fn phony_and_forced_are_always_stale() {
        assert_eq!(
            freshness(&[], &[], false).unwrap(),
            Freshness::Stale(StaleReason::Phony)
        );
        assert_eq!(
            freshness(&[], &[PathBuf::from("whatever")], true).unwrap(),
            Freshness::Stale(StaleReason::Forced)
        );
    }

    #[test]
    fn missing_output_is_stale() {
        let dir = scratch("stale_missing_output");
        let input = dir.join("scene.ps3d");
        touch(&input);
        let output = dir.join("scene.obj");
        assert_eq!(
            freshness(&[input], &[output.clone()], false).unwrap(),
            Freshness::Stale(StaleReason::MissingOutput(output))
        );
    }

    #[test]
    fn outputs_newer_than_inputs_are_fresh() {
        let dir = scratch("stale_fresh");
        let input = dir.join("scene.ps3d");
        touch(&input);
        settle();
        let obj = dir.join("scene.obj");
        let mtl = dir.join("scene.mtl");
        touch(&obj);
        touch(&mtl);
        assert_eq!(
            freshness(&[input], &[obj, mtl], false).unwrap(),
            Freshness::Fresh
        );
    }

    #[test]
    fn touched_input_makes_the_pair_stale() {
        let dir = scratch("stale_touched");
        let input = dir.join("scene.ps3d");
        let obj = dir.join("scene.obj");
        touch(&input);
        settle();
        touch(&obj);
        settle();
        touch(&input);
        assert!(freshness(&[input], &[obj], false).unwrap().is_stale());
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = scratch("stale_missing_input");
        let obj = dir.join("scene.obj");
        touch(&obj);
        let gone = dir.join("scene.ps3d");
        match freshness(&[gone.clone()], &[obj], false) {
            Err(BuildError::MissingInput(path)) => assert_eq!(path, gone),
            other => panic!("expected MissingInput, got {other:?}"),
        }
    }
}
