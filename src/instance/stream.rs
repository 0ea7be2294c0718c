use std::time::Duration;

use log::debug;
use tempfile::TempDir;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::process::Child;
use tokio::process::ChildStdout;
use tokio::task::JoinHandle;

use crate::error::parse_error;
use crate::results::OutputParser;
use crate::results::Solution;
use crate::results::SolveResult;
use crate::results::Statistics;
use crate::results::Status;
use crate::solver::SolverConfiguration;
use crate::Error;

/// How long MiniZinc gets to stop its solver after being asked to terminate.
const TERMINATION_GRACE: Duration = Duration::from_secs(1);

/// The solutions of a running solve, in the order in which MiniZinc reports them.
///
/// The MiniZinc process, the generated files and the solver configuration are kept alive by the
/// stream. Dropping an unfinished stream stops the solve the same way [`SolutionStream::terminate`]
/// does; the grace period then runs on the current tokio runtime, or is skipped without one.
#[derive(Debug)]
pub struct SolutionStream {
    /// Only taken when the solve is stopped.
    child: Option<Child>,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    parser: OutputParser,
    finished: bool,
    _configuration: SolverConfiguration,
    _directory: TempDir,
}

impl SolutionStream {
    pub(crate) fn new(
        child: Child,
        stdout: ChildStdout,
        stderr: JoinHandle<std::io::Result<Vec<u8>>>,
        parser: OutputParser,
        configuration: SolverConfiguration,
        directory: TempDir,
    ) -> SolutionStream {
        SolutionStream {
            child: Some(child),
            stdout: BufReader::new(stdout).lines(),
            stderr: Some(stderr),
            parser,
            finished: false,
            _configuration: configuration,
            _directory: directory,
        }
    }

    /// Wait for the next solution. Returns `None` once MiniZinc has exited successfully; an
    /// unsuccessful exit is reported as a [`crate::MiniZincError`].
    pub async fn next_solution(&mut self) -> Result<Option<Solution>, Error> {
        if self.finished {
            return Ok(None);
        }

        while let Some(line) = self.stdout.next_line().await? {
            if let Some(solution) = self.parser.feed_line(&line)? {
                return Ok(Some(solution));
            }
        }

        let child = self
            .child
            .as_mut()
            .ok_or_else(|| Error::Output("the MiniZinc process was already stopped".to_owned()))?;
        let exit = child.wait().await?;
        self.finished = true;
        let stderr = match self.stderr.take() {
            Some(task) => task
                .await
                .map_err(|error| std::io::Error::new(std::io::ErrorKind::Other, error))??,
            None => Vec::new(),
        };
        debug!("MiniZinc exited with {exit}");

        if !exit.success() {
            return Err(parse_error(&stderr).into());
        }

        Ok(None)
    }

    /// The status implied by the output received so far.
    pub fn status(&self) -> Status {
        self.parser.status()
    }

    pub fn statistics(&self) -> &Statistics {
        self.parser.statistics()
    }

    pub(crate) fn into_result(self, solutions: Vec<Solution>) -> SolveResult {
        SolveResult {
            status: self.parser.status(),
            solutions,
            statistics: self.parser.statistics().clone(),
        }
    }

    /// Stop the solve. MiniZinc and the solvers it started are asked to shut down; whatever is
    /// still running after a second is killed.
    pub async fn terminate(mut self) -> Result<(), Error> {
        match self.child.take() {
            Some(child) if !self.finished => {
                request_stop(&child);
                stop(child).await
            }
            _ => Ok(()),
        }
    }
}

impl Drop for SolutionStream {
    fn drop(&mut self) {
        let Some(child) = self.child.take() else {
            return;
        };
        if self.finished {
            return;
        }

        debug!("Stopping MiniZinc because its solution stream was dropped");
        request_stop(&child);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let _ = runtime.spawn(async move {
                    if let Err(error) = stop(child).await {
                        debug!("Unable to stop MiniZinc: {error}");
                    }
                });
            }
            Err(_) => kill_now(child),
        }
    }
}

/// Signal the process group MiniZinc leads, which holds the solvers it started.
#[cfg(unix)]
fn signal_group(child: &Child, signal: &str) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };

    std::process::Command::new("kill")
        .arg("-s")
        .arg(signal)
        .arg("--")
        .arg(format!("-{pid}"))
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn request_stop(child: &Child) {
    #[cfg(unix)]
    {
        let _ = signal_group(child, "TERM");
    }
    #[cfg(not(unix))]
    {
        let _ = child;
    }
}

/// Wait out the grace period, then kill what is left.
async fn stop(mut child: Child) -> Result<(), Error> {
    if tokio::time::timeout(TERMINATION_GRACE, child.wait())
        .await
        .is_ok()
    {
        return Ok(());
    }

    #[cfg(unix)]
    {
        let _ = signal_group(&child, "KILL");
    }
    child.kill().await?;
    Ok(())
}

fn kill_now(mut child: Child) {
    #[cfg(unix)]
    {
        let _ = signal_group(&child, "KILL");
    }

    let _ = child.start_kill();
}
