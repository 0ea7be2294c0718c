//! Interaction with the `minizinc` executable.
//!
//! Driving MiniZinc through its executable is non-incremental: every solve recompiles the full
//! instance. The [`Driver`] is therefore a thin layer which formats arguments, runs the process
//! (either blocking through [`Driver::run`] or asynchronously through [`Driver::create_process`])
//! and converts failures into structured errors.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt::Display;
use std::fmt::Formatter;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::process::Stdio;

use log::debug;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::parse_error;
use crate::solver::SolverConfiguration;
use crate::ConfigurationError;
use crate::Error;
use crate::Solver;

/// The oldest MiniZinc release this crate can drive.
pub const REQUIRED_VERSION: Version = Version {
    major: 2,
    minor: 5,
    patch: 0,
};

/// Every alias under which a solver can be looked up, mapped to the matching solvers in the order
/// in which MiniZinc reported them.
pub type SolverRegistry = HashMap<String, Vec<Solver>>;

#[cfg(target_os = "macos")]
const FALLBACK_LOCATIONS: &[&str] = &[
    "/Applications/MiniZincIDE.app/Contents/Resources",
    "/Applications/MiniZincIDE.app/Contents/MacOS",
];
#[cfg(windows)]
const FALLBACK_LOCATIONS: &[&str] = &[
    "C:\\Program Files\\MiniZinc",
    "C:\\Program Files\\MiniZinc IDE (bundled)",
    "C:\\Program Files (x86)\\MiniZinc",
    "C:\\Program Files (x86)\\MiniZinc IDE (bundled)",
];
#[cfg(not(any(target_os = "macos", windows)))]
const FALLBACK_LOCATIONS: &[&str] = &["/snap/bin", "/opt/minizinc/bin"];

/// MiniZinc terminates its solvers by generating a Ctrl+C event for its own console, so on
/// Windows it needs a console of its own. On other platforms MiniZinc signals the process group of
/// the solver, which never includes us.
#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"version (\d+)\.(\d+)\.(\d+)").expect("version pattern is valid"));

/// A `major.minor.patch` release number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Find the version in the output of `minizinc --version`.
    pub fn parse(text: &str) -> Option<Version> {
        let captures = VERSION.captures(text)?;
        let number = |index: usize| captures[index].parse::<u32>().ok();

        Some(Version {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
        })
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Interfaces with MiniZinc through its command line executable.
#[derive(Debug)]
pub struct Driver {
    executable: PathBuf,
    version: Version,
    solver_cache: Option<SolverRegistry>,
}

impl Driver {
    /// Create a driver for the given executable. Fails if the executable does not exist or is
    /// older than [`REQUIRED_VERSION`].
    pub fn new(executable: impl Into<PathBuf>) -> Result<Driver, ConfigurationError> {
        let executable = executable.into();
        if !executable.exists() {
            return Err(ConfigurationError::ExecutableNotFound(executable));
        }

        let output = Command::new(&executable)
            .arg("--allow-multiple-assignments")
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|error| ConfigurationError::DriverQuery {
                path: executable.clone(),
                reason: error.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = Version::parse(&stdout).ok_or_else(|| ConfigurationError::DriverQuery {
            path: executable.clone(),
            reason: format!("unrecognised version output `{}`", stdout.trim()),
        })?;

        if version < REQUIRED_VERSION {
            return Err(ConfigurationError::IncompatibleVersion {
                path: executable,
                found: version,
                required: REQUIRED_VERSION,
            });
        }

        debug!("Using MiniZinc {version} at '{}'", executable.display());

        Ok(Driver {
            executable,
            version,
            solver_cache: None,
        })
    }

    /// Locate an executable called `name` (by default `minizinc`) on the search path, or in the
    /// locations where MiniZinc is usually installed, and create a driver for it.
    pub fn find(name: Option<&str>) -> Result<Driver, ConfigurationError> {
        let name = name.unwrap_or("minizinc");

        let executable = which::which(name)
            .or_else(|_| {
                let cwd = std::env::current_dir().unwrap_or_default();
                let fallback = std::env::join_paths(FALLBACK_LOCATIONS).ok();
                which::which_in(name, fallback, cwd)
            })
            .map_err(|_| ConfigurationError::NotOnPath(name.to_owned()))?;

        Driver::new(executable)
    }

    #[cfg(test)]
    pub(crate) fn unchecked(executable: impl Into<PathBuf>, version: Version) -> Driver {
        Driver {
            executable: executable.into(),
            version,
            solver_cache: None,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The full text MiniZinc reports for `--version`.
    pub fn minizinc_version(&self) -> Result<String, Error> {
        let output = self.run(&["--version"], None)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run MiniZinc to completion with the given arguments.
    ///
    /// When a solver is given, its configuration stays alive until the process has ended. A
    /// non-zero exit status is turned into a [`crate::MiniZincError`].
    pub fn run<S: AsRef<OsStr>>(&self, args: &[S], solver: Option<&Solver>) -> Result<Output, Error> {
        let configuration = solver.map(Solver::configuration).transpose()?;

        let mut command = self.command(
            args,
            configuration.as_ref().map(SolverConfiguration::as_os_str),
        );
        debug!("Driver::run -> {command:?}");

        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(parse_error(&output.stderr).into());
        }

        Ok(output)
    }

    /// Start MiniZinc without waiting for it. Stdin is closed, stdout and stderr are piped. The
    /// process is killed when the returned handle is dropped.
    ///
    /// On unix MiniZinc leads a new process group, so that it can be signalled together with the
    /// solvers it starts.
    ///
    /// The solver configuration string must stay valid until the process has ended.
    pub fn create_process<S: AsRef<OsStr>>(
        &self,
        args: &[S],
        solver: Option<&OsStr>,
    ) -> Result<tokio::process::Child, Error> {
        let command = self.command(args, solver);
        debug!("Driver::create_process -> {command:?}");

        #[cfg(unix)]
        let command = {
            use std::os::unix::process::CommandExt;
            let mut command = command;
            let _ = command.process_group(0);
            command
        };

        let mut command = tokio::process::Command::from(command);
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        Ok(child)
    }

    /// All solvers known to MiniZinc, by every alias. The result of the first query is cached
    /// unless `refresh` is set.
    pub fn available_solvers(&mut self, refresh: bool) -> Result<&SolverRegistry, Error> {
        if refresh || self.solver_cache.is_none() {
            let output = self.run(&["--solvers-json"], None).map_err(|error| {
                ConfigurationError::DriverQuery {
                    path: self.executable.clone(),
                    reason: error.to_string(),
                }
            })?;
            self.solver_cache = Some(parse_registry(&output.stdout)?);
        }

        Ok(&*self.solver_cache.get_or_insert_with(SolverRegistry::new))
    }

    fn command<S: AsRef<OsStr>>(&self, args: &[S], solver: Option<&OsStr>) -> Command {
        let mut command = Command::new(&self.executable);

        if let Some(solver) = solver {
            let _ = command.arg("--solver").arg(solver);
        }
        let _ = command.arg("--allow-multiple-assignments").args(args);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            let _ = command.creation_flags(CREATE_NEW_CONSOLE);
        }

        command
    }
}

/// Build the registry from the output of `minizinc --solvers-json`.
pub(crate) fn parse_registry(json: &[u8]) -> Result<SolverRegistry, ConfigurationError> {
    let entries: Vec<serde_json::Value> = serde_json::from_slice(json)
        .map_err(|error| ConfigurationError::MalformedSolverList(error.to_string()))?;

    let mut registry = SolverRegistry::new();

    for entry in entries {
        let mut solver = match serde_json::from_value::<Solver>(entry) {
            Ok(solver) => solver,
            Err(error) => {
                warn!("Ignoring a solver reported by MiniZinc: {error}");
                continue;
            }
        };
        solver.register();

        let mut names: Vec<String> = Vec::new();
        let short_id = solver.id.rsplit('.').next().unwrap_or(&solver.id);
        for name in solver
            .tags
            .iter()
            .map(String::as_str)
            .chain([solver.id.as_str(), short_id])
        {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_owned());
            }
        }

        for name in names {
            registry.entry(name).or_default().push(solver.clone());
        }
    }

    Ok(registry)
}
