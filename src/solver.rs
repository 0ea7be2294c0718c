//! Descriptions of the solvers MiniZinc can use.

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::ConfigurationError;
use crate::Driver;
use crate::Error;

/// The version MiniZinc reports for solvers that do not declare one.
const UNKNOWN_VERSION: &str = "<unknown version>";

/// A solver configuration, as found in `.msc` files and in the output of
/// `minizinc --solvers-json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solver {
    pub name: String,
    pub version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub mznlib: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub std_flags: Vec<String>,
    /// Solver specific flags: `[flag, description, type, default]`.
    #[serde(default)]
    pub extra_flags: Vec<Vec<String>>,
    #[serde(default)]
    pub required_flags: Vec<String>,
    #[serde(default = "default_input_type")]
    pub input_type: String,
    #[serde(default)]
    pub supports_mzn: bool,
    #[serde(default = "default_true")]
    pub supports_fzn: bool,
    #[serde(default, rename = "supportsNL")]
    pub supports_nl: bool,
    #[serde(default, rename = "needsSolns2Out")]
    pub needs_solns2_out: bool,
    #[serde(default, rename = "isGUIApplication")]
    pub is_gui_application: bool,
    #[serde(default)]
    pub needs_mzn_executable: bool,
    #[serde(default)]
    pub needs_stdlib_dir: bool,
    #[serde(default)]
    pub needs_paths_file: bool,
    #[serde(skip)]
    registration: Option<Registration>,
}

/// How MiniZinc knows a solver from its registry. The fingerprint is the serialised descriptor at
/// registration time; once the descriptor changes, the identifier no longer describes it.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Registration {
    identifier: String,
    fingerprint: Option<String>,
}

fn default_input_type() -> String {
    "FZN".to_owned()
}

fn default_true() -> bool {
    true
}

impl Solver {
    /// Describe a solver which is not part of the MiniZinc registry.
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Solver {
        Solver {
            name: name.into(),
            version: version.into(),
            id: id.into(),
            executable: None,
            mznlib: String::new(),
            tags: Vec::new(),
            std_flags: Vec::new(),
            extra_flags: Vec::new(),
            required_flags: Vec::new(),
            input_type: default_input_type(),
            supports_mzn: false,
            supports_fzn: true,
            supports_nl: false,
            needs_solns2_out: false,
            is_gui_application: false,
            needs_mzn_executable: false,
            needs_stdlib_dir: false,
            needs_paths_file: false,
            registration: None,
        }
    }

    /// Find the first solver registered under `tag`. A tag of the form `tag@version` only matches
    /// solvers with that version.
    pub fn lookup(tag: &str, driver: &mut Driver, refresh: bool) -> Result<Solver, Error> {
        let (name, version) = match tag.split_once('@') {
            Some((name, version)) => (name, Some(version)),
            None => (tag, None),
        };

        driver
            .available_solvers(refresh)?
            .get(name)
            .and_then(|candidates| {
                candidates
                    .iter()
                    .find(|solver| version.map_or(true, |version| solver.version == version))
            })
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownSolver(tag.to_owned()).into())
    }

    /// Load a solver from a `.msc` file. Relative paths in the file are resolved against the
    /// directory containing it.
    pub fn load(path: impl AsRef<Path>) -> Result<Solver, ConfigurationError> {
        let path = path.as_ref();
        let invalid = |reason: String| ConfigurationError::InvalidSolverConfiguration {
            path: path.to_path_buf(),
            reason,
        };

        let contents = std::fs::read(path).map_err(|error| invalid(error.to_string()))?;
        let mut solver: Solver =
            serde_json::from_slice(&contents).map_err(|error| invalid(error.to_string()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        if let Some(executable) = solver.executable.as_mut() {
            if executable.is_relative() {
                *executable = base.join(&*executable);
            }
        }
        if !solver.mznlib.is_empty()
            && !solver.mznlib.starts_with("-G")
            && Path::new(&solver.mznlib).is_relative()
        {
            solver.mznlib = base.join(&solver.mznlib).to_string_lossy().into_owned();
        }

        Ok(solver)
    }

    /// Mark the solver as known to MiniZinc under its identifier.
    pub(crate) fn register(&mut self) {
        let identifier = if self.version == UNKNOWN_VERSION {
            self.id.clone()
        } else {
            format!("{}@{}", self.id, self.version)
        };

        self.registration = None;
        let fingerprint = serde_json::to_string(self).ok();
        self.registration = Some(Registration {
            identifier,
            fingerprint,
        });
    }

    /// The identifier under which MiniZinc knows this solver, if it came from the registry and has
    /// not been changed since.
    pub fn identifier(&self) -> Option<&str> {
        let registration = self.registration.as_ref()?;
        let fingerprint = registration.fingerprint.as_deref()?;

        (serde_json::to_string(self).ok()?.as_str() == fingerprint)
            .then_some(registration.identifier.as_str())
    }

    /// Whether the solver declares support for a standard flag such as `-a`.
    pub fn supports(&self, flag: &str) -> bool {
        self.std_flags.iter().any(|supported| supported == flag)
    }

    /// The solver serialised as a `.msc` configuration.
    pub fn output_configuration(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The value to pass to `--solver`. It stays valid until the returned guard is dropped.
    pub fn configuration(&self) -> Result<SolverConfiguration, Error> {
        if let Some(identifier) = self.identifier() {
            return Ok(SolverConfiguration {
                source: ConfigurationSource::Identifier(identifier.to_owned()),
            });
        }

        let mut file = tempfile::Builder::new()
            .prefix("minizinc_solver_")
            .suffix(".msc")
            .tempfile()?;
        file.write_all(self.output_configuration()?.as_bytes())?;
        file.flush()?;

        Ok(SolverConfiguration {
            source: ConfigurationSource::File(file),
        })
    }
}

/// A solver configuration passed to MiniZinc. A configuration written to a temporary file is
/// removed when this is dropped.
#[derive(Debug)]
pub struct SolverConfiguration {
    source: ConfigurationSource,
}

#[derive(Debug)]
enum ConfigurationSource {
    Identifier(String),
    File(NamedTempFile),
}

impl SolverConfiguration {
    pub fn as_os_str(&self) -> &OsStr {
        match &self.source {
            ConfigurationSource::Identifier(identifier) => OsStr::new(identifier),
            ConfigurationSource::File(file) => file.path().as_os_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> Solver {
        let mut solver = Solver::new("org.gecode.gecode", "Gecode", "6.3.0");
        solver.std_flags = vec!["-a".to_owned(), "-n".to_owned()];
        solver.register();
        solver
    }

    #[test]
    fn registered_solvers_are_passed_by_identifier() {
        let solver = registered();

        let configuration = solver.configuration().expect("configuration");

        assert_eq!(configuration.as_os_str(), OsStr::new("org.gecode.gecode@6.3.0"));
    }

    #[test]
    fn modified_solvers_are_written_to_a_temporary_file() {
        let mut solver = registered();
        solver.executable = Some(PathBuf::from("/opt/gecode/fzn-gecode"));
        assert_eq!(solver.identifier(), None);

        let configuration = solver.configuration().expect("configuration");
        let path = PathBuf::from(configuration.as_os_str());
        assert_eq!(path.extension(), Some(OsStr::new("msc")));

        let written: Solver =
            serde_json::from_slice(&std::fs::read(&path).expect("readable")).expect("valid msc");
        assert_eq!(written.executable, solver.executable);
        assert_eq!(written.std_flags, solver.std_flags);

        drop(configuration);
        assert!(!path.exists());
    }

    #[test]
    fn msc_files_resolve_relative_paths() {
        let directory = tempfile::tempdir().expect("temporary directory");
        let path = directory.path().join("mysolver.msc");
        std::fs::write(
            &path,
            r#"{"id": "org.example.mysolver", "name": "MySolver", "version": "1.0",
                "executable": "bin/fzn-mysolver", "mznlib": "share/mznlib",
                "stdFlags": ["-a"], "isGUIApplication": false}"#,
        )
        .expect("writable");

        let solver = Solver::load(&path).expect("valid configuration");

        assert_eq!(
            solver.executable,
            Some(directory.path().join("bin/fzn-mysolver"))
        );
        assert_eq!(
            PathBuf::from(&solver.mznlib),
            directory.path().join("share/mznlib")
        );
        assert!(solver.supports("-a"));
        assert!(!solver.supports("-p"));
        assert_eq!(solver.input_type, "FZN");
        assert_eq!(solver.identifier(), None);
    }

    #[test]
    fn invalid_msc_files_are_configuration_errors() {
        let directory = tempfile::tempdir().expect("temporary directory");
        let path = directory.path().join("broken.msc");
        std::fs::write(&path, "{\"name\": \"Broken\"}").expect("writable");

        assert!(matches!(
            Solver::load(&path),
            Err(ConfigurationError::InvalidSolverConfiguration { .. })
        ));
    }
}
