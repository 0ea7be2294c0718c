//! Errors reported by the driver.
//!
//! Two families exist: a [`ConfigurationError`] is raised whenever the environment or the
//! user-provided configuration cannot work (wrong executable, unknown solver, unknown parameter,
//! ...), whereas a [`MiniZincError`] is the structured form of whatever the `minizinc` executable
//! reported on stderr when it exited unsuccessfully.

use std::fmt::Display;
use std::fmt::Formatter;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::driver::Version;

/// The crate-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    MiniZinc(#[from] MiniZincError),
    #[error("I/O error while driving MiniZinc: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to process MiniZinc JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unable to decode MiniZinc output: {0}")]
    Output(String),
}

/// The configuration of the driver, the solver or the instance is not usable.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no MiniZinc executable exists at '{0}'")]
    ExecutableNotFound(PathBuf),
    #[error("unable to locate a MiniZinc executable named '{0}'")]
    NotOnPath(String),
    #[error(
        "the MiniZinc driver found at '{path}' has version {found}. The minimal required version \
         is {required}."
    )]
    IncompatibleVersion {
        path: PathBuf,
        found: Version,
        required: Version,
    },
    #[error("the MiniZinc driver at '{path}' could not be queried: {reason}")]
    DriverQuery { path: PathBuf, reason: String },
    #[error("the solver list reported by MiniZinc is malformed: {0}")]
    MalformedSolverList(String),
    #[error("no solver is registered under the tag '{0}'")]
    UnknownSolver(String),
    #[error("solver '{solver}' does not support the '{flag}' flag")]
    UnsupportedFlag { solver: String, flag: &'static str },
    #[error("finding all optimal solutions is not supported; request intermediate solutions instead")]
    AllOptimalSolutions,
    #[error("invalid solver configuration '{path}': {reason}")]
    InvalidSolverConfiguration { path: PathBuf, reason: String },
    #[error("'{0}' is neither a model (.mzn) nor a data (.dzn, .json) file")]
    UnsupportedFile(PathBuf),
    #[error("the parameter '{0}' is not declared in the model")]
    UnknownParameter(String),
    #[error("the value assigned to '{name}' has {found} dimension(s), but {expected} are declared")]
    ShapeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("the array assigned to '{0}' is not rectangular")]
    RaggedArray(String),
    #[error("the value assigned to '{0}' contains a float that is infinite or NaN")]
    NonFiniteFloat(String),
}

/// The classification MiniZinc attaches to an error message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MiniZincErrorKind {
    Syntax,
    Type,
    Evaluation,
    Assertion,
    /// The error was reported by the solver backend rather than the compiler.
    Solver,
    Other,
}

impl Display for MiniZincErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let description = match self {
            MiniZincErrorKind::Syntax => "syntax error",
            MiniZincErrorKind::Type => "type error",
            MiniZincErrorKind::Evaluation => "evaluation error",
            MiniZincErrorKind::Assertion => "assertion failure",
            MiniZincErrorKind::Solver => "solver error",
            MiniZincErrorKind::Other => "MiniZinc error",
        };

        write!(f, "{description}")
    }
}

/// The place in a model file that an error refers to. Lines and columns are 1-based and inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub lines: (u32, u32),
    pub columns: Option<(u32, u32)>,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.lines.0)?;

        if let Some((start, end)) = self.columns {
            if self.lines.0 == self.lines.1 {
                write!(f, ".{start}-{end}")?;
            } else {
                write!(f, ".{start}-{}.{end}", self.lines.1)?;
            }
        }

        Ok(())
    }
}

/// An error reported by the `minizinc` executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiniZincError {
    pub kind: MiniZincErrorKind,
    pub location: Option<Location>,
    pub message: String,
}

impl Display for MiniZincError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {location}: {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for MiniZincError {}

static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?P<file>[^\s:]+):(?P<line>\d+)(?:\.(?P<col>\d+)(?:-(?:(?P<end_line>\d+)\.)?(?P<end_col>\d+))?)?:",
    )
    .expect("location pattern is valid")
});

static MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:MiniZinc|Error): (?P<message>.*)$").expect("message pattern is valid")
});

/// Turn the stderr output of a failed `minizinc` invocation into a [`MiniZincError`].
pub fn parse_error(stderr: &[u8]) -> MiniZincError {
    let text = String::from_utf8_lossy(stderr);

    let message = MESSAGE
        .captures(&text)
        .and_then(|captures| captures.name("message"))
        .map(|message| message.as_str().trim().to_owned())
        .unwrap_or_else(|| text.trim().to_owned());

    MiniZincError {
        kind: classify(&text),
        location: parse_location(&text),
        message,
    }
}

fn classify(text: &str) -> MiniZincErrorKind {
    let lowercase = text.to_lowercase();

    if lowercase.contains("syntax error") {
        MiniZincErrorKind::Syntax
    } else if lowercase.contains("type error") {
        MiniZincErrorKind::Type
    } else if lowercase.contains("assertion failed") {
        MiniZincErrorKind::Assertion
    } else if lowercase.contains("evaluation error") {
        MiniZincErrorKind::Evaluation
    } else if lowercase.contains("=====error=====") || lowercase.contains("solver backend") {
        MiniZincErrorKind::Solver
    } else {
        MiniZincErrorKind::Other
    }
}

fn parse_location(text: &str) -> Option<Location> {
    let captures = LOCATION.captures(text)?;
    let number = |name: &str| {
        captures
            .name(name)
            .and_then(|value| value.as_str().parse::<u32>().ok())
    };

    let line = number("line")?;
    let end_line = number("end_line").unwrap_or(line);
    let columns = number("col").map(|start| (start, number("end_col").unwrap_or(start)));

    Some(Location {
        file: PathBuf::from(&captures["file"]),
        lines: (line, end_line),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_errors_carry_their_location() {
        let stderr = b"/tmp/model.mzn:3.12-18:\n  constraint x = \"a\";\n             ^^^^^^^\n\
MiniZinc: type error: type error in operator application for `='\n";

        let error = parse_error(stderr);

        assert_eq!(error.kind, MiniZincErrorKind::Type);
        assert_eq!(
            error.location,
            Some(Location {
                file: PathBuf::from("/tmp/model.mzn"),
                lines: (3, 3),
                columns: Some((12, 18)),
            })
        );
        assert_eq!(
            error.message,
            "type error: type error in operator application for `='"
        );
    }

    #[test]
    fn multi_line_locations_are_parsed() {
        let stderr = b"model.mzn:2.5-4.7:\nMiniZinc: evaluation error: division by zero\n";

        let error = parse_error(stderr);

        assert_eq!(error.kind, MiniZincErrorKind::Evaluation);
        let location = error.location.expect("a location");
        assert_eq!(location.lines, (2, 4));
        assert_eq!(location.columns, Some((5, 7)));
    }

    #[test]
    fn syntax_errors_without_columns() {
        let error = parse_error(b"model.mzn:7:\nError: syntax error, unexpected identifier\n");

        assert_eq!(error.kind, MiniZincErrorKind::Syntax);
        assert_eq!(error.location.map(|location| location.lines), Some((7, 7)));
    }

    #[test]
    fn assertion_failures_are_recognised() {
        let error = parse_error(
            b"model.mzn:1.1-20:\nMiniZinc: evaluation error:\n  Assertion failed: n must be positive\n",
        );

        assert_eq!(error.kind, MiniZincErrorKind::Assertion);
    }

    #[test]
    fn unstructured_output_falls_back_to_the_full_text() {
        let error = parse_error(b"  something unexpected happened  \n");

        assert_eq!(error.kind, MiniZincErrorKind::Other);
        assert_eq!(error.location, None);
        assert_eq!(error.message, "something unexpected happened");
    }
}
