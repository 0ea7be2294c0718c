use std::fmt::Display;
use std::fmt::Formatter;

/// The outcome of a solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// An error occurred.
    Error,
    /// No solution was found and the search did not finish.
    Unknown,
    /// The objective is unbounded.
    Unbounded,
    /// The problem is either unsatisfiable or unbounded.
    UnsatOrUnbounded,
    /// The problem has no solutions.
    Unsatisfiable,
    /// At least one solution was found.
    Satisfied,
    /// All solutions were found.
    AllSolutions,
    /// A solution was found and proven optimal.
    OptimalSolution,
}

impl Status {
    /// Whether solutions are reported with this status.
    pub fn has_solution(self) -> bool {
        matches!(
            self,
            Status::Satisfied | Status::AllSolutions | Status::OptimalSolution
        )
    }

    /// The status announced by one of the `=====...=====` lines MiniZinc prints.
    pub(crate) fn from_marker(line: &str) -> Option<Status> {
        match line {
            "=====ERROR=====" => Some(Status::Error),
            "=====UNKNOWN=====" => Some(Status::Unknown),
            "=====UNBOUNDED=====" => Some(Status::Unbounded),
            "=====UNSATorUNBOUNDED=====" => Some(Status::UnsatOrUnbounded),
            "=====UNSATISFIABLE=====" => Some(Status::Unsatisfiable),
            _ => None,
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Error => "ERROR",
            Status::Unknown => "UNKNOWN",
            Status::Unbounded => "UNBOUNDED",
            Status::UnsatOrUnbounded => "UNSATorUNBOUNDED",
            Status::Unsatisfiable => "UNSATISFIABLE",
            Status::Satisfied => "SATISFIED",
            Status::AllSolutions => "ALL_SOLUTIONS",
            Status::OptimalSolution => "OPTIMAL_SOLUTION",
        };

        write!(f, "{name}")
    }
}
