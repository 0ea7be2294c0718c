//! Contains the structures reported back from a solve.

mod parser;
mod solution;
mod statistics;
mod status;

use std::ops::Index;

pub(crate) use parser::OutputParser;
pub use solution::Solution;
pub use statistics::Statistic;
pub use statistics::Statistics;
pub use status::Status;

use crate::model::Value;

/// The result of solving an [`crate::Instance`]. Solutions are in the order in which they were
/// found, so for optimisation problems the last one is the best.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveResult {
    pub status: Status,
    pub solutions: Vec<Solution>,
    pub statistics: Statistics,
}

impl SolveResult {
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// The last (and for optimisation problems, the best) solution.
    pub fn solution(&self) -> Option<&Solution> {
        self.solutions.last()
    }

    /// The objective value of the best solution.
    pub fn objective(&self) -> Option<&Value> {
        self.solution()
            .and_then(|solution| solution.objective.as_ref())
    }
}

impl Index<usize> for SolveResult {
    type Output = Solution;

    fn index(&self, index: usize) -> &Solution {
        &self.solutions[index]
    }
}
