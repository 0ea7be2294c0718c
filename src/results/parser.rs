use std::collections::BTreeMap;
use std::time::Duration;

use super::Solution;
use super::Statistics;
use super::Status;
use crate::types::Method;
use crate::types::ValueType;
use crate::Error;

const SOLUTION_SEPARATOR: &str = "----------";
const SEARCH_COMPLETE: &str = "==========";
const STATISTIC_PREFIX: &str = "%%%mzn-stat:";
const ELAPSED_PREFIX: &str = "% time elapsed:";

/// Incrementally interprets the output of `minizinc --output-mode json`, one line at a time.
#[derive(Debug)]
pub(crate) struct OutputParser {
    method: Method,
    output_types: BTreeMap<String, ValueType>,
    buffer: String,
    marker: Option<Status>,
    complete: bool,
    solutions_found: usize,
    statistics: Statistics,
}

impl OutputParser {
    pub(crate) fn new(method: Method, output_types: BTreeMap<String, ValueType>) -> OutputParser {
        OutputParser {
            method,
            output_types,
            buffer: String::new(),
            marker: None,
            complete: false,
            solutions_found: 0,
            statistics: Statistics::default(),
        }
    }

    /// Process a line of output. Returns the solution the line completes, if any.
    pub(crate) fn feed_line(&mut self, line: &str) -> Result<Option<Solution>, Error> {
        let line = line.trim_end();

        if line == SOLUTION_SEPARATOR {
            return self.take_solution().map(Some);
        }

        if line == SEARCH_COMPLETE {
            self.complete = true;
        } else if let Some(status) = Status::from_marker(line) {
            self.marker = Some(status);
        } else if let Some(pair) = line.strip_prefix(STATISTIC_PREFIX) {
            self.statistics.record(pair);
        } else if let Some(elapsed) = line.strip_prefix(ELAPSED_PREFIX) {
            let seconds = elapsed.trim().trim_end_matches('s').trim();
            if let Ok(seconds) = seconds.parse::<f64>() {
                if seconds.is_finite() && seconds >= 0.0 {
                    self.statistics
                        .record_elapsed(Duration::from_secs_f64(seconds));
                }
            }
        } else if !line.starts_with('%') {
            self.buffer.push_str(line);
            self.buffer.push('\n');
        }

        Ok(None)
    }

    fn take_solution(&mut self) -> Result<Solution, Error> {
        let text = std::mem::take(&mut self.buffer);
        self.solutions_found += 1;

        if text.trim().is_empty() {
            return Ok(Solution::default());
        }

        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)?;
        Ok(Solution::from_json(object, &self.output_types))
    }

    /// The status implied by the output processed so far.
    pub(crate) fn status(&self) -> Status {
        if let Some(marker) = self.marker {
            marker
        } else if self.complete {
            match self.method {
                Method::Satisfy => Status::AllSolutions,
                Method::Minimize | Method::Maximize => Status::OptimalSolution,
            }
        } else if self.solutions_found > 0 {
            Status::Satisfied
        } else {
            Status::Unknown
        }
    }

    pub(crate) fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub(crate) fn into_statistics(self) -> Statistics {
        self.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;
    use crate::results::Statistic;

    fn parse(method: Method, output: &str) -> (Status, Vec<Solution>, Statistics) {
        let mut output_types = BTreeMap::new();
        let _ = output_types.insert(
            "x".to_owned(),
            ValueType::Array(Box::new(ValueType::Int)),
        );

        let mut parser = OutputParser::new(method, output_types);
        let mut solutions = Vec::new();
        for line in output.lines() {
            if let Some(solution) = parser.feed_line(line).expect("valid output") {
                solutions.push(solution);
            }
        }

        (parser.status(), solutions, parser.into_statistics())
    }

    #[test]
    fn all_solutions_of_a_satisfaction_problem() {
        let output = "{\n  \"x\" : [1, 2, 3, 4]\n}\n----------\n{\n  \"x\" : [1, 2, 3, 5]\n}\n\
                      % time elapsed: 0.25 s\n----------\n==========\n%%%mzn-stat: nodes=9\n\
                      %%%mzn-stat-end\n";

        let (status, solutions, statistics) = parse(Method::Satisfy, output);

        assert_eq!(status, Status::AllSolutions);
        assert_eq!(solutions.len(), 2);
        assert_eq!(solutions[1]["x"], Value::from(vec![1, 2, 3, 5]));
        assert_eq!(statistics.get("nodes"), Some(&Statistic::Int(9)));
        assert_eq!(
            statistics.get("time"),
            Some(&Statistic::Duration(Duration::from_millis(250)))
        );
    }

    #[test]
    fn single_solution_is_satisfied() {
        let (status, solutions, _) = parse(Method::Satisfy, "{\"x\": [3]}\n----------\n");

        assert_eq!(status, Status::Satisfied);
        assert_eq!(solutions.len(), 1);
    }

    #[test]
    fn optimal_solutions_carry_their_objective() {
        let output = "{\"x\": [1], \"_objective\": 7, \"_output\": \"x = [1];\\n\"}\n----------\n==========\n";

        let (status, solutions, _) = parse(Method::Minimize, output);

        assert_eq!(status, Status::OptimalSolution);
        assert_eq!(solutions[0].objective, Some(Value::Int(7)));
        assert_eq!(solutions[0].output.as_deref(), Some("x = [1];\n"));
        assert_eq!(solutions[0].get("_objective"), None);
    }

    #[test]
    fn status_markers_take_precedence() {
        let (status, solutions, _) = parse(Method::Satisfy, "=====UNSATISFIABLE=====\n");
        assert_eq!(status, Status::Unsatisfiable);
        assert!(solutions.is_empty());

        let (status, _, _) = parse(Method::Maximize, "=====UNBOUNDED=====\n");
        assert_eq!(status, Status::Unbounded);

        let (status, _, _) = parse(Method::Satisfy, "");
        assert_eq!(status, Status::Unknown);
    }

    #[test]
    fn malformed_solutions_are_errors() {
        let mut parser = OutputParser::new(Method::Satisfy, BTreeMap::new());
        let _ = parser.feed_line("{\"x\": ").expect("buffered");

        assert!(matches!(
            parser.feed_line("----------"),
            Err(Error::Json(_))
        ));
    }
}
