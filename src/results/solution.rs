use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::Index;

use crate::model::Value;
use crate::types::ValueType;

/// The values MiniZinc reported for a single solution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Solution {
    assignments: BTreeMap<String, Value>,
    /// The value of the objective, for optimisation problems.
    pub objective: Option<Value>,
    /// The text produced by the output item of the model.
    pub output: Option<String>,
    /// The output of a solution checker, if one was used.
    pub checker: Option<String>,
}

impl Solution {
    /// Decode a solution from the JSON object MiniZinc prints in `--output-mode json`.
    pub(crate) fn from_json(
        object: serde_json::Map<String, serde_json::Value>,
        output_types: &BTreeMap<String, ValueType>,
    ) -> Solution {
        let mut solution = Solution::default();

        for (name, json) in object {
            match name.as_str() {
                "_objective" => solution.objective = Some(Value::from_json(&json, None)),
                "_output" => solution.output = json.as_str().map(str::to_owned),
                "_checker" => solution.checker = json.as_str().map(str::to_owned),
                _ => {
                    let value = Value::from_json(&json, output_types.get(&name));
                    let _ = solution.assignments.insert(name, value);
                }
            }
        }

        solution
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.assignments.get(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.assignments.iter()
    }

    pub fn assignments(&self) -> &BTreeMap<String, Value> {
        &self.assignments
    }
}

impl Index<&str> for Solution {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        self.assignments
            .get(name)
            .unwrap_or_else(|| panic!("the solution does not assign '{name}'"))
    }
}
