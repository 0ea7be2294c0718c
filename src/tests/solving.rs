#![cfg(test)]
//! Solves small models with a real MiniZinc installation and Gecode. These are ignored by default;
//! run them with `cargo test -- --ignored`.

use std::sync::Arc;

use crate::Driver;
use crate::Instance;
use crate::Model;
use crate::SolveOptions;
use crate::Solver;
use crate::Status;
use crate::Value;

const ASSIGN: &str = "include \"globals.mzn\";\n\
                      int: n;\n\
                      array[1..4] of var 1..5: x;\n\
                      constraint increasing(x);\n\
                      constraint alldifferent(x);\n\
                      constraint sum(x) = n;";

const BRANCH: &str = "include \"globals.mzn\";\n\
                      var 14..15: n;\n\
                      array[1..4] of var 1..5: x;\n\
                      constraint increasing(x);\n\
                      constraint sum(x) = n;";

fn gecode(code: &str) -> Instance {
    let mut driver = Driver::find(None).expect("MiniZinc is installed");
    let solver = Solver::lookup("gecode", &mut driver, false).expect("Gecode is installed");

    Instance::new(Arc::new(driver), solver, Model::from_string(code))
}

fn all_solutions() -> SolveOptions {
    SolveOptions {
        all_solutions: true,
        ..Default::default()
    }
}

#[test]
#[ignore = "requires MiniZinc with Gecode"]
fn assigned_parameters_are_used() {
    let mut instance = gecode(ASSIGN);
    instance.set("n", 14);

    let result = instance.solve(&all_solutions()).expect("successful solve");

    assert_eq!(result.status, Status::AllSolutions);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0]["x"], Value::from(vec![2, 3, 4, 5]));
}

#[test]
#[ignore = "requires MiniZinc with Gecode"]
fn the_last_assignment_wins() {
    let mut instance = gecode(ASSIGN);
    instance.set("n", 14);
    instance.set("n", 15);

    let result = instance.solve(&all_solutions()).expect("successful solve");

    assert_eq!(result.status, Status::Unsatisfiable);
    assert!(result.is_empty());
}

#[test]
#[ignore = "requires MiniZinc with Gecode"]
fn sibling_branches_add_data_independently() {
    let instance = gecode(BRANCH);

    let result = instance.solve(&all_solutions()).expect("successful solve");
    assert_eq!(result.status, Status::AllSolutions);
    assert_eq!(result.len(), 12);

    let mut fifteen = instance.branch();
    fifteen.set("n", 15);
    let mut fourteen = instance.branch();
    fourteen.set("n", 14);

    let result = fifteen.solve(&all_solutions()).expect("successful solve");
    assert_eq!(result.status, Status::AllSolutions);
    assert_eq!(result.len(), 5);

    let result = fourteen.solve(&all_solutions()).expect("successful solve");
    assert_eq!(result.status, Status::AllSolutions);
    assert_eq!(result.len(), 7);
}

#[test]
#[ignore = "requires MiniZinc with Gecode"]
fn constraints_added_to_a_branch_stay_in_the_branch() {
    let mut instance = gecode(BRANCH);
    instance.set("n", 14);

    let mut child = instance.branch();
    child.add_to_model("constraint all_different(x);");

    let result = child.solve(&all_solutions()).expect("successful solve");
    assert_eq!(result.status, Status::AllSolutions);
    assert_eq!(result.len(), 1);

    let result = instance.solve(&all_solutions()).expect("successful solve");
    assert_eq!(result.len(), 7);
}

#[test]
#[ignore = "requires MiniZinc with Gecode"]
fn branch_data_is_added_to_inherited_data() {
    let mut instance = gecode(BRANCH);
    instance.set("n", 14);

    let mut child = instance.branch();
    child.set("n", 15);

    let result = child.solve(&all_solutions()).expect("successful solve");
    assert_eq!(result.status, Status::Unsatisfiable);
    assert!(result.is_empty());
}

#[tokio::test]
#[ignore = "requires MiniZinc with Gecode"]
async fn branches_can_be_solved_concurrently() {
    let instance = gecode(BRANCH);

    let mut fifteen = instance.branch();
    fifteen.set("n", 15);
    let mut fourteen = instance.branch();
    fourteen.set("n", 14);

    let options = all_solutions();
    let (fifteen, fourteen) = tokio::join!(
        fifteen.solve_async(&options),
        fourteen.solve_async(&options)
    );

    assert_eq!(fifteen.expect("successful solve").len(), 5);
    assert_eq!(fourteen.expect("successful solve").len(), 7);
}
